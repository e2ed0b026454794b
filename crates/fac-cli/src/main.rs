use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use uuid::Uuid;

mod commands;

#[derive(Parser)]
#[command(name = "fac")]
#[command(about = "Finance admin console operator CLI", long_about = None)]
struct Cli {
    /// Layered config paths in merge order (repeatable). Defaults apply when omitted.
    #[arg(long = "config", global = true)]
    config_paths: Vec<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Database commands
    Db {
        #[command(subcommand)]
        cmd: DbCmd,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> site -> local)
        #[arg(required = true)]
        paths: Vec<String>,

        /// Fail when keys the daemon never reads are present
        #[arg(long, default_value_t = false)]
        strict: bool,
    },

    /// Garnishment profile commands
    Profile {
        #[command(subcommand)]
        cmd: ProfileCmd,
    },

    /// Employee loan commands
    Loans {
        #[command(subcommand)]
        cmd: LoansCmd,
    },

    /// Audit trail utilities
    Audit {
        #[command(subcommand)]
        cmd: AuditCmd,
    },
}

#[derive(Subcommand)]
enum DbCmd {
    Status,
    /// Apply embedded SQL migrations
    Migrate,
}

#[derive(Subcommand)]
enum ProfileCmd {
    /// List all profiles with their stored balances
    List,

    /// Recompute a profile's totals from its installments and report drift
    Check {
        #[arg(long)]
        id: String,
    },
}

#[derive(Subcommand)]
enum LoansCmd {
    /// Print an employee's outstanding loan balance
    Outstanding {
        #[arg(long)]
        employee: String,
    },

    /// Preview the snapshot a new withdrawal would record
    Evaluate {
        #[arg(long)]
        employee: String,

        /// Requested amount, e.g. 500.00
        #[arg(long)]
        amount: String,
    },
}

#[derive(Subcommand)]
enum AuditCmd {
    /// Verify the hash chain of an audit JSONL mirror
    Verify {
        #[arg(long)]
        path: String,
    },

    /// Reconstruct a record's history. Reads the JSONL mirror when --path is
    /// given, otherwise the database audit table.
    History {
        #[arg(long)]
        table: String,

        #[arg(long = "record-id")]
        record_id: String,

        #[arg(long)]
        path: Option<String>,
    },
}

fn parse_uuid(raw: &str, what: &str) -> Result<Uuid> {
    Uuid::parse_str(raw.trim()).with_context(|| format!("invalid {what} uuid"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    commands::init_tracing();

    let cli = Cli::parse();
    let config_paths = cli.config_paths;

    match cli.cmd {
        Commands::Db { cmd } => {
            let cfg = commands::load_config(&config_paths)?;
            let pool = commands::connect(&cfg).await?;
            match cmd {
                DbCmd::Status => {
                    let s = fac_db::status(&pool).await?;
                    println!("db_ok={} has_profiles_table={}", s.ok, s.has_profiles_table);
                }
                DbCmd::Migrate => {
                    fac_db::migrate(&pool).await?;
                    println!("migrations_applied=true");
                }
            }
        }

        Commands::ConfigHash { paths, strict } => commands::config::hash(&paths, strict)?,

        Commands::Profile { cmd } => {
            let console = commands::console(&config_paths).await?;
            match cmd {
                ProfileCmd::List => commands::ledger::list_profiles(&console).await?,
                ProfileCmd::Check { id } => {
                    let id = parse_uuid(&id, "profile id")?;
                    commands::ledger::check_profile(&console, id).await?;
                }
            }
        }

        Commands::Loans { cmd } => {
            let console = commands::console(&config_paths).await?;
            match cmd {
                LoansCmd::Outstanding { employee } => {
                    let id = parse_uuid(&employee, "employee id")?;
                    commands::ledger::outstanding(&console, id).await?;
                }
                LoansCmd::Evaluate { employee, amount } => {
                    let id = parse_uuid(&employee, "employee id")?;
                    commands::ledger::evaluate(&console, id, &amount).await?;
                }
            }
        }

        Commands::Audit { cmd } => match cmd {
            AuditCmd::Verify { path } => commands::audit::verify(&path)?,
            AuditCmd::History {
                table,
                record_id,
                path,
            } => {
                let record_id = parse_uuid(&record_id, "record id")?;
                match path {
                    Some(path) => commands::audit::history_from_file(&path, &table, record_id)?,
                    None => {
                        let console = commands::console(&config_paths).await?;
                        commands::audit::history_from_db(&console, &table, record_id).await?;
                    }
                }
            }
        },
    }

    Ok(())
}
