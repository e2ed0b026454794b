use std::sync::Arc;

use chrono::Utc;
use fac_audit::{reconstruct_history, AuditEntry, HistoryPoint};
use fac_reconcile::{
    check_consistency, plan_create_installment, plan_delete_profile, plan_new_profile,
    plan_status_change, plan_update_installment, ConsistencyReport,
};
use fac_schemas::{
    EntityKind, FinanceError, FinanceResult, Installment, InstallmentPatch, NewInstallment,
    NewProfile, ObligationProfile, Principal, ProfileStatus, Role,
};
use tracing::info;
use uuid::Uuid;

use crate::retry::retry_once_on_conflict;
use crate::{AuditLog, AuditMirror, ChangeBus, GarnishmentStore, KeyedLocks, ProfileAggregate};

/// Garnishment Reconciliation Engine.
///
/// Every mutation holds the profile's in-process lock, reads the profile and
/// its installments from the store, plans, then commits conditional on the
/// version it read.
pub struct GarnishmentEngine {
    store: Arc<dyn GarnishmentStore>,
    audit_log: Arc<dyn AuditLog>,
    bus: ChangeBus,
    locks: KeyedLocks,
    mirror: Option<AuditMirror>,
}

impl GarnishmentEngine {
    pub fn new(
        store: Arc<dyn GarnishmentStore>,
        audit_log: Arc<dyn AuditLog>,
        bus: ChangeBus,
        mirror: Option<AuditMirror>,
    ) -> Self {
        Self {
            store,
            audit_log,
            bus,
            locks: KeyedLocks::new(),
            mirror,
        }
    }

    async fn committed(&self, entries: &[AuditEntry]) {
        self.bus.publish_all(entries);
        if let Some(m) = &self.mirror {
            m.record(entries).await;
        }
    }

    // -----------------------------------------------------------------------
    // Profiles
    // -----------------------------------------------------------------------

    pub async fn create_profile(
        &self,
        principal: &Principal,
        draft: NewProfile,
    ) -> FinanceResult<ObligationProfile> {
        principal.require_edit()?;
        let (profile, audit) = plan_new_profile(&draft, principal, Utc::now())?;
        self.store.insert_profile(&profile, &audit).await?;
        info!(
            profile_id = %profile.id,
            case_number = %profile.case_number,
            owed = %profile.total_amount_owed,
            "garnishment profile created"
        );
        self.committed(std::slice::from_ref(&audit)).await;
        Ok(profile)
    }

    pub async fn get_profile(&self, profile_id: Uuid) -> FinanceResult<ProfileAggregate> {
        self.store.load_profile(profile_id).await
    }

    pub async fn list_profiles(&self) -> FinanceResult<Vec<ObligationProfile>> {
        self.store.list_profiles().await
    }

    pub async fn change_profile_status(
        &self,
        principal: &Principal,
        profile_id: Uuid,
        target: ProfileStatus,
    ) -> FinanceResult<ObligationProfile> {
        principal.require_edit()?;
        let _guard = self.locks.lock(profile_id).await;

        let plan = retry_once_on_conflict("change_profile_status", || async move {
            let agg = self.store.load_profile(profile_id).await?;
            let plan = plan_status_change(&agg.profile, target, principal, Utc::now())?;
            self.store.commit_status(&plan).await?;
            Ok(plan)
        })
        .await?;

        info!(
            profile_id = %profile_id,
            status = %plan.profile.status,
            version = plan.profile.version,
            "garnishment profile status changed"
        );
        self.committed(&plan.audit).await;
        Ok(plan.profile)
    }

    /// Administrative correction only.
    pub async fn delete_profile(&self, principal: &Principal, profile_id: Uuid) -> FinanceResult<()> {
        principal.require_any(&[Role::Admin], "delete a garnishment profile")?;
        let _guard = self.locks.lock(profile_id).await;

        let plan = retry_once_on_conflict("delete_profile", || async move {
            let agg = self.store.load_profile(profile_id).await?;
            let plan = plan_delete_profile(&agg.profile, &agg.installments, principal, Utc::now())?;
            self.store.delete_profile(&plan).await?;
            Ok(plan)
        })
        .await?;

        info!(profile_id = %profile_id, "garnishment profile deleted");
        self.committed(&plan.audit).await;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Installments
    // -----------------------------------------------------------------------

    pub async fn create_installment(
        &self,
        principal: &Principal,
        profile_id: Uuid,
        draft: NewInstallment,
    ) -> FinanceResult<Installment> {
        principal.require_edit()?;
        let _guard = self.locks.lock(profile_id).await;

        let draft = &draft;
        let plan = retry_once_on_conflict("create_installment", || async move {
            let agg = self.store.load_profile(profile_id).await?;
            let plan = plan_create_installment(
                &agg.profile,
                &agg.installments,
                draft,
                principal,
                Utc::now(),
            )?;
            self.store.commit_installment(&plan).await?;
            Ok(plan)
        })
        .await?;

        info!(
            profile_id = %profile_id,
            installment_number = plan.installment.installment_number,
            amount = %plan.installment.amount,
            balance_remaining = %plan.profile.balance_remaining,
            "installment recorded"
        );
        self.committed(&plan.audit).await;
        Ok(plan.installment)
    }

    pub async fn update_installment(
        &self,
        principal: &Principal,
        installment_id: Uuid,
        patch: InstallmentPatch,
    ) -> FinanceResult<Installment> {
        principal.require_edit()?;
        let profile_id = self.store.find_installment(installment_id).await?.profile_id;
        let _guard = self.locks.lock(profile_id).await;

        let patch = &patch;
        let plan = retry_once_on_conflict("update_installment", || async move {
            let agg = self.store.load_profile(profile_id).await?;
            let plan = plan_update_installment(
                &agg.profile,
                &agg.installments,
                installment_id,
                patch,
                principal,
                Utc::now(),
            )?;
            self.store.commit_installment(&plan).await?;
            Ok(plan)
        })
        .await?;

        info!(
            profile_id = %profile_id,
            installment_id = %installment_id,
            amount = %plan.installment.amount,
            balance_remaining = %plan.profile.balance_remaining,
            "installment updated"
        );
        self.committed(&plan.audit).await;
        Ok(plan.installment)
    }

    // -----------------------------------------------------------------------
    // Read-side checks
    // -----------------------------------------------------------------------

    pub async fn check_profile(&self, profile_id: Uuid) -> FinanceResult<ConsistencyReport> {
        let agg = self.store.load_profile(profile_id).await?;
        let report = check_consistency(&agg.profile, &agg.installments);
        if !report.is_clean() {
            tracing::warn!(
                profile_id = %profile_id,
                findings = report.findings.len(),
                "garnishment profile is inconsistent"
            );
        }
        Ok(report)
    }

    pub async fn audit_history(
        &self,
        table_name: &str,
        record_id: Uuid,
    ) -> FinanceResult<Vec<AuditEntry>> {
        if EntityKind::from_table_name(table_name).is_none() {
            return Err(FinanceError::validation(format!(
                "unknown audited table: {table_name}"
            )));
        }
        self.audit_log.history(table_name, record_id).await
    }

    pub async fn reconstruct(
        &self,
        table_name: &str,
        record_id: Uuid,
    ) -> FinanceResult<Vec<HistoryPoint>> {
        let entries = self.audit_history(table_name, record_id).await?;
        Ok(reconstruct_history(&entries))
    }
}
