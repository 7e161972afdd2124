use chrono::NaiveDate;
use metrics_exporter_prometheus::PrometheusHandle;
use registrar::config::PolicyConfig;
use registrar::error::AppError;
use registrar::integrations::{OutboxWorker, StaticPermissions};
use registrar::workflows::{Collaborators, Registrar, WorkflowError};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Builds the workflows on in-memory collaborators and opens the tuition fund
/// so payments have somewhere to post.
pub(crate) fn build_registrar(
    policy: &PolicyConfig,
    collaborators: Collaborators,
) -> Result<(Registrar, OutboxWorker), AppError> {
    let (registrar, worker) = Registrar::new(policy, collaborators);
    match registrar.ledger.create_fund(&policy.tuition_fund) {
        Ok(fund) => info!(fund_id = %fund.id, name = %fund.name, "tuition fund opened"),
        Err(WorkflowError::Conflict(_)) => {}
        Err(err) => return Err(err.into()),
    }
    Ok((registrar, worker))
}

/// Role table for the in-memory deployment.
pub(crate) fn staff_permissions() -> StaticPermissions {
    StaticPermissions::new()
        .grant("admissions-officer", &["admissions.read", "admissions.write"])
        .grant("registrar", &["academic.write", "academic.enrollment.write"])
        .grant("bursar", &["finance.write"])
        .grant(
            "admin",
            &[
                "admissions.read",
                "admissions.write",
                "academic.write",
                "academic.enrollment.write",
                "finance.write",
            ],
        )
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate, String> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|err| format!("failed to parse '{raw}' as YYYY-MM-DD ({err})"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use registrar::integrations::PermissionLookup;

    #[test]
    fn parse_date_trims_and_reports_bad_input() {
        assert_eq!(
            parse_date(" 2025-09-01 ").expect("valid"),
            NaiveDate::from_ymd_opt(2025, 9, 1).expect("valid date")
        );
        assert!(parse_date("09/01/2025")
            .expect_err("wrong format")
            .contains("YYYY-MM-DD"));
    }

    #[test]
    fn roles_are_scoped() {
        let permissions = staff_permissions();
        assert!(permissions.has_permission("bursar", "finance.write"));
        assert!(!permissions.has_permission("bursar", "admissions.write"));
        assert!(permissions.has_permission("admin", "academic.enrollment.write"));
    }

    #[test]
    fn registrar_starts_with_the_tuition_fund() {
        let policy = PolicyConfig::default();
        let (registrar, _worker) =
            build_registrar(&policy, Collaborators::in_memory()).expect("registrar");
        assert!(registrar.ledger.fund_by_name(&policy.tuition_fund).is_some());
    }
}
