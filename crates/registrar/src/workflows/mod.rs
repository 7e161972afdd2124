//! The registrar workflows and the composition root that wires them to one
//! shared store.

pub mod academic;
pub mod admissions;
mod error;
pub mod finance;
pub mod http;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::Router;

pub use error::WorkflowError;
pub use http::{ApiState, ACTOR_HEADER};

use crate::clock::{Clock, SystemClock};
use crate::config::PolicyConfig;
use crate::integrations::{
    outbox, BlobStore, LmsSync, MemoryBlobStore, Notifier, OutboxWorker, PermissionLookup,
    RecordingLms, RecordingNotifier,
};
use crate::store::Store;
use academic::{
    CatalogService, EnrollmentWorkflow, PrerequisiteGraph, StudentIdentifierGenerator,
};
use admissions::{ApplicationWorkflow, InquiryWorkflow, PeopleDirectory};
use finance::{BillingWorkflow, LedgerEngine, PaymentWebhook};

/// External services the workflows call out to.
#[derive(Clone)]
pub struct Collaborators {
    pub notifier: Arc<dyn Notifier>,
    pub blobs: Arc<dyn BlobStore>,
    pub lms: Arc<dyn LmsSync>,
    pub clock: Arc<dyn Clock>,
}

impl Collaborators {
    /// In-process stand-ins, used by the demo server.
    pub fn in_memory() -> Self {
        Self {
            notifier: Arc::new(RecordingNotifier::default()),
            blobs: Arc::new(MemoryBlobStore::default()),
            lms: Arc::new(RecordingLms::default()),
            clock: Arc::new(SystemClock),
        }
    }
}

/// Every workflow, sharing one store and one outbox.
pub struct Registrar {
    pub store: Arc<Store>,
    pub people: Arc<PeopleDirectory>,
    pub inquiries: Arc<InquiryWorkflow>,
    pub applications: Arc<ApplicationWorkflow>,
    pub catalog: Arc<CatalogService>,
    pub prerequisites: Arc<PrerequisiteGraph>,
    pub identifiers: Arc<StudentIdentifierGenerator>,
    pub enrollments: Arc<EnrollmentWorkflow>,
    pub ledger: Arc<LedgerEngine>,
    pub billing: Arc<BillingWorkflow>,
}

impl Registrar {
    /// Builds the workflows. The returned worker delivers queued side effects
    /// and must be drained or spawned by the caller.
    pub fn new(policy: &PolicyConfig, collaborators: Collaborators) -> (Self, OutboxWorker) {
        let Collaborators {
            notifier,
            blobs,
            lms,
            clock,
        } = collaborators;
        let (outbox, worker) = outbox(notifier, lms);
        let store = Arc::new(Store::new());

        let people = Arc::new(PeopleDirectory::new(Arc::clone(&store), Arc::clone(&clock)));
        let inquiries = Arc::new(InquiryWorkflow::new(
            Arc::clone(&store),
            Arc::clone(&people),
            Arc::clone(&clock),
        ));
        let applications = Arc::new(ApplicationWorkflow::new(
            Arc::clone(&store),
            Arc::clone(&people),
            blobs,
            outbox.clone(),
            Arc::clone(&clock),
            policy.min_approved_documents,
        ));
        let catalog = Arc::new(CatalogService::new(Arc::clone(&store)));
        let prerequisites = Arc::new(PrerequisiteGraph::new(Arc::clone(&store)));
        let identifiers = Arc::new(StudentIdentifierGenerator::new(
            Arc::clone(&store),
            Arc::clone(&clock),
        ));
        let enrollments = Arc::new(EnrollmentWorkflow::new(
            Arc::clone(&store),
            Arc::clone(&prerequisites),
            Arc::clone(&identifiers),
            outbox,
            Arc::clone(&clock),
        ));
        let ledger = Arc::new(LedgerEngine::new(Arc::clone(&clock)));
        let billing = Arc::new(BillingWorkflow::new(
            Arc::clone(&store),
            Arc::clone(&enrollments),
            Arc::clone(&ledger),
            clock,
            policy,
        ));

        let registrar = Self {
            store,
            people,
            inquiries,
            applications,
            catalog,
            prerequisites,
            identifiers,
            enrollments,
            ledger,
            billing,
        };
        (registrar, worker)
    }
}

/// All workflow routes with the permission gate applied per route.
pub fn router(
    registrar: Arc<Registrar>,
    permissions: Arc<dyn PermissionLookup>,
    webhook: Arc<PaymentWebhook>,
) -> Router {
    let state = ApiState {
        registrar,
        permissions,
        webhook,
    };
    Router::new()
        .merge(admissions::admissions_router())
        .merge(academic::academic_router())
        .merge(finance::finance_router())
        .with_state(state)
}
