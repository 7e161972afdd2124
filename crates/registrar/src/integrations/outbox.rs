use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{LmsSync, Notification, Notifier};
use crate::workflows::academic::domain::{EnrollmentId, OfferingId};

/// Best-effort work queued after a workflow commits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SideEffect {
    Notify(Notification),
    LmsProvisionStudent(EnrollmentId),
    LmsSyncOffering(OfferingId),
}

/// Creates a connected outbox and its delivery worker.
pub fn outbox(notifier: Arc<dyn Notifier>, lms: Arc<dyn LmsSync>) -> (Outbox, OutboxWorker) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (
        Outbox { sender },
        OutboxWorker {
            receiver: Mutex::new(receiver),
            delivery: Delivery { notifier, lms },
        },
    )
}

/// Producer half handed to the workflows. Enqueueing never blocks or fails the
/// caller, so synchronous workflow code can use it directly.
#[derive(Clone)]
pub struct Outbox {
    sender: UnboundedSender<SideEffect>,
}

impl Outbox {
    pub fn enqueue(&self, effect: SideEffect) {
        if let Err(SendError(effect)) = self.sender.send(effect) {
            warn!(?effect, "outbox worker stopped; side effect dropped");
        }
    }
}

/// Delivers queued side effects, logging and discarding failures.
pub struct OutboxWorker {
    receiver: Mutex<UnboundedReceiver<SideEffect>>,
    delivery: Delivery,
}

impl OutboxWorker {
    /// Delivers everything queued so far without waiting for more.
    pub fn drain(&self) -> usize {
        let mut receiver = self.receiver.lock();
        let mut delivered = 0;
        while let Ok(effect) = receiver.try_recv() {
            self.delivery.deliver(effect);
            delivered += 1;
        }
        delivered
    }

    /// Moves delivery onto a runtime task that finishes once every
    /// [`Outbox`] handle is dropped. Must be called inside a tokio runtime.
    pub fn spawn(self) -> JoinHandle<usize> {
        let OutboxWorker { receiver, delivery } = self;
        tokio::spawn(async move {
            let mut receiver = receiver.into_inner();
            let mut delivered = 0;
            while let Some(effect) = receiver.recv().await {
                delivery.deliver(effect);
                delivered += 1;
            }
            debug!(delivered, "outbox closed");
            delivered
        })
    }
}

struct Delivery {
    notifier: Arc<dyn Notifier>,
    lms: Arc<dyn LmsSync>,
}

impl Delivery {
    fn deliver(&self, effect: SideEffect) {
        match effect {
            SideEffect::Notify(notification) => {
                let kind = notification.kind;
                let recipient = notification.recipient.clone();
                if let Err(error) = self.notifier.notify(notification) {
                    warn!(%error, ?kind, %recipient, "notification failed");
                }
            }
            SideEffect::LmsProvisionStudent(enrollment_id) => {
                if let Err(error) = self.lms.provision_student(&enrollment_id) {
                    warn!(%error, %enrollment_id, "lms student provisioning failed");
                }
            }
            SideEffect::LmsSyncOffering(offering_id) => {
                if let Err(error) = self.lms.sync_course_offering(&offering_id) {
                    warn!(%error, %offering_id, "lms offering sync failed");
                }
            }
        }
    }
}
