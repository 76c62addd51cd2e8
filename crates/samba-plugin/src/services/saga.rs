//! Compensating-action runner for multi-step workflows.
//!
//! Forward steps run in order. After a step succeeds the caller may register
//! a compensation for it. If a later step fails, the registered
//! compensations run once each in reverse order, and their own failures are
//! logged and counted but never returned.

use crate::errors::PluginError;
use crate::observability::metrics::{record_compensation, record_meeting_failure};
use futures::future::BoxFuture;
use std::future::Future;
use tracing::{error, info};

struct Compensation {
    label: &'static str,
    action: BoxFuture<'static, Result<(), PluginError>>,
}

/// One workflow run.
#[derive(Default)]
pub struct Saga {
    compensations: Vec<Compensation>,
}

impl Saga {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run one forward step.
    ///
    /// On failure every registered compensation runs before the error is
    /// returned.
    pub async fn run<T, F>(&mut self, step: &'static str, future: F) -> Result<T, PluginError>
    where
        F: Future<Output = Result<T, PluginError>>,
    {
        match future.await {
            Ok(value) => Ok(value),
            Err(e) => {
                error!(target: "ds.services.saga", step, error = %e, "Workflow step failed");
                record_meeting_failure(step);
                self.compensate().await;
                Err(e)
            }
        }
    }

    /// Register the undo action for a step that already succeeded.
    pub fn on_rollback<F>(&mut self, label: &'static str, action: F)
    where
        F: Future<Output = Result<(), PluginError>> + Send + 'static,
    {
        self.compensations.push(Compensation {
            label,
            action: Box::pin(action),
        });
    }

    /// Number of compensations currently registered.
    pub fn pending(&self) -> usize {
        self.compensations.len()
    }

    /// Finish the workflow; registered compensations are dropped unrun.
    pub fn commit(mut self) {
        self.compensations.clear();
    }

    async fn compensate(&mut self) {
        // Drain so a second failure cannot run anything twice.
        while let Some(compensation) = self.compensations.pop() {
            match compensation.action.await {
                Ok(()) => {
                    info!(target: "ds.services.saga", label = compensation.label, "Compensation succeeded");
                    record_compensation("success");
                }
                Err(e) => {
                    error!(
                        target: "ds.services.saga",
                        label = compensation.label,
                        error = %e,
                        "Compensation failed"
                    );
                    record_compensation("error");
                }
            }
        }
    }
}
