//! Blocking and suspending execution of store calls.
//!
//! Every operation is written once as async code. The async services await
//! store calls; the blocking services run the same code with
//! `Execution::Blocking`, where each store call must complete on its first
//! poll. A store that suspends under a blocking caller is a usage error.

use std::future::Future;

use futures::FutureExt;

use crate::error::{Result, SoftDeleteError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Execution {
    Blocking,
    Suspending,
}

impl Execution {
    /// Drive one store call.
    pub async fn run<F: Future>(self, operation: &'static str, call: F) -> Result<F::Output> {
        match self {
            Self::Suspending => Ok(call.await),
            Self::Blocking => call
                .now_or_never()
                .ok_or(SoftDeleteError::SyncOverAsync { operation }),
        }
    }
}

/// Complete a whole blocking operation without an executor.
pub fn settle<T>(operation: &'static str, task: impl Future<Output = Result<T>>) -> Result<T> {
    task.now_or_never()
        .ok_or(SoftDeleteError::SyncOverAsync { operation })?
}
