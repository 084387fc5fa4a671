//! Subtopic registry and parallel activator.
//!
//! Holds the registered expert handlers (one per category bucket) and
//! fans a scenario out to every handler whose category is active,
//! concurrently. Handler invocations are isolated: a failure, timeout, or
//! empty result from one handler is logged and excluded from the
//! aggregate, and never aborts sibling calls.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use crate::categories::Category;
use crate::error::{CodingError, CodingResult};
use crate::types::CategoryActivation;

pub type SyncHandlerFn = Arc<dyn Fn(&str) -> CodingResult<String> + Send + Sync>;
pub type AsyncHandlerFn =
    Arc<dyn Fn(String) -> BoxFuture<'static, CodingResult<String>> + Send + Sync>;

/// A registered handler, synchronous or asynchronous. Call sites never
/// branch on the kind: `run` dispatches, offloading synchronous handlers
/// to the blocking pool so they cannot stall the scheduler.
#[derive(Clone)]
pub enum ExpertHandler {
    Sync(SyncHandlerFn),
    Async(AsyncHandlerFn),
}

impl ExpertHandler {
    pub fn from_sync<F>(f: F) -> Self
    where
        F: Fn(&str) -> CodingResult<String> + Send + Sync + 'static,
    {
        ExpertHandler::Sync(Arc::new(f))
    }

    pub fn from_async<F>(f: F) -> Self
    where
        F: Fn(String) -> BoxFuture<'static, CodingResult<String>> + Send + Sync + 'static,
    {
        ExpertHandler::Async(Arc::new(f))
    }

    pub async fn run(&self, scenario: String) -> CodingResult<String> {
        match self {
            ExpertHandler::Sync(f) => {
                let f = Arc::clone(f);
                tokio::task::spawn_blocking(move || f(&scenario))
                    .await
                    .map_err(|e| CodingError::Inference(format!("handler panicked: {}", e)))?
            }
            ExpertHandler::Async(f) => f(scenario).await,
        }
    }
}

impl std::fmt::Debug for ExpertHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExpertHandler::Sync(_) => f.debug_struct("ExpertHandler::Sync").finish(),
            ExpertHandler::Async(_) => f.debug_struct("ExpertHandler::Async").finish(),
        }
    }
}

#[derive(Debug, Clone)]
struct Registration {
    category: Category,
    name: String,
    handler: ExpertHandler,
}

/// Registry of expert handlers plus the fan-out executor.
#[derive(Debug)]
pub struct SubtopicRegistry {
    registrations: Vec<Registration>,
    max_parallel: usize,
    handler_timeout: Duration,
}

impl SubtopicRegistry {
    pub fn new(max_parallel: usize, handler_timeout: Duration) -> Self {
        Self {
            registrations: Vec::new(),
            max_parallel: max_parallel.max(1),
            handler_timeout,
        }
    }

    pub fn register(
        &mut self,
        category: Category,
        handler: ExpertHandler,
        name: impl Into<String>,
    ) {
        self.registrations.push(Registration {
            category,
            name: name.into(),
            handler,
        });
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Invoke every registered handler whose category is active, all
    /// concurrently under the parallelism bound. Returns the successful
    /// activations plus the names of the handlers that were actually
    /// invoked (for observability). Result order is unspecified;
    /// downstream keys off `category`, not position.
    pub async fn activate_all(
        &self,
        scenario_text: &str,
        active_categories: &HashSet<Category>,
    ) -> (Vec<CategoryActivation>, Vec<String>) {
        let selected: Vec<Registration> = self
            .registrations
            .iter()
            .filter(|r| active_categories.contains(&r.category))
            .cloned()
            .collect();

        let activated_names: Vec<String> = selected.iter().map(|r| r.name.clone()).collect();
        if selected.is_empty() {
            return (Vec::new(), activated_names);
        }

        let semaphore = Arc::new(Semaphore::new(self.max_parallel));
        let timeout = self.handler_timeout;
        let mut handles = Vec::with_capacity(selected.len());

        for registration in selected {
            let permit = Arc::clone(&semaphore);
            let scenario = scenario_text.to_string();

            let handle = tokio::spawn(async move {
                let _permit = permit.acquire().await.expect("semaphore closed");

                let outcome =
                    tokio::time::timeout(timeout, registration.handler.run(scenario)).await;
                match outcome {
                    Ok(Ok(raw_text)) if !raw_text.trim().is_empty() => {
                        debug!(
                            handler = %registration.name,
                            bytes = raw_text.len(),
                            "expert handler produced output"
                        );
                        Some(CategoryActivation {
                            category: registration.category,
                            name: registration.name,
                            raw_text,
                        })
                    }
                    Ok(Ok(_)) => {
                        warn!(handler = %registration.name, "expert handler returned empty output, skipping");
                        None
                    }
                    Ok(Err(e)) => {
                        warn!(handler = %registration.name, error = %e, "expert handler failed, skipping");
                        None
                    }
                    Err(_) => {
                        warn!(
                            handler = %registration.name,
                            timeout_s = timeout.as_secs(),
                            "expert handler timed out, skipping"
                        );
                        None
                    }
                }
            });
            handles.push(handle);
        }

        let mut activations = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(Some(activation)) => activations.push(activation),
                Ok(None) => {}
                Err(e) => warn!(error = %e, "expert handler task panicked"),
            }
        }

        (activations, activated_names)
    }
}
