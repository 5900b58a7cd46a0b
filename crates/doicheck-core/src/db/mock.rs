//! Mock registry for testing.

use std::collections::HashMap;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use super::{LookupError, LookupFuture, MetadataRegistry, WorkMetadata};

/// A configurable mock response for [`MockRegistry`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    Found(WorkMetadata),
    Failed(LookupError),
}

/// A hand-rolled registry that answers from a table instead of the network.
///
/// Supports:
/// - A fallback response used for any DOI not in the table.
/// - Per-DOI responses via [`with_response`](MockRegistry::with_response).
/// - Recording every looked-up DOI via [`calls()`](MockRegistry::calls).
/// - Cancelling a token after the N-th lookup, to simulate Ctrl+C mid-run.
pub struct MockRegistry {
    responses: HashMap<String, MockResponse>,
    fallback: MockResponse,
    calls: Mutex<Vec<String>>,
    cancel_after: Option<(usize, CancellationToken)>,
}

impl MockRegistry {
    /// Create a mock that answers every DOI with `fallback`.
    pub fn new(fallback: MockResponse) -> Self {
        Self {
            responses: HashMap::new(),
            fallback,
            calls: Mutex::new(Vec::new()),
            cancel_after: None,
        }
    }

    pub fn with_response(mut self, doi: &str, response: MockResponse) -> Self {
        self.responses.insert(doi.to_string(), response);
        self
    }

    /// Cancel `token` once `n` lookups have completed.
    pub fn cancel_after(mut self, n: usize, token: CancellationToken) -> Self {
        self.cancel_after = Some((n, token));
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or(0)
    }
}

impl MetadataRegistry for MockRegistry {
    fn name(&self) -> &str {
        "Mock"
    }

    fn lookup<'a>(&'a self, doi: &'a str) -> LookupFuture<'a> {
        Box::pin(async move {
            let count = match self.calls.lock() {
                Ok(mut calls) => {
                    calls.push(doi.to_string());
                    calls.len()
                }
                Err(_) => 0,
            };
            if let Some((n, token)) = &self.cancel_after
                && count >= *n
            {
                token.cancel();
            }

            match self.responses.get(doi).unwrap_or(&self.fallback) {
                MockResponse::Found(work) => Ok(work.clone()),
                MockResponse::Failed(err) => Err(err.clone()),
            }
        })
    }
}
