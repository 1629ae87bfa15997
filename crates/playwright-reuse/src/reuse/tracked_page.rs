// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Page handed to a test body
//
// Every suspending call is registered with the context's pending-operation
// registry, so the test boundary can stop it.

use crate::error::{Error, Result};
use crate::protocol::{Page, origin_of};
use crate::reuse::cancellation::{OperationKind, PendingOperation, PendingOperations};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

/// Default interval between `wait_for_function` polls
const DEFAULT_POLLING: Duration = Duration::from_millis(100);

/// A page whose operations end with the test that started them
#[derive(Debug, Clone)]
pub struct TrackedPage {
    page: Arc<dyn Page>,
    operations: Arc<PendingOperations>,
    visited: Arc<Mutex<BTreeSet<String>>>,
}

impl TrackedPage {
    /// Wraps `page`; origins it navigates to are added to `visited`.
    pub fn new(
        page: Arc<dyn Page>,
        operations: Arc<PendingOperations>,
        visited: Arc<Mutex<BTreeSet<String>>>,
    ) -> Self {
        Self {
            page,
            operations,
            visited,
        }
    }

    /// The underlying page, for calls that need no tracking
    pub fn page(&self) -> &Arc<dyn Page> {
        &self.page
    }

    pub fn operations(&self) -> &Arc<PendingOperations> {
        &self.operations
    }

    pub fn url(&self) -> String {
        self.page.url()
    }

    /// Starts a navigation and returns its handle without waiting.
    pub fn spawn_goto(&self, url: &str) -> PendingOperation<()> {
        // Recorded up front: a navigation cut short may still have written storage
        if let Some(origin) = origin_of(url) {
            self.visited.lock().insert(origin);
        }
        let page = self.page.clone();
        let target = url.to_string();
        self.operations
            .spawn(OperationKind::Navigation, format!("goto {}", url), async move {
                page.goto(&target).await
            })
    }

    pub async fn goto(&self, url: &str) -> Result<()> {
        self.spawn_goto(url).await
    }

    /// Starts an evaluation and returns its handle without waiting.
    pub fn spawn_evaluate(&self, expression: &str, arg: Value) -> PendingOperation<Value> {
        let page = self.page.clone();
        let script = expression.to_string();
        self.operations
            .spawn(OperationKind::Evaluation, "evaluate", async move {
                page.evaluate(&script, arg).await
            })
    }

    pub async fn evaluate(&self, expression: &str, arg: Value) -> Result<Value> {
        self.spawn_evaluate(expression, arg).await
    }

    /// Starts a click and returns its handle without waiting.
    pub fn spawn_click(&self, selector: &str) -> PendingOperation<()> {
        let page = self.page.clone();
        let target = selector.to_string();
        self.operations
            .spawn(OperationKind::Action, format!("click {}", selector), async move {
                page.click(&target).await
            })
    }

    pub async fn click(&self, selector: &str) -> Result<()> {
        self.spawn_click(selector).await
    }

    /// Polls `expression` until it returns a truthy value.
    ///
    /// Never settles on its own if the value stays falsy; the test timeout or
    /// the test boundary ends it.
    pub fn spawn_wait_for_function(
        &self,
        expression: &str,
        arg: Value,
        polling: Option<Duration>,
    ) -> PendingOperation<Value> {
        let page = self.page.clone();
        let script = expression.to_string();
        let interval = polling.unwrap_or(DEFAULT_POLLING);
        self.operations
            .spawn(OperationKind::Wait, "waitForFunction", async move {
                loop {
                    if page.is_closed() {
                        return Err(Error::target_closed("page", "waitForFunction"));
                    }
                    let value = page.evaluate(&script, arg.clone()).await?;
                    if is_truthy(&value) {
                        return Ok(value);
                    }
                    tokio::time::sleep(interval).await;
                }
            })
    }

    pub async fn wait_for_function(
        &self,
        expression: &str,
        arg: Value,
        polling: Option<Duration>,
    ) -> Result<Value> {
        self.spawn_wait_for_function(expression, arg, polling).await
    }
}

/// JavaScript truthiness of a JSON value
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_truthiness() {
        assert!(!is_truthy(&json!(null)));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(false)));
        assert!(is_truthy(&json!([])));
        assert!(is_truthy(&json!({})));
        assert!(is_truthy(&json!("0")));
        assert!(is_truthy(&json!(-1.5)));
    }
}
