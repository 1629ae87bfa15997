// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// In-memory browser
//
// Factory of in-memory contexts plus the engine-wide knobs tests use to
// inject failures: failing origins, slow navigations, failing construction,
// failing closes, and page scripts.

use crate::error::{Error, Result};
use crate::protocol::{BrowserContext, ContextFactory, ContextLaunchOptions};
use crate::server::in_memory_context::InMemoryContext;
use crate::server::in_memory_page::InMemoryPage;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

/// A page script: receives the page it runs in and the evaluate argument
pub type ScriptFn = Arc<dyn Fn(&InMemoryPage, Value) -> Result<Value> + Send + Sync>;

/// Engine-wide state shared by the browser, its contexts, and their pages
#[derive(Default)]
pub(crate) struct Engine {
    next_id: AtomicU64,
    scripts: Mutex<HashMap<String, ScriptFn>>,
    failing_origins: Mutex<HashSet<String>>,
    navigation_delay: Mutex<Duration>,
    fail_next_context: Mutex<Option<String>>,
    fail_close: AtomicBool,
}

impl Engine {
    pub(crate) fn next_guid(&self, kind: &str) -> String {
        format!("{}@{}", kind, self.next_id.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub(crate) fn script(&self, expression: &str) -> Option<ScriptFn> {
        self.scripts.lock().get(expression).cloned()
    }

    pub(crate) fn fails_navigation_to(&self, origin: &str) -> bool {
        self.failing_origins.lock().contains(origin)
    }

    pub(crate) fn navigation_delay(&self) -> Duration {
        *self.navigation_delay.lock()
    }

    pub(crate) fn fails_close(&self) -> bool {
        self.fail_close.load(Ordering::SeqCst)
    }
}

/// In-process stand-in for a browser: a [`ContextFactory`] with faithful
/// cookie, storage, route, trace, and video semantics.
#[derive(Default)]
pub struct InMemoryBrowser {
    engine: Arc<Engine>,
    contexts: Mutex<Vec<Arc<InMemoryContext>>>,
}

impl std::fmt::Debug for InMemoryBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBrowser")
            .field("contexts", &self.contexts.lock().len())
            .finish()
    }
}

impl InMemoryBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a script `evaluate` can run.
    ///
    /// The reset scripts are built in; any other expression must be defined
    /// here or evaluation fails.
    pub fn define_script<F>(&self, expression: impl Into<String>, script: F)
    where
        F: Fn(&InMemoryPage, Value) -> Result<Value> + Send + Sync + 'static,
    {
        self.engine
            .scripts
            .lock()
            .insert(expression.into(), Arc::new(script));
    }

    /// Makes every navigation to `origin` fail.
    pub fn fail_navigation_to(&self, origin: impl Into<String>) {
        self.engine.failing_origins.lock().insert(origin.into());
    }

    /// Delays every navigation to a tuple origin.
    pub fn set_navigation_delay(&self, delay: Duration) {
        *self.engine.navigation_delay.lock() = delay;
    }

    /// Makes the next `new_context` call fail with `message`.
    pub fn fail_next_context(&self, message: impl Into<String>) {
        *self.engine.fail_next_context.lock() = Some(message.into());
    }

    /// Makes context closes fail.
    pub fn fail_context_close(&self, fail: bool) {
        self.engine.fail_close.store(fail, Ordering::SeqCst);
    }

    /// Every context created so far, in creation order
    pub fn contexts(&self) -> Vec<Arc<InMemoryContext>> {
        self.contexts.lock().clone()
    }

    pub fn context(&self, guid: &str) -> Option<Arc<InMemoryContext>> {
        self.contexts
            .lock()
            .iter()
            .find(|context| context.guid() == guid)
            .cloned()
    }

    /// Contexts not closed yet
    pub fn open_contexts(&self) -> Vec<Arc<InMemoryContext>> {
        self.contexts
            .lock()
            .iter()
            .filter(|context| !context.is_closed())
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ContextFactory for InMemoryBrowser {
    async fn new_context(&self, launch: &ContextLaunchOptions) -> Result<Arc<dyn BrowserContext>> {
        if let Some(message) = self.engine.fail_next_context.lock().take() {
            return Err(Error::Construction(message));
        }
        if let Some(video) = &launch.record_video {
            tokio::fs::create_dir_all(&video.dir).await?;
        }

        let context = InMemoryContext::new(self.engine.clone(), launch.clone());
        tracing::debug!("In-memory context {} created", context.guid());
        self.contexts.lock().push(context.clone());
        Ok(context)
    }
}
