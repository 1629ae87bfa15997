// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// In-memory page
//
// A page has a URL, per-origin sessionStorage, and its own routes. Origin
// storage (localStorage, IndexedDB) lives on the owning context. Evaluation
// understands the storage reset scripts plus whatever the browser defines.

use crate::error::{Error, Result};
use crate::protocol::{
    InterceptedRequest, LocalStorageItem, Page, RouteDecision, RouteHandler, origin_of,
};
use crate::reuse::storage_reset::{CLEAR_STORAGE_SCRIPT, SEED_LOCAL_STORAGE_SCRIPT};
use crate::server::in_memory_context::InMemoryContext;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Weak};

const BLANK: &str = "about:blank";

/// A route registered on a page or context
pub(crate) struct Route {
    pattern: glob::Pattern,
    pub(crate) handler: RouteHandler,
}

impl Route {
    pub(crate) fn new(pattern: &str, handler: RouteHandler) -> Result<Self> {
        let pattern = glob::Pattern::new(pattern)
            .map_err(|e| Error::InvalidArgument(format!("Invalid route pattern '{}': {}", pattern, e)))?;
        Ok(Self { pattern, handler })
    }

    pub(crate) fn matches(&self, url: &str) -> bool {
        self.pattern.matches(url)
    }
}

#[derive(Default)]
struct PageState {
    url: String,
    closed: bool,
    session_storage: BTreeMap<String, BTreeMap<String, String>>,
    routes: Vec<Route>,
}

pub struct InMemoryPage {
    guid: String,
    context: Weak<InMemoryContext>,
    state: Mutex<PageState>,
}

impl std::fmt::Debug for InMemoryPage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryPage")
            .field("guid", &self.guid)
            .field("url", &state.url)
            .field("closed", &state.closed)
            .finish()
    }
}

impl InMemoryPage {
    pub(crate) fn new(guid: String, context: Weak<InMemoryContext>) -> Self {
        Self {
            guid,
            context,
            state: Mutex::new(PageState {
                url: BLANK.to_string(),
                ..PageState::default()
            }),
        }
    }

    fn context(&self, operation: &str) -> Result<Arc<InMemoryContext>> {
        let context = self
            .context
            .upgrade()
            .ok_or_else(|| Error::target_closed("context", operation))?;
        context.ensure_open(operation)?;
        Ok(context)
    }

    fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.state.lock().closed {
            return Err(Error::target_closed("page", operation));
        }
        Ok(())
    }

    fn require_origin(&self) -> Result<String> {
        self.origin().ok_or_else(|| {
            Error::Evaluation(format!(
                "SecurityError: storage is not available at '{}'",
                self.url()
            ))
        })
    }

    /// Origin of the current document, `None` when opaque
    pub fn origin(&self) -> Option<String> {
        origin_of(&self.state.lock().url)
    }

    /// localStorage of the current origin
    pub fn local_storage(&self) -> BTreeMap<String, String> {
        match (self.origin(), self.context.upgrade()) {
            (Some(origin), Some(context)) => context.local_storage(&origin),
            _ => BTreeMap::new(),
        }
    }

    /// `localStorage.setItem(key, value)` in the current document.
    pub fn set_local_storage(&self, key: &str, value: &str) -> Result<()> {
        let origin = self.require_origin()?;
        let context = self.context("localStorage")?;
        context.with_local_storage(&origin, |items| {
            items.insert(key.to_string(), value.to_string());
        });
        Ok(())
    }

    /// sessionStorage of the current origin in this page
    pub fn session_storage(&self) -> BTreeMap<String, String> {
        let Some(origin) = self.origin() else {
            return BTreeMap::new();
        };
        self.state
            .lock()
            .session_storage
            .get(&origin)
            .cloned()
            .unwrap_or_default()
    }

    /// `sessionStorage.setItem(key, value)` in the current document.
    pub fn set_session_storage(&self, key: &str, value: &str) -> Result<()> {
        let origin = self.require_origin()?;
        self.ensure_open("sessionStorage")?;
        self.state
            .lock()
            .session_storage
            .entry(origin)
            .or_default()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// `indexedDB.open(name)` in the current document.
    pub fn open_indexed_db(&self, name: &str) -> Result<()> {
        let origin = self.require_origin()?;
        self.context("indexedDB")?.open_indexed_db(&origin, name);
        Ok(())
    }

    /// IndexedDB database names of the current origin
    pub fn indexed_db_names(&self) -> BTreeSet<String> {
        match (self.origin(), self.context.upgrade()) {
            (Some(origin), Some(context)) => context.indexed_db_names(&origin),
            _ => BTreeSet::new(),
        }
    }

    /// Number of routes registered on the page itself
    pub fn route_count(&self) -> usize {
        self.state.lock().routes.len()
    }

    fn route_for(&self, url: &str) -> Option<RouteHandler> {
        self.state
            .lock()
            .routes
            .iter()
            .rev()
            .find(|route| route.matches(url))
            .map(|route| route.handler.clone())
    }
}

#[async_trait]
impl Page for InMemoryPage {
    fn guid(&self) -> &str {
        &self.guid
    }

    fn url(&self) -> String {
        self.state.lock().url.clone()
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.ensure_open("goto")?;
        let context = self.context("goto")?;

        if let Some(origin) = origin_of(url) {
            if context.engine.fails_navigation_to(&origin) {
                return Err(Error::NavigationFailed {
                    url: url.to_string(),
                    message: "net::ERR_CONNECTION_REFUSED".to_string(),
                });
            }

            // A page route answers before context routes see the request
            if let Some(handler) = self.route_for(url).or_else(|| context.route_for(url)) {
                let request = InterceptedRequest {
                    url: url.to_string(),
                    method: "GET".to_string(),
                };
                if let RouteDecision::Abort(code) = handler(request).await? {
                    return Err(Error::NavigationFailed {
                        url: url.to_string(),
                        message: format!("net::ERR_{}", code.to_uppercase()),
                    });
                }
            }

            let delay = context.engine.navigation_delay();
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        } else if url != BLANK && !url.starts_with("data:") {
            return Err(Error::NavigationFailed {
                url: url.to_string(),
                message: "invalid URL".to_string(),
            });
        }

        // The page may have been closed while navigating
        self.ensure_open("goto")?;
        self.state.lock().url = url.to_string();
        context.trace("goto", &self.guid, url, url);
        Ok(())
    }

    async fn evaluate(&self, expression: &str, arg: Value) -> Result<Value> {
        self.ensure_open("evaluate")?;
        let context = self.context("evaluate")?;

        let result = if expression == CLEAR_STORAGE_SCRIPT {
            let origin = self.require_origin()?;
            context.clear_origin(&origin);
            self.state.lock().session_storage.remove(&origin);
            Value::Null
        } else if expression == SEED_LOCAL_STORAGE_SCRIPT {
            let origin = self.require_origin()?;
            let items: Vec<LocalStorageItem> = serde_json::from_value(arg)?;
            context.with_local_storage(&origin, |storage| {
                for item in items {
                    storage.insert(item.name, item.value);
                }
            });
            Value::Null
        } else if let Some(script) = context.engine.script(expression) {
            script(self, arg)?
        } else {
            return Err(Error::Evaluation(format!(
                "ReferenceError: unsupported expression: {}",
                expression
            )));
        };

        context.trace("evaluate", &self.guid, expression, &self.url());
        Ok(result)
    }

    async fn click(&self, selector: &str) -> Result<()> {
        self.ensure_open("click")?;
        let context = self.context("click")?;
        context.record_click(&self.guid, selector);
        context.trace("click", &self.guid, selector, &self.url());
        Ok(())
    }

    async fn route(&self, pattern: &str, handler: RouteHandler) -> Result<()> {
        self.ensure_open("route")?;
        let route = Route::new(pattern, handler)?;
        self.state.lock().routes.push(route);
        Ok(())
    }

    async fn unroute_all(&self) -> Result<()> {
        self.state.lock().routes.clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        {
            let mut state = self.state.lock();
            if state.closed {
                return Ok(());
            }
            state.closed = true;
            state.routes.clear();
            state.session_storage.clear();
        }

        let Some(context) = self.context.upgrade() else {
            return Ok(());
        };
        context.forget_page(&self.guid);
        if let Some(dir) = context.video_dir() {
            let path = dir.join(format!("{}.webm", self.guid.replace('@', "-")));
            tokio::fs::write(&path, format!("webm:{}", self.guid)).await?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
