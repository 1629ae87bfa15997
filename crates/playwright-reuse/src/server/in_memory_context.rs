// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// In-memory browser context
//
// Owns the cookie jar, per-origin localStorage and IndexedDB names, the page
// list, context routes, and the trace recorder. Pages reach back through a
// weak reference so a dropped context does not outlive its owner.

use crate::error::{Error, Result};
use crate::protocol::{
    BrowserContext, ContextLaunchOptions, Cookie, LocalStorageItem, Origin, Page, RouteHandler,
    StorageState, Tracing,
};
use crate::server::in_memory_browser::Engine;
use crate::server::in_memory_page::{InMemoryPage, Route};
use crate::server::in_memory_tracing::InMemoryTracing;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::{Arc, Weak};

/// A click that reached a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickRecord {
    pub page_guid: String,
    pub selector: String,
}

#[derive(Default)]
struct ContextState {
    cookies: Vec<Cookie>,
    local_storage: BTreeMap<String, BTreeMap<String, String>>,
    indexed_db: BTreeMap<String, BTreeSet<String>>,
    pages: Vec<Arc<InMemoryPage>>,
    routes: Vec<Route>,
    clicks: Vec<ClickRecord>,
    closed: bool,
}

pub struct InMemoryContext {
    guid: String,
    me: Weak<InMemoryContext>,
    pub(crate) engine: Arc<Engine>,
    launch: ContextLaunchOptions,
    tracing: Arc<InMemoryTracing>,
    state: Mutex<ContextState>,
}

impl std::fmt::Debug for InMemoryContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("InMemoryContext")
            .field("guid", &self.guid)
            .field("pages", &state.pages.len())
            .field("closed", &state.closed)
            .finish()
    }
}

impl InMemoryContext {
    pub(crate) fn new(engine: Arc<Engine>, launch: ContextLaunchOptions) -> Arc<Self> {
        let guid = engine.next_guid("context");
        let mut state = ContextState::default();
        if let Some(seed) = &launch.storage_state {
            state.cookies = seed.cookies.clone();
            for origin in &seed.origins {
                state.local_storage.insert(
                    origin.origin.clone(),
                    origin
                        .local_storage
                        .iter()
                        .map(|item| (item.name.clone(), item.value.clone()))
                        .collect(),
                );
            }
        }

        Arc::new_cyclic(|me| Self {
            guid,
            me: me.clone(),
            engine,
            launch,
            tracing: Arc::new(InMemoryTracing::new()),
            state: Mutex::new(state),
        })
    }

    /// Options the context was constructed with
    pub fn launch_options(&self) -> &ContextLaunchOptions {
        &self.launch
    }

    pub fn video_dir(&self) -> Option<&Path> {
        self.launch.record_video.as_ref().map(|video| video.dir.as_path())
    }

    /// The concrete trace recorder, for inspection
    pub fn recorder(&self) -> Arc<InMemoryTracing> {
        self.tracing.clone()
    }

    /// localStorage of `origin`
    pub fn local_storage(&self, origin: &str) -> BTreeMap<String, String> {
        self.state
            .lock()
            .local_storage
            .get(origin)
            .cloned()
            .unwrap_or_default()
    }

    /// Writes into `origin`'s localStorage from outside any page, the way a
    /// document script of that origin would.
    pub fn set_local_storage(&self, origin: &str, key: &str, value: &str) {
        self.with_local_storage(origin, |items| {
            items.insert(key.to_string(), value.to_string());
        });
    }

    /// IndexedDB database names of `origin`
    pub fn indexed_db_names(&self, origin: &str) -> BTreeSet<String> {
        self.state
            .lock()
            .indexed_db
            .get(origin)
            .cloned()
            .unwrap_or_default()
    }

    /// Every click any page of the context received
    pub fn clicks(&self) -> Vec<ClickRecord> {
        self.state.lock().clicks.clone()
    }

    /// Number of routes registered on the context itself
    pub fn route_count(&self) -> usize {
        self.state.lock().routes.len()
    }

    pub(crate) fn ensure_open(&self, operation: &str) -> Result<()> {
        if self.state.lock().closed {
            return Err(Error::target_closed("context", operation));
        }
        Ok(())
    }

    pub(crate) fn route_for(&self, url: &str) -> Option<RouteHandler> {
        // Last registered wins
        self.state
            .lock()
            .routes
            .iter()
            .rev()
            .find(|route| route.matches(url))
            .map(|route| route.handler.clone())
    }

    pub(crate) fn trace(&self, action: &str, page_guid: &str, detail: &str, url: &str) {
        self.tracing.record(action, page_guid, detail, url);
    }

    pub(crate) fn with_local_storage<R>(
        &self,
        origin: &str,
        f: impl FnOnce(&mut BTreeMap<String, String>) -> R,
    ) -> R {
        let mut state = self.state.lock();
        f(state.local_storage.entry(origin.to_string()).or_default())
    }

    pub(crate) fn open_indexed_db(&self, origin: &str, name: &str) {
        self.state
            .lock()
            .indexed_db
            .entry(origin.to_string())
            .or_default()
            .insert(name.to_string());
    }

    /// Drops localStorage and IndexedDB of `origin`.
    pub(crate) fn clear_origin(&self, origin: &str) {
        let mut state = self.state.lock();
        state.local_storage.remove(origin);
        state.indexed_db.remove(origin);
    }

    pub(crate) fn record_click(&self, page_guid: &str, selector: &str) {
        self.state.lock().clicks.push(ClickRecord {
            page_guid: page_guid.to_string(),
            selector: selector.to_string(),
        });
    }

    pub(crate) fn forget_page(&self, page_guid: &str) {
        self.state.lock().pages.retain(|page| page.guid() != page_guid);
    }
}

#[async_trait]
impl BrowserContext for InMemoryContext {
    fn guid(&self) -> &str {
        &self.guid
    }

    fn pages(&self) -> Vec<Arc<dyn Page>> {
        self.state
            .lock()
            .pages
            .iter()
            .filter(|page| !page.is_closed())
            .map(|page| page.clone() as Arc<dyn Page>)
            .collect()
    }

    fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    fn tracing(&self) -> Arc<dyn Tracing> {
        self.tracing.clone()
    }

    async fn new_page(&self) -> Result<Arc<dyn Page>> {
        self.ensure_open("newPage")?;
        let page = Arc::new(InMemoryPage::new(
            self.engine.next_guid("page"),
            self.me.clone(),
        ));
        self.state.lock().pages.push(page.clone());
        Ok(page)
    }

    async fn clear_cookies(&self) -> Result<()> {
        self.ensure_open("clearCookies")?;
        self.state.lock().cookies.clear();
        Ok(())
    }

    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()> {
        self.ensure_open("addCookies")?;
        if let Some(bad) = cookies.iter().find(|cookie| cookie.domain.is_empty()) {
            return Err(Error::InvalidArgument(format!(
                "Cookie '{}' should have a domain",
                bad.name
            )));
        }
        let mut state = self.state.lock();
        for cookie in cookies {
            state.cookies.retain(|existing| {
                !(existing.name == cookie.name
                    && existing.domain == cookie.domain
                    && existing.path == cookie.path)
            });
            state.cookies.push(cookie.clone());
        }
        Ok(())
    }

    async fn cookies(&self) -> Result<Vec<Cookie>> {
        self.ensure_open("cookies")?;
        Ok(self.state.lock().cookies.clone())
    }

    async fn storage_state(&self) -> Result<StorageState> {
        self.ensure_open("storageState")?;
        let state = self.state.lock();
        Ok(StorageState {
            cookies: state.cookies.clone(),
            origins: state
                .local_storage
                .iter()
                .filter(|(_, items)| !items.is_empty())
                .map(|(origin, items)| Origin {
                    origin: origin.clone(),
                    local_storage: items
                        .iter()
                        .map(|(name, value)| LocalStorageItem {
                            name: name.clone(),
                            value: value.clone(),
                        })
                        .collect(),
                })
                .collect(),
        })
    }

    async fn route(&self, pattern: &str, handler: RouteHandler) -> Result<()> {
        self.ensure_open("route")?;
        let route = Route::new(pattern, handler)?;
        self.state.lock().routes.push(route);
        Ok(())
    }

    async fn unroute_all(&self) -> Result<()> {
        self.ensure_open("unrouteAll")?;
        self.state.lock().routes.clear();
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if self.is_closed() {
            return Ok(());
        }
        if self.engine.fails_close() {
            return Err(Error::Construction(format!(
                "Browser refused to close context {}",
                self.guid
            )));
        }

        let pages = std::mem::take(&mut self.state.lock().pages);
        for page in pages {
            page.close().await?;
        }
        {
            let mut state = self.state.lock();
            state.closed = true;
            state.routes.clear();
        }
        self.tracing.discard();
        tracing::debug!("In-memory context {} closed", self.guid);
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
