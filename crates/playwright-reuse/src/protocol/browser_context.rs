// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// BrowserContext control surface
//
// A browser context is an isolated browsing session (cookie jar, storage,
// permissions) hosting any number of pages. The reuse manager never talks to
// a browser engine directly: it drives contexts through the traits below,
// which the runner implements over its remote-control transport.

use crate::error::Result;
use crate::protocol::page::{Page, RouteHandler};
use crate::protocol::proxy::ProxySettings;
use crate::protocol::tracing::Tracing;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

/// Creates browser contexts.
///
/// One factory is shared by every test of a worker. Construction may suspend
/// (the engine spins up a session), and is bounded by the caller.
#[async_trait]
pub trait ContextFactory: Send + Sync {
    /// Creates a new context from fully resolved construction options.
    async fn new_context(&self, launch: &ContextLaunchOptions) -> Result<Arc<dyn BrowserContext>>;
}

/// An isolated browser session.
///
/// See: <https://playwright.dev/docs/api/class-browsercontext>
#[async_trait]
pub trait BrowserContext: Send + Sync + std::fmt::Debug {
    /// Engine-assigned identifier; stable for the lifetime of the context.
    fn guid(&self) -> &str;

    /// Returns a snapshot of all open pages in the context.
    fn pages(&self) -> Vec<Arc<dyn Page>>;

    /// Returns true once the context was closed (by us, by the test, or by a crash).
    fn is_closed(&self) -> bool;

    /// Returns the tracing recorder bound to this context.
    fn tracing(&self) -> Arc<dyn Tracing>;

    /// Creates a new page in this context.
    ///
    /// See: <https://playwright.dev/docs/api/class-browsercontext#browser-context-new-page>
    async fn new_page(&self) -> Result<Arc<dyn Page>>;

    /// Removes all cookies from the context's cookie jar.
    ///
    /// See: <https://playwright.dev/docs/api/class-browsercontext#browser-context-clear-cookies>
    async fn clear_cookies(&self) -> Result<()>;

    /// Adds cookies into this context. Cookies are context-global.
    ///
    /// See: <https://playwright.dev/docs/api/class-browsercontext#browser-context-add-cookies>
    async fn add_cookies(&self, cookies: &[Cookie]) -> Result<()>;

    /// Returns all cookies in the context.
    async fn cookies(&self) -> Result<Vec<Cookie>>;

    /// Returns current cookies and per-origin local storage.
    ///
    /// See: <https://playwright.dev/docs/api/class-browsercontext#browser-context-storage-state>
    async fn storage_state(&self) -> Result<StorageState>;

    /// Registers a network route handler for every page of the context.
    async fn route(&self, pattern: &str, handler: RouteHandler) -> Result<()>;

    /// Removes every route handler registered on the context.
    async fn unroute_all(&self) -> Result<()>;

    /// Closes the context and all its pages. Finalizes video recordings.
    ///
    /// See: <https://playwright.dev/docs/api/class-browsercontext#browser-context-close>
    async fn close(&self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Viewport dimensions for browser context.
///
/// See: <https://playwright.dev/docs/api/class-browser#browser-new-context>
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Page width in pixels
    pub width: u32,
    /// Page height in pixels
    pub height: u32,
}

/// Geolocation coordinates.
///
/// See: <https://playwright.dev/docs/api/class-browser#browser-new-context>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Geolocation {
    /// Latitude between -90 and 90
    pub latitude: f64,
    /// Longitude between -180 and 180
    pub longitude: f64,
    /// Optional accuracy in meters (default: 0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
}

/// Cookie information for storage state.
///
/// See: <https://playwright.dev/docs/api/class-browser#browser-new-context-option-storage-state>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Cookie domain (use dot prefix for subdomain matching, e.g., ".example.com")
    pub domain: String,
    /// Cookie path
    pub path: String,
    /// Unix timestamp in seconds; -1 for session cookies
    #[serde(default = "session_expiry")]
    pub expires: f64,
    /// HTTP-only flag
    #[serde(default)]
    pub http_only: bool,
    /// Secure flag
    #[serde(default)]
    pub secure: bool,
    /// SameSite attribute ("Strict", "Lax", "None")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn session_expiry() -> f64 {
    -1.0
}

impl Cookie {
    /// Creates a session cookie scoped to `domain` with path `/`.
    pub fn new(name: impl Into<String>, value: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: domain.into(),
            path: "/".to_string(),
            expires: session_expiry(),
            http_only: false,
            secure: false,
            same_site: None,
        }
    }
}

/// Local storage item for storage state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalStorageItem {
    /// Storage key
    pub name: String,
    /// Storage value
    pub value: String,
}

/// Origin with local storage items for storage state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Origin {
    /// Origin URL (e.g., "https://example.com")
    pub origin: String,
    /// Local storage items for this origin, in declaration order
    #[serde(default)]
    pub local_storage: Vec<LocalStorageItem>,
}

/// Declarative initial storage of a context: cookies plus per-origin local storage.
///
/// Resolved once per test and never mutated afterwards.
///
/// See: <https://playwright.dev/docs/api/class-browser#browser-new-context-option-storage-state>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageState {
    /// List of cookies
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// List of origins with local storage
    #[serde(default)]
    pub origins: Vec<Origin>,
}

impl StorageState {
    /// Returns true when neither cookies nor origins are declared.
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.is_empty()
    }

    /// Loads a storage state file as written by `storageState({ path })`.
    pub async fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let bytes = tokio::fs::read(path.as_ref()).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Options for recording video.
///
/// See: <https://playwright.dev/docs/api/class-browser#browser-new-context-option-record-video>
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordVideo {
    /// Directory to put videos into. Files appear when their page closes.
    pub dir: PathBuf,
    /// Optional dimensions of the recorded videos.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<Viewport>,
}

/// Context construction options that cannot be changed on a live context.
///
/// Every field participates in the reuse fingerprint. Storage state and video
/// recording are not part of it: they are supplied through
/// [`ContextLaunchOptions`] and handled per test.
///
/// See: <https://playwright.dev/docs/api/class-browser#browser-new-context>
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextOptions {
    /// Sets consistent viewport for all pages in the context.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub viewport: Option<Viewport>,

    /// Disables viewport emulation when set to true.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_viewport: Option<bool>,

    /// Custom user agent string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,

    /// Locale for the context (e.g., "en-GB", "de-DE", "fr-FR")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,

    /// Timezone identifier (e.g., "America/New_York", "Europe/Berlin")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone_id: Option<String>,

    /// Geolocation coordinates
    #[serde(skip_serializing_if = "Option::is_none")]
    pub geolocation: Option<Geolocation>,

    /// List of permissions to grant (e.g., "geolocation", "notifications")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub permissions: Option<Vec<String>>,

    /// Emulates 'prefers-colors-scheme' media feature ("light", "dark", "no-preference")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_scheme: Option<String>,

    /// Emulates 'prefers-reduced-motion' media feature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reduced_motion: Option<String>,

    /// Emulates 'forced-colors' media feature
    #[serde(skip_serializing_if = "Option::is_none")]
    pub forced_colors: Option<String>,

    /// Whether the viewport supports touch events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub has_touch: Option<bool>,

    /// Whether the meta viewport tag is respected
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_mobile: Option<bool>,

    /// Whether JavaScript is enabled in the context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub javascript_enabled: Option<bool>,

    /// Emulates network being offline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offline: Option<bool>,

    /// Whether to automatically download attachments
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accept_downloads: Option<bool>,

    /// Whether to bypass Content-Security-Policy
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bypass_csp: Option<bool>,

    /// Whether to ignore HTTPS errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_https_errors: Option<bool>,

    /// Device scale factor (default: 1)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_scale_factor: Option<f64>,

    /// Extra HTTP headers to send with every request
    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_http_headers: Option<BTreeMap<String, String>>,

    /// Base URL for relative navigation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Network proxy settings for the context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub proxy: Option<ProxySettings>,

    /// Whether to allow sites to register Service workers ("allow" | "block")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_workers: Option<String>,

    /// Check if strict selectors mode is enabled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub strict_selectors: Option<bool>,
}

impl ContextOptions {
    /// Creates a new ContextOptions with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the viewport dimensions
    pub fn viewport(mut self, viewport: Viewport) -> Self {
        self.viewport = Some(viewport);
        self.no_viewport = None; // Clear no_viewport if setting viewport
        self
    }

    /// Disables viewport emulation
    pub fn no_viewport(mut self, no_viewport: bool) -> Self {
        self.no_viewport = Some(no_viewport);
        if no_viewport {
            self.viewport = None; // Clear viewport if setting no_viewport
        }
        self
    }

    /// Sets the user agent string
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Sets the locale
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Sets the timezone identifier
    pub fn timezone_id(mut self, timezone_id: impl Into<String>) -> Self {
        self.timezone_id = Some(timezone_id.into());
        self
    }

    /// Sets the geolocation
    pub fn geolocation(mut self, geolocation: Geolocation) -> Self {
        self.geolocation = Some(geolocation);
        self
    }

    /// Sets the permissions to grant
    pub fn permissions(mut self, permissions: Vec<String>) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Sets the color scheme preference
    pub fn color_scheme(mut self, color_scheme: impl Into<String>) -> Self {
        self.color_scheme = Some(color_scheme.into());
        self
    }

    /// Emulates 'prefers-reduced-motion' media feature
    pub fn reduced_motion(mut self, value: impl Into<String>) -> Self {
        self.reduced_motion = Some(value.into());
        self
    }

    /// Emulates 'forced-colors' media feature
    pub fn forced_colors(mut self, value: impl Into<String>) -> Self {
        self.forced_colors = Some(value.into());
        self
    }

    /// Sets whether the viewport supports touch events
    pub fn has_touch(mut self, has_touch: bool) -> Self {
        self.has_touch = Some(has_touch);
        self
    }

    /// Sets whether this is a mobile viewport
    pub fn is_mobile(mut self, is_mobile: bool) -> Self {
        self.is_mobile = Some(is_mobile);
        self
    }

    /// Sets whether JavaScript is enabled
    pub fn javascript_enabled(mut self, javascript_enabled: bool) -> Self {
        self.javascript_enabled = Some(javascript_enabled);
        self
    }

    /// Sets whether to emulate offline network
    pub fn offline(mut self, offline: bool) -> Self {
        self.offline = Some(offline);
        self
    }

    /// Sets whether to automatically download attachments
    pub fn accept_downloads(mut self, accept_downloads: bool) -> Self {
        self.accept_downloads = Some(accept_downloads);
        self
    }

    /// Sets whether to bypass Content-Security-Policy
    pub fn bypass_csp(mut self, bypass_csp: bool) -> Self {
        self.bypass_csp = Some(bypass_csp);
        self
    }

    /// Sets whether to ignore HTTPS errors
    pub fn ignore_https_errors(mut self, ignore_https_errors: bool) -> Self {
        self.ignore_https_errors = Some(ignore_https_errors);
        self
    }

    /// Sets the device scale factor
    pub fn device_scale_factor(mut self, device_scale_factor: f64) -> Self {
        self.device_scale_factor = Some(device_scale_factor);
        self
    }

    /// Sets extra HTTP headers
    pub fn extra_http_headers(mut self, extra_http_headers: BTreeMap<String, String>) -> Self {
        self.extra_http_headers = Some(extra_http_headers);
        self
    }

    /// Sets the base URL for relative navigation
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets network proxy settings
    pub fn proxy(mut self, proxy: ProxySettings) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Whether to allow sites to register Service workers ("allow" | "block")
    pub fn service_workers(mut self, value: impl Into<String>) -> Self {
        self.service_workers = Some(value.into());
        self
    }

    /// Enables strict selectors mode
    pub fn strict_selectors(mut self, enabled: bool) -> Self {
        self.strict_selectors = Some(enabled);
        self
    }
}

/// Everything a [`ContextFactory`] needs to construct one context.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextLaunchOptions {
    /// Immutable construction options
    #[serde(flatten)]
    pub options: ContextOptions,

    /// Storage state seeded at construction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_state: Option<StorageState>,

    /// Video recording, when the test's recording plan asks for it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub record_video: Option<RecordVideo>,
}
