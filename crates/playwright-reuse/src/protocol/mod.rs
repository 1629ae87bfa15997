// Copyright 2024 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Control surfaces - the collaborator interfaces the reuse manager drives
//
// Architecture:
// - Contexts, pages and trace recorders are object-safe async traits
// - The runner implements them over its transport to the browser engine
// - Value types (options, cookies, storage state) are plain serde structs

pub mod browser_context;
pub mod page;
pub mod proxy;
pub mod tracing;

pub use browser_context::{
    BrowserContext, ContextFactory, ContextLaunchOptions, ContextOptions, Cookie, Geolocation,
    LocalStorageItem, Origin, RecordVideo, StorageState, Viewport,
};
pub use page::{
    InterceptedRequest, Page, RouteDecision, RouteHandler, RouteHandlerFuture, origin_of,
    route_handler,
};
pub use proxy::ProxySettings;
pub use self::tracing::{Tracing, TracingStartOptions};
