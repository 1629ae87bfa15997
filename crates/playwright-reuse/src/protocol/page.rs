// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Page control surface
//
// A page is a single navigable document within a context. The reuse manager
// needs a narrow slice of it: navigate, evaluate, click, route interception,
// and close.

use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::any::Any;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// A single tab within a [`BrowserContext`](crate::protocol::BrowserContext).
///
/// See: <https://playwright.dev/docs/api/class-page>
#[async_trait]
pub trait Page: Send + Sync + std::fmt::Debug {
    /// Engine-assigned identifier
    fn guid(&self) -> &str;

    /// Returns the URL of the main frame ("about:blank" for a new page).
    fn url(&self) -> String;

    /// Returns true once the page was closed.
    fn is_closed(&self) -> bool;

    /// Navigates the main frame to `url` and waits for the load to commit.
    ///
    /// See: <https://playwright.dev/docs/api/class-page#page-goto>
    async fn goto(&self, url: &str) -> Result<()>;

    /// Evaluates a function expression in the page's main execution context.
    ///
    /// `expression` is a function source; `arg` is passed as its single argument.
    ///
    /// See: <https://playwright.dev/docs/api/class-page#page-evaluate>
    async fn evaluate(&self, expression: &str, arg: Value) -> Result<Value>;

    /// Clicks the element matching `selector`.
    async fn click(&self, selector: &str) -> Result<()>;

    /// Registers a route handler for requests whose URL matches the glob `pattern`.
    ///
    /// See: <https://playwright.dev/docs/api/class-page#page-route>
    async fn route(&self, pattern: &str, handler: RouteHandler) -> Result<()>;

    /// Removes every route handler registered on this page.
    async fn unroute_all(&self) -> Result<()>;

    /// Closes the page.
    async fn close(&self) -> Result<()>;

    fn as_any(&self) -> &dyn Any;
}

/// Request intercepted by a route handler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub url: String,
    pub method: String,
}

/// What a route handler decided to do with a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteDecision {
    /// Let the request reach the network
    Continue,
    /// Fail the request with an error code ("aborted", "failed", ...)
    Abort(String),
    /// Answer the request without touching the network
    Fulfill { status: u16, body: String },
}

/// Type-erased future returned by route handlers
pub type RouteHandlerFuture = Pin<Box<dyn Future<Output = Result<RouteDecision>> + Send>>;

/// Type-erased route handler
pub type RouteHandler = Arc<dyn Fn(InterceptedRequest) -> RouteHandlerFuture + Send + Sync>;

/// Wraps an async closure into a [`RouteHandler`].
pub fn route_handler<F, Fut>(handler: F) -> RouteHandler
where
    F: Fn(InterceptedRequest) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<RouteDecision>> + Send + 'static,
{
    Arc::new(move |request: InterceptedRequest| -> RouteHandlerFuture {
        Box::pin(handler(request))
    })
}

/// Returns the serialized origin of `url`, or `None` for opaque origins
/// (`about:blank`, `data:` URLs, unparsable input).
pub fn origin_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let origin = parsed.origin();
    if origin.is_tuple() {
        Some(origin.ascii_serialization())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_of_tuple_origins() {
        assert_eq!(
            origin_of("https://example.com/path?q=1#frag"),
            Some("https://example.com".to_string())
        );
        assert_eq!(
            origin_of("http://localhost:8080/index.html"),
            Some("http://localhost:8080".to_string())
        );
        // Default ports are elided in the serialization
        assert_eq!(
            origin_of("https://example.com:443/"),
            Some("https://example.com".to_string())
        );
    }

    #[test]
    fn test_origin_of_opaque_origins() {
        assert_eq!(origin_of("about:blank"), None);
        assert_eq!(origin_of("data:text/html,<p>hi</p>"), None);
        assert_eq!(origin_of("not a url"), None);
    }

    #[tokio::test]
    async fn test_route_handler_wraps_closure() {
        let handler = route_handler(|request| async move {
            if request.url.ends_with(".png") {
                Ok(RouteDecision::Abort("blockedbyclient".to_string()))
            } else {
                Ok(RouteDecision::Continue)
            }
        });

        let decision = handler(InterceptedRequest {
            url: "https://example.com/logo.png".to_string(),
            method: "GET".to_string(),
        })
        .await
        .unwrap();
        assert_eq!(decision, RouteDecision::Abort("blockedbyclient".to_string()));
    }
}
