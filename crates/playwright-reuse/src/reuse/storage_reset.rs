// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Storage Reset Protocol
//
// Restores a reused context to an empty storage baseline, then seeds the
// storage state the next test declares. Step order is fixed:
//
// 1. clear origin storage through every open page, park the page on about:blank
// 2. clear the remaining dirty origins through one transient page
// 3. clear cookies (context level, unconditional)
// 4. seed declared localStorage per origin, then declared cookies
// 5. close the transient page
//
// The transient page answers every request with an empty document, so an
// origin's own scripts never run between the clear and the seed.
//
// Per-origin failures are collected and the protocol continues. Only running
// out of the test's time budget aborts it.

use crate::error::{Error, Result};
use crate::protocol::{
    BrowserContext, Origin, Page, RouteDecision, RouteHandler, StorageState, origin_of,
    route_handler,
};
use serde_json::json;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use tokio::time::Instant;

/// Clears localStorage and sessionStorage of the page's origin and requests
/// deletion of every IndexedDB database it can enumerate.
///
/// Deletion is best effort: a database held open by an in-flight writer is
/// blocked until the writer goes away.
pub const CLEAR_STORAGE_SCRIPT: &str = r#"async () => {
  localStorage.clear();
  sessionStorage.clear();
  if (!indexedDB.databases) return;
  const databases = await indexedDB.databases();
  await Promise.all(databases.map(db => new Promise(resolve => {
    const request = indexedDB.deleteDatabase(db.name);
    request.onsuccess = request.onerror = request.onblocked = () => resolve();
  })));
}"#;

/// Writes the `[{ name, value }]` argument into the page origin's localStorage.
pub const SEED_LOCAL_STORAGE_SCRIPT: &str = r#"(items) => {
  for (const { name, value } of items)
    localStorage.setItem(name, value);
}"#;

const BLANK: &str = "about:blank";

/// Body served for every request of the transient page
const EMPTY_DOCUMENT: &str = "<html></html>";

fn empty_document() -> RouteHandler {
    route_handler(|_request| async {
        Ok(RouteDecision::Fulfill {
            status: 200,
            body: EMPTY_DOCUMENT.to_string(),
        })
    })
}

/// What one run of the protocol did
#[derive(Debug, Default)]
pub struct StorageResetReport {
    /// Origins whose storage was cleared
    pub cleared_origins: BTreeSet<String>,
    /// Origins that received declared localStorage
    pub seeded_origins: BTreeSet<String>,
    /// Number of declared cookies applied
    pub seeded_cookies: usize,
    /// Steps that failed; each is an [`Error::Reset`]
    pub failures: Vec<Error>,
}

impl StorageResetReport {
    /// Returns true if every step succeeded.
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, origin: &str, error: Error) {
        tracing::warn!("Storage reset step failed for {}: {}", origin, error);
        self.failures.push(Error::Reset {
            origin: origin.to_string(),
            message: error.to_string(),
        });
    }
}

/// Runs `step` unless `deadline` passes first.
///
/// The outer result is the budget, the inner one the step itself.
async fn bounded<T>(
    deadline: Instant,
    what: &str,
    step: impl Future<Output = Result<T>>,
) -> Result<Result<T>> {
    tokio::time::timeout_at(deadline, step)
        .await
        .map_err(|_| Error::Timeout(format!("storage reset exceeded the test budget while {}", what)))
}

/// Resets `context` to a clean baseline and applies `declared`.
///
/// `dirty_origins` lists origins the previous test may have written to in
/// addition to the origins of pages still open. Origins declared by `declared`
/// are always cleared before they are seeded.
///
/// Returns `Err` only when the deadline passes.
pub async fn reset_storage(
    context: &dyn BrowserContext,
    dirty_origins: &BTreeSet<String>,
    declared: Option<&StorageState>,
    deadline: Instant,
) -> Result<StorageResetReport> {
    let mut report = StorageResetReport::default();

    let mut remaining: BTreeSet<String> = dirty_origins.clone();
    if let Some(state) = declared {
        remaining.extend(state.origins.iter().map(|o| o.origin.clone()));
    }

    // 1. Open pages, in their current document
    for page in context.pages() {
        if page.is_closed() {
            continue;
        }
        if let Some(origin) = origin_of(&page.url()) {
            match bounded(
                deadline,
                "clearing an open page",
                page.evaluate(CLEAR_STORAGE_SCRIPT, json!(null)),
            )
            .await?
            {
                Ok(_) => {
                    tracing::debug!("Cleared storage of {} through page {}", origin, page.guid());
                    remaining.remove(&origin);
                    report.cleared_origins.insert(origin);
                }
                Err(e) => report.fail(&origin, e),
            }
        }
        if let Err(e) = bounded(deadline, "parking an open page", page.goto(BLANK)).await? {
            report.fail(&page.url(), e);
        }
    }

    // 2. Origins without an open page need a transient navigation
    let mut scratch: Option<Arc<dyn Page>> = None;
    for origin in &remaining {
        let page = match scratch_page(context, &mut scratch, deadline).await? {
            Ok(page) => page,
            Err(e) => {
                report.fail(origin, e);
                break;
            }
        };

        if let Err(e) = bounded(deadline, "navigating to a dirty origin", page.goto(origin)).await? {
            report.fail(origin, e);
            continue;
        }
        match bounded(
            deadline,
            "clearing a dirty origin",
            page.evaluate(CLEAR_STORAGE_SCRIPT, json!(null)),
        )
        .await?
        {
            Ok(_) => {
                tracing::debug!("Cleared storage of {} through a transient page", origin);
                report.cleared_origins.insert(origin.clone());
            }
            Err(e) => report.fail(origin, e),
        }
    }

    // 3. Cookies
    if let Err(e) = bounded(deadline, "clearing cookies", context.clear_cookies()).await? {
        report.fail("<cookies>", e);
    }

    // 4. Declared state: localStorage first, cookies last
    if let Some(state) = declared {
        for origin in &state.origins {
            match seed_origin(context, &mut scratch, origin, deadline).await? {
                Ok(()) => {
                    report.seeded_origins.insert(origin.origin.clone());
                }
                Err(e) => report.fail(&origin.origin, e),
            }
        }

        if !state.cookies.is_empty() {
            match bounded(deadline, "seeding cookies", context.add_cookies(&state.cookies)).await? {
                Ok(()) => report.seeded_cookies = state.cookies.len(),
                Err(e) => report.fail("<cookies>", e),
            }
        }
    }

    // 5. Transient page
    if let Some(page) = scratch.take() {
        if let Err(e) = bounded(deadline, "unrouting the transient page", page.unroute_all()).await? {
            tracing::warn!("Failed to unroute transient reset page: {}", e);
        }
        if let Err(e) = bounded(deadline, "closing the transient page", page.close()).await? {
            tracing::warn!("Failed to close transient reset page: {}", e);
        }
    }

    tracing::debug!(
        "Storage reset done: {} cleared, {} seeded, {} failure(s)",
        report.cleared_origins.len(),
        report.seeded_origins.len(),
        report.failures.len()
    );
    Ok(report)
}

async fn scratch_page(
    context: &dyn BrowserContext,
    scratch: &mut Option<Arc<dyn Page>>,
    deadline: Instant,
) -> Result<Result<Arc<dyn Page>>> {
    if let Some(page) = scratch.as_ref().filter(|page| !page.is_closed()) {
        return Ok(Ok(page.clone()));
    }
    let page = match bounded(deadline, "opening a transient page", context.new_page()).await? {
        Ok(page) => page,
        Err(e) => return Ok(Err(e)),
    };
    // Registered before the first navigation
    if let Err(e) = bounded(deadline, "routing the transient page", page.route("*", empty_document())).await? {
        if let Err(close) = bounded(deadline, "closing the transient page", page.close()).await? {
            tracing::warn!("Failed to close transient reset page: {}", close);
        }
        return Ok(Err(e));
    }
    *scratch = Some(page.clone());
    Ok(Ok(page))
}

async fn seed_origin(
    context: &dyn BrowserContext,
    scratch: &mut Option<Arc<dyn Page>>,
    origin: &Origin,
    deadline: Instant,
) -> Result<Result<()>> {
    let page = match scratch_page(context, scratch, deadline).await? {
        Ok(page) => page,
        Err(e) => return Ok(Err(e)),
    };
    if let Err(e) = bounded(deadline, "navigating to a declared origin", page.goto(&origin.origin)).await? {
        return Ok(Err(e));
    }
    let items = match serde_json::to_value(&origin.local_storage) {
        Ok(items) => items,
        Err(e) => return Ok(Err(e.into())),
    };
    let seeded = bounded(
        deadline,
        "seeding localStorage",
        page.evaluate(SEED_LOCAL_STORAGE_SCRIPT, items),
    )
    .await?;
    if seeded.is_ok() {
        tracing::debug!(
            "Seeded {} localStorage item(s) into {}",
            origin.local_storage.len(),
            origin.origin
        );
    }
    Ok(seeded.map(|_| ()))
}
