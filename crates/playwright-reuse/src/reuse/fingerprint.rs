// Copyright 2026 Paul Adamson
// Licensed under the Apache License, Version 2.0
//
// Fingerprint Evaluator
//
// Reuse compatibility is a pure value comparison: the fingerprint of the
// retained context against the fingerprint the next test requires, plus a
// separate check of recording requirements that depends on the reuse mode.

use crate::api::{RecordingOptions, ReuseMode};
use crate::protocol::{ContextOptions, Geolocation, ProxySettings, Viewport};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// The immutable construction options of a context, as one comparable value.
///
/// Fields are kept in a fixed order; an option absent on one side and present
/// on the other is a difference. A fingerprint is computed once when its
/// context is constructed and never changes afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextFingerprint {
    viewport: Option<Viewport>,
    no_viewport: Option<bool>,
    user_agent: Option<String>,
    locale: Option<String>,
    timezone_id: Option<String>,
    geolocation: Option<Geolocation>,
    permissions: Option<Vec<String>>,
    color_scheme: Option<String>,
    reduced_motion: Option<String>,
    forced_colors: Option<String>,
    has_touch: Option<bool>,
    is_mobile: Option<bool>,
    javascript_enabled: Option<bool>,
    offline: Option<bool>,
    accept_downloads: Option<bool>,
    bypass_csp: Option<bool>,
    ignore_https_errors: Option<bool>,
    device_scale_factor: Option<f64>,
    extra_http_headers: Option<BTreeMap<String, String>>,
    base_url: Option<String>,
    proxy: Option<ProxySettings>,
    service_workers: Option<String>,
    strict_selectors: Option<bool>,
}

impl ContextFingerprint {
    /// Derives the fingerprint of `options`.
    pub fn from_options(options: &ContextOptions) -> Self {
        // Exhaustive destructuring: a new construction option cannot be added
        // without deciding its place in the fingerprint.
        let ContextOptions {
            viewport,
            no_viewport,
            user_agent,
            locale,
            timezone_id,
            geolocation,
            permissions,
            color_scheme,
            reduced_motion,
            forced_colors,
            has_touch,
            is_mobile,
            javascript_enabled,
            offline,
            accept_downloads,
            bypass_csp,
            ignore_https_errors,
            device_scale_factor,
            extra_http_headers,
            base_url,
            proxy,
            service_workers,
            strict_selectors,
        } = options.clone();

        Self {
            viewport,
            no_viewport,
            user_agent,
            locale,
            timezone_id,
            geolocation,
            permissions,
            color_scheme,
            reduced_motion,
            forced_colors,
            has_touch,
            is_mobile,
            javascript_enabled,
            offline,
            accept_downloads,
            bypass_csp,
            ignore_https_errors,
            device_scale_factor,
            extra_http_headers,
            base_url,
            proxy,
            service_workers,
            strict_selectors,
        }
    }

    /// Canonical JSON form, stable across runs. Used in logs and reports.
    pub fn digest(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!("<unserializable: {}>", e))
    }

    /// Names of the options that differ between `self` and `other`, sorted by
    /// name. Empty iff the fingerprints are compatible.
    pub fn mismatched_fields(&self, other: &ContextFingerprint) -> Vec<String> {
        let (ours, theirs) = match (serde_json::to_value(self), serde_json::to_value(other)) {
            (Ok(Value::Object(a)), Ok(Value::Object(b))) => (a, b),
            _ => return vec!["<fingerprint>".to_string()],
        };

        ours.iter()
            .filter(|(key, value)| theirs.get(*key) != Some(*value))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

/// Strict structural equality over every construction option.
pub fn compatible(a: &ContextFingerprint, b: &ContextFingerprint) -> bool {
    a == b
}

/// Recording activity of a retained context
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordingState {
    /// The context was constructed with video recording
    pub video: bool,
    /// A trace session is alive on the context
    pub tracing: bool,
}

/// Whether a context with `prev` recording activity may host a test with
/// `next` requirements under `mode`.
///
/// - `Disabled`: never.
/// - `WhenPossible`: a test wanting video always needs a fresh context, a
///   context recording video is never handed on, and a context with a live
///   trace is handed on only to a test that traces too. An idle context can
///   open a trace session for the next test.
/// - `Force`: recording never blocks reuse; video is disabled for the test.
pub fn recording_compatible(
    prev: RecordingState,
    next: &RecordingOptions,
    retry: u32,
    mode: ReuseMode,
) -> bool {
    match mode {
        ReuseMode::Disabled => false,
        ReuseMode::Force => true,
        ReuseMode::WhenPossible => {
            !prev.video && !next.wants_video(retry) && (!prev.tracing || next.wants_trace(retry))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{TraceMode, VideoMode};

    fn fingerprint(options: ContextOptions) -> ContextFingerprint {
        ContextFingerprint::from_options(&options)
    }

    #[test]
    fn test_identical_options_are_compatible() {
        let options = ContextOptions::new()
            .locale("en-GB")
            .timezone_id("Europe/London")
            .viewport(Viewport {
                width: 1280,
                height: 720,
            });
        let a = fingerprint(options.clone());
        let b = fingerprint(options);

        assert!(compatible(&a, &b));
        assert!(a.mismatched_fields(&b).is_empty());
        assert_eq!(a.digest(), b.digest());
    }

    #[test]
    fn test_any_differing_field_is_incompatible() {
        let base = fingerprint(ContextOptions::new().color_scheme("dark"));
        let other = fingerprint(ContextOptions::new().color_scheme("light"));

        assert!(!compatible(&base, &other));
        assert_eq!(base.mismatched_fields(&other), vec!["colorScheme"]);
    }

    #[test]
    fn test_absent_versus_present_is_a_mismatch() {
        // Explicitly setting the engine default still differs from leaving it unset
        let unset = fingerprint(ContextOptions::new());
        let set = fingerprint(ContextOptions::new().javascript_enabled(true));

        assert!(!compatible(&unset, &set));
        assert_eq!(unset.mismatched_fields(&set), vec!["javascriptEnabled"]);
        assert_eq!(set.mismatched_fields(&unset), vec!["javascriptEnabled"]);
    }

    #[test]
    fn test_headers_compare_by_value_permissions_by_order() {
        let headers_a = BTreeMap::from([
            ("x-a".to_string(), "1".to_string()),
            ("x-b".to_string(), "2".to_string()),
        ]);
        let headers_b = BTreeMap::from([
            ("x-b".to_string(), "2".to_string()),
            ("x-a".to_string(), "1".to_string()),
        ]);
        assert!(compatible(
            &fingerprint(ContextOptions::new().extra_http_headers(headers_a)),
            &fingerprint(ContextOptions::new().extra_http_headers(headers_b)),
        ));

        let a = fingerprint(
            ContextOptions::new().permissions(vec!["geolocation".into(), "camera".into()]),
        );
        let b = fingerprint(
            ContextOptions::new().permissions(vec!["camera".into(), "geolocation".into()]),
        );
        assert!(!compatible(&a, &b));
    }

    #[test]
    fn test_mismatched_fields_lists_every_difference() {
        let a = fingerprint(
            ContextOptions::new()
                .user_agent("A")
                .locale("en-US")
                .proxy(ProxySettings::new("http://proxy:3128")),
        );
        let b = fingerprint(ContextOptions::new().user_agent("B").locale("fr-FR"));

        assert_eq!(a.mismatched_fields(&b), vec!["locale", "proxy", "userAgent"]);
    }

    #[test]
    fn test_recording_compatibility_when_possible() {
        let idle = RecordingState::default();
        let tracing = RecordingState {
            video: false,
            tracing: true,
        };
        let video = RecordingState {
            video: true,
            tracing: false,
        };
        let plain = RecordingOptions::default();
        let traced = RecordingOptions {
            trace: TraceMode::On,
            ..RecordingOptions::default()
        };
        let filmed = RecordingOptions {
            video: VideoMode::On,
            ..RecordingOptions::default()
        };

        assert!(recording_compatible(idle, &plain, 0, ReuseMode::WhenPossible));
        assert!(recording_compatible(tracing, &traced, 0, ReuseMode::WhenPossible));
        assert!(!recording_compatible(tracing, &plain, 0, ReuseMode::WhenPossible));
        assert!(recording_compatible(idle, &traced, 0, ReuseMode::WhenPossible));
        assert!(!recording_compatible(idle, &filmed, 0, ReuseMode::WhenPossible));
        assert!(!recording_compatible(video, &plain, 0, ReuseMode::WhenPossible));
    }

    #[test]
    fn test_recording_compatibility_respects_retry_gated_modes() {
        let first_retry_video = RecordingOptions {
            video: VideoMode::OnFirstRetry,
            ..RecordingOptions::default()
        };
        let idle = RecordingState::default();

        assert!(recording_compatible(idle, &first_retry_video, 0, ReuseMode::WhenPossible));
        assert!(!recording_compatible(idle, &first_retry_video, 1, ReuseMode::WhenPossible));
    }

    #[test]
    fn test_recording_compatibility_force_and_disabled() {
        let video = RecordingState {
            video: true,
            tracing: true,
        };
        let filmed = RecordingOptions {
            video: VideoMode::On,
            ..RecordingOptions::default()
        };

        assert!(recording_compatible(video, &filmed, 0, ReuseMode::Force));
        assert!(!recording_compatible(
            RecordingState::default(),
            &RecordingOptions::default(),
            0,
            ReuseMode::Disabled
        ));
    }
}
