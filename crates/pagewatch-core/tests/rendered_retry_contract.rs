//! Contract Test: Rendered Acquisition Retry and Readiness
//!
//! Constraints verified:
//! - Unexpected browser errors are retried up to the configured ceiling,
//!   with doubling backoff between attempts (N attempts, N-1 sleeps)
//! - Every browser context is closed, on success and on failure
//! - A readiness anchor that never appears yields Unknown without retry
//! - Text that stays empty past the deadline yields Unknown
//! - Readiness and text deadlines hold on the clock even when each browser
//!   check is slow
//! - Exhausted retries yield Unknown, never an error to the engine
//! - Anchor selection: ready_selector, else scope_selector, else body

mod common;

use common::*;
use pagewatch_core::acquire::{DOCUMENT_ROOT, RenderedAcquirer};
use pagewatch_core::config::EngineConfig;
use pagewatch_core::traits::{AcquireRequest, PageText, Renderer, TextAcquirer};
use std::sync::Arc;
use std::time::Duration;

fn acquirer(renderer: &ScriptedRenderer, sleeper: &RecordingSleeper) -> RenderedAcquirer {
    acquirer_with(renderer, sleeper, &EngineConfig::default())
}

fn acquirer_with(
    renderer: &ScriptedRenderer,
    sleeper: &RecordingSleeper,
    config: &EngineConfig,
) -> RenderedAcquirer {
    RenderedAcquirer::new(Arc::new(renderer.clone()), config).with_sleeper(Arc::new(sleeper.clone()))
}

fn request<'a>(scope: Option<&'a str>, ready: Option<&'a str>) -> AcquireRequest<'a> {
    AcquireRequest {
        url: "https://example.com/spa",
        scope_selector: scope,
        ready_selector: ready,
    }
}

#[tokio::test]
async fn retry_ceiling_is_honoured_with_doubling_backoff() {
    let renderer = ScriptedRenderer::new(vec![
        ContextScript::navigate_error(),
        ContextScript::navigate_error(),
        ContextScript::navigate_error(),
    ]);
    let sleeper = RecordingSleeper::default();

    let result = acquirer(&renderer, &sleeper)
        .acquire(&request(None, None))
        .await
        .expect("exhausted retries are not an error");

    assert!(matches!(result, PageText::Unknown { .. }), "got {:?}", result);
    assert_eq!(renderer.created(), 3, "exactly max_render_attempts contexts");
    assert_eq!(renderer.closed(), 3, "every context closed");
    assert_eq!(renderer.active_contexts(), 0);
    assert_eq!(
        sleeper.sleeps(),
        vec![Duration::from_secs(2), Duration::from_secs(4)],
        "N-1 backoff sleeps of doubling length"
    );
}

#[tokio::test]
async fn retry_ceiling_follows_configuration() {
    let renderer = ScriptedRenderer::new((0..5).map(|_| ContextScript::navigate_error()));
    let sleeper = RecordingSleeper::default();
    let config = EngineConfig {
        max_render_attempts: 1,
        ..EngineConfig::default()
    };

    let result = acquirer_with(&renderer, &sleeper, &config)
        .acquire(&request(None, None))
        .await
        .unwrap();

    assert!(matches!(result, PageText::Unknown { .. }));
    assert_eq!(renderer.created(), 1);
    assert!(sleeper.sleeps().is_empty(), "no backoff after the last attempt");
}

#[tokio::test]
async fn recovers_on_a_later_attempt() {
    let renderer = ScriptedRenderer::new(vec![
        ContextScript::navigate_error(),
        ContextScript::ready_with(&["  Now   VACANCY\n available "]),
    ]);
    let sleeper = RecordingSleeper::default();

    let result = acquirer(&renderer, &sleeper)
        .acquire(&request(None, None))
        .await
        .unwrap();

    assert_eq!(result, PageText::Text("Now VACANCY available".to_string()));
    assert_eq!(renderer.created(), 2);
    assert_eq!(renderer.closed(), 2);
    assert_eq!(sleeper.sleeps(), vec![Duration::from_secs(2)]);
}

#[tokio::test]
async fn readiness_timeout_is_unknown_without_retry() {
    let renderer = ScriptedRenderer::new(vec![
        ContextScript::never_visible(),
        ContextScript::ready_with(&["should not be reached"]),
    ]);
    let sleeper = RecordingSleeper::default();

    let result = acquirer(&renderer, &sleeper)
        .acquire(&request(Some("#rooms"), None))
        .await
        .unwrap();

    match result {
        PageText::Unknown { reason } => assert!(reason.contains("#rooms"), "{}", reason),
        other => panic!("expected Unknown, got {:?}", other),
    }
    assert_eq!(renderer.created(), 1, "not-ready is not retried");
    assert_eq!(renderer.closed(), 1);

    // Polled at 500 ms for the 15 s readiness budget
    let waited: Duration = sleeper.sleeps().iter().sum();
    assert_eq!(waited, Duration::from_secs(15));
    assert!(sleeper.sleeps_at_least(Duration::from_secs(1)).is_empty());
}

#[tokio::test]
async fn empty_text_past_deadline_is_unknown() {
    let renderer = ScriptedRenderer::new(vec![ContextScript::ready_with(&["", "   \n "])]);
    let sleeper = RecordingSleeper::default();

    let result = acquirer(&renderer, &sleeper)
        .acquire(&request(None, None))
        .await
        .unwrap();

    assert!(matches!(result, PageText::Unknown { .. }));
    assert_eq!(renderer.created(), 1);
    assert_eq!(renderer.closed(), 1);
    let waited: Duration = sleeper.sleeps().iter().sum();
    assert_eq!(waited, Duration::from_secs(10));
}

#[tokio::test(start_paused = true)]
async fn slow_visibility_checks_respect_the_readiness_deadline() {
    let renderer = ScriptedRenderer::new(vec![
        ContextScript::never_visible().with_check_delay(Duration::from_secs(1)),
    ]);
    let config = EngineConfig::default();
    let acquirer = RenderedAcquirer::new(Arc::new(renderer.clone()), &config);

    let start = tokio::time::Instant::now();
    let result = acquirer
        .acquire(&request(Some("#rooms"), None))
        .await
        .unwrap();
    let elapsed = start.elapsed();

    assert!(matches!(result, PageText::Unknown { .. }), "got {:?}", result);
    assert!(
        elapsed <= config.ready_timeout() + Duration::from_millis(100),
        "readiness wait took {:?}",
        elapsed
    );
    assert_eq!(renderer.created(), 1);
    assert_eq!(renderer.closed(), 1);
}

#[tokio::test(start_paused = true)]
async fn slow_text_reads_respect_the_text_deadline() {
    let renderer = ScriptedRenderer::new(vec![
        ContextScript::ready_with(&[""]).with_check_delay(Duration::from_secs(1)),
    ]);
    let config = EngineConfig::default();
    let acquirer = RenderedAcquirer::new(Arc::new(renderer.clone()), &config);

    let start = tokio::time::Instant::now();
    let result = acquirer.acquire(&request(None, None)).await.unwrap();
    let elapsed = start.elapsed();

    assert!(matches!(result, PageText::Unknown { .. }), "got {:?}", result);
    // One slow visibility check, then the text deadline
    assert!(
        elapsed <= Duration::from_secs(1) + config.text_deadline() + Duration::from_millis(100),
        "text polling took {:?}",
        elapsed
    );
    assert_eq!(renderer.closed(), 1);
}

#[tokio::test]
async fn text_is_polled_until_non_empty() {
    let renderer = ScriptedRenderer::new(vec![ContextScript::ready_with(&["", "", "Rooms: full"])]);
    let sleeper = RecordingSleeper::default();

    let result = acquirer(&renderer, &sleeper)
        .acquire(&request(None, None))
        .await
        .unwrap();

    assert_eq!(result, PageText::Text("Rooms: full".to_string()));
    assert_eq!(sleeper.sleeps(), vec![Duration::from_millis(500); 2]);
}

#[tokio::test]
async fn anchors_follow_selector_precedence() {
    let cases = [
        (Some("#scope"), Some(".ready"), ".ready", "#scope"),
        (Some("#scope"), None, "#scope", "#scope"),
        (None, Some(".ready"), ".ready", DOCUMENT_ROOT),
        (None, None, DOCUMENT_ROOT, DOCUMENT_ROOT),
    ];

    for (scope, ready, ready_anchor, text_anchor) in cases {
        let renderer = ScriptedRenderer::new(vec![ContextScript::ready_with(&["vacancy"])]);
        let sleeper = RecordingSleeper::default();

        acquirer(&renderer, &sleeper)
            .acquire(&request(scope, ready))
            .await
            .unwrap();

        let visibility = renderer.log.visibility_selectors.lock().unwrap().clone();
        let text = renderer.log.text_selectors.lock().unwrap().clone();
        assert_eq!(visibility, vec![ready_anchor.to_string()]);
        assert_eq!(text, vec![text_anchor.to_string()]);
    }
}

#[tokio::test]
async fn shutdown_reaches_the_renderer() {
    let renderer = ScriptedRenderer::new(Vec::new());
    let sleeper = RecordingSleeper::default();

    acquirer(&renderer, &sleeper).shutdown().await.unwrap();

    assert_eq!(
        renderer
            .log
            .shutdowns
            .load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}
