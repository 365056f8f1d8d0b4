mod common;

use std::time::Duration;

use common::{PAST_WINDOW_BODY, SUCCESS_BODY, ScriptedConnector, dispatcher, fail, ok};
use volley_core::error::VolleyError;
use volley_core::{AbortSignal, WaveReport};
use volley_traits::ManualClock;

const STAGGER: Duration = Duration::from_millis(15);

#[tokio::test]
async fn full_wave_sends_every_request_stagger_apart() {
    let clock = ManualClock::new();
    let steps = (0..5).map(|_| ok(40, SUCCESS_BODY)).collect();
    let connector = ScriptedConnector::new(clock.clone(), steps);
    let d = dispatcher(connector.clone(), clock.clone());

    let abort = AbortSignal::new();
    let report = d.send_wave(5, STAGGER, &abort).await.unwrap();

    assert_eq!(
        report,
        WaveReport {
            sent: 5,
            aborted: false
        }
    );
    assert!(!abort.is_set());
    let sends = connector.sends();
    assert_eq!(sends.len(), 5);
    for pair in sends.windows(2) {
        let gap = (pair[1] - pair[0]).to_std().unwrap();
        assert!(gap >= STAGGER, "gap {gap:?} shorter than stagger");
    }
    // 5 round trips + 4 staggers; nothing sleeps after the last send.
    assert_eq!(clock.elapsed(), Duration::from_millis(5 * 40 + 4 * 15));
    assert_eq!(connector.sessions_opened(), 1);
}

#[tokio::test]
async fn abort_stops_after_the_offending_response() {
    let clock = ManualClock::new();
    let steps = vec![
        ok(10, SUCCESS_BODY),
        ok(10, SUCCESS_BODY),
        ok(10, PAST_WINDOW_BODY),
        ok(10, SUCCESS_BODY),
    ];
    let connector = ScriptedConnector::new(clock.clone(), steps);
    let d = dispatcher(connector.clone(), clock.clone());

    let abort = AbortSignal::new();
    let report = d.send_wave(10, STAGGER, &abort).await.unwrap();

    assert_eq!(report.sent, 3);
    assert!(report.aborted);
    assert!(abort.is_set());
    assert_eq!(connector.sends().len(), 3);
    // No stagger sleep after the aborting send.
    assert_eq!(clock.elapsed(), Duration::from_millis(3 * 10 + 2 * 15));
}

#[tokio::test]
async fn transport_failure_does_not_abort() {
    let clock = ManualClock::new();
    let steps = vec![
        ok(10, SUCCESS_BODY),
        fail(15_000, "operation timed out"),
        ok(10, SUCCESS_BODY),
    ];
    let connector = ScriptedConnector::new(clock.clone(), steps);
    let d = dispatcher(connector.clone(), clock.clone());

    let abort = AbortSignal::new();
    let report = d.send_wave(3, STAGGER, &abort).await.unwrap();

    assert_eq!(report.sent, 3);
    assert!(!report.aborted);
    assert!(!abort.is_set());
    let sends = connector.sends();
    let gap = (sends[2] - sends[1]).to_std().unwrap();
    assert_eq!(gap, Duration::from_millis(15_000) + STAGGER);
}

#[tokio::test]
async fn malformed_body_continues() {
    let clock = ManualClock::new();
    let steps = vec![
        ok(5, "<html>504 Gateway Time-out</html>"),
        ok(5, ""),
        ok(5, SUCCESS_BODY),
    ];
    let connector = ScriptedConnector::new(clock.clone(), steps);
    let d = dispatcher(connector.clone(), clock);

    let report = d.send_wave(3, STAGGER, &AbortSignal::new()).await.unwrap();
    assert_eq!(report.sent, 3);
    assert!(!report.aborted);
}

#[tokio::test]
async fn preset_abort_sends_nothing() {
    let clock = ManualClock::new();
    let connector = ScriptedConnector::new(clock.clone(), Vec::new());
    let d = dispatcher(connector.clone(), clock);

    let abort = AbortSignal::new();
    abort.trip();
    let report = d.send_wave(10, STAGGER, &abort).await.unwrap();

    assert_eq!(report.sent, 0);
    assert!(report.aborted);
    assert!(connector.sends().is_empty());
}

#[tokio::test]
async fn session_setup_failure_is_fatal() {
    let clock = ManualClock::new();
    let d = dispatcher(ScriptedConnector::refusing(clock.clone()), clock);

    let err = d
        .send_wave(3, STAGGER, &AbortSignal::new())
        .await
        .expect_err("setup must fail");
    match err.downcast_ref::<VolleyError>() {
        Some(VolleyError::Session(msg)) => assert!(msg.contains("unavailable")),
        other => panic!("expected Session error, got {other:?}"),
    }
}

#[tokio::test]
async fn send_one_reports_failure_as_null_status() {
    let clock = ManualClock::new();
    let connector = ScriptedConnector::new(clock.clone(), vec![fail(3, "dns error")]);
    let d = dispatcher(connector.clone(), clock);

    let session = volley_traits::Connector::open(&connector, d.request()).unwrap();
    let outcome = d.send_one(&session, 7, "Request").await;

    assert_eq!(outcome.status, None);
    assert_eq!(outcome.elapsed_ms, None);
    assert_eq!(outcome.body, "dns error");
    assert!(!outcome.answered());
}

#[tokio::test]
async fn probe_sends_a_single_request_on_its_own_session() {
    let clock = ManualClock::new();
    let connector = ScriptedConnector::new(clock.clone(), vec![ok(80, PAST_WINDOW_BODY)]);
    let d = dispatcher(connector.clone(), clock);

    let outcome = d.probe().await.unwrap();

    assert_eq!(outcome.status, Some(200));
    assert!((outcome.elapsed_ms.unwrap() - 80.0).abs() < 1e-6);
    assert_eq!(connector.sends().len(), 1);
    assert_eq!(connector.sessions_opened(), 1);
}
