//! Drives the speed probe end to end against the mock engine.

use std::time::Duration;

use scilab_speed_check::bridge::mock::lock_log;
use scilab_speed_check::bridge::{MockCall, MockSession};
use scilab_speed_check::core::{ProbeSettings, ProbeState, SpeedProbe, TeardownPolicy};
use scilab_speed_check::ProbeError;

fn settings(teardown: TeardownPolicy) -> ProbeSettings {
    ProbeSettings {
        settle_delay: Duration::ZERO,
        teardown,
        ..ProbeSettings::default()
    }
}

fn close_count(calls: &[MockCall]) -> usize {
    calls.iter().filter(|call| **call == MockCall::Close).count()
}

#[tokio::test]
async fn test_fixed_schedule_call_sequence() {
    let session = MockSession::new();
    let log = session.call_log();
    let mut probe = SpeedProbe::new(session, settings(TeardownPolicy::Always));

    let report = probe.run(Vec::new()).await.unwrap();
    let calls = lock_log(&log).clone();

    let mut expected = vec![MockCall::Eval("x = 1".to_string()); 10];
    for (side, repeats) in [(1usize, 10usize), (10, 10), (100, 10), (1000, 5)] {
        for _ in 0..repeats {
            expected.push(MockCall::Push { name: "x".to_string(), len: side * side });
        }
        for _ in 0..repeats {
            expected.push(MockCall::Pull("x".to_string()));
        }
    }
    expected.push(MockCall::Close);
    assert_eq!(calls, expected);

    assert_eq!(report.raw_call.repeats, 10);
    let summary: Vec<(Option<usize>, usize)> =
        report.transfers.iter().map(|t| (t.side, t.repeats)).collect();
    assert_eq!(
        summary,
        vec![
            (Some(1), 10), (Some(1), 10),
            (Some(10), 10), (Some(10), 10),
            (Some(100), 10), (Some(100), 10),
            (Some(1000), 5), (Some(1000), 5),
        ]
    );
    for trial in report.trials() {
        assert!(trial.average() >= Duration::ZERO);
    }
}

#[tokio::test]
async fn test_console_output_shape() {
    let mut probe = SpeedProbe::new(MockSession::new(), settings(TeardownPolicy::Always));
    let mut out = Vec::new();
    probe.run(&mut out).await.unwrap();

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();

    assert_eq!(lines.len(), 2 + 2 + 4 * 4 + 2);
    assert_eq!(lines[0], "Mock speed test");
    assert_eq!(lines[1], "********************");
    assert_eq!(lines[2], "Raw speed:");
    assert!(lines[3].starts_with("    ") && lines[3].ends_with(" usec per loop"));
    assert_eq!(lines[4], "Put 1x1:");
    assert!(lines[5].ends_with(" msec"));
    assert_eq!(lines[6], "Get 1x1:");
    assert_eq!(lines[16], "Put 1000x1000:");
    assert_eq!(lines[18], "Get 1000x1000:");
    assert_eq!(lines[lines.len() - 1], "Test complete!");

    assert_eq!(text.matches("speed test").count(), 1);
    assert_eq!(lines.iter().filter(|l| **l == "********************").count(), 2);
    assert_eq!(text.matches("Test complete!").count(), 1);
}

#[tokio::test]
async fn test_teardown_once_after_success() {
    let session = MockSession::new();
    let log = session.call_log();
    let mut probe = SpeedProbe::new(session, settings(TeardownPolicy::SuccessOnly));

    probe.run(Vec::new()).await.unwrap();

    let calls = lock_log(&log).clone();
    assert_eq!(close_count(&calls), 1);
    assert_eq!(calls.last(), Some(&MockCall::Close));
    assert_eq!(probe.state(), ProbeState::Closed);
}

#[tokio::test]
async fn test_upload_failure_on_third_size_leaves_session_open() {
    let session = MockSession::new().fail_push_with_len(100 * 100);
    let log = session.call_log();
    let mut probe = SpeedProbe::new(session, settings(TeardownPolicy::SuccessOnly));
    let mut out = Vec::new();

    let err = probe.run(&mut out).await.unwrap_err();
    assert!(matches!(err, ProbeError::Transfer(_)));

    let calls = lock_log(&log).clone();
    assert_eq!(close_count(&calls), 0);
    assert_eq!(probe.state(), ProbeState::Running);
    assert!(!probe.session().is_closed());

    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("Get 10x10:"));
    assert!(!text.contains("Put 100x100:\n"));
    assert!(!text.contains("Test complete!"));
}

#[tokio::test]
async fn test_upload_failure_on_third_size_closes_session() {
    let session = MockSession::new().fail_push_with_len(100 * 100);
    let log = session.call_log();
    let mut probe = SpeedProbe::new(session, settings(TeardownPolicy::Always));
    let mut out = Vec::new();

    let err = probe.run(&mut out).await.unwrap_err();
    assert!(matches!(err, ProbeError::Transfer(_)));

    let calls = lock_log(&log).clone();
    assert_eq!(close_count(&calls), 1);
    assert_eq!(calls.last(), Some(&MockCall::Close));
    assert_eq!(probe.state(), ProbeState::Closed);

    let text = String::from_utf8(out).unwrap();
    assert!(!text.contains("Test complete!"));
}

#[tokio::test]
async fn test_raw_call_failure_aborts_before_transfers() {
    let session = MockSession::new();
    session.trigger_failure();
    let log = session.call_log();
    let mut probe = SpeedProbe::new(session, settings(TeardownPolicy::Always));

    let err = probe.run(Vec::new()).await.unwrap_err();
    assert!(matches!(err, ProbeError::Connection(_)));

    let calls = lock_log(&log).clone();
    assert_eq!(calls, vec![MockCall::Eval("x = 1".to_string()), MockCall::Close]);
}

#[tokio::test]
async fn test_boxed_session() {
    let session: Box<dyn scilab_speed_check::bridge::Session> = Box::new(MockSession::new());
    let mut probe = SpeedProbe::new(
        session,
        ProbeSettings {
            schedule: vec![scilab_speed_check::core::ScheduleEntry::new(5, 2)],
            ..settings(TeardownPolicy::Always)
        },
    );
    let report = probe.run(std::io::sink()).await.unwrap();
    assert_eq!(report.transfers[0].elements, 25);
}
