//! Orchestration scenarios on a paused tokio clock
//!
//! Drives the orchestrator and family actors through `AppState` with a
//! loopback transport, so pacing and expiry can be asserted exactly.

use shared_types::{
    AttemptOutcome, CallMode, EnvironmentReport, Family, Guardian, IncomingCallNotice,
    PermissionState, PermissionsReport, Recipient, RemediationSurface,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

use dashboard::actors::call_orchestrator::actor as orchestrator;
use dashboard::actors::call_orchestrator::{IncomingError, RingAllOutcome, RingAllRejection};
use dashboard::actors::family as families;
use dashboard::app_state::AppState;
use dashboard::transport::{CallTransport, LoopbackTransport};

fn child(id: &str, reachable: bool) -> Recipient {
    Recipient {
        reachable,
        ..Recipient::new(id, id)
    }
}

fn test_family(children: Vec<Recipient>) -> Family {
    Family {
        id: "okafor".to_string(),
        name: "Okafor".to_string(),
        guardians: vec![Guardian::new("g-1", "Ngozi")],
        children,
    }
}

async fn setup(family: Family) -> (AppState, LoopbackTransport) {
    let transport = LoopbackTransport::new();
    let app_state = AppState::start(
        EnvironmentReport::default(),
        Vec::new(),
        vec![family],
        Arc::new(transport.clone()),
    )
    .await
    .expect("Failed to start dashboard actors");
    (app_state, transport)
}

async fn roster(app_state: &AppState) -> Family {
    families::get_family(&app_state.families(), "okafor".to_string())
        .await
        .unwrap()
        .unwrap()
}

async fn ring_all(app_state: &AppState) -> RingAllOutcome {
    let family = roster(app_state).await;
    orchestrator::start_ring_all(&app_state.orchestrator(), family)
        .await
        .unwrap()
}

async fn ring_all_active(app_state: &AppState) -> bool {
    orchestrator::get_snapshot(&app_state.orchestrator())
        .await
        .unwrap()
        .ring_all
        .is_active()
}

async fn sleep_until(t0: Instant, offset: Duration) {
    tokio::time::sleep_until(t0 + offset).await;
}

#[tokio::test(start_paused = true)]
async fn test_two_of_three_reachable_rings_two_paced_and_closes_at_ten_seconds() {
    let (app_state, transport) = setup(test_family(vec![
        child("c-1", true),
        child("c-2", false),
        child("c-3", true),
    ]))
    .await;

    let t0 = Instant::now();
    let outcome = ring_all(&app_state).await;
    let RingAllOutcome::Started {
        attempts_planned, ..
    } = outcome
    else {
        panic!("ring-all should start, got {outcome:?}");
    };
    assert_eq!(attempts_planned, 2);

    sleep_until(t0, Duration::from_secs(5)).await;
    let dispatched = transport.dispatched();
    let ids: Vec<_> = dispatched.iter().map(|d| d.recipient_id.as_str()).collect();
    assert_eq!(ids, vec!["c-1", "c-3"]);
    assert!(dispatched.iter().all(|d| d.mode == CallMode::Voice));
    assert!(dispatched[1].at - dispatched[0].at >= Duration::from_secs(1));

    sleep_until(t0, Duration::from_millis(9_900)).await;
    assert!(ring_all_active(&app_state).await);

    sleep_until(t0, Duration::from_millis(10_100)).await;
    assert!(!ring_all_active(&app_state).await);
    assert_eq!(transport.dispatched().len(), 2);

    app_state.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_session_expires_even_when_every_attempt_fails() {
    let (app_state, transport) = setup(test_family(vec![
        child("c-1", true),
        child("c-2", true),
    ]))
    .await;
    transport.reject_recipient("c-1");
    transport.reject_recipient("c-2");
    let before = roster(&app_state).await;

    let t0 = Instant::now();
    assert!(matches!(ring_all(&app_state).await, RingAllOutcome::Started { .. }));

    sleep_until(t0, Duration::from_secs(3)).await;
    let snapshot = orchestrator::get_snapshot(&app_state.orchestrator())
        .await
        .unwrap();
    assert!(snapshot.ring_all.is_active());
    assert_eq!(snapshot.ring_attempts.len(), 2);
    assert!(snapshot
        .ring_attempts
        .iter()
        .all(|a| matches!(a.outcome, AttemptOutcome::Failed { .. })));
    assert!(snapshot.notice.is_none());

    sleep_until(t0, Duration::from_millis(10_100)).await;
    assert!(!ring_all_active(&app_state).await);

    // Failed attempts never touch the roster
    assert_eq!(roster(&app_state).await, before);

    app_state.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_cancel_returns_to_idle_and_is_noop_when_idle() {
    let (app_state, transport) = setup(test_family(vec![child("c-1", true)])).await;
    transport.reject_recipient("c-1");
    let orchestrator_ref = app_state.orchestrator();

    assert!(!orchestrator::cancel_ring_all(&orchestrator_ref).await.unwrap());

    let t0 = Instant::now();
    assert!(matches!(ring_all(&app_state).await, RingAllOutcome::Started { .. }));
    sleep_until(t0, Duration::from_millis(2_500)).await;

    assert!(orchestrator::cancel_ring_all(&orchestrator_ref).await.unwrap());
    assert!(!ring_all_active(&app_state).await);

    sleep_until(t0, Duration::from_secs(20)).await;
    assert!(!ring_all_active(&app_state).await);
    assert!(!orchestrator::cancel_ring_all(&orchestrator_ref).await.unwrap());

    app_state.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_second_ring_all_while_active_is_rejected() {
    let (app_state, transport) = setup(test_family(vec![child("c-1", true)])).await;
    transport.reject_recipient("c-1");

    let first = ring_all(&app_state).await;
    assert!(matches!(first, RingAllOutcome::Started { .. }));

    let second = ring_all(&app_state).await;
    assert_eq!(
        second,
        RingAllOutcome::Rejected {
            reason: RingAllRejection::CallInProgress
        }
    );

    app_state.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_all_unreachable_family_starts_and_expires_without_dispatch() {
    let (app_state, transport) = setup(test_family(vec![
        child("c-1", false),
        child("c-2", false),
    ]))
    .await;

    let t0 = Instant::now();
    let outcome = ring_all(&app_state).await;
    let RingAllOutcome::Started {
        attempts_planned, ..
    } = outcome
    else {
        panic!("ring-all should start, got {outcome:?}");
    };
    assert_eq!(attempts_planned, 0);

    sleep_until(t0, Duration::from_secs(5)).await;
    assert!(transport.dispatched().is_empty());
    assert!(ring_all_active(&app_state).await);

    sleep_until(t0, Duration::from_millis(10_100)).await;
    assert!(!ring_all_active(&app_state).await);
    assert!(transport.dispatched().is_empty());

    app_state.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_restart_after_cancel_survives_old_expiry() {
    let (app_state, transport) = setup(test_family(vec![child("c-1", true)])).await;
    transport.reject_recipient("c-1");
    let orchestrator_ref = app_state.orchestrator();

    let t0 = Instant::now();
    ring_all(&app_state).await;
    sleep_until(t0, Duration::from_secs(2)).await;
    orchestrator::cancel_ring_all(&orchestrator_ref).await.unwrap();

    sleep_until(t0, Duration::from_secs(5)).await;
    let RingAllOutcome::Started { session_id, .. } = ring_all(&app_state).await else {
        panic!("restart should be accepted");
    };

    // Past the first session's original deadline
    sleep_until(t0, Duration::from_secs(12)).await;
    let snapshot = orchestrator::get_snapshot(&orchestrator_ref).await.unwrap();
    assert_eq!(snapshot.ring_all.session_id, Some(session_id));

    sleep_until(t0, Duration::from_millis(15_100)).await;
    assert!(!ring_all_active(&app_state).await);

    app_state.shutdown();
}

#[tokio::test(start_paused = true)]
async fn test_permission_denied_dispatches_nothing() {
    let (app_state, transport) = setup(test_family(vec![
        child("c-1", true),
        child("c-2", true),
    ]))
    .await;
    app_state
        .environment()
        .update(EnvironmentReport {
            permissions: PermissionsReport::Known {
                microphone: PermissionState::Denied,
                camera: PermissionState::Prompt,
            },
            ..EnvironmentReport::default()
        })
        .await;

    let t0 = Instant::now();
    ring_all(&app_state).await;
    sleep_until(t0, Duration::from_secs(3)).await;

    assert!(transport.dispatched().is_empty());
    let snapshot = orchestrator::get_snapshot(&app_state.orchestrator())
        .await
        .unwrap();
    assert_eq!(snapshot.remediation, Some(RemediationSurface::PermissionRecovery));
    assert_eq!(snapshot.ring_attempts.len(), 2);

    app_state.shutdown();
}

#[tokio::test]
async fn test_incoming_raised_right_after_start_is_shown() {
    let (app_state, transport) = setup(test_family(vec![child("c-1", true)])).await;
    let notice = IncomingCallNotice {
        caller_id: "c-1".to_string(),
        mode: CallMode::Voice,
    };

    // No RPC between start-up and the notice, so the status forwarder may
    // not be running yet when the transport publishes it.
    transport.raise_incoming(notice.clone());
    tokio::time::sleep(Duration::from_millis(100)).await;

    let snapshot = orchestrator::get_snapshot(&app_state.orchestrator())
        .await
        .unwrap();
    assert_eq!(snapshot.incoming, Some(notice.clone()));
    assert_eq!(transport.status().incoming_notice, Some(notice));

    app_state.shutdown();
}

#[tokio::test]
async fn test_reject_incoming_is_local_only() {
    let (app_state, transport) = setup(test_family(vec![child("c-1", true)])).await;
    let orchestrator_ref = app_state.orchestrator();
    let notice = IncomingCallNotice {
        caller_id: "c-1".to_string(),
        mode: CallMode::Video,
    };

    transport.raise_incoming(notice.clone());
    tokio::time::sleep(Duration::from_millis(50)).await;
    let snapshot = orchestrator::get_snapshot(&orchestrator_ref).await.unwrap();
    assert_eq!(snapshot.incoming, Some(notice.clone()));

    assert!(orchestrator::reject_incoming(&orchestrator_ref).await.unwrap());
    let snapshot = orchestrator::get_snapshot(&orchestrator_ref).await.unwrap();
    assert!(snapshot.incoming.is_none());

    // Nothing reached the transport; the caller is still ringing
    assert_eq!(transport.accept_requests(), 0);
    assert_eq!(transport.end_requests(), 0);
    assert_eq!(transport.status().incoming_notice, Some(notice));

    assert!(!orchestrator::reject_incoming(&orchestrator_ref).await.unwrap());

    app_state.shutdown();
}

#[tokio::test]
async fn test_new_incoming_after_dismissal_is_shown() {
    let (app_state, transport) = setup(test_family(vec![child("c-1", true)])).await;
    let orchestrator_ref = app_state.orchestrator();

    transport.raise_incoming(IncomingCallNotice {
        caller_id: "c-1".to_string(),
        mode: CallMode::Voice,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;
    orchestrator::reject_incoming(&orchestrator_ref).await.unwrap();

    transport.clear_incoming();
    tokio::time::sleep(Duration::from_millis(50)).await;
    transport.raise_incoming(IncomingCallNotice {
        caller_id: "c-1".to_string(),
        mode: CallMode::Voice,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let snapshot = orchestrator::get_snapshot(&orchestrator_ref).await.unwrap();
    assert!(snapshot.incoming.is_some());

    app_state.shutdown();
}

#[tokio::test]
async fn test_accept_incoming_enters_active_call() {
    let (app_state, transport) = setup(test_family(vec![child("c-1", true)])).await;
    let orchestrator_ref = app_state.orchestrator();

    assert_eq!(
        orchestrator::accept_incoming(&orchestrator_ref).await.unwrap(),
        Err(IncomingError::NoPendingNotice)
    );

    transport.raise_incoming(IncomingCallNotice {
        caller_id: "c-1".to_string(),
        mode: CallMode::Video,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let call = orchestrator::accept_incoming(&orchestrator_ref)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(call.peer_id, "c-1");
    assert_eq!(call.mode, CallMode::Video);
    assert_eq!(transport.accept_requests(), 1);

    let snapshot = orchestrator::get_snapshot(&orchestrator_ref).await.unwrap();
    assert!(snapshot.incoming.is_none());
    assert_eq!(
        snapshot.view,
        shared_types::DashboardView::ActiveCall {
            mode: CallMode::Video,
            peer_id: "c-1".to_string()
        }
    );

    app_state.shutdown();
}

#[tokio::test]
async fn test_failed_accept_keeps_notice_and_shows_message() {
    let (app_state, transport) = setup(test_family(vec![child("c-1", true)])).await;
    let orchestrator_ref = app_state.orchestrator();
    transport.fail_accept(Some("media device busy".to_string()));
    transport.raise_incoming(IncomingCallNotice {
        caller_id: "c-1".to_string(),
        mode: CallMode::Voice,
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let result = orchestrator::accept_incoming(&orchestrator_ref).await.unwrap();
    assert!(matches!(result, Err(IncomingError::AcceptFailed { .. })));

    let snapshot = orchestrator::get_snapshot(&orchestrator_ref).await.unwrap();
    assert!(snapshot.incoming.is_some());
    assert!(snapshot.notice.is_some());
    assert_eq!(snapshot.view, shared_types::DashboardView::Home);

    app_state.shutdown();
}
