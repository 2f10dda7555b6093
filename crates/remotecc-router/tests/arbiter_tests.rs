//! Arbitration protocol tests
//!
//! Drives the arbiter directly with mock connections so origins can be
//! chosen freely and every sink frame can be asserted exactly.

use async_trait::async_trait;
use remotecc_core::{ControlMessage, ServerMessage, SUPERSEDED_REASON};
use remotecc_output::OutputSink;
use remotecc_router::{
    spawn_eviction, Arbiter, Connection, ControlOutcome, Diagnostics, OutputState, RejectReason,
};
use remotecc_test_utils::{test_connection, RecordingSink};
use remotecc_transport::TransportSender;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const ZERO_PB: [u8; 3] = [0xE0, 0x00, 0x40];
const ZERO_MOD: [u8; 3] = [0xB0, 0x01, 0x00];

fn arbiter_with(sink: &RecordingSink) -> Arbiter {
    Arbiter::new(Box::new(sink.clone()), Diagnostics::default())
}

fn connected(arbiter: &Arbiter, addr: &str) -> Arc<Connection> {
    let (connection, _) = test_connection(addr);
    arbiter.connect(connection.clone());
    connection
}

#[tokio::test]
async fn test_takeover_scenario() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);

    let (a, a_sender) = test_connection("10.0.0.5:50000");
    let b = connected(&arbiter, "10.0.0.5:50001");
    arbiter.connect(a.clone());

    let zero = ControlMessage::new(0.0, 0.0);

    let outcome = arbiter.control(&a, &zero);
    assert!(matches!(outcome, ControlOutcome::Elected { evicted: None }));
    assert_eq!(sink.frames(), vec![ZERO_PB, ZERO_MOD, ZERO_PB, ZERO_MOD]);

    sink.clear();
    let outcome = arbiter.control(&b, &zero);
    let evicted = match outcome {
        ControlOutcome::Elected {
            evicted: Some(previous),
        } => previous,
        other => panic!("expected eviction, got {:?}", other),
    };
    assert_eq!(evicted.id, a.id);
    assert!(a.is_superseded());
    assert!(arbiter.is_active(&b));
    assert!(!arbiter.is_active(&a));
    assert_eq!(sink.frames(), vec![ZERO_PB, ZERO_MOD, ZERO_PB, ZERO_MOD]);

    spawn_eviction(evicted, Duration::from_millis(500))
        .await
        .unwrap();

    assert_eq!(
        a_sender.messages(),
        vec![ServerMessage::Disconnect {
            reason: SUPERSEDED_REASON.to_string()
        }]
    );
    assert!(a_sender.is_closed());
    assert!(a.close_requested());
}

#[test]
fn test_election_zeroes_before_first_values() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");
    let b = connected(&arbiter, "10.0.0.5:50001");

    arbiter.control(&a, &ControlMessage::new(1.0, 1.0));
    assert_eq!(
        sink.frames(),
        vec![ZERO_PB, ZERO_MOD, [0xE0, 0x7F, 0x7F], [0xB0, 0x01, 0x7F]]
    );

    sink.clear();
    arbiter.control(&b, &ControlMessage::new(-1.0, 0.0));
    assert_eq!(
        sink.frames(),
        vec![ZERO_PB, ZERO_MOD, [0xE0, 0x00, 0x00], ZERO_MOD]
    );
    assert_eq!(
        arbiter.output_state(),
        Some(OutputState {
            pitch_bend: 0,
            modulation: 0
        })
    );
}

#[test]
fn test_superseded_connection_cannot_write() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");
    let b = connected(&arbiter, "10.0.0.5:50001");

    arbiter.control(&a, &ControlMessage::new(0.5, 0.5));
    arbiter.control(&b, &ControlMessage::new(0.0, 0.0));
    sink.clear();

    // Late frame from A racing its own eviction
    let outcome = arbiter.control(&a, &ControlMessage::new(1.0, 1.0));
    assert!(matches!(
        outcome,
        ControlOutcome::Rejected(RejectReason::Superseded)
    ));
    assert!(sink.frames().is_empty());
    assert!(arbiter.is_active(&b));
}

#[test]
fn test_superseded_connection_is_never_reelected() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");
    let b = connected(&arbiter, "10.0.0.5:50001");

    arbiter.control(&a, &ControlMessage::default());
    arbiter.control(&b, &ControlMessage::default());
    arbiter.disconnect(&b);
    sink.clear();

    let outcome = arbiter.control(&a, &ControlMessage::default());
    assert!(matches!(
        outcome,
        ControlOutcome::Rejected(RejectReason::Superseded)
    ));
    assert!(sink.frames().is_empty());
    assert!(arbiter.registry_snapshot().active_list.is_empty());
}

#[test]
fn test_active_disconnect_zeroes_once() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");

    arbiter.control(&a, &ControlMessage::new(0.8, 0.3));
    sink.clear();

    assert!(arbiter.disconnect(&a));
    assert_eq!(sink.frames(), vec![ZERO_PB, ZERO_MOD]);
    assert_eq!(arbiter.output_state(), Some(OutputState::default()));

    let snapshot = arbiter.registry_snapshot();
    assert_eq!(snapshot.connected_count, 0);
    assert!(snapshot.active_list.is_empty());

    // A second unregister of the same connection is a no-op
    assert!(!arbiter.disconnect(&a));
    assert_eq!(sink.count(), 2);
}

#[test]
fn test_passive_disconnect_leaves_output_alone() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");
    let b = connected(&arbiter, "10.0.0.5:50001");

    arbiter.control(&a, &ControlMessage::new(0.25, 0.5));
    sink.clear();

    assert!(!arbiter.disconnect(&b));
    assert!(sink.frames().is_empty());
    assert!(arbiter.is_active(&a));
    assert_eq!(arbiter.connection_count(), 1);
}

#[test]
fn test_identical_controls_are_not_coalesced() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");

    let control = ControlMessage::new(0.5, 1.0);
    arbiter.control(&a, &control);
    sink.clear();

    assert!(matches!(arbiter.control(&a, &control), ControlOutcome::Applied));
    assert!(matches!(arbiter.control(&a, &control), ControlOutcome::Applied));

    let frames = sink.frames();
    assert_eq!(frames.len(), 4);
    assert_eq!(frames[0..2], frames[2..4]);
}

#[test]
fn test_closed_sink_is_noop() {
    let sink = RecordingSink::closed();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");

    let outcome = arbiter.control(&a, &ControlMessage::new(1.0, 1.0));
    assert!(matches!(outcome, ControlOutcome::Elected { evicted: None }));
    assert!(arbiter.is_active(&a));
    assert!(sink.frames().is_empty());
    assert_eq!(arbiter.output_state(), Some(OutputState::default()));
    assert!(!arbiter.status().midi_connected);
}

#[test]
fn test_write_failure_drops_frame() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");

    arbiter.control(&a, &ControlMessage::new(0.0, 0.0));
    sink.set_failing(true);
    arbiter.control(&a, &ControlMessage::new(1.0, 1.0));
    assert_eq!(sink.count(), 4);
    // Dropped frames never reached the device, so it still holds the old values
    assert_eq!(arbiter.output_state(), Some(OutputState::default()));

    // Next update self-corrects
    sink.set_failing(false);
    arbiter.control(&a, &ControlMessage::new(1.0, 1.0));
    assert_eq!(
        arbiter.output_state(),
        Some(OutputState {
            pitch_bend: 16383,
            modulation: 127
        })
    );
}

#[test]
fn test_device_rejection_makes_output_unknown() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");

    arbiter.control(&a, &ControlMessage::new(0.5, 0.5));
    assert!(arbiter.output_state().is_some());

    // Frames were queued but the device refused one of them
    sink.reject_on_device(1);
    arbiter.control(&a, &ControlMessage::new(1.0, 1.0));
    assert_eq!(arbiter.output_state(), None);

    // Stays unknown until a clean write
    arbiter.control(&a, &ControlMessage::new(0.0, 0.0));
    assert_eq!(arbiter.output_state(), Some(OutputState::default()));
}

#[test]
fn test_debug_report_is_throttled_for_single_updates() {
    let sink = RecordingSink::new();
    let arbiter = Arbiter::new(
        Box::new(sink.clone()),
        Diagnostics::new(true, Duration::from_secs(60)),
    );
    let a = connected(&arbiter, "10.0.0.5:50000");

    let single = ControlMessage::new(0.1, 0.1);
    assert!(!single.continuous);
    arbiter.control(&a, &single);
    arbiter.control(&a, &single);

    // The first update used this interval's line
    assert!(!arbiter.diagnostics().should_emit());
    assert_eq!(sink.count(), 6);
}

#[test]
fn test_origins_are_independent() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");
    let c = connected(&arbiter, "10.0.0.6:50000");

    arbiter.control(&a, &ControlMessage::default());
    let outcome = arbiter.control(&c, &ControlMessage::default());

    assert!(matches!(outcome, ControlOutcome::Elected { evicted: None }));
    assert!(arbiter.is_active(&a));
    assert!(arbiter.is_active(&c));
    assert!(!a.is_superseded());
    assert_eq!(
        arbiter.registry_snapshot().active_list,
        vec!["10.0.0.5:50000".to_string(), "10.0.0.6:50000".to_string()]
    );
}

#[test]
fn test_unregistered_connection_rejected() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);

    let (stranger, _) = test_connection("10.0.0.7:40000");
    let outcome = arbiter.control(&stranger, &ControlMessage::default());
    assert!(matches!(
        outcome,
        ControlOutcome::Rejected(RejectReason::NotRegistered)
    ));

    let closing = connected(&arbiter, "10.0.0.8:40000");
    closing.request_close();
    let outcome = arbiter.control(&closing, &ControlMessage::default());
    assert!(matches!(
        outcome,
        ControlOutcome::Rejected(RejectReason::NotRegistered)
    ));

    assert!(sink.frames().is_empty());
    assert!(arbiter.registry_snapshot().active_list.is_empty());
}

#[test]
fn test_status_snapshot() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");
    let _b = connected(&arbiter, "10.0.0.9:50001");

    arbiter.control(&a, &ControlMessage::default());

    let status = arbiter.status();
    assert!(status.midi_connected);
    assert_eq!(status.midi_port.as_deref(), Some("Test Port"));
    assert_eq!(status.clients_connected, 2);
    assert_eq!(status.active_clients, vec!["10.0.0.5:50000".to_string()]);
    assert_eq!(status.available_ports, vec!["Test Port".to_string()]);
}

#[test]
fn test_close_port() {
    let sink = RecordingSink::new();
    let arbiter = arbiter_with(&sink);
    let a = connected(&arbiter, "10.0.0.5:50000");

    arbiter.close_port();
    assert!(!arbiter.status().midi_connected);
    assert_eq!(arbiter.status().midi_port, None);

    arbiter.control(&a, &ControlMessage::new(1.0, 1.0));
    assert!(sink.frames().is_empty());
}

#[test]
fn test_replace_sink_redirects_output() {
    let first = RecordingSink::new();
    let arbiter = arbiter_with(&first);
    let a = connected(&arbiter, "10.0.0.5:50000");
    arbiter.control(&a, &ControlMessage::new(0.5, 0.5));

    let second = RecordingSink::new();
    let previous = arbiter.replace_sink(Box::new(second.clone()));
    assert!(previous.is_open());
    // The new device's state is not known yet
    assert_eq!(arbiter.output_state(), None);

    first.clear();
    assert!(matches!(
        arbiter.control(&a, &ControlMessage::new(1.0, 1.0)),
        ControlOutcome::Applied
    ));
    assert!(first.frames().is_empty());
    assert_eq!(second.frames(), vec![[0xE0, 0x7F, 0x7F], [0xB0, 0x01, 0x7F]]);
    assert!(arbiter.output_state().is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_control_flows_while_new_sink_opens() {
    let sink = RecordingSink::new();
    let arbiter = Arc::new(arbiter_with(&sink));
    let a = connected(&arbiter, "10.0.0.5:50000");

    // Slow device open runs off the arbitration lock
    let opening = tokio::task::spawn_blocking(|| {
        std::thread::sleep(Duration::from_millis(300));
        let mut next = RecordingSink::closed();
        next.open(0).unwrap();
        next
    });

    let started = std::time::Instant::now();
    for _ in 0..10 {
        arbiter.control(&a, &ControlMessage::new(0.2, 0.2));
    }
    assert!(started.elapsed() < Duration::from_millis(200));
    assert_eq!(sink.count(), 22);

    let next = opening.await.unwrap();
    drop(arbiter.replace_sink(Box::new(next)));
    assert!(arbiter.status().midi_connected);
}

/// Sender whose sends never complete
struct StalledSender {
    closed: AtomicBool,
}

#[async_trait]
impl TransportSender for StalledSender {
    async fn send(&self, _text: String) -> remotecc_transport::Result<()> {
        std::future::pending().await
    }

    fn is_connected(&self) -> bool {
        !self.closed.load(Ordering::SeqCst)
    }

    async fn close(&self) -> remotecc_transport::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test]
async fn test_eviction_closes_despite_stalled_notice() {
    let sender = Arc::new(StalledSender {
        closed: AtomicBool::new(false),
    });
    let connection = Arc::new(Connection::new(
        sender.clone(),
        "10.0.0.5:50000".parse().unwrap(),
    ));

    let result = tokio::time::timeout(
        Duration::from_secs(2),
        spawn_eviction(connection.clone(), Duration::from_millis(50)),
    )
    .await;

    assert!(result.is_ok(), "eviction should finish after the notice deadline");
    assert!(sender.closed.load(Ordering::SeqCst));
    assert!(connection.close_requested());
}
