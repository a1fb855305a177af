use super::*;

use serde_json::{Value, json};

use crate::channel::{Envelope, InMemoryChannel};
use crate::foundation::core::{FrameIndex, NodeId};
use crate::graph::validate::SchemaRule;

fn identity() -> Value {
    json!([
        [1.0, 0.0, 0.0, 0.0],
        [0.0, 1.0, 0.0, 0.0],
        [0.0, 0.0, 1.0, 0.0],
        [0.0, 0.0, 0.0, 1.0]
    ])
}

fn snapshot(node: u32) -> Value {
    let mut world = serde_json::Map::new();
    world.insert(node.to_string(), json!({"0": identity()}));
    json!({"edges": {}, "local_transforms": {}, "world_transforms": world})
}

fn mixed() -> Value {
    let mut m = identity();
    m[0][0] = Value::Null;
    json!({
        "edges": {},
        "local_transforms": {"0": {"1": {"0": m}}},
        "world_transforms": {}
    })
}

fn has_world_node(store: &WorldStore, node: u32) -> bool {
    store
        .current()
        .is_some_and(|s| s.world_transform(NodeId(node), FrameIndex(0)).is_some())
}

#[test]
fn valid_snapshot_is_applied() {
    let store = Arc::new(WorldStore::new());
    let mut ch = InMemoryChannel::new();
    ch.push_payload("graph", snapshot(1));

    let mut adapter = UpdateAdapter::activate(ch, "graph", Arc::clone(&store));
    assert!(matches!(adapter.pump(), PumpOutcome::Applied { generation: 1 }));
    assert!(has_world_node(&store, 1));
    assert!(matches!(adapter.pump(), PumpOutcome::Closed));
    assert!(!adapter.is_active());
}

#[test]
fn invalid_snapshot_keeps_previous_state() {
    let store = Arc::new(WorldStore::new());
    let mut ch = InMemoryChannel::new();
    ch.push_payload("graph", snapshot(1));
    ch.push_payload("graph", mixed());

    let mut adapter = UpdateAdapter::activate(ch, "graph", Arc::clone(&store));
    adapter.pump();
    match adapter.pump() {
        PumpOutcome::Rejected(errors) => assert!(errors.has_rule(SchemaRule::MixedTransform)),
        other => panic!("expected rejection, got {other:?}"),
    }
    assert!(has_world_node(&store, 1));
    assert_eq!(store.generation(), 1);
}

#[test]
fn invalid_first_snapshot_leaves_store_empty() {
    let store = Arc::new(WorldStore::new());
    let mut ch = InMemoryChannel::new();
    ch.push_payload("graph", json!({"edges": {}}));

    let stats = UpdateAdapter::activate(ch, "graph", Arc::clone(&store)).run();
    assert_eq!(stats.rejected, 1);
    assert!(store.current().is_none());
}

#[test]
fn run_applies_in_arrival_order_and_counts() {
    let store = Arc::new(WorldStore::new());
    let mut ch = InMemoryChannel::new();
    ch.push_payload("graph", snapshot(1));
    ch.push_payload("status", json!("busy"));
    ch.push_garbage("\u{0}");
    ch.push_payload("graph", mixed());
    ch.push_payload("graph", snapshot(2));

    let mut seen = Vec::new();
    let mut adapter = UpdateAdapter::activate(ch, "graph", Arc::clone(&store));
    let stats = adapter.run_with(|o| seen.push(format!("{o:?}")));

    assert_eq!(
        stats,
        UpdateStats {
            applied: 2,
            rejected: 1,
            ignored: 1,
            channel_faults: 1,
        }
    );
    assert_eq!(seen.len(), 6);
    assert!(seen[1].starts_with("Ignored"));
    assert!(seen[2].starts_with("ChannelFault"));
    assert_eq!(seen[5], "Closed");
    assert!(has_world_node(&store, 2));
    assert!(!has_world_node(&store, 1));
    assert_eq!(store.generation(), 2);
}

#[test]
fn cancel_stops_before_next_apply() {
    let store = Arc::new(WorldStore::new());
    let mut ch = InMemoryChannel::open_ended();
    ch.push_payload("graph", snapshot(1));
    ch.push_payload("graph", snapshot(2));

    let mut adapter = UpdateAdapter::activate(ch, "graph", Arc::clone(&store));
    let cancel = adapter.cancel_handle();
    assert!(matches!(adapter.pump(), PumpOutcome::Applied { .. }));

    cancel.cancel();
    assert!(cancel.is_cancelled());
    assert!(matches!(adapter.pump(), PumpOutcome::Cancelled));
    assert!(!adapter.is_active());
    assert!(has_world_node(&store, 1));
    assert_eq!(store.generation(), 1);
}

#[test]
fn run_with_stops_when_callback_cancels() {
    let store = Arc::new(WorldStore::new());
    let mut ch = InMemoryChannel::open_ended();
    for node in 0..5 {
        ch.push_payload("graph", snapshot(node));
    }

    let mut adapter = UpdateAdapter::activate(ch, "graph", Arc::clone(&store));
    let cancel = adapter.cancel_handle();
    let stats = adapter.run_with(|o| {
        if matches!(o, PumpOutcome::Applied { generation: 2 }) {
            cancel.cancel();
        }
    });
    assert_eq!(stats.applied, 2);
    assert!(has_world_node(&store, 1));
}

#[test]
fn teardown_releases_channel() {
    let store = Arc::new(WorldStore::new());
    let mut ch = InMemoryChannel::open_ended();
    ch.push(Envelope::new("graph", snapshot(0)));

    let adapter = UpdateAdapter::activate(ch, "graph", Arc::clone(&store));
    assert_eq!(adapter.event(), "graph");
    assert!(Arc::ptr_eq(adapter.store(), &store));
    let stats = adapter.teardown();
    assert_eq!(stats, UpdateStats::default());
    assert!(store.current().is_none());
}

#[test]
fn idle_is_not_terminal() {
    let store = Arc::new(WorldStore::new());
    let mut adapter =
        UpdateAdapter::activate(InMemoryChannel::open_ended(), "graph", Arc::clone(&store));
    let outcome = adapter.pump();
    assert!(matches!(outcome, PumpOutcome::Idle));
    assert!(!outcome.is_terminal());
    assert!(adapter.is_active());
}

/// Fires cancellation while handing out a valid snapshot, as a UI thread would mid-validation.
struct CancelOnRecv {
    cancel: CancelHandle,
    payload: Option<Value>,
}

impl SnapshotChannel for CancelOnRecv {
    fn recv(&mut self) -> Result<Received, ChannelError> {
        self.cancel.cancel();
        Ok(match self.payload.take() {
            Some(data) => Received::Event(Envelope::new("graph", data)),
            None => Received::Closed,
        })
    }

    fn close(&mut self) {}
}

#[test]
fn snapshot_in_flight_at_cancellation_is_discarded() {
    let store = Arc::new(WorldStore::new());
    let cancel = CancelHandle::default();
    let ch = CancelOnRecv {
        cancel: cancel.clone(),
        payload: Some(snapshot(1)),
    };

    let mut adapter = UpdateAdapter::activate(ch, "graph", Arc::clone(&store));
    // Share the channel's handle with the adapter.
    adapter.cancel = cancel;
    assert!(matches!(adapter.pump(), PumpOutcome::Cancelled));
    assert!(!adapter.is_active());
    assert!(store.current().is_none());
    assert_eq!(store.generation(), 0);
    assert_eq!(adapter.stats().applied, 0);
}
