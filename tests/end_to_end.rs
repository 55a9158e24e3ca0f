//! Cross-crate end-to-end scenarios from spec §8, driven through the
//! top-level `GraphDb` facade and, where CDC is involved, the shard/cdc
//! crates directly (the facade has no CDC wiring of its own yet — CDC is
//! a sibling subsystem a shard can be attached to, not a step in the
//! query pipeline).

use std::sync::Arc;

use graphdb::{EntityId, ExecutionRequest, GraphDb, Predicate, Triple, TypedObject};
use graphdb_cdc::{CdcCoordinator, CdcMessage, CoordinatorMessage, InMemoryObjectStore, ShardTransport, TripleEvent, TripleEventKind};
use graphdb_core::ids::{Namespace, TransactionId};
use graphdb_shard::{CdcSink, Direction, ShardActor};

fn eid(s: &str) -> EntityId {
    EntityId::new(s).unwrap()
}
fn pred(s: &str) -> Predicate {
    Predicate::new(s).unwrap()
}
fn tx(n: u64) -> TransactionId {
    TransactionId::generate(n, [0; 10])
}
fn ns() -> Namespace {
    Namespace::new("https://e.com").unwrap()
}

#[test]
fn entity_lookup_scenario() {
    let db = GraphDb::new();
    let shard = db.shard_for_namespace(&ns());
    shard
        .insert(vec![
            Triple::new(eid("https://e.com/alice"), pred("name"), TypedObject::String("Alice".into()), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/alice"), pred("age"), TypedObject::Int64(30), 1, tx(2)).unwrap(),
        ])
        .unwrap();

    let result = db.query("e:alice", &ns(), ExecutionRequest::default(), 0).unwrap();
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0].entity_type, "Thing");
    assert_eq!(result.entities[0].id.as_str(), "https://e.com/alice");
}

#[test]
fn two_hop_traversal_with_filter_scenario() {
    let db = GraphDb::new();
    let shard = db.shard_for_namespace(&ns());
    shard
        .insert(vec![
            Triple::new(eid("https://e.com/alice"), pred("follows"), TypedObject::Ref(eid("https://e.com/bob")), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/alice"), pred("follows"), TypedObject::Ref(eid("https://e.com/charlie")), 1, tx(2)).unwrap(),
            Triple::new(eid("https://e.com/bob"), pred("age"), TypedObject::Int64(25), 1, tx(3)).unwrap(),
            Triple::new(eid("https://e.com/charlie"), pred("age"), TypedObject::Int64(35), 1, tx(4)).unwrap(),
        ])
        .unwrap();

    let result = db
        .query("e:alice.follows[?age > 30]", &ns(), ExecutionRequest::default(), 0)
        .unwrap();
    assert_eq!(result.entities.len(), 1);
    assert_eq!(result.entities[0].id.as_str(), "https://e.com/charlie");
}

#[test]
fn reverse_traversal_scenario() {
    let db = GraphDb::new();
    let shard = db.shard_for_namespace(&ns());
    shard
        .insert(vec![
            Triple::new(eid("https://e.com/bob"), pred("liked"), TypedObject::Ref(eid("https://e.com/post1")), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/charlie"), pred("liked"), TypedObject::Ref(eid("https://e.com/post1")), 1, tx(2)).unwrap(),
        ])
        .unwrap();

    let result = db.query("e:post1 <- liked", &ns(), ExecutionRequest::default(), 0).unwrap();
    let ids: std::collections::HashSet<_> = result.entities.iter().map(|e| e.id.as_str().to_string()).collect();
    assert_eq!(ids.len(), 2);
    assert!(ids.contains("https://e.com/bob"));
    assert!(ids.contains("https://e.com/charlie"));
}

#[test]
fn bounded_recursion_over_a_cycle_terminates() {
    let db = GraphDb::new();
    let shard = db.shard_for_namespace(&ns());
    shard
        .insert(vec![
            Triple::new(eid("https://e.com/a"), pred("friends"), TypedObject::Ref(eid("https://e.com/b")), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/b"), pred("friends"), TypedObject::Ref(eid("https://e.com/a")), 1, tx(2)).unwrap(),
        ])
        .unwrap();

    let result = db
        .query("e:a.friends*[depth <= 5]", &ns(), ExecutionRequest::default(), 0)
        .unwrap();
    assert!(result.entities.len() <= 2);
    assert!(!result.has_more);
}

#[test]
fn pagination_continuity_scenario() {
    let db = GraphDb::new();
    let shard = db.shard_for_namespace(&ns());
    let followees: Vec<_> = (1..=25).map(|i| eid(&format!("https://e.com/u{i}"))).collect();
    shard
        .insert(vec![Triple::new(eid("https://e.com/u0"), pred("followees"), TypedObject::RefArray(followees), 1, tx(1)).unwrap()])
        .unwrap();
    for i in 1..=25 {
        shard
            .insert(vec![Triple::new(eid(&format!("https://e.com/u{i}")), pred("n"), TypedObject::Int64(i), 1, tx(100 + i as u64)).unwrap()])
            .unwrap();
    }

    let mut seen = std::collections::HashSet::new();
    let mut pages = 0;
    let mut request = ExecutionRequest { max_results: 10, ..Default::default() };
    loop {
        let result = db.query("e:u0.followees", &ns(), request.clone(), 0).unwrap();
        pages += 1;
        for e in &result.entities {
            seen.insert(e.id.as_str().to_string());
        }
        if !result.has_more {
            assert!(result.cursor.is_none());
            break;
        }
        request = ExecutionRequest { max_results: 10, cursor: result.cursor.clone(), ..Default::default() };
    }
    assert_eq!(seen.len(), 25);
    assert_eq!(pages, 3);
}

struct CapturingTransport {
    acks: parking_lot::Mutex<Vec<CoordinatorMessage>>,
}

impl ShardTransport for CapturingTransport {
    fn send(&self, message: CoordinatorMessage) {
        self.acks.lock().push(message);
    }
}

struct CoordinatorSink {
    coordinator: Arc<CdcCoordinator>,
}

impl CdcSink for CoordinatorSink {
    fn emit(&self, message: CdcMessage) {
        self.coordinator.receive(message, 0).expect("in-order CDC message");
    }
}

#[test]
fn shard_writes_flow_through_cdc_to_the_object_store() {
    let coordinator = Arc::new(CdcCoordinator::new());
    let transport = Arc::new(CapturingTransport { acks: parking_lot::Mutex::new(Vec::new()) });
    coordinator.register("shard-e".into(), ns(), 0, 0, transport.clone());

    let sink = Arc::new(CoordinatorSink { coordinator: coordinator.clone() });
    let shard = ShardActor::new("shard-e", ns()).with_cdc_sink(sink);

    shard
        .insert(vec![Triple::new(eid("https://e.com/alice"), pred("name"), TypedObject::String("Alice".into()), 1, tx(1)).unwrap()])
        .unwrap();
    shard
        .insert(vec![Triple::new(eid("https://e.com/bob"), pred("name"), TypedObject::String("Bob".into()), 2, tx(2)).unwrap()])
        .unwrap();

    assert_eq!(coordinator.buffered_count(), 2);
    assert_eq!(transport.acks.lock().len(), 2);

    let store = InMemoryObjectStore::default();
    let report = coordinator.flush(&store);
    assert_eq!(report.flushed.len(), 1);
    assert_eq!(coordinator.buffered_count(), 0);

    let (flushed_ns, key, count) = &report.flushed[0];
    assert_eq!(flushed_ns, &ns());
    assert_eq!(*count, 2);
    assert!(key.contains("/_wal/"));
    let blob = store.get(key).expect("blob was written");
    let decoded = graphdb_graphcol::decode(&blob).unwrap();
    assert_eq!(decoded.triples.len(), 2);
}

#[test]
fn cdc_rejects_replayed_sequence_then_accepts_the_next_batch() {
    let coordinator = CdcCoordinator::new();
    struct NullTransport;
    impl ShardTransport for NullTransport {
        fn send(&self, _message: CoordinatorMessage) {}
    }
    coordinator.register("shard-e".into(), ns(), 0, 0, Arc::new(NullTransport));

    let make_event = |ts: i64| TripleEvent {
        kind: TripleEventKind::Insert,
        triple: Triple::new(eid("https://e.com/a"), pred("n"), TypedObject::Int64(ts), ts, tx(ts as u64)).unwrap(),
    };

    coordinator
        .receive(
            CdcMessage::Cdc { shard_id: "shard-e".into(), namespace: ns(), events: vec![make_event(1), make_event(2), make_event(3)], sequence: 3 },
            0,
        )
        .unwrap();

    let replay = coordinator.receive(
        CdcMessage::Cdc { shard_id: "shard-e".into(), namespace: ns(), events: vec![make_event(3)], sequence: 3 },
        1,
    );
    assert!(replay.is_err());
    assert_eq!(coordinator.registration("shard-e").unwrap().last_sequence, 3);

    coordinator
        .receive(
            CdcMessage::Cdc { shard_id: "shard-e".into(), namespace: ns(), events: vec![make_event(4), make_event(5)], sequence: 5 },
            2,
        )
        .unwrap();
    assert_eq!(coordinator.registration("shard-e").unwrap().last_sequence, 5);
}

#[test]
fn direct_traverse_endpoint_matches_query_pipeline_result() {
    let shard = ShardActor::new("shard-e", ns());
    shard
        .insert(vec![
            Triple::new(eid("https://e.com/alice"), pred("follows"), TypedObject::Ref(eid("https://e.com/bob")), 1, tx(1)).unwrap(),
            Triple::new(eid("https://e.com/bob"), pred("age"), TypedObject::Int64(25), 1, tx(2)).unwrap(),
        ])
        .unwrap();

    let out = shard.traverse(&eid("https://e.com/alice"), &pred("follows"), Direction::Outgoing);
    assert_eq!(out.len(), 1);
    assert_eq!(out[0].id.as_str(), "https://e.com/bob");
}
