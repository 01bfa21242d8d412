// Path: crates/storage/tests/collections.rs
use fleet_api::store::DocumentStore;
use fleet_storage::{Collections, MemoryStore, RedbStore};
use fleet_types::app::{
    Anchor, AppMessage, HashRecord, LocationRecord, MessageType, StoredMessage, TemporaryMessage,
};
use serde_json::json;
use std::sync::Arc;

fn message(name: &str, hash: &str, height: u64) -> AppMessage {
    AppMessage {
        message_type: MessageType::Register,
        version: 7,
        specification: json!({"version": 7, "name": name}),
        hash: hash.into(),
        timestamp: 1,
        signature: "sig".into(),
        txid: format!("tx-{hash}"),
        height,
        paid_amount: 100,
    }
}

fn anchor(hash: &str, height: u64) -> Anchor {
    Anchor {
        hash: hash.into(),
        txid: format!("tx-{hash}"),
        height,
        paid_amount: 100,
    }
}

fn exercise(store: Arc<dyn DocumentStore>) {
    let c = Collections::new(store);

    assert!(c.insert_hash_record(&HashRecord::new(anchor("h2", 20))).unwrap());
    assert!(c.insert_hash_record(&HashRecord::new(anchor("h1", 10))).unwrap());
    assert!(!c.insert_hash_record(&HashRecord::new(anchor("h1", 10))).unwrap());
    let missing: Vec<_> = c
        .missing_hash_records(false)
        .unwrap()
        .into_iter()
        .map(|r| r.hash)
        .collect();
    assert_eq!(missing, vec!["h1", "h2"]);

    c.mark_not_found("h2").unwrap();
    assert_eq!(c.missing_hash_records(false).unwrap().len(), 1);
    assert_eq!(c.missing_hash_records(true).unwrap().len(), 2);
    c.set_has_message("h1", true).unwrap();
    assert_eq!(c.hash_record_counts().unwrap(), (2, 1));

    let stored = StoredMessage {
        message: message("web", "h1", 10),
        underpaid: false,
    };
    assert!(c.store_permanent(&stored).unwrap());
    assert!(!c.store_permanent(&stored).unwrap());
    c.store_permanent(&StoredMessage {
        message: message("web", "h3", 30),
        underpaid: true,
    })
    .unwrap();
    assert_eq!(c.accepted_messages(0).unwrap().len(), 1);
    assert_eq!(
        c.previous_accepted("web", 30).unwrap().map(|m| m.hash),
        Some("h1".to_string())
    );
    assert!(c.previous_accepted("web", 10).unwrap().is_none());

    c.store_temporary(&TemporaryMessage {
        message: message("db", "t1", 0),
        received_at: 1_000,
    })
    .unwrap();
    assert!(c.temporary_message("t1", 500).unwrap().is_some());
    assert!(c.temporary_message("t1", 2_000).unwrap().is_none());
    assert_eq!(c.purge_temporary(1_001).unwrap(), 1);

    let loc = |ip: &str, since: u64| LocationRecord {
        name: "web".into(),
        hash: "h1".into(),
        ip: ip.into(),
        broadcasted_at: since,
        expire_at: 10_000,
        running_since: since,
    };
    c.upsert_location(&loc("10.0.0.2", 50)).unwrap();
    c.upsert_location(&loc("10.0.0.1", 70)).unwrap();
    let ips: Vec<_> = c
        .locations(Some("web"), 100)
        .unwrap()
        .into_iter()
        .map(|l| l.ip)
        .collect();
    assert_eq!(ips, vec!["10.0.0.2", "10.0.0.1"]);
    assert_eq!(c.purge_expired(20_000).unwrap(), 2);
}

fn racing_writers_store_once(store: Arc<dyn DocumentStore>) {
    let c = Collections::new(store);
    let stored = StoredMessage {
        message: message("web", "h1", 10),
        underpaid: false,
    };
    let (records, messages) = std::thread::scope(|s| {
        let workers: Vec<_> = (0..8)
            .map(|_| {
                s.spawn(|| {
                    (
                        c.insert_hash_record(&HashRecord::new(anchor("h1", 10))).unwrap(),
                        c.store_permanent(&stored).unwrap(),
                    )
                })
            })
            .collect();
        workers
            .into_iter()
            .map(|w| w.join().unwrap())
            .fold((0, 0), |(r, m), (ri, mi)| (r + usize::from(ri), m + usize::from(mi)))
    });
    assert_eq!(records, 1);
    assert_eq!(messages, 1);
    assert_eq!(c.hash_record_counts().unwrap(), (1, 1));
    assert_eq!(c.accepted_messages(0).unwrap().len(), 1);
}

#[test]
fn collections_on_memory_store() {
    exercise(Arc::new(MemoryStore::new()));
}

#[test]
fn collections_on_redb_store() {
    let dir = tempfile::tempdir().unwrap();
    exercise(Arc::new(RedbStore::open(dir.path().join("fleet.redb")).unwrap()));
}

#[test]
fn concurrent_inserts_of_one_hash_keep_a_single_document() {
    racing_writers_store_once(Arc::new(MemoryStore::new()));
    let dir = tempfile::tempdir().unwrap();
    racing_writers_store_once(Arc::new(RedbStore::open(dir.path().join("fleet.redb")).unwrap()));
}
