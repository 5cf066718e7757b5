use bytes::Bytes;
use crossbeam_channel::unbounded;
use watch_keeper::CreateMode;
use watch_keeper::EventKind;
use watch_keeper::SessionState;
use watch_keeper::WatchEvent;

use crate::common::kinds;
use crate::common::Collector;
use crate::common::Harness;
use crate::common::EVENT_TIMEOUT;

#[test]
fn test_expired_session_is_fully_restored() {
    let harness = Harness::start(2);
    harness.put("/svc", b"");
    harness.put("/svc/peers", b"");
    harness.put("/svc/peers/a", b"");
    harness.put("/svc/leader", b"old");
    let peers = Collector::new();
    let leader = Collector::new();

    harness.session.listen_children("/svc/peers", peers.clone()).unwrap();
    harness.session.listen_data("/svc/leader", leader.clone()).unwrap();
    peers.expect(1);
    leader.expect(1);
    harness
        .session
        .create_stubborn("/svc/lock", Bytes::from_static(b"me"))
        .unwrap();

    harness.service.expire_session();
    assert_eq!(harness.service.node_mode("/svc/lock"), None);
    harness.put("/svc/peers/b", b"");
    harness.service.external_delete("/svc/peers/a").unwrap();
    harness.session.reconnect().unwrap();

    assert_eq!(
        kinds(&peers.expect(2)),
        vec![
            ("/svc/peers/a".to_string(), EventKind::Deleted),
            ("/svc/peers/b".to_string(), EventKind::Created),
        ]
    );
    assert_eq!(
        leader.expect(1),
        vec![WatchEvent::data_changed("/svc/leader".to_string(), Bytes::from_static(b"old"))]
    );
    assert_eq!(harness.service.node_mode("/svc/lock"), Some(CreateMode::Ephemeral));
    assert_eq!(harness.service.node_data("/svc/lock"), Some(Bytes::from_static(b"me")));

    harness
        .service
        .external_set_data("/svc/leader", Bytes::from_static(b"new"))
        .unwrap();
    assert_eq!(
        leader.expect(1),
        vec![WatchEvent::data_changed("/svc/leader".to_string(), Bytes::from_static(b"new"))]
    );
    peers.expect_quiet();
}

#[test]
fn test_disconnect_does_not_duplicate_events() {
    let harness = Harness::start(2);
    harness.put("/queue", b"");
    let collector = Collector::new();
    harness.session.listen_children("/queue", collector.clone()).unwrap();

    harness.service.disconnect();
    harness.put("/queue/job-1", b"");
    // Both the queued fire and the relisten pass see job-1; one event only.
    harness.session.reconnect().unwrap();

    assert_eq!(kinds(&collector.expect(1)), vec![("/queue/job-1".to_string(), EventKind::Created)]);
    collector.expect_quiet();

    harness.session.reconnect().unwrap();
    collector.expect_quiet();
}

#[test]
fn test_expiry_reaches_state_listener() {
    let harness = Harness::start(1);
    let (tx, rx) = unbounded();
    let listener = move |state: SessionState| {
        let _ = tx.send(state);
    };
    harness
        .session
        .listen_state(SessionState::Expired, std::sync::Arc::new(listener))
        .unwrap();

    harness.service.disconnect();
    harness.service.expire_session();

    assert_eq!(rx.recv_timeout(EVENT_TIMEOUT).unwrap(), SessionState::Expired);
    assert!(rx.try_recv().is_err());
}

#[test]
fn test_deleted_stubborn_node_stays_deleted() {
    let harness = Harness::start(1);
    harness
        .session
        .create_ephemeral("/worker", Bytes::from_static(b"w1"), true)
        .unwrap();

    harness.session.delete("/worker").unwrap();
    harness.service.expire_session();
    harness.session.reconnect().unwrap();

    assert_eq!(harness.service.node_mode("/worker"), None);
}
