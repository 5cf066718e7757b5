use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;
use crossbeam_channel::unbounded;
use watch_keeper::EventKind;
use watch_keeper::ListenerResult;
use watch_keeper::WatchEvent;

use crate::common::kinds;
use crate::common::Collector;
use crate::common::Harness;
use crate::common::EVENT_TIMEOUT;

#[test]
fn test_children_come_and_go() {
    let harness = Harness::start(2);
    harness.put("/members", b"");
    harness.put("/members/n1", b"10.0.0.1");
    let collector = Collector::new();

    harness.session.listen_children("/members", collector.clone()).unwrap();
    assert_eq!(
        collector.expect(1),
        vec![WatchEvent::created("/members/n1".to_string(), Bytes::from_static(b"10.0.0.1"))]
    );

    harness.put("/members/n2", b"10.0.0.2");
    assert_eq!(
        collector.expect(1),
        vec![WatchEvent::created("/members/n2".to_string(), Bytes::from_static(b"10.0.0.2"))]
    );

    harness.service.external_delete("/members/n1").unwrap();
    assert_eq!(collector.expect(1), vec![WatchEvent::deleted("/members/n1".to_string())]);
    collector.expect_quiet();

    assert_eq!(
        harness.session.coordinator().known_children("/members"),
        Some(vec!["n2".to_string()])
    );
}

#[test]
fn test_child_data_changes_are_followed() {
    let harness = Harness::start(4);
    harness.put("/config", b"");
    harness.put("/config/timeout", b"30");
    let collector = Collector::new();

    harness.session.listen_child_data("/config", collector.clone()).unwrap();
    collector.expect(1);

    harness
        .service
        .external_set_data("/config/timeout", Bytes::from_static(b"60"))
        .unwrap();
    assert_eq!(
        collector.expect(1),
        vec![WatchEvent::data_changed(
            "/config/timeout".to_string(),
            Bytes::from_static(b"60")
        )]
    );

    harness.put("/config/retries", b"3");
    assert_eq!(kinds(&collector.expect(1)), vec![("/config/retries".to_string(), EventKind::Created)]);
    harness
        .service
        .external_set_data("/config/retries", Bytes::from_static(b"5"))
        .unwrap();
    assert_eq!(
        collector.expect(1),
        vec![WatchEvent::data_changed("/config/retries".to_string(), Bytes::from_static(b"5"))]
    );

    harness.session.unlisten_child_data("/config").unwrap();
    harness
        .service
        .external_set_data("/config/retries", Bytes::from_static(b"7"))
        .unwrap();
    collector.expect_quiet();
}

#[test]
fn test_failing_listener_keeps_receiving() {
    let harness = Harness::start(1);
    harness.put("/jobs", b"");
    let calls = Arc::new(AtomicUsize::new(0));
    let (tx, rx) = unbounded();
    let counter = calls.clone();
    let listener = move |event: &WatchEvent| -> ListenerResult {
        match counter.fetch_add(1, Ordering::SeqCst) {
            0 => panic!("first event blows up"),
            1 => Err("second event fails".into()),
            _ => {
                let _ = tx.send(event.path.clone());
                Ok(())
            }
        }
    };
    harness.session.listen_children("/jobs", Arc::new(listener)).unwrap();

    for name in ["a", "b", "c"] {
        harness.put(&format!("/jobs/{name}"), b"");
        // One fire per creation; wait until the watch is re-armed.
        while !harness.service.has_child_watch("/jobs") {
            std::thread::yield_now();
        }
    }

    assert_eq!(rx.recv_timeout(EVENT_TIMEOUT).unwrap(), "/jobs/c");
    assert_eq!(calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_every_data_change_is_reported() {
    let harness = Harness::start(4);
    harness.put("/flag", b"0");
    let collector = Collector::new();
    harness.session.listen_data("/flag", collector.clone()).unwrap();
    assert_eq!(
        collector.expect(1),
        vec![WatchEvent::data_changed("/flag".to_string(), Bytes::from_static(b"0"))]
    );

    let values: [&'static [u8]; 4] = [b"1", b"2", b"3", b"4"];
    for value in values {
        harness.service.external_set_data("/flag", Bytes::from_static(value)).unwrap();
        let event = collector.expect(1).remove(0);
        assert_eq!(event.data, Bytes::from_static(value));
    }
}
