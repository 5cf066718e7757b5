use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use watch_keeper::EventKind;
use watch_keeper::Listener;
use watch_keeper::ListenerResult;
use watch_keeper::MemCoordinationClient;
use watch_keeper::WatchEvent;
use watch_keeper::WatchKeeperConfig;
use watch_keeper::WatchSession;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(2);

pub const QUIET_PERIOD: Duration = Duration::from_millis(200);

static LOGGER_INIT: once_cell::sync::Lazy<()> = once_cell::sync::Lazy::new(|| {
    let _ = env_logger::builder().is_test(true).try_init();
});

pub fn enable_logger() {
    *LOGGER_INIT;
    println!("setup logger for integration test.");
}

/// A session over a fresh in-memory service with its notification loop
/// running.
pub struct Harness {
    pub session: WatchSession<MemCoordinationClient>,
    pub service: Arc<MemCoordinationClient>,
}

impl Harness {
    pub fn start(worker_pool_size: usize) -> Self {
        enable_logger();
        let (client, notifications) = MemCoordinationClient::new();
        let service = Arc::new(client);
        let mut config = WatchKeeperConfig::default();
        config.dispatcher.worker_pool_size = worker_pool_size;
        let session = WatchSession::new(service.clone(), &config);
        session
            .spawn_notification_loop(notifications)
            .expect("spawn notification loop");
        Self { session, service }
    }

    pub fn put(
        &self,
        path: &str,
        data: &'static [u8],
    ) {
        self.service
            .external_create(path, Bytes::from_static(data))
            .expect("external create");
    }
}

/// Forwards events to a channel the test reads from.
pub struct Collector {
    sender: Sender<WatchEvent>,
    receiver: Receiver<WatchEvent>,
}

impl Collector {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = unbounded();
        Arc::new(Self { sender, receiver })
    }

    pub fn expect(
        &self,
        n: usize,
    ) -> Vec<WatchEvent> {
        (0..n)
            .map(|i| {
                self.receiver
                    .recv_timeout(EVENT_TIMEOUT)
                    .unwrap_or_else(|_| panic!("event {i} of {n} did not arrive"))
            })
            .collect()
    }

    pub fn expect_quiet(&self) {
        if let Ok(event) = self.receiver.recv_timeout(QUIET_PERIOD) {
            panic!("unexpected event: {event:?}");
        }
    }
}

impl Listener for Collector {
    fn on_event(
        &self,
        event: &WatchEvent,
    ) -> ListenerResult {
        let _ = self.sender.send(event.clone());
        Ok(())
    }
}

pub fn kinds(events: &[WatchEvent]) -> Vec<(String, EventKind)> {
    let mut pairs: Vec<(String, EventKind)> = events.iter().map(|e| (e.path.clone(), e.kind)).collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    pairs
}
