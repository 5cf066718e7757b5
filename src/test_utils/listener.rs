use std::sync::Arc;
use std::thread::ThreadId;
use std::time::Duration;

use crossbeam_channel::unbounded;
use crossbeam_channel::Receiver;
use crossbeam_channel::Sender;
use parking_lot::Mutex;

use crate::EventKind;
use crate::Listener;
use crate::ListenerResult;
use crate::SessionState;
use crate::StateListener;
use crate::WatchEvent;

use super::EVENT_TIMEOUT;
use super::QUIET_PERIOD;

pub fn noop_listener() -> Arc<dyn Listener> {
    Arc::new(|_: &WatchEvent| -> ListenerResult { Ok(()) })
}

/// Listener that records every event together with the thread it ran on.
#[derive(Debug)]
pub struct RecordingListener {
    sender: Sender<(WatchEvent, ThreadId)>,
    receiver: Receiver<(WatchEvent, ThreadId)>,
    seen: Mutex<Vec<WatchEvent>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        let (sender, receiver) = unbounded();
        Arc::new(Self {
            sender,
            receiver,
            seen: Mutex::new(Vec::new()),
        })
    }

    /// Events recorded so far, in invocation order
    pub fn events(&self) -> Vec<WatchEvent> {
        self.seen.lock().clone()
    }

    /// Waits for the next event not yet taken with `next`/`take`.
    pub fn next(&self) -> Option<WatchEvent> {
        self.next_with_thread().map(|(event, _)| event)
    }

    pub fn next_with_thread(&self) -> Option<(WatchEvent, ThreadId)> {
        self.receiver.recv_timeout(EVENT_TIMEOUT).ok()
    }

    /// Waits for `n` events.
    pub fn take(
        &self,
        n: usize,
    ) -> Vec<WatchEvent> {
        (0..n).filter_map(|_| self.next()).collect()
    }

    /// Asserts nothing else shows up during a short quiet period.
    pub fn assert_quiet(&self) {
        self.assert_quiet_for(QUIET_PERIOD);
    }

    pub fn assert_quiet_for(
        &self,
        period: Duration,
    ) {
        if let Ok((event, _)) = self.receiver.recv_timeout(period) {
            panic!("unexpected event: {event:?}");
        }
    }
}

impl Listener for RecordingListener {
    fn on_event(
        &self,
        event: &WatchEvent,
    ) -> ListenerResult {
        self.seen.lock().push(event.clone());
        let _ = self.sender.send((event.clone(), std::thread::current().id()));
        Ok(())
    }
}

/// Records session states delivered to it.
#[derive(Debug)]
pub struct RecordingStateListener {
    states: Mutex<Vec<SessionState>>,
}

impl RecordingStateListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            states: Mutex::new(Vec::new()),
        })
    }

    pub fn states(&self) -> Vec<SessionState> {
        self.states.lock().clone()
    }
}

impl StateListener for RecordingStateListener {
    fn on_state(
        &self,
        state: SessionState,
    ) {
        self.states.lock().push(state);
    }
}

/// Sorted (path, kind) pairs, convenient for order-insensitive assertions
pub fn summarize(events: &[WatchEvent]) -> Vec<(String, EventKind)> {
    let mut pairs: Vec<(String, EventKind)> = events.iter().map(|e| (e.path.clone(), e.kind)).collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| format!("{:?}", a.1).cmp(&format!("{:?}", b.1))));
    pairs
}
