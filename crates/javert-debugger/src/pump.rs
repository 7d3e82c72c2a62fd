//! Event pump: a dedicated thread that blocks on the transport's event
//! read and hands event sets to the control thread over a bounded queue.

use std::sync::mpsc::{Receiver, SyncSender};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use javert_jdi::{EventSet, Jdi, JdiError};
use tracing::{debug, warn};

/// Queue depth for the pump -> control hand-off. The debuggee stays
/// suspended while a set is queued, so a small bound suffices.
const QUEUE_DEPTH: usize = 64;

const JOIN_WAIT: Duration = Duration::from_secs(2);

/// What the pump thread forwards to the control thread. `Disconnected`
/// and `Error` are terminal: the pump exits right after sending one.
#[derive(Debug)]
pub(crate) enum Pumped {
    Set(EventSet),
    Disconnected,
    Error(JdiError),
}

pub(crate) struct EventPump {
    receiver: Receiver<Pumped>,
    handle: Option<JoinHandle<()>>,
}

impl EventPump {
    pub(crate) fn start(jdi: Arc<dyn Jdi>) -> Self {
        let (tx, rx) = std::sync::mpsc::sync_channel(QUEUE_DEPTH);
        let handle = std::thread::Builder::new()
            .name("javert-event-pump".to_owned())
            .spawn(move || pump_loop(jdi.as_ref(), &tx));
        let handle = match handle {
            Ok(handle) => Some(handle),
            Err(err) => {
                warn!(error = %err, "failed to spawn event pump thread");
                None
            }
        };
        Self { receiver: rx, handle }
    }

    /// Blocks until the pump hands over the next entry. A closed channel
    /// means the pump died without a terminal entry; report disconnect.
    pub(crate) fn recv(&self) -> Pumped {
        self.receiver.recv().unwrap_or(Pumped::Disconnected)
    }

    /// Waits for the pump thread to finish, bounded. The caller must have
    /// interrupted the transport read first, or the pump may still be
    /// blocked; in that case we detach rather than hang teardown.
    pub(crate) fn join(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let deadline = Instant::now() + JOIN_WAIT;
        while !handle.is_finished() {
            if Instant::now() >= deadline {
                warn!("event pump did not exit in time; detaching");
                return;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
        // Finished; the join itself cannot block.
        if handle.join().is_err() {
            warn!("event pump thread panicked");
        }
    }
}

fn pump_loop(jdi: &dyn Jdi, tx: &SyncSender<Pumped>) {
    loop {
        let entry = match jdi.next_event_set() {
            Ok(set) => Pumped::Set(set),
            Err(JdiError::Interrupted) => {
                debug!("event pump interrupted; exiting");
                return;
            }
            Err(JdiError::Disconnected) => Pumped::Disconnected,
            Err(err) => Pumped::Error(err),
        };
        let terminal = !matches!(entry, Pumped::Set(_));
        if tx.send(entry).is_err() {
            // Control side dropped the receiver during teardown.
            return;
        }
        if terminal {
            return;
        }
    }
}
