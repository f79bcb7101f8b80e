//! Periodic presence signal sent on its own timer thread, independent of
//! the connection's reader loop.

use std::{
    sync::{
        mpsc::{self, RecvTimeoutError, Sender},
        Arc, Mutex,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    client::connection::{LineSender, SendError},
    domain::{identity::UserId, presence::PresenceStatus},
    infra::contracts::UserDirectory,
    protocol::{codec, envelope::Envelope},
};

const HEARTBEAT_SEND_FAILED: &str = "HEARTBEAT_SEND_FAILED";
const HEARTBEAT_SHUTDOWN_FAILED: &str = "HEARTBEAT_SHUTDOWN_FAILED";
const PRESENCE_PERSIST_FAILED: &str = "PRESENCE_PERSIST_FAILED";

#[derive(Debug)]
pub enum HeartbeatStartError {
    WorkerSpawn(std::io::Error),
}

impl std::fmt::Display for HeartbeatStartError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::WorkerSpawn(source) => write!(f, "worker spawn failed: {source}"),
        }
    }
}

impl std::error::Error for HeartbeatStartError {}

struct HeartbeatWorker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Sends a PRESENCE envelope carrying the last-set status every interval
/// while started. `start` emits one immediate ONLINE update, `stop` one
/// final OFFLINE update; both record the status in the user directory.
pub struct Heartbeat {
    sender: Arc<dyn LineSender + Send + Sync>,
    directory: Arc<dyn UserDirectory>,
    user_id: UserId,
    interval: Duration,
    status: Arc<Mutex<PresenceStatus>>,
    worker: Option<HeartbeatWorker>,
}

impl Heartbeat {
    pub fn new(
        sender: Arc<dyn LineSender + Send + Sync>,
        directory: Arc<dyn UserDirectory>,
        user_id: UserId,
        interval: Duration,
    ) -> Self {
        Self {
            sender,
            directory,
            user_id,
            interval,
            status: Arc::new(Mutex::new(PresenceStatus::Online)),
            worker: None,
        }
    }

    /// Starts the timer. A previous timer is cancelled first, so starting
    /// twice never leaves two tickers running.
    pub fn start(&mut self) -> Result<(), HeartbeatStartError> {
        self.cancel_worker();
        self.apply_status(PresenceStatus::Online);

        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let sender = self.sender.clone();
        let status = self.status.clone();
        let user_id = self.user_id;
        let interval = self.interval;
        let handle = thread::Builder::new()
            .name("wren-heartbeat".to_owned())
            .spawn(move || run_timer(sender, status, user_id, interval, stop_rx))
            .map_err(HeartbeatStartError::WorkerSpawn)?;

        self.worker = Some(HeartbeatWorker { stop_tx, handle });
        tracing::info!(user_id = self.user_id, "heartbeat started");
        Ok(())
    }

    /// Cancels the timer and announces OFFLINE once.
    pub fn stop(&mut self) {
        self.cancel_worker();
        self.apply_status(PresenceStatus::Offline);
        tracing::info!(user_id = self.user_id, "heartbeat stopped");
    }

    /// Updates the status used by the next tick and emits one immediate
    /// presence update.
    pub fn set_status(&self, status: PresenceStatus) {
        self.apply_status(status);
    }

    pub fn current_status(&self) -> PresenceStatus {
        self.status
            .lock()
            .map(|status| *status)
            .unwrap_or(PresenceStatus::Offline)
    }

    fn apply_status(&self, status: PresenceStatus) {
        if let Ok(mut current) = self.status.lock() {
            *current = status;
        }

        if let Err(error) = self.directory.set_presence(self.user_id, status) {
            tracing::warn!(
                code = PRESENCE_PERSIST_FAILED,
                user_id = self.user_id,
                error = ?error,
                "failed to record presence in user directory"
            );
        }

        send_presence(self.sender.as_ref(), self.user_id, status);
    }

    fn cancel_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            let _ = worker.stop_tx.send(());
            if worker.handle.join().is_err() {
                tracing::warn!(
                    code = HEARTBEAT_SHUTDOWN_FAILED,
                    "heartbeat worker panicked on shutdown"
                );
            }
        }
    }
}

impl Drop for Heartbeat {
    fn drop(&mut self) {
        self.cancel_worker();
    }
}

fn run_timer(
    sender: Arc<dyn LineSender + Send + Sync>,
    status: Arc<Mutex<PresenceStatus>>,
    user_id: UserId,
    interval: Duration,
    stop_rx: mpsc::Receiver<()>,
) {
    loop {
        match stop_rx.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => {
                let current = status
                    .lock()
                    .map(|status| *status)
                    .unwrap_or(PresenceStatus::Offline);
                send_presence(sender.as_ref(), user_id, current);
                tracing::debug!(user_id, status = %current, "heartbeat sent");
            }
            _ => return,
        }
    }
}

fn send_presence(sender: &(dyn LineSender + Send + Sync), user_id: UserId, status: PresenceStatus) {
    let line = codec::encode(&Envelope::presence(user_id, status));
    if let Err(error) = sender.send_line(&line) {
        match error {
            SendError::NotConnected => tracing::warn!(
                code = HEARTBEAT_SEND_FAILED,
                user_id,
                "cannot send presence: not connected"
            ),
            SendError::Io(source) => tracing::warn!(
                code = HEARTBEAT_SEND_FAILED,
                user_id,
                error = %source,
                "presence send failed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::{infra::stubs::InMemoryUserDirectory, protocol::envelope::Envelope};

    #[derive(Default)]
    struct RecordingSender {
        lines: Mutex<Vec<String>>,
    }

    impl RecordingSender {
        fn statuses(&self) -> Vec<PresenceStatus> {
            self.lines
                .lock()
                .expect("lines lock")
                .iter()
                .filter_map(|line| match codec::decode(line) {
                    Ok(Envelope::Presence { status, .. }) => Some(status),
                    _ => None,
                })
                .collect()
        }
    }

    impl LineSender for RecordingSender {
        fn send_line(&self, line: &str) -> Result<(), SendError> {
            self.lines.lock().expect("lines lock").push(line.to_owned());
            Ok(())
        }
    }

    fn heartbeat_with(
        interval: Duration,
    ) -> (Heartbeat, Arc<RecordingSender>, Arc<InMemoryUserDirectory>) {
        let sender = Arc::new(RecordingSender::default());
        let directory = Arc::new(InMemoryUserDirectory::new());
        let heartbeat = Heartbeat::new(sender.clone(), directory.clone(), 1, interval);
        (heartbeat, sender, directory)
    }

    #[test]
    fn start_sends_immediate_online_and_records_presence() {
        let (mut heartbeat, sender, directory) = heartbeat_with(Duration::from_secs(60));

        heartbeat.start().expect("heartbeat must start");

        assert_eq!(sender.statuses(), vec![PresenceStatus::Online]);
        assert_eq!(directory.presence_of(1), Some(PresenceStatus::Online));
    }

    #[test]
    fn ticks_repeat_the_last_set_status() {
        let (mut heartbeat, sender, _directory) = heartbeat_with(Duration::from_millis(25));

        heartbeat.start().expect("heartbeat must start");
        thread::sleep(Duration::from_millis(100));
        heartbeat.cancel_worker();

        let statuses = sender.statuses();
        assert!(
            statuses.len() >= 3,
            "expected immediate update plus ticks, got {statuses:?}"
        );
        assert!(statuses.iter().all(|s| *s == PresenceStatus::Online));
    }

    #[test]
    fn set_status_emits_once_and_changes_future_ticks() {
        let (mut heartbeat, sender, directory) = heartbeat_with(Duration::from_millis(25));

        heartbeat.start().expect("heartbeat must start");
        heartbeat.set_status(PresenceStatus::Offline);
        thread::sleep(Duration::from_millis(60));
        heartbeat.cancel_worker();

        assert_eq!(heartbeat.current_status(), PresenceStatus::Offline);
        assert_eq!(directory.presence_of(1), Some(PresenceStatus::Offline));
        let statuses = sender.statuses();
        assert_eq!(statuses.first(), Some(&PresenceStatus::Online));
        assert_eq!(statuses.last(), Some(&PresenceStatus::Offline));
    }

    #[test]
    fn stop_cancels_timer_and_announces_offline() {
        let (mut heartbeat, sender, directory) = heartbeat_with(Duration::from_millis(25));

        heartbeat.start().expect("heartbeat must start");
        heartbeat.stop();
        let count_after_stop = sender.statuses().len();
        thread::sleep(Duration::from_millis(80));

        assert_eq!(sender.statuses().len(), count_after_stop, "timer kept ticking");
        assert_eq!(sender.statuses().last(), Some(&PresenceStatus::Offline));
        assert_eq!(directory.presence_of(1), Some(PresenceStatus::Offline));
    }

    #[test]
    fn restart_replaces_the_previous_timer() {
        let (mut heartbeat, sender, _directory) = heartbeat_with(Duration::from_millis(30));

        heartbeat.start().expect("first start");
        heartbeat.start().expect("second start");
        heartbeat.stop();
        let settled = sender.statuses().len();
        thread::sleep(Duration::from_millis(90));

        assert_eq!(
            sender.statuses().len(),
            settled,
            "a leaked timer from the first start kept ticking"
        );
    }
}
