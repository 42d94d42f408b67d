//! Live journal monitoring.
//!
//! A [`Monitor`] follows the journal on a background thread and broadcasts
//! every record to its subscribers.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle --run--> Running --stop--> Idle
//!   \______________|_____close_____> Closed
//! ```
//!
//! `stop` and `close` wait for the thread to exit; nothing is broadcast
//! after they return. `close` also drops every subscriber's sender, so
//! receivers see a disconnected channel once they have drained it.
//!
//! ## Backpressure
//!
//! Subscriber queues are bounded. A full queue blocks the broadcast (records
//! are never dropped) until the subscriber catches up or unsubscribes, or
//! until the monitor is stopped. Unsubscribing wakes a blocked broadcast,
//! which then moves on to the remaining subscribers.
//!
//! ## Errors
//!
//! A failing read ends the thread. The error is sent on the channel
//! returned by [`Monitor::errors`].

use crossbeam_channel::{
    bounded, select, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError,
};
use parking_lot::{Mutex, RwLock};
use std::io::SeekFrom;
use std::ops::Deref;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::debug;

use crate::cursor::{Cursor, RecordPipeline};
use crate::device::{BufferPolicy, JournalDevice};
use crate::error::{Result, UsnError};
use crate::handle::SharedHandle;
use crate::reason::Reason;
use crate::record::{Record, Usn, MAX_RECORD_SIZE};

/// Default lower bound on the poll interval
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

/// A subscriber's end of a monitor's broadcast.
///
/// Dereferences to the underlying receiver.
#[derive(Debug)]
pub struct Subscription {
    id: u64,
    rx: Receiver<Record>,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn receiver(&self) -> &Receiver<Record> {
        &self.rx
    }
}

impl Deref for Subscription {
    type Target = Receiver<Record>;

    fn deref(&self) -> &Receiver<Record> {
        &self.rx
    }
}

struct Listener {
    id: u64,
    tx: Sender<Record>,
    // Never sent on; dropped by `unlisten` to wake a blocked broadcast
    _cancel: Sender<()>,
    cancelled: Receiver<()>,
}

impl Listener {
    fn new(id: u64, tx: Sender<Record>) -> Self {
        let (cancel, cancelled) = bounded(0);
        Listener {
            id,
            tx,
            _cancel: cancel,
            cancelled,
        }
    }
}

enum Phase<D: JournalDevice + 'static> {
    Idle,
    Running {
        stop_tx: Sender<()>,
        thread: JoinHandle<Cursor<D>>,
    },
    Closed,
}

/// Follows a journal and broadcasts new records.
pub struct Monitor<D: JournalDevice + 'static> {
    handle: SharedHandle<D>,
    phase: Mutex<Phase<D>>,
    listeners: Arc<RwLock<Vec<Listener>>>,
    next_id: AtomicU64,
    errors_tx: Sender<UsnError>,
    errors_rx: Receiver<UsnError>,
    min_interval: Duration,
    policy: BufferPolicy,
    max_record_size: u32,
}

impl<D: JournalDevice + 'static> Monitor<D> {
    /// Create an idle monitor. The monitor owns `handle` and closes it on
    /// [`Monitor::close`].
    pub fn new(handle: SharedHandle<D>) -> Self {
        let (errors_tx, errors_rx) = unbounded();
        Monitor {
            handle,
            phase: Mutex::new(Phase::Idle),
            listeners: Arc::new(RwLock::new(Vec::new())),
            next_id: AtomicU64::new(1),
            errors_tx,
            errors_rx,
            min_interval: MIN_POLL_INTERVAL,
            policy: BufferPolicy::default(),
            max_record_size: MAX_RECORD_SIZE,
        }
    }

    pub fn with_min_interval(mut self, min_interval: Duration) -> Self {
        self.min_interval = min_interval;
        self
    }

    pub fn with_policy(mut self, policy: BufferPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_max_record_size(mut self, max_record_size: u32) -> Self {
        self.max_record_size = max_record_size;
        self
    }

    /// Start following the journal from `start`, polling every `interval`
    /// once caught up.
    pub fn run(&self, start: Usn, interval: Duration, reason_mask: Reason) -> Result<()> {
        self.run_with(start, interval, reason_mask, RecordPipeline::default())
    }

    /// Like [`Monitor::run`], passing records through `pipeline` before
    /// they are broadcast.
    pub fn run_with(
        &self,
        start: Usn,
        interval: Duration,
        reason_mask: Reason,
        pipeline: RecordPipeline,
    ) -> Result<()> {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Running { .. } => return Err(UsnError::AlreadyRunning),
            Phase::Closed => return Err(UsnError::AlreadyClosed),
            Phase::Idle => {}
        }

        let start = u64::try_from(start).map_err(|_| UsnError::InvalidSeek)?;
        let mut cursor = Cursor::open(self.handle.clone(), reason_mask)?
            .with_pipeline(pipeline)
            .with_policy(self.policy)
            .with_max_record_size(self.max_record_size);
        cursor.seek(SeekFrom::Start(start))?;

        let interval = interval.max(self.min_interval);
        let (stop_tx, stop_rx) = bounded(1);
        let listeners = Arc::clone(&self.listeners);
        let errors = self.errors_tx.clone();
        let policy = self.policy;

        let thread = thread::Builder::new()
            .name("usn-monitor".to_string())
            .spawn(move || poll_loop(cursor, interval, stop_rx, listeners, errors, policy))?;

        debug!(
            start,
            interval_ms = interval.as_millis() as u64,
            "Monitor started"
        );
        *phase = Phase::Running { stop_tx, thread };
        Ok(())
    }

    /// Stop the background thread and wait for it to exit.
    pub fn stop(&self) -> Result<()> {
        let mut phase = self.phase.lock();
        match std::mem::replace(&mut *phase, Phase::Idle) {
            Phase::Running { stop_tx, thread } => join(stop_tx, thread),
            Phase::Idle => Err(UsnError::NotRunning),
            Phase::Closed => {
                *phase = Phase::Closed;
                Err(UsnError::AlreadyClosed)
            }
        }
    }

    /// Stop if running, disconnect every subscriber and close the handle.
    pub fn close(&self) -> Result<()> {
        let mut phase = self.phase.lock();
        let stopped = match std::mem::replace(&mut *phase, Phase::Closed) {
            Phase::Closed => return Err(UsnError::AlreadyClosed),
            Phase::Running { stop_tx, thread } => join(stop_tx, thread),
            Phase::Idle => Ok(()),
        };
        self.listeners.write().clear();
        debug!("Monitor closed");
        let closed = self.handle.close();
        stopped.and(closed)
    }

    /// Register a subscriber with a queue of `capacity` records.
    ///
    /// A closed monitor returns a subscription that is already
    /// disconnected.
    pub fn listen(&self, capacity: usize) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = bounded(capacity);
        // Held across the push so a concurrent close cannot miss it
        let phase = self.phase.lock();
        if matches!(*phase, Phase::Closed) {
            return Subscription { id, rx };
        }
        self.listeners.write().push(Listener::new(id, tx));
        Subscription { id, rx }
    }

    /// Remove a subscriber and disconnect its queue. Returns false if it
    /// was not registered.
    ///
    /// A broadcast blocked on this subscriber's full queue moves on.
    pub fn unlisten(&self, subscription: &Subscription) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| l.id != subscription.id);
        listeners.len() != before
    }

    /// Errors that ended the background thread.
    pub fn errors(&self) -> Receiver<UsnError> {
        self.errors_rx.clone()
    }

    /// Returns true while the background thread is alive
    pub fn is_running(&self) -> bool {
        match &*self.phase.lock() {
            Phase::Running { thread, .. } => !thread.is_finished(),
            _ => false,
        }
    }
}

impl<D: JournalDevice + 'static> Drop for Monitor<D> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn join<D: JournalDevice>(stop_tx: Sender<()>, thread: JoinHandle<Cursor<D>>) -> Result<()> {
    // Disconnecting wakes the thread wherever it waits.
    drop(stop_tx);
    match thread.join() {
        Ok(cursor) => {
            debug!(usn = cursor.usn(), "Monitor stopped");
            cursor.close()
        }
        Err(_) => {
            debug!("Monitor thread panicked");
            Ok(())
        }
    }
}

fn poll_loop<D: JournalDevice>(
    mut cursor: Cursor<D>,
    interval: Duration,
    stop_rx: Receiver<()>,
    listeners: Arc<RwLock<Vec<Listener>>>,
    errors: Sender<UsnError>,
    policy: BufferPolicy,
) -> Cursor<D> {
    let mut buf = policy.buffer();
    loop {
        match stop_rx.try_recv() {
            Err(TryRecvError::Empty) => {}
            _ => break,
        }

        match cursor.next(&mut buf) {
            Ok(Some(records)) => {
                for record in records {
                    if !broadcast(&listeners, &record, &stop_rx) {
                        return cursor;
                    }
                }
            }
            Ok(None) => match stop_rx.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            },
            Err(e) => {
                debug!(error = %e, usn = cursor.usn(), "Monitor read failed");
                let _ = errors.send(e);
                break;
            }
        }
    }
    cursor
}

/// Send `record` to every current subscriber. Returns false if stopped
/// while waiting on a full queue.
///
/// Subscribers removed after the snapshot are skipped, and a send blocked
/// on one of them is abandoned.
fn broadcast(listeners: &RwLock<Vec<Listener>>, record: &Record, stop_rx: &Receiver<()>) -> bool {
    let targets: Vec<(Sender<Record>, Receiver<()>)> = listeners
        .read()
        .iter()
        .map(|l| (l.tx.clone(), l.cancelled.clone()))
        .collect();
    for (tx, cancelled) in targets {
        if let Err(TryRecvError::Disconnected) = cancelled.try_recv() {
            continue;
        }
        select! {
            send(tx, record.clone()) -> _ => {}
            recv(cancelled) -> _ => {}
            recv(stop_rx) -> _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{file, with_reason, FakeDevice, Scripted};
    use crate::error::DeviceError;
    use std::sync::atomic::Ordering;
    use std::time::Instant;

    const WAIT: Duration = Duration::from_secs(5);

    fn change(id: u64, name: &str) -> Record {
        with_reason(file(id, 5, name), Reason::DATA_EXTEND | Reason::CLOSE)
    }

    fn names(sub: &Subscription, count: usize) -> Vec<String> {
        (0..count)
            .map(|_| sub.recv_timeout(WAIT).unwrap().file_name)
            .collect()
    }

    #[test]
    fn test_broadcasts_to_every_listener_in_order() {
        let handle = FakeDevice::new()
            .with_journal(vec![change(10, "a"), change(11, "b")])
            .into_handle();
        let monitor = Monitor::new(handle.clone());
        let first = monitor.listen(16);
        let second = monitor.listen(16);
        monitor.run(0, Duration::from_millis(5), Reason::ANY).unwrap();
        assert!(monitor.is_running());

        assert_eq!(names(&first, 2), vec!["a", "b"]);
        assert_eq!(names(&second, 2), vec!["a", "b"]);

        handle.get().append(change(12, "c"));
        assert_eq!(names(&first, 1), vec!["c"]);
        assert_eq!(names(&second, 1), vec!["c"]);

        monitor.stop().unwrap();
        assert!(!monitor.is_running());
        monitor.close().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_lifecycle_errors() {
        let monitor = Monitor::new(FakeDevice::new().into_handle());
        assert!(matches!(monitor.stop(), Err(UsnError::NotRunning)));

        monitor.run(0, Duration::from_millis(5), Reason::ANY).unwrap();
        assert!(matches!(
            monitor.run(0, Duration::from_millis(5), Reason::ANY),
            Err(UsnError::AlreadyRunning)
        ));
        monitor.stop().unwrap();
        assert!(matches!(monitor.stop(), Err(UsnError::NotRunning)));

        // Idle monitors can run again
        monitor.run(0, Duration::from_millis(5), Reason::ANY).unwrap();
        monitor.close().unwrap();

        assert!(matches!(monitor.close(), Err(UsnError::AlreadyClosed)));
        assert!(matches!(monitor.stop(), Err(UsnError::AlreadyClosed)));
        assert!(matches!(
            monitor.run(0, Duration::from_millis(5), Reason::ANY),
            Err(UsnError::AlreadyClosed)
        ));
    }

    #[test]
    fn test_negative_start_rejected() {
        let monitor = Monitor::new(FakeDevice::new().into_handle());
        assert!(matches!(
            monitor.run(-1, Duration::from_millis(5), Reason::ANY),
            Err(UsnError::InvalidSeek)
        ));
        assert!(!monitor.is_running());
    }

    #[test]
    fn test_close_disconnects_every_listener() {
        let handle = FakeDevice::new()
            .with_journal(vec![change(10, "a")])
            .into_handle();
        let monitor = Monitor::new(handle);
        let subs: Vec<_> = (0..3).map(|_| monitor.listen(4)).collect();
        monitor.run(0, Duration::from_millis(5), Reason::ANY).unwrap();
        for sub in &subs {
            assert_eq!(names(sub, 1), vec!["a"]);
        }
        monitor.close().unwrap();
        for sub in &subs {
            assert!(sub.recv_timeout(WAIT).is_err());
        }

        let late = monitor.listen(4);
        assert!(late.recv_timeout(Duration::from_millis(10)).is_err());
        assert!(!monitor.unlisten(&late));
    }

    #[test]
    fn test_unlisten_disconnects_one() {
        let monitor = Monitor::new(FakeDevice::new().into_handle());
        let keep = monitor.listen(1);
        let gone = monitor.listen(1);
        assert_ne!(keep.id(), gone.id());
        assert!(monitor.unlisten(&gone));
        assert!(!monitor.unlisten(&gone));
        assert!(gone.recv_timeout(Duration::from_millis(10)).is_err());
        assert!(keep.receiver().is_empty());
        monitor.close().unwrap();
    }

    #[test]
    fn test_unlisten_unblocks_broadcast() {
        let records: Vec<Record> = (0..3).map(|i| change(10 + i, &format!("r{}", i))).collect();
        let monitor = Monitor::new(FakeDevice::new().with_journal(records).into_handle());
        let slow = monitor.listen(1);
        let fast = monitor.listen(16);
        monitor.run(0, Duration::from_millis(5), Reason::ANY).unwrap();

        // The slow queue holds r0, so the broadcast of r1 blocks on it
        assert_eq!(names(&fast, 1), vec!["r0"]);
        thread::sleep(Duration::from_millis(20));
        assert!(monitor.unlisten(&slow));

        assert_eq!(names(&fast, 2), vec!["r1", "r2"]);
        // Whatever was queued drains, then the channel reports closure
        let started = Instant::now();
        while slow.recv_timeout(WAIT).is_ok() {}
        assert!(started.elapsed() < WAIT);
        monitor.close().unwrap();
    }

    #[test]
    fn test_listen_racing_close_is_disconnected() {
        for _ in 0..50 {
            let monitor = Arc::new(Monitor::new(FakeDevice::new().into_handle()));
            let listener = {
                let monitor = Arc::clone(&monitor);
                thread::spawn(move || monitor.listen(4))
            };
            monitor.close().unwrap();
            let sub = listener.join().unwrap();
            // Registered before the close or refused after it, never left behind
            assert!(sub.recv_timeout(WAIT).is_err());
            assert!(!monitor.unlisten(&sub));
        }
    }

    #[test]
    fn test_stop_interrupts_poll_sleep() {
        let monitor = Monitor::new(FakeDevice::new().into_handle());
        monitor.run(0, Duration::from_secs(600), Reason::ANY).unwrap();
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        monitor.stop().unwrap();
        assert!(started.elapsed() < WAIT);
    }

    #[test]
    fn test_stop_interrupts_blocked_broadcast() {
        let records: Vec<Record> = (0..8).map(|i| change(10 + i, "x")).collect();
        let monitor = Monitor::new(FakeDevice::new().with_journal(records).into_handle());
        let slow = monitor.listen(1);
        monitor.run(0, Duration::from_millis(5), Reason::ANY).unwrap();

        // Let the queue fill so the thread blocks on the second record
        assert!(slow.recv_timeout(WAIT).is_ok());
        thread::sleep(Duration::from_millis(20));

        let started = Instant::now();
        monitor.close().unwrap();
        assert!(started.elapsed() < WAIT);
        // Whatever was queued is still readable, then the channel is closed
        while slow.recv_timeout(WAIT).is_ok() {}
    }

    #[test]
    fn test_read_error_is_reported() {
        let device = FakeDevice::new();
        device.push_read(Scripted::Fail(DeviceError::AccessDenied));
        let monitor = Monitor::new(device.into_handle());
        let errors = monitor.errors();
        monitor.run(0, Duration::from_millis(5), Reason::ANY).unwrap();

        let err = errors.recv_timeout(WAIT).unwrap();
        assert_eq!(err.device_error(), Some(&DeviceError::AccessDenied));

        let deadline = Instant::now() + WAIT;
        while monitor.is_running() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(!monitor.is_running());
        // The exited thread still has to be collected
        monitor.stop().unwrap();
    }

    #[test]
    fn test_poll_interval_is_clamped() {
        let handle = FakeDevice::new().into_handle();
        let monitor = Monitor::new(handle.clone()).with_min_interval(Duration::from_millis(50));
        monitor.run(0, Duration::ZERO, Reason::ANY).unwrap();
        thread::sleep(Duration::from_millis(200));
        monitor.stop().unwrap();
        // Unclamped, a zero interval would spin thousands of times
        assert!(handle.get().read_calls() < 50);
        monitor.close().unwrap();
        handle.close().unwrap();
    }

    #[test]
    fn test_close_releases_handle_once() {
        let device = FakeDevice::new();
        let releases = device.releases();
        let handle = device.into_handle();
        let monitor = Monitor::new(handle.clone());
        monitor.run(0, Duration::from_millis(5), Reason::ANY).unwrap();
        monitor.close().unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 0);
        handle.close().unwrap();
        assert_eq!(releases.load(Ordering::SeqCst), 1);
    }
}
