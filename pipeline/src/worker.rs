use std::any::Any;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use frame_scan_common::frame::Frame;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::decoder::{DecodeFault, Decoder};

/// Upper bound on how long `spawn` waits for the thread to come up.
const READY_TIMEOUT: Duration = Duration::from_secs(2);

/// Lifecycle of the decode thread:
/// `Stopped → Starting → Running → Stopping → Stopped`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Stopped,
    Starting,
    Running,
    Stopping,
}

/// Result of one decode attempt, posted back to the controller.
#[derive(Debug, Clone)]
pub struct DecodeOutcome {
    pub seq: u64,
    pub payload: Option<String>,
    pub elapsed: Duration,
}

struct Inbox {
    state: WorkerState,
    /// Single slot: a newer frame replaces one that has not started decoding.
    pending: Option<Frame>,
}

struct Shared {
    inbox: Mutex<Inbox>,
    wake: Condvar,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inbox> {
        self.inbox.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// One dedicated thread that decodes at most one frame at a time.
///
/// Outcomes are posted in submission order on the `results` channel. The
/// state check and the post happen under the inbox lock, so once
/// [`DecodeWorker::shutdown`] returns nothing more is posted, even if a
/// decode was still running at that point.
pub struct DecodeWorker {
    shared: Arc<Shared>,
}

impl DecodeWorker {
    pub fn spawn(
        decoder: Box<dyn Decoder>,
        results: mpsc::UnboundedSender<DecodeOutcome>,
    ) -> io::Result<Self> {
        let shared = Arc::new(Shared {
            inbox: Mutex::new(Inbox {
                state: WorkerState::Starting,
                pending: None,
            }),
            wake: Condvar::new(),
        });

        let thread_shared = Arc::clone(&shared);
        let spawned = thread::Builder::new()
            .name("decode-worker".into())
            .spawn(move || run_worker(thread_shared, decoder, results));
        if let Err(e) = spawned {
            shared.lock().state = WorkerState::Stopped;
            return Err(e);
        }

        let worker = Self { shared };
        worker.wait_ready(READY_TIMEOUT);
        Ok(worker)
    }

    fn wait_ready(&self, timeout: Duration) {
        let guard = self.shared.lock();
        let (_guard, wait) = self
            .shared
            .wake
            .wait_timeout_while(guard, timeout, |inbox| inbox.state == WorkerState::Starting)
            .unwrap_or_else(PoisonError::into_inner);
        if wait.timed_out() {
            warn!(?timeout, "decode worker not ready yet, early frames will be dropped");
        }
    }

    /// Hand a frame to the worker. Returns `false` when the frame was dropped
    /// because the worker is not running.
    pub fn submit(&self, frame: Frame) -> bool {
        let seq = frame.seq();
        let mut inbox = self.shared.lock();
        if inbox.state != WorkerState::Running {
            debug!(seq, state = ?inbox.state, "decode worker not running, dropping frame");
            return false;
        }
        if let Some(stale) = inbox.pending.replace(frame) {
            debug!(stale = stale.seq(), seq, "pending frame superseded before decoding");
        }
        self.shared.wake.notify_one();
        true
    }

    /// Stop accepting frames. Idempotent; returns `true` only for the call
    /// that actually initiated the shutdown. Does not wait for a running decode.
    pub fn shutdown(&self) -> bool {
        let mut inbox = self.shared.lock();
        match inbox.state {
            WorkerState::Stopped | WorkerState::Stopping => false,
            WorkerState::Starting | WorkerState::Running => {
                inbox.state = WorkerState::Stopping;
                inbox.pending = None;
                self.shared.wake.notify_all();
                info!("decode worker stopping");
                true
            }
        }
    }

    pub fn state(&self) -> WorkerState {
        self.shared.lock().state
    }
}

impl Drop for DecodeWorker {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_worker(
    shared: Arc<Shared>,
    mut decoder: Box<dyn Decoder>,
    results: mpsc::UnboundedSender<DecodeOutcome>,
) {
    {
        let mut inbox = shared.lock();
        // Shutdown may already have moved us to Stopping.
        if inbox.state == WorkerState::Starting {
            inbox.state = WorkerState::Running;
        }
        shared.wake.notify_all();
    }
    debug!(decoder = decoder.name(), "decode worker running");

    while let Some(frame) = next_frame(&shared) {
        let started = Instant::now();
        let payload = decode_guarded(decoder.as_mut(), &frame);
        let outcome = DecodeOutcome {
            seq: frame.seq(),
            payload,
            elapsed: started.elapsed(),
        };

        let inbox = shared.lock();
        if inbox.state != WorkerState::Running {
            continue;
        }
        if results.send(outcome).is_err() {
            debug!("decode result receiver closed");
            break;
        }
    }

    shared.lock().state = WorkerState::Stopped;
    shared.wake.notify_all();
    debug!("decode worker exited");
}

fn next_frame(shared: &Shared) -> Option<Frame> {
    let mut inbox = shared.lock();
    loop {
        if inbox.state != WorkerState::Running {
            return None;
        }
        if let Some(frame) = inbox.pending.take() {
            return Some(frame);
        }
        inbox = shared.wake.wait(inbox).unwrap_or_else(PoisonError::into_inner);
    }
}

/// Run the decoder, absorbing faults and panics into an empty result.
fn decode_guarded(decoder: &mut dyn Decoder, frame: &Frame) -> Option<String> {
    let seq = frame.seq();
    let fault = match panic::catch_unwind(AssertUnwindSafe(|| decoder.decode(frame))) {
        Ok(Ok(payload)) => return payload.filter(|p| !p.is_empty()),
        Ok(Err(fault)) => fault,
        Err(panic) => DecodeFault::Panicked(panic_message(panic.as_ref())),
    };
    warn!(seq, decoder = decoder.name(), error = %fault, "decode fault, frame treated as empty");
    None
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(msg) = panic.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = panic.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic payload".into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc as std_mpsc;

    /// Decodes the luma plane as UTF-8 text.
    struct TextDecoder;

    impl Decoder for TextDecoder {
        fn decode(&mut self, frame: &Frame) -> Result<Option<String>, DecodeFault> {
            match frame.luma() {
                b"fault" => Err(DecodeFault::Engine("synthetic".into())),
                b"panic" => panic!("synthetic decoder panic"),
                bytes => Ok(Some(String::from_utf8_lossy(bytes).into_owned())),
            }
        }
    }

    /// Reports each frame it starts on, then blocks until released.
    struct GatedDecoder {
        started: std_mpsc::Sender<u64>,
        release: std_mpsc::Receiver<()>,
    }

    impl Decoder for GatedDecoder {
        fn decode(&mut self, frame: &Frame) -> Result<Option<String>, DecodeFault> {
            let _ = self.started.send(frame.seq());
            let _ = self.release.recv();
            Ok(Some(format!("frame-{}", frame.seq())))
        }
    }

    fn text_frame(text: &str, seq: u64) -> Frame {
        Frame::new(text.as_bytes().to_vec(), text.len() as u32, 1, seq).unwrap()
    }

    fn wait_for_state(worker: &DecodeWorker, want: WorkerState) {
        for _ in 0..200 {
            if worker.state() == want {
                return;
            }
            thread::sleep(Duration::from_millis(5));
        }
        panic!("worker never reached {want:?}, still {:?}", worker.state());
    }

    #[test]
    fn decodes_and_posts_outcome() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = DecodeWorker::spawn(Box::new(TextDecoder), tx).unwrap();
        assert_eq!(worker.state(), WorkerState::Running);

        assert!(worker.submit(text_frame("HELLO", 7)));
        let outcome = rx.blocking_recv().unwrap();
        assert_eq!(outcome.seq, 7);
        assert_eq!(outcome.payload.as_deref(), Some("HELLO"));
    }

    #[test]
    fn pending_frame_is_superseded() {
        let (started_tx, started_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let decoder = GatedDecoder {
            started: started_tx,
            release: release_rx,
        };
        let worker = DecodeWorker::spawn(Box::new(decoder), tx).unwrap();

        assert!(worker.submit(text_frame("a", 1)));
        assert_eq!(started_rx.recv().unwrap(), 1);

        // Frame 1 is in flight; 2 waits in the slot and is replaced by 3.
        assert!(worker.submit(text_frame("b", 2)));
        assert!(worker.submit(text_frame("c", 3)));
        release_tx.send(()).unwrap();
        release_tx.send(()).unwrap();

        assert_eq!(rx.blocking_recv().unwrap().seq, 1);
        assert_eq!(rx.blocking_recv().unwrap().seq, 3);
        assert_eq!(started_rx.recv().unwrap(), 3);
        assert!(started_rx.try_recv().is_err());
    }

    #[test]
    fn frame_submitted_after_completion_is_decoded() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = DecodeWorker::spawn(Box::new(TextDecoder), tx).unwrap();

        assert!(worker.submit(text_frame("A", 1)));
        assert_eq!(rx.blocking_recv().unwrap().seq, 1);
        assert!(worker.submit(text_frame("B", 2)));
        assert_eq!(rx.blocking_recv().unwrap().payload.as_deref(), Some("B"));
    }

    #[test]
    fn faults_and_panics_become_empty_results() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = DecodeWorker::spawn(Box::new(TextDecoder), tx).unwrap();

        worker.submit(text_frame("fault", 1));
        assert_eq!(rx.blocking_recv().unwrap().payload, None);

        worker.submit(text_frame("panic", 2));
        assert_eq!(rx.blocking_recv().unwrap().payload, None);

        // The worker survives both.
        worker.submit(text_frame("ok", 3));
        assert_eq!(rx.blocking_recv().unwrap().payload.as_deref(), Some("ok"));
    }

    #[test]
    fn shutdown_is_idempotent_and_drops_late_frames() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = DecodeWorker::spawn(Box::new(TextDecoder), tx).unwrap();

        assert!(worker.shutdown());
        assert!(!worker.shutdown());
        assert!(!worker.submit(text_frame("late", 1)));

        wait_for_state(&worker, WorkerState::Stopped);
        assert!(!worker.shutdown());
        // Thread gone, sender dropped, nothing was posted.
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn in_flight_result_not_posted_after_shutdown() {
        let (started_tx, started_rx) = std_mpsc::channel();
        let (release_tx, release_rx) = std_mpsc::channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let decoder = GatedDecoder {
            started: started_tx,
            release: release_rx,
        };
        let worker = DecodeWorker::spawn(Box::new(decoder), tx).unwrap();

        worker.submit(text_frame("a", 1));
        started_rx.recv().unwrap();

        // Returns while the decode is still blocked.
        assert!(worker.shutdown());
        release_tx.send(()).unwrap();

        assert!(rx.blocking_recv().is_none());
        wait_for_state(&worker, WorkerState::Stopped);
    }

    #[test]
    fn shutdown_before_thread_start_exits_cleanly() {
        let shared = Arc::new(Shared {
            inbox: Mutex::new(Inbox {
                state: WorkerState::Stopping,
                pending: None,
            }),
            wake: Condvar::new(),
        });
        let (tx, mut rx) = mpsc::unbounded_channel();
        let thread_shared = Arc::clone(&shared);
        thread::spawn(move || run_worker(thread_shared, Box::new(TextDecoder), tx))
            .join()
            .unwrap();

        assert_eq!(shared.lock().state, WorkerState::Stopped);
        assert!(rx.blocking_recv().is_none());
    }

    #[test]
    fn dropping_worker_shuts_it_down() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let worker = DecodeWorker::spawn(Box::new(TextDecoder), tx).unwrap();
        drop(worker);
        assert!(rx.blocking_recv().is_none());
    }
}
