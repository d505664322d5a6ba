use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{
    bounded, select, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError,
};

/// Handle for asking the scheduler to run a pass. Cheap to clone.
#[derive(Clone)]
pub struct PassTrigger {
    tx: Sender<()>,
}

impl PassTrigger {
    /// Requests a pass. Returns `false` when a request is already pending,
    /// in which case this one is folded into it.
    pub fn request(&self) -> bool {
        match self.tx.try_send(()) {
            Ok(()) => true,
            Err(TrySendError::Full(())) => false,
            Err(TrySendError::Disconnected(())) => {
                log::debug!("Pass requested after scheduler shut down");
                false
            }
        }
    }
}

/// Runs passes on a single worker thread.
///
/// Requests go through a one-slot queue: while a pass runs, any number of
/// triggers collapse into exactly one follow-up pass. After a trigger the
/// worker waits until no new trigger has arrived for `debounce`, so a burst
/// of files from one camera upload is handled by one pass.
pub struct PassScheduler {
    trigger: PassTrigger,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl PassScheduler {
    pub fn start<F>(debounce: Duration, run_pass: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let (tx, rx) = bounded::<()>(1);
        let (stop_tx, stop_rx) = bounded::<()>(0);
        let handle = thread::Builder::new()
            .name("camroll-pass".to_string())
            .spawn(move || worker(rx, stop_rx, debounce, run_pass))
            .ok();
        if handle.is_none() {
            log::error!("Failed to spawn pass worker; watch triggers will be ignored");
        }

        Self {
            trigger: PassTrigger { tx },
            stop_tx: Some(stop_tx),
            handle,
        }
    }

    pub fn trigger(&self) -> PassTrigger {
        self.trigger.clone()
    }

    /// Stops the worker after the pass in progress (if any) and waits for it.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        // Dropping the sender disconnects the stop channel.
        self.stop_tx.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!("Pass worker panicked");
            }
        }
    }
}

impl Drop for PassScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

fn worker<F: FnMut()>(
    rx: Receiver<()>,
    stop_rx: Receiver<()>,
    debounce: Duration,
    mut run_pass: F,
) {
    loop {
        select! {
            recv(rx) -> msg => if msg.is_err() { return },
            recv(stop_rx) -> _ => return,
        }

        // Let the burst settle.
        loop {
            match rx.recv_timeout(debounce) {
                Ok(()) => continue,
                Err(RecvTimeoutError::Timeout) => break,
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
        if stop_requested(&stop_rx) {
            return;
        }

        run_pass();
    }
}

fn stop_requested(stop_rx: &Receiver<()>) -> bool {
    matches!(stop_rx.try_recv(), Err(TryRecvError::Disconnected))
}
