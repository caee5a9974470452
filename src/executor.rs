//! Background executor
//!
//! One named worker thread draining an unbounded queue in submission order.
//! Control commands and device callbacks are both posted here, so handlers
//! never run concurrently and the worker state needs no locks.

use crate::errors::{CameraError, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

enum Envelope<M> {
    Message(M),
    Shutdown,
}

/// Cloneable handle for posting onto a running executor.
pub struct ExecutorHandle<M> {
    sender: Sender<Envelope<M>>,
    closed: Arc<AtomicBool>,
}

impl<M> Clone for ExecutorHandle<M> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            closed: self.closed.clone(),
        }
    }
}

impl<M: Send + 'static> ExecutorHandle<M> {
    /// Queue a message. Fails once shutdown has begun.
    pub fn post(&self, message: M) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(CameraError::ExecutorError(
                "executor is shut down".to_string(),
            ));
        }
        self.sender
            .send(Envelope::Message(message))
            .map_err(|_| CameraError::ExecutorError("executor queue disconnected".to_string()))
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// A single serialized worker context owning a state value `S`.
///
/// The state lives on the worker thread for the executor's whole lifetime
/// and is handed back by [`shutdown`](Self::shutdown) once the thread has
/// been joined.
pub struct BackgroundExecutor<M: Send + 'static, S: Send + 'static> {
    name: String,
    handle: ExecutorHandle<M>,
    thread: Mutex<Option<JoinHandle<S>>>,
}

impl<M: Send + 'static, S: Send + 'static> BackgroundExecutor<M, S> {
    /// Start the worker. Every posted message is handed to `handler`
    /// together with the state.
    pub fn spawn<F>(name: &str, mut state: S, mut handler: F) -> Result<Self>
    where
        F: FnMut(&mut S, M) + Send + 'static,
    {
        let (sender, receiver): (Sender<Envelope<M>>, Receiver<Envelope<M>>) = unbounded();
        let thread_name = name.to_string();

        let thread = std::thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                log::debug!("Executor '{}' started", thread_name);
                let mut handled: u64 = 0;
                while let Ok(envelope) = receiver.recv() {
                    match envelope {
                        Envelope::Message(message) => {
                            handler(&mut state, message);
                            handled += 1;
                        }
                        Envelope::Shutdown => break,
                    }
                }
                let discarded = receiver.try_iter().count();
                log::debug!(
                    "Executor '{}' stopped after {} messages ({} discarded)",
                    thread_name,
                    handled,
                    discarded
                );
                state
            })
            .map_err(|e| CameraError::ExecutorError(format!("spawn failed: {e}")))?;

        log::info!("Started background executor '{}'", name);
        Ok(Self {
            name: name.to_string(),
            handle: ExecutorHandle {
                sender,
                closed: Arc::new(AtomicBool::new(false)),
            },
            thread: Mutex::new(Some(thread)),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handle(&self) -> ExecutorHandle<M> {
        self.handle.clone()
    }

    pub fn post(&self, message: M) -> Result<()> {
        self.handle.post(message)
    }

    /// Stop accepting messages, let already queued ones run, then join the
    /// worker and return its state. Returns `None` when already joined.
    pub fn shutdown(&self, join_timeout: Duration) -> Result<Option<S>> {
        if !self.handle.closed.swap(true, Ordering::SeqCst) {
            // Ignored if the worker already exited.
            let _ = self.handle.sender.send(Envelope::Shutdown);
        }

        let join_handle = self
            .thread
            .lock()
            .map_err(|_| CameraError::ExecutorError("executor lock poisoned".to_string()))?
            .take();

        let Some(join_handle) = join_handle else {
            return Ok(None);
        };

        let start = Instant::now();
        while !join_handle.is_finished() {
            if start.elapsed() >= join_timeout {
                log::warn!("Executor '{}' did not stop within {:?}", self.name, join_timeout);
                // Keep the handle so a later shutdown can retry.
                if let Ok(mut slot) = self.thread.lock() {
                    *slot = Some(join_handle);
                }
                return Err(CameraError::ExecutorError(format!(
                    "executor '{}' join timed out",
                    self.name
                )));
            }
            std::thread::sleep(Duration::from_millis(5));
        }

        let state = join_handle
            .join()
            .map_err(|_| CameraError::ExecutorError(format!("executor '{}' panicked", self.name)))?;
        log::info!("Joined background executor '{}'", self.name);
        Ok(Some(state))
    }

    pub fn is_running(&self) -> bool {
        self.thread
            .lock()
            .map(|slot| slot.as_ref().is_some_and(|t| !t.is_finished()))
            .unwrap_or(false)
    }
}

impl<M: Send + 'static, S: Send + 'static> Drop for BackgroundExecutor<M, S> {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown(Duration::from_millis(500)) {
            log::warn!("Error shutting down executor in drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_run_in_submission_order() {
        let executor = BackgroundExecutor::spawn("test-order", Vec::new(), |seen: &mut Vec<u32>, n: u32| {
            seen.push(n);
        })
        .unwrap();

        for n in 0..50 {
            executor.post(n).unwrap();
        }
        let seen = executor.shutdown(Duration::from_secs(2)).unwrap().unwrap();
        assert_eq!(seen, (0..50).collect::<Vec<_>>());
    }

    #[test]
    fn test_post_after_shutdown_fails() {
        let executor = BackgroundExecutor::spawn("test-closed", (), |_: &mut (), _: u32| {}).unwrap();
        let handle = executor.handle();
        executor.shutdown(Duration::from_secs(2)).unwrap();
        assert!(executor.post(1).is_err());
        assert!(handle.post(2).is_err());
        assert!(handle.is_closed());
        assert!(!executor.is_running());
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let executor = BackgroundExecutor::spawn("test-idem", 7u32, |_: &mut u32, _: u32| {}).unwrap();
        assert_eq!(executor.shutdown(Duration::from_secs(2)).unwrap(), Some(7));
        assert_eq!(executor.shutdown(Duration::from_secs(2)).unwrap(), None);
    }

    #[test]
    fn test_worker_runs_on_named_thread() {
        let (tx, rx) = std::sync::mpsc::channel();
        let executor = BackgroundExecutor::spawn("rawstreamer-test", (), move |_: &mut (), _: ()| {
            tx.send(std::thread::current().name().map(str::to_string)).unwrap();
        })
        .unwrap();
        executor.post(()).unwrap();
        let name = rx.recv_timeout(Duration::from_secs(2)).unwrap();
        assert_eq!(name.as_deref(), Some("rawstreamer-test"));
        executor.shutdown(Duration::from_secs(2)).unwrap();
    }

    #[test]
    fn test_handle_posts_from_other_threads() {
        let executor = BackgroundExecutor::spawn("test-handles", 0u32, |total: &mut u32, n: u32| {
            *total += n;
        })
        .unwrap();
        let workers: Vec<_> = (0..4)
            .map(|_| {
                let handle = executor.handle();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        handle.post(1).unwrap();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(executor.shutdown(Duration::from_secs(2)).unwrap(), Some(100));
    }
}
