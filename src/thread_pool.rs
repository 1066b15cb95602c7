//! A module for the connection worker pool.
use std::{
    io,
    panic::{AssertUnwindSafe, catch_unwind},
    sync::{Arc, Mutex, mpsc},
    thread,
};

use log::{debug, error};

use crate::error::Result;

/// A trait for thread pools.
///
/// The server hands every accepted connection to a pool, so the pool size
/// bounds how many clients are served at once.
pub trait ThreadPool: Sized {
    /// Create a new thread pool with `threads` workers.
    fn new(threads: u32) -> Result<Self>;
    /// Queue a job; it runs as soon as a worker is free.
    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static;
}

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Terminate,
}

/// Fixed workers pulling jobs from one shared queue.
pub struct SharedQueueThreadPool {
    workers: Vec<Worker>,
    sender: mpsc::Sender<Message>,
}

impl SharedQueueThreadPool {
    /// Number of worker threads.
    pub fn size(&self) -> usize {
        self.workers.len()
    }
}

impl ThreadPool for SharedQueueThreadPool {
    fn new(threads: u32) -> Result<Self> {
        if threads == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "thread pool needs at least one worker",
            )
            .into());
        }
        let (sender, receiver) = mpsc::channel();
        let receiver = Arc::new(Mutex::new(receiver));
        let mut workers = Vec::with_capacity(threads as usize);
        for id in 0..threads {
            workers.push(Worker::spawn(id, receiver.clone())?);
        }
        Ok(Self { workers, sender })
    }

    fn spawn<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if self.sender.send(Message::Run(Box::new(job))).is_err() {
            error!("thread pool queue is closed, job dropped");
        }
    }
}

impl Drop for SharedQueueThreadPool {
    fn drop(&mut self) {
        for _ in &self.workers {
            let _ = self.sender.send(Message::Terminate);
        }

        for worker in &mut self.workers {
            if let Some(thread) = worker.thread.take() {
                if thread.join().is_err() {
                    error!("worker {} join failed", worker.id);
                }
            }
        }
    }
}

struct Worker {
    id: u32,
    thread: Option<thread::JoinHandle<()>>,
}

impl Worker {
    fn spawn(id: u32, receiver: Arc<Mutex<mpsc::Receiver<Message>>>) -> Result<Self> {
        let thread = thread::Builder::new()
            .name(format!("weather-worker-{id}"))
            .spawn(move || {
                loop {
                    let msg = {
                        let receiver = match receiver.lock() {
                            Ok(guard) => guard,
                            Err(poisoned) => poisoned.into_inner(),
                        };
                        receiver.recv()
                    };
                    match msg {
                        Ok(Message::Run(job)) => {
                            if catch_unwind(AssertUnwindSafe(job)).is_err() {
                                error!("worker {} job panicked", id);
                            }
                        }
                        Ok(Message::Terminate) | Err(_) => break,
                    }
                }
                debug!("worker {} stopped", id);
            })?;
        Ok(Self {
            id,
            thread: Some(thread),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_utils::sync::WaitGroup;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn runs_every_job() {
        let pool = SharedQueueThreadPool::new(4).unwrap();
        assert_eq!(pool.size(), 4);
        let counter = Arc::new(AtomicUsize::new(0));
        let wg = WaitGroup::new();
        for _ in 0..64 {
            let counter = counter.clone();
            let wg = wg.clone();
            pool.spawn(move || {
                counter.fetch_add(1, Ordering::SeqCst);
                drop(wg);
            });
        }
        wg.wait();
        assert_eq!(counter.load(Ordering::SeqCst), 64);
    }

    #[test]
    fn survives_panicking_jobs() {
        let pool = SharedQueueThreadPool::new(2).unwrap();
        for _ in 0..4 {
            pool.spawn(|| {
                panic_control::disable_hook_in_current_thread();
                panic!("boom");
            });
        }
        let wg = WaitGroup::new();
        for _ in 0..8 {
            let wg = wg.clone();
            pool.spawn(move || drop(wg));
        }
        wg.wait();
    }

    #[test]
    fn zero_workers_is_an_error() {
        assert!(SharedQueueThreadPool::new(0).is_err());
    }
}
