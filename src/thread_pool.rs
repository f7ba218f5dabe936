//! Fixed-size worker pool over an unbounded task queue. Distinct from
//! `BlockingDeque`: the reactor is the only producer here and is never
//! meant to be pushed back on, so the queue has no capacity bound.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};

type Task = Box<dyn FnOnce() + Send + 'static>;

struct Shared {
    queue: Mutex<VecDeque<Task>>,
    condvar: Condvar,
    shutting_down: Mutex<bool>,
}

pub struct ThreadPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl ThreadPool {
    pub fn new(num_threads: usize) -> Self {
        assert!(num_threads > 0, "thread pool needs at least one worker");
        let shared = Arc::new(Shared {
            queue: Mutex::new(VecDeque::new()),
            condvar: Condvar::new(),
            shutting_down: Mutex::new(false),
        });

        let workers = (0..num_threads)
            .map(|_| {
                let shared = shared.clone();
                thread::spawn(move || Self::worker_loop(shared))
            })
            .collect();

        Self { shared, workers }
    }

    fn worker_loop(shared: Arc<Shared>) {
        loop {
            let mut queue = shared.queue.lock().unwrap();
            loop {
                if let Some(task) = queue.pop_front() {
                    drop(queue);
                    task();
                    break;
                }
                if *shared.shutting_down.lock().unwrap() {
                    return;
                }
                queue = shared.condvar.wait(queue).unwrap();
            }
        }
    }

    pub fn submit(&self, task: impl FnOnce() + Send + 'static) {
        let mut queue = self.shared.queue.lock().unwrap();
        queue.push_back(Box::new(task));
        self.shared.condvar.notify_one();
    }
}

impl Drop for ThreadPool {
    fn drop(&mut self) {
        *self.shared.shutting_down.lock().unwrap() = true;
        self.shared.condvar.notify_all();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;

    #[test]
    fn runs_submitted_tasks() {
        let pool = ThreadPool::new(4);
        let (tx, rx) = mpsc::channel();
        for i in 0..10 {
            let tx = tx.clone();
            pool.submit(move || tx.send(i).unwrap());
        }
        drop(tx);
        let mut results: Vec<_> = rx.iter().collect();
        results.sort();
        assert_eq!(results, (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn drains_queue_on_drop() {
        let counter = Arc::new(AtomicUsize::new(0));
        {
            let pool = ThreadPool::new(2);
            for _ in 0..50 {
                let counter = counter.clone();
                pool.submit(move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                });
            }
        }
        assert_eq!(counter.load(Ordering::SeqCst), 50);
    }
}
