//! Bounded producer/consumer queue, grounded on the original C++
//! `BlockDeque<T>` (one mutex, one "not full" condvar, one "not empty"
//! condvar, and an explicit closed flag).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::Duration;

#[derive(Debug, PartialEq, Eq)]
pub struct Closed;

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
    closed: bool,
}

pub struct BlockingDeque<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<T> BlockingDeque<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::new(),
                capacity,
                closed: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().capacity
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_full(&self) -> bool {
        let g = self.inner.lock().unwrap();
        g.items.len() >= g.capacity
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().unwrap().closed
    }

    pub fn push_back(&self, item: T) -> Result<(), Closed> {
        let mut g = self.inner.lock().unwrap();
        loop {
            if g.closed {
                return Err(Closed);
            }
            if g.items.len() < g.capacity {
                g.items.push_back(item);
                self.not_empty.notify_one();
                return Ok(());
            }
            g = self.not_full.wait(g).unwrap();
        }
    }

    pub fn push_front(&self, item: T) -> Result<(), Closed> {
        let mut g = self.inner.lock().unwrap();
        loop {
            if g.closed {
                return Err(Closed);
            }
            if g.items.len() < g.capacity {
                g.items.push_front(item);
                self.not_empty.notify_one();
                return Ok(());
            }
            g = self.not_full.wait(g).unwrap();
        }
    }

    /// Block until an item is available, or `None` once the queue is
    /// closed and drained.
    pub fn pop(&self) -> Option<T> {
        let mut g = self.inner.lock().unwrap();
        loop {
            if let Some(item) = g.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if g.closed {
                return None;
            }
            g = self.not_empty.wait(g).unwrap();
        }
    }

    /// Block for up to `timeout`; `None` on timeout or close-while-empty.
    pub fn pop_timeout(&self, timeout: Duration) -> Option<T> {
        let mut g = self.inner.lock().unwrap();
        loop {
            if let Some(item) = g.items.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            if g.closed {
                return None;
            }
            let (next, result) = self.not_empty.wait_timeout(g, timeout).unwrap();
            g = next;
            if result.timed_out() {
                return g.items.pop_front().inspect(|_| {
                    self.not_full.notify_one();
                });
            }
        }
    }

    /// Mark the queue closed, drop whatever's still queued, and wake every
    /// waiter; `pop` returns `None` from this point on.
    pub fn close(&self) {
        let mut g = self.inner.lock().unwrap();
        g.closed = true;
        g.items.clear();
        drop(g);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn clear(&self) {
        let mut g = self.inner.lock().unwrap();
        g.items.clear();
        self.not_full.notify_all();
    }

    /// Wake one waiting consumer without pushing anything (used by the
    /// logger to force a flush before shutdown).
    pub fn flush(&self) {
        self.not_empty.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn push_then_pop() {
        let q = BlockingDeque::new(4);
        q.push_back(1).unwrap();
        q.push_back(2).unwrap();
        assert_eq!(q.pop(), Some(1));
        assert_eq!(q.pop(), Some(2));
    }

    #[test]
    fn pop_returns_none_after_close_and_drain() {
        let q: BlockingDeque<i32> = BlockingDeque::new(4);
        q.close();
        assert_eq!(q.pop(), None);
    }

    #[test]
    fn push_after_close_is_refused() {
        let q = BlockingDeque::new(4);
        q.close();
        assert_eq!(q.push_back(1), Err(Closed));
    }

    #[test]
    fn blocks_until_producer_pushes() {
        let q = Arc::new(BlockingDeque::new(4));
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.pop());
        thread::sleep(Duration::from_millis(20));
        q.push_back(42).unwrap();
        assert_eq!(handle.join().unwrap(), Some(42));
    }

    #[test]
    fn full_push_blocks_until_space() {
        let q = Arc::new(BlockingDeque::new(1));
        q.push_back(1).unwrap();
        let q2 = q.clone();
        let handle = thread::spawn(move || q2.push_back(2));
        thread::sleep(Duration::from_millis(20));
        assert_eq!(q.pop(), Some(1));
        handle.join().unwrap().unwrap();
        assert_eq!(q.pop(), Some(2));
    }

    #[test]
    fn pop_timeout_expires() {
        let q: BlockingDeque<i32> = BlockingDeque::new(4);
        assert_eq!(q.pop_timeout(Duration::from_millis(10)), None);
    }
}
