//! Min-heap timer, grounded on the original C++ `HeapTimer`/`TimerNode`:
//! a binary heap ordered by deadline plus a side index from id to heap
//! position, giving O(log n) add/adjust/remove by id instead of the
//! O(n) scan a naive timeout sweep would need.

use std::collections::HashMap;
use std::time::{Duration, Instant};

type TimeoutCallback = Box<dyn FnMut() + Send>;

struct TimerNode {
    id: usize,
    deadline: Instant,
    callback: TimeoutCallback,
}

pub struct MinHeapTimer {
    heap: Vec<TimerNode>,
    index: HashMap<usize, usize>,
}

impl MinHeapTimer {
    pub fn new() -> Self {
        Self {
            heap: Vec::with_capacity(64),
            index: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Register a new timer, replacing any existing one for `id`.
    pub fn add(&mut self, id: usize, timeout: Duration, callback: impl FnMut() + Send + 'static) {
        if let Some(&i) = self.index.get(&id) {
            self.heap[i].deadline = Instant::now() + timeout;
            self.heap[i].callback = Box::new(callback);
            self.sift_up(i);
            let i = self.index[&id];
            self.sift_down(i, self.heap.len());
            return;
        }
        let i = self.heap.len();
        self.heap.push(TimerNode {
            id,
            deadline: Instant::now() + timeout,
            callback: Box::new(callback),
        });
        self.index.insert(id, i);
        self.sift_up(i);
    }

    /// Reset `id`'s deadline to `timeout` from now, whether that moves it
    /// later or earlier in the heap.
    pub fn adjust(&mut self, id: usize, timeout: Duration) {
        if let Some(&i) = self.index.get(&id) {
            self.heap[i].deadline = Instant::now() + timeout;
            self.sift_up(i);
            let i = self.index[&id];
            self.sift_down(i, self.heap.len());
        }
    }

    /// Run `id`'s callback immediately and remove it.
    pub fn do_work(&mut self, id: usize) {
        if let Some(&i) = self.index.get(&id) {
            (self.heap[i].callback)();
            self.del(i);
        }
    }

    /// Remove `id` without running its callback.
    pub fn remove(&mut self, id: usize) {
        if let Some(&i) = self.index.get(&id) {
            self.del(i);
        }
    }

    pub fn clear(&mut self) {
        self.heap.clear();
        self.index.clear();
    }

    /// Pop and run every expired node, returning their ids.
    pub fn tick(&mut self) -> Vec<usize> {
        let now = Instant::now();
        let mut fired = Vec::new();
        while let Some(top) = self.heap.first() {
            if top.deadline > now {
                break;
            }
            let id = top.id;
            (self.heap[0].callback)();
            self.pop();
            fired.push(id);
        }
        fired
    }

    pub fn pop(&mut self) {
        if !self.heap.is_empty() {
            self.del(0);
        }
    }

    /// Run `tick`, then report milliseconds until the new soonest
    /// deadline, or `None` if the heap is now empty.
    pub fn next_tick_ms(&mut self) -> Option<i64> {
        self.tick();
        self.heap.first().map(|top| {
            let now = Instant::now();
            if top.deadline > now {
                (top.deadline - now).as_millis() as i64
            } else {
                0
            }
        })
    }

    fn del(&mut self, i: usize) {
        let last = self.heap.len() - 1;
        if i != last {
            self.swap_nodes(i, last);
        }
        let removed = self.heap.pop().unwrap();
        self.index.remove(&removed.id);
        if i < self.heap.len() {
            self.sift_down(i, self.heap.len());
            self.sift_up(i);
        }
    }

    fn swap_nodes(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        self.index.insert(self.heap[i].id, i);
        self.index.insert(self.heap[j].id, j);
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if self.heap[parent].deadline <= self.heap[i].deadline {
                break;
            }
            self.swap_nodes(i, parent);
            i = parent;
        }
    }

    fn sift_down(&mut self, mut i: usize, n: usize) {
        loop {
            let left = i * 2 + 1;
            let right = i * 2 + 2;
            let mut smallest = i;
            if left < n && self.heap[left].deadline < self.heap[smallest].deadline {
                smallest = left;
            }
            if right < n && self.heap[right].deadline < self.heap[smallest].deadline {
                smallest = right;
            }
            if smallest == i {
                break;
            }
            self.swap_nodes(i, smallest);
            i = smallest;
        }
    }
}

impl Default for MinHeapTimer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn fires_in_deadline_order() {
        let mut timer = MinHeapTimer::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        for (id, ms) in [(1, 30), (2, 10), (3, 20)] {
            let order = order.clone();
            timer.add(id, Duration::from_millis(ms), move || {
                order.lock().unwrap().push(id);
            });
        }

        std::thread::sleep(Duration::from_millis(40));
        timer.tick();
        assert_eq!(*order.lock().unwrap(), vec![2, 3, 1]);
        assert!(timer.is_empty());
    }

    #[test]
    fn adjust_postpones_expiry() {
        let mut timer = MinHeapTimer::new();
        let fired = Arc::new(Mutex::new(false));
        let fired2 = fired.clone();
        timer.add(1, Duration::from_millis(10), move || {
            *fired2.lock().unwrap() = true;
        });
        timer.adjust(1, Duration::from_millis(200));
        std::thread::sleep(Duration::from_millis(20));
        timer.tick();
        assert!(!*fired.lock().unwrap());
    }

    #[test]
    fn adjust_can_promote_node_to_root() {
        let mut timer = MinHeapTimer::new();
        timer.add(1, Duration::from_millis(1000), || {});
        timer.add(2, Duration::from_millis(2000), || {});
        timer.adjust(2, Duration::from_millis(1));
        std::thread::sleep(Duration::from_millis(10));
        let fired = timer.tick();
        assert_eq!(fired, vec![2]);
    }

    #[test]
    fn do_work_runs_and_removes() {
        let mut timer = MinHeapTimer::new();
        let fired = Arc::new(Mutex::new(false));
        let fired2 = fired.clone();
        timer.add(1, Duration::from_secs(10), move || {
            *fired2.lock().unwrap() = true;
        });
        timer.do_work(1);
        assert!(*fired.lock().unwrap());
        assert!(timer.is_empty());
    }

    #[test]
    fn next_tick_ms_reports_remaining_time() {
        let mut timer = MinHeapTimer::new();
        timer.add(1, Duration::from_millis(50), || {});
        let remaining = timer.next_tick_ms().unwrap();
        assert!(remaining > 0 && remaining <= 50);
    }
}
