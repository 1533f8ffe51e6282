// crates/dragnet-core/src/queue.rs
//
// BoundedQueue: fixed-capacity blocking FIFO, multi-producer / multi-consumer.
//
// Every stage interconnect in the pipeline is one of these. The capacity
// bound is what gives the pipeline backpressure: a slow detector fills its
// input queue, which parks the loader (or the socket readers, which in turn
// lets TCP flow control throttle the remote cameras).
//
// One mutex guards the ring; two condvars share it. push signals one waiter
// on `item_avail`, pop signals one waiter on `free_space`. Both re-check
// their predicate in a loop, so spurious wakeups are harmless.
//
// There is no timeout and no cancellation: a blocked pop is only ever
// released by a push, which by convention is eventually an `Item::End`
// marker from each producer.

use std::sync::{Condvar, Mutex};

struct Ring<T> {
    slots:    Vec<Option<T>>,
    next_in:  usize,
    next_out: usize,
    backlog:  usize,
}

/// Hook invoked for each item still queued when the queue is dropped.
type Disposer<T> = Box<dyn Fn(T) + Send + Sync>;

pub struct BoundedQueue<T> {
    inner:      Mutex<Ring<T>>,
    item_avail: Condvar,
    free_space: Condvar,
    dispose:    Option<Disposer<T>>,
}

impl<T> BoundedQueue<T> {
    pub fn new(capacity: usize) -> Self {
        Self::build(capacity, None)
    }

    /// Like `new`, but `dispose` is called for every item still in the queue
    /// when it is dropped, in FIFO order.
    pub fn with_disposer<F>(capacity: usize, dispose: F) -> Self
    where
        F: Fn(T) + Send + Sync + 'static,
    {
        Self::build(capacity, Some(Box::new(dispose) as Disposer<T>))
    }

    fn build(capacity: usize, dispose: Option<Disposer<T>>) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            inner: Mutex::new(Ring {
                slots:    (0..capacity).map(|_| None).collect(),
                next_in:  0,
                next_out: 0,
                backlog:  0,
            }),
            item_avail: Condvar::new(),
            free_space: Condvar::new(),
            dispose,
        }
    }

    /// Append `item` at the tail. Blocks while the queue is full.
    pub fn push(&self, item: T) {
        {
            let mut ring = self.inner.lock().unwrap();
            while ring.backlog == ring.slots.len() {
                ring = self.free_space.wait(ring).unwrap();
            }
            let idx = ring.next_in;
            ring.slots[idx] = Some(item);
            ring.next_in = (idx + 1) % ring.slots.len();
            ring.backlog += 1;
        }
        self.item_avail.notify_one();
    }

    /// Remove and return the head item. Blocks while the queue is empty.
    pub fn pop(&self) -> T {
        let item = {
            let mut ring = self.inner.lock().unwrap();
            while ring.backlog == 0 {
                ring = self.item_avail.wait(ring).unwrap();
            }
            let idx = ring.next_out;
            let item = ring.slots[idx].take().unwrap();
            ring.next_out = (idx + 1) % ring.slots.len();
            ring.backlog -= 1;
            item
        };
        self.free_space.notify_one();
        item
    }

    /// Items currently queued. Racy by nature; useful for tests and logs.
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().backlog
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.inner.lock().unwrap().slots.len()
    }
}

impl<T> Drop for BoundedQueue<T> {
    fn drop(&mut self) {
        // Drain residue head-first so the disposer observes FIFO order.
        let ring = self.inner.get_mut().unwrap();
        while ring.backlog > 0 {
            let idx = ring.next_out;
            let item = ring.slots[idx].take().unwrap();
            ring.next_out = (idx + 1) % ring.slots.len();
            ring.backlog -= 1;
            if let Some(dispose) = &self.dispose {
                dispose(item);
            }
        }
    }
}
