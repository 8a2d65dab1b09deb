//! Lock-Free Task Channels
//!
//! Bounded SPSC and MPSC channels for cross-thread events, used for
//! loader-completion hand-off and similar producer/consumer pairs that
//! cross the frame boundary.
//!
//! # Design
//!
//! Both flavors share the same external contract:
//! - `try_send` / `try_recv` never block; a full ring is back-pressure,
//!   not an error.
//! - `send` / `recv` take a deadline; a zero timeout behaves exactly like
//!   the `try_` variant.
//! - Delivery is FIFO per producer.
//!
//! The non-blocking fast path goes straight to the ring; the blocking
//! layer parks on a condition variable keyed to "not full" / "not empty"
//! and re-probes the ring under the lock before waiting, so a wakeup is
//! never lost between the probe and the park.
//!
//! Channels are split into endpoints at construction:
//! [`spsc_channel`] returns a non-cloneable sender, [`mpsc_channel`] a
//! cloneable one. Role violations (two SPSC producers) are unrepresentable
//! instead of undefined.

use std::cell::UnsafeCell;
use std::mem::MaybeUninit;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

// ============================================================================
// Ring buffers
// ============================================================================

/// Minimum ring capacity; requested capacities round up to a power of two.
const MIN_CAPACITY: usize = 2;

fn ring_capacity(requested: usize) -> usize {
    requested.max(MIN_CAPACITY).next_power_of_two()
}

trait Ring: Send + Sync {
    type Item;

    fn try_push(&self, value: Self::Item) -> Result<(), Self::Item>;
    fn try_pop(&self) -> Option<Self::Item>;
    fn len(&self) -> usize;
    fn capacity(&self) -> usize;
}

/// Single-producer single-consumer ring: one writer bumps `tail`, one
/// reader bumps `head`. The endpoint split guarantees the role exclusivity
/// the orderings rely on.
struct SpscRing<T> {
    slots: Box<[UnsafeCell<MaybeUninit<T>>]>,
    mask: usize,
    head: AtomicUsize,
    tail: AtomicUsize,
}

unsafe impl<T: Send> Send for SpscRing<T> {}
unsafe impl<T: Send> Sync for SpscRing<T> {}

impl<T> SpscRing<T> {
    fn new(capacity: usize) -> Self {
        let capacity = ring_capacity(capacity);
        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(MaybeUninit::uninit()))
            .collect();
        Self {
            slots,
            mask: capacity - 1,
            head: AtomicUsize::new(0),
            tail: AtomicUsize::new(0),
        }
    }
}

impl<T: Send> Ring for SpscRing<T> {
    type Item = T;

    fn try_push(&self, value: T) -> Result<(), T> {
        let tail = self.tail.load(Ordering::Relaxed);
        let head = self.head.load(Ordering::Acquire);
        if tail.wrapping_sub(head) == self.slots.len() {
            return Err(value);
        }
        unsafe {
            (*self.slots[tail & self.mask].get()).write(value);
        }
        self.tail.store(tail.wrapping_add(1), Ordering::Release);
        Ok(())
    }

    fn try_pop(&self) -> Option<T> {
        let head = self.head.load(Ordering::Relaxed);
        let tail = self.tail.load(Ordering::Acquire);
        if head == tail {
            return None;
        }
        let value = unsafe { (*self.slots[head & self.mask].get()).assume_init_read() };
        self.head.store(head.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    fn len(&self) -> usize {
        let tail = self.tail.load(Ordering::Acquire);
        let head = self.head.load(Ordering::Acquire);
        tail.wrapping_sub(head)
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T> Drop for SpscRing<T> {
    fn drop(&mut self) {
        let mut head = *self.head.get_mut();
        let tail = *self.tail.get_mut();
        while head != tail {
            unsafe {
                (*self.slots[head & self.mask].get()).assume_init_drop();
            }
            head = head.wrapping_add(1);
        }
    }
}

/// Multi-producer single-consumer ring using per-slot sequence numbers:
/// a producer claims a slot with a CAS on `enqueue_pos`, then publishes
/// the payload by advancing the slot's sequence.
struct MpscSlot<T> {
    sequence: AtomicUsize,
    value: UnsafeCell<MaybeUninit<T>>,
}

struct MpscRing<T> {
    slots: Box<[MpscSlot<T>]>,
    mask: usize,
    enqueue_pos: AtomicUsize,
    dequeue_pos: AtomicUsize,
}

unsafe impl<T: Send> Send for MpscRing<T> {}
unsafe impl<T: Send> Sync for MpscRing<T> {}

impl<T> MpscRing<T> {
    fn new(capacity: usize) -> Self {
        let capacity = ring_capacity(capacity);
        let slots = (0..capacity)
            .map(|i| MpscSlot {
                sequence: AtomicUsize::new(i),
                value: UnsafeCell::new(MaybeUninit::uninit()),
            })
            .collect();
        Self {
            slots,
            mask: capacity - 1,
            enqueue_pos: AtomicUsize::new(0),
            dequeue_pos: AtomicUsize::new(0),
        }
    }
}

impl<T: Send> Ring for MpscRing<T> {
    type Item = T;

    fn try_push(&self, value: T) -> Result<(), T> {
        let mut pos = self.enqueue_pos.load(Ordering::Relaxed);
        loop {
            let slot = &self.slots[pos & self.mask];
            let seq = slot.sequence.load(Ordering::Acquire);
            let diff = seq as isize - pos as isize;
            if diff == 0 {
                match self.enqueue_pos.compare_exchange_weak(
                    pos,
                    pos.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        unsafe {
                            (*slot.value.get()).write(value);
                        }
                        slot.sequence.store(pos.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => pos = current,
                }
            } else if diff < 0 {
                return Err(value);
            } else {
                pos = self.enqueue_pos.load(Ordering::Relaxed);
            }
        }
    }

    fn try_pop(&self) -> Option<T> {
        let pos = self.dequeue_pos.load(Ordering::Relaxed);
        let slot = &self.slots[pos & self.mask];
        let seq = slot.sequence.load(Ordering::Acquire);
        let diff = seq as isize - pos.wrapping_add(1) as isize;
        if diff < 0 {
            return None;
        }
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        slot.sequence
            .store(pos.wrapping_add(self.mask).wrapping_add(1), Ordering::Release);
        self.dequeue_pos.store(pos.wrapping_add(1), Ordering::Release);
        Some(value)
    }

    fn len(&self) -> usize {
        let enqueue = self.enqueue_pos.load(Ordering::Acquire);
        let dequeue = self.dequeue_pos.load(Ordering::Acquire);
        enqueue.wrapping_sub(dequeue)
    }

    fn capacity(&self) -> usize {
        self.slots.len()
    }
}

impl<T> Drop for MpscRing<T> {
    fn drop(&mut self) {
        while self.try_pop_mut().is_some() {}
    }
}

impl<T> MpscRing<T> {
    /// Drop-path pop that does not require `T: Send`.
    fn try_pop_mut(&mut self) -> Option<T> {
        let pos = *self.dequeue_pos.get_mut();
        let slot = &mut self.slots[pos & self.mask];
        let seq = *slot.sequence.get_mut();
        if (seq as isize - pos.wrapping_add(1) as isize) < 0 {
            return None;
        }
        let value = unsafe { (*slot.value.get()).assume_init_read() };
        *slot.sequence.get_mut() = pos.wrapping_add(self.mask).wrapping_add(1);
        *self.dequeue_pos.get_mut() = pos.wrapping_add(1);
        Some(value)
    }
}

// ============================================================================
// Blocking layer
// ============================================================================

struct Shared<R> {
    ring: R,
    lock: Mutex<()>,
    not_full: Condvar,
    not_empty: Condvar,
}

impl<R> Shared<R> {
    fn new(ring: R) -> Arc<Self> {
        Arc::new(Self {
            ring,
            lock: Mutex::new(()),
            not_full: Condvar::new(),
            not_empty: Condvar::new(),
        })
    }
}

impl<R: Ring> Shared<R> {
    fn try_send(&self, value: R::Item) -> Result<(), R::Item> {
        self.ring.try_push(value)?;
        self.not_empty.notify_one();
        Ok(())
    }

    fn try_recv(&self) -> Option<R::Item> {
        let value = self.ring.try_pop()?;
        self.not_full.notify_one();
        Some(value)
    }

    fn send(&self, value: R::Item, timeout: Duration) -> Result<(), R::Item> {
        if timeout.is_zero() {
            return self.try_send(value);
        }
        let deadline = Instant::now() + timeout;
        let mut pending = Some(value);
        loop {
            match self.try_send(pending.take().expect("pending value present")) {
                Ok(()) => return Ok(()),
                Err(v) => pending = Some(v),
            }
            let mut guard = self.lock.lock();
            // Re-probe under the lock: a consumer may have drained a slot
            // between the failed push and acquiring the lock.
            match self.try_send(pending.take().expect("pending value present")) {
                Ok(()) => return Ok(()),
                Err(v) => pending = Some(v),
            }
            if Instant::now() >= deadline {
                return Err(pending.take().expect("pending value present"));
            }
            self.not_full.wait_until(&mut guard, deadline);
        }
    }

    fn recv(&self, timeout: Duration) -> Option<R::Item> {
        if timeout.is_zero() {
            return self.try_recv();
        }
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(value) = self.try_recv() {
                return Some(value);
            }
            let mut guard = self.lock.lock();
            if let Some(value) = self.try_recv() {
                return Some(value);
            }
            if Instant::now() >= deadline {
                return None;
            }
            self.not_empty.wait_until(&mut guard, deadline);
        }
    }
}

// ============================================================================
// SPSC endpoints
// ============================================================================

/// Producer endpoint of an SPSC channel. Not cloneable; exactly one
/// producer exists per channel.
pub struct SpscSender<T> {
    shared: Arc<Shared<SpscRing<T>>>,
}

/// Consumer endpoint of an SPSC channel.
pub struct SpscReceiver<T> {
    shared: Arc<Shared<SpscRing<T>>>,
}

/// Creates a bounded SPSC channel. `capacity` rounds up to a power of two
/// with a minimum of 2.
#[must_use]
pub fn spsc_channel<T: Send>(capacity: usize) -> (SpscSender<T>, SpscReceiver<T>) {
    let shared = Shared::new(SpscRing::new(capacity));
    (
        SpscSender {
            shared: Arc::clone(&shared),
        },
        SpscReceiver { shared },
    )
}

impl<T: Send> SpscSender<T> {
    /// Enqueues without blocking. Returns the value back iff the ring is
    /// full.
    pub fn try_send(&mut self, value: T) -> Result<(), T> {
        self.shared.try_send(value)
    }

    /// Enqueues, waiting up to `timeout` for space. A zero timeout behaves
    /// exactly like [`try_send`](Self::try_send).
    pub fn send(&mut self, value: T, timeout: Duration) -> Result<(), T> {
        self.shared.send(value, timeout)
    }

    /// Number of queued elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.ring.len()
    }

    /// True iff no element is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ring capacity after power-of-two rounding.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }
}

impl<T: Send> SpscReceiver<T> {
    /// Dequeues without blocking; `None` iff the ring is empty.
    pub fn try_recv(&mut self) -> Option<T> {
        self.shared.try_recv()
    }

    /// Dequeues, waiting up to `timeout` for an element. A zero timeout
    /// behaves exactly like [`try_recv`](Self::try_recv).
    pub fn recv(&mut self, timeout: Duration) -> Option<T> {
        self.shared.recv(timeout)
    }

    /// Number of queued elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.ring.len()
    }

    /// True iff no element is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ring capacity after power-of-two rounding.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }
}

// ============================================================================
// MPSC endpoints
// ============================================================================

/// Producer endpoint of an MPSC channel. Cloneable; any number of
/// producers may send concurrently.
pub struct MpscSender<T> {
    shared: Arc<Shared<MpscRing<T>>>,
}

impl<T> Clone for MpscSender<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

/// Consumer endpoint of an MPSC channel.
pub struct MpscReceiver<T> {
    shared: Arc<Shared<MpscRing<T>>>,
}

/// Creates a bounded MPSC channel. `capacity` rounds up to a power of two
/// with a minimum of 2.
#[must_use]
pub fn mpsc_channel<T: Send>(capacity: usize) -> (MpscSender<T>, MpscReceiver<T>) {
    let shared = Shared::new(MpscRing::new(capacity));
    (
        MpscSender {
            shared: Arc::clone(&shared),
        },
        MpscReceiver { shared },
    )
}

impl<T: Send> MpscSender<T> {
    /// Enqueues without blocking. Returns the value back iff the ring is
    /// full.
    pub fn try_send(&self, value: T) -> Result<(), T> {
        self.shared.try_send(value)
    }

    /// Enqueues, waiting up to `timeout` for space. A zero timeout behaves
    /// exactly like [`try_send`](Self::try_send).
    pub fn send(&self, value: T, timeout: Duration) -> Result<(), T> {
        self.shared.send(value, timeout)
    }

    /// Number of queued elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.ring.len()
    }

    /// True iff no element is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ring capacity after power-of-two rounding.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }
}

impl<T: Send> MpscReceiver<T> {
    /// Dequeues without blocking; `None` iff the ring is empty.
    pub fn try_recv(&mut self) -> Option<T> {
        self.shared.try_recv()
    }

    /// Dequeues, waiting up to `timeout` for an element. A zero timeout
    /// behaves exactly like [`try_recv`](Self::try_recv).
    pub fn recv(&mut self, timeout: Duration) -> Option<T> {
        self.shared.recv(timeout)
    }

    /// Number of queued elements.
    #[must_use]
    pub fn len(&self) -> usize {
        self.shared.ring.len()
    }

    /// True iff no element is queued.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Ring capacity after power-of-two rounding.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.shared.ring.capacity()
    }
}
