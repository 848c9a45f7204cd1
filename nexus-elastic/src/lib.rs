//! An unbounded MPMC queue built from two bounded handoff channels and a
//! relay thread.
//!
//! Producers push into a small bounded *input* handoff, consumers pull from a
//! small bounded *output* handoff, and a dedicated worker thread moves items
//! between them through a growable buffer it owns exclusively:
//!
//! ```text
//! ┌──────────┐   ┌─────────┐   ┌──────────────────────┐   ┌──────────┐   ┌──────────┐
//! │ Sender   │──>│ input   │──>│ worker               │──>│ output   │──>│ Receiver │
//! │ (clone)  │   │ bounded │   │ VecDeque (unbounded) │   │ bounded  │   │ (clone)  │
//! └──────────┘   └─────────┘   └──────────────────────┘   └──────────┘   └──────────┘
//! ```
//!
//! The effect is a queue whose effective capacity has no upper bound while
//! every shared structure stays fixed-size.
//!
//! # Trade-off
//!
//! Producers are never blocked by a slow consumer. They only wait, briefly,
//! while the input handoff is full and the worker has not pulled from it yet.
//! The price is memory: under sustained overload the worker's buffer grows
//! without limit. This queue suits event delivery to a consumer that keeps
//! draining forever (a render loop, a log sink). A consumer that stops
//! draining turns it into a leak. If you need bounded memory, put admission
//! control in front of [`Sender::send`] or use a bounded channel.
//!
//! # Example
//!
//! ```
//! use nexus_elastic::channel;
//!
//! let (tx, rx) = channel::<u64>();
//!
//! for i in 0..10_000 {
//!     tx.send(i).unwrap(); // never waits on the consumer
//! }
//! tx.close();
//!
//! let received: Vec<u64> = rx.iter().collect();
//! assert_eq!(received, (0..10_000).collect::<Vec<_>>());
//! ```
//!
//! # Closing
//!
//! [`Sender::close`] closes the queue for every clone of the sender. Items
//! already accepted are still delivered, in order, and then
//! [`Receiver::recv`] returns [`RecvError`] forever:
//!
//! ```
//! use nexus_elastic::{channel, RecvError};
//!
//! let (tx, rx) = channel::<&str>();
//!
//! tx.send("a").unwrap();
//! tx.send("b").unwrap();
//! tx.close();
//!
//! // Sending after close hands the value back
//! assert_eq!(tx.send("c").unwrap_err().into_inner(), "c");
//!
//! assert_eq!(rx.recv(), Ok("a"));
//! assert_eq!(rx.recv(), Ok("b"));
//! assert_eq!(rx.recv(), Err(RecvError));
//! assert_eq!(rx.recv(), Err(RecvError));
//! ```
//!
//! Dropping every `Sender` closes the queue the same way.
//!
//! # Ordering
//!
//! Items leave in the order they were accepted. With several producers, each
//! producer's own items keep their relative order; how two producers
//! interleave is decided by the input handoff.
//!
//! # Tuning
//!
//! ```
//! use nexus_elastic::Builder;
//!
//! let (tx, rx) = Builder::new()
//!     .input_capacity(64)
//!     .output_capacity(64)
//!     .overflow_capacity(4096)
//!     .retain_limit(1 << 16)
//!     .name("frame-events")
//!     .build::<u32>();
//! # drop((tx, rx));
//! ```
//!
//! | Setting | Default | Meaning |
//! |---------|---------|---------|
//! | `input_capacity` | 128 | Slots in the input handoff |
//! | `output_capacity` | 128 | Slots in the output handoff |
//! | `overflow_capacity` | 1024 | Initial allocation of the worker's buffer |
//! | `retain_limit` | 8 × `overflow_capacity` | Largest buffer kept after a burst drains |
//! | `name` | `nexus-elastic` | Worker thread name |
//!
//! Once a burst has fully drained, a buffer that grew past `retain_limit` is
//! replaced by a fresh one at `overflow_capacity`, so one spike does not pin
//! its peak allocation forever.
//!
//! # Logging
//!
//! The worker emits [`tracing`] events: lifecycle at `debug`, buffer
//! recycling at `trace`, and a `warn` if every receiver is dropped while items
//! are still buffered. No subscriber is installed by this crate.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

mod error;
mod gate;
mod overflow;
mod worker;

use core::fmt;
use std::io;
use std::sync::Arc;
use std::thread;

use crossbeam_channel as cb;
use tracing::debug;

pub use error::{RecvError, SendError, TryRecvError, TrySendError};

use gate::{Close, Gate};
use overflow::Overflow;
use worker::{Envelope, Worker};

/// Default number of slots in the input handoff.
pub const DEFAULT_INPUT_CAPACITY: usize = 128;

/// Default number of slots in the output handoff.
pub const DEFAULT_OUTPUT_CAPACITY: usize = 128;

/// Default initial allocation of the worker's overflow buffer.
pub const DEFAULT_OVERFLOW_CAPACITY: usize = 1 << 10;

/// Default ratio between the retain limit and the overflow capacity.
const DEFAULT_RETAIN_FACTOR: usize = 8;

const DEFAULT_NAME: &str = "nexus-elastic";

/// Creates an elastic queue with default capacities.
///
/// Returns a `(Sender, Receiver)` pair. Both halves can be cloned.
///
/// # Panics
///
/// Panics if the worker thread cannot be spawned.
///
/// # Example
///
/// ```
/// use nexus_elastic::channel;
///
/// let (tx, rx) = channel::<String>();
///
/// tx.send("hello".to_string()).unwrap();
/// assert_eq!(rx.recv().unwrap(), "hello");
/// ```
pub fn channel<T: Send + 'static>() -> (Sender<T>, Receiver<T>) {
    Builder::new().build()
}

/// Creates an elastic queue with explicit capacities.
///
/// # Arguments
///
/// * `input_capacity` - Slots in the input handoff. A full input handoff is the
///   only thing a producer ever waits on.
/// * `output_capacity` - Slots in the output handoff.
/// * `overflow_capacity` - Initial allocation of the worker's buffer, sized
///   for a typical burst.
///
/// # Panics
///
/// Panics if `input_capacity` or `output_capacity` is 0, or if the worker
/// thread cannot be spawned.
///
/// # Example
///
/// ```
/// use nexus_elastic::channel_with_config;
///
/// let (tx, rx) = channel_with_config::<u64>(4, 4, 16);
///
/// // Far more than both handoffs hold
/// for i in 0..1000 {
///     tx.send(i).unwrap();
/// }
/// assert_eq!(rx.recv().unwrap(), 0);
/// ```
pub fn channel_with_config<T: Send + 'static>(
    input_capacity: usize,
    output_capacity: usize,
    overflow_capacity: usize,
) -> (Sender<T>, Receiver<T>) {
    Builder::new()
        .input_capacity(input_capacity)
        .output_capacity(output_capacity)
        .overflow_capacity(overflow_capacity)
        .build()
}

// ============================================================================
// Builder
// ============================================================================

/// Configuration for an elastic queue.
///
/// See the [crate-level docs](crate#tuning) for the meaning of each setting.
#[derive(Debug, Clone)]
pub struct Builder {
    input_capacity: usize,
    output_capacity: usize,
    overflow_capacity: usize,
    retain_limit: Option<usize>,
    name: Option<String>,
}

impl Default for Builder {
    fn default() -> Self {
        Self::new()
    }
}

impl Builder {
    /// Creates a builder with the default settings.
    pub const fn new() -> Self {
        Self {
            input_capacity: DEFAULT_INPUT_CAPACITY,
            output_capacity: DEFAULT_OUTPUT_CAPACITY,
            overflow_capacity: DEFAULT_OVERFLOW_CAPACITY,
            retain_limit: None,
            name: None,
        }
    }

    /// Sets the number of slots in the input handoff.
    #[must_use]
    pub const fn input_capacity(mut self, capacity: usize) -> Self {
        self.input_capacity = capacity;
        self
    }

    /// Sets the number of slots in the output handoff.
    #[must_use]
    pub const fn output_capacity(mut self, capacity: usize) -> Self {
        self.output_capacity = capacity;
        self
    }

    /// Sets the initial allocation of the worker's overflow buffer.
    ///
    /// This is also the size the buffer is reset to after a burst.
    #[must_use]
    pub const fn overflow_capacity(mut self, capacity: usize) -> Self {
        self.overflow_capacity = capacity;
        self
    }

    /// Sets the largest overflow allocation kept once a burst has drained.
    ///
    /// Values below `overflow_capacity` are raised to it.
    #[must_use]
    pub const fn retain_limit(mut self, limit: usize) -> Self {
        self.retain_limit = Some(limit);
        self
    }

    /// Names the worker thread.
    #[must_use]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Spawns the worker and returns the two endpoints.
    ///
    /// # Panics
    ///
    /// Panics if either handoff capacity is 0, or if the worker thread cannot
    /// be spawned. Use [`try_build`](Self::try_build) to handle spawn failure.
    pub fn build<T: Send + 'static>(self) -> (Sender<T>, Receiver<T>) {
        match self.try_build() {
            Ok(endpoints) => endpoints,
            Err(err) => panic!("failed to spawn elastic queue worker: {err}"),
        }
    }

    /// Spawns the worker and returns the two endpoints.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the worker thread cannot be spawned.
    ///
    /// # Panics
    ///
    /// Panics if either handoff capacity is 0.
    pub fn try_build<T: Send + 'static>(self) -> io::Result<(Sender<T>, Receiver<T>)> {
        assert!(self.input_capacity > 0, "input capacity must be non-zero");
        assert!(self.output_capacity > 0, "output capacity must be non-zero");

        let retain_limit = self.retain_limit.unwrap_or_else(|| {
            self.overflow_capacity
                .saturating_mul(DEFAULT_RETAIN_FACTOR)
        });
        let name = self.name.unwrap_or_else(|| DEFAULT_NAME.to_owned());

        let (input_tx, input_rx) = cb::bounded(self.input_capacity);
        let (output_tx, output_rx) = cb::bounded(self.output_capacity);

        let worker = Worker::new(
            input_rx,
            output_tx,
            Overflow::with_capacity(self.overflow_capacity, retain_limit),
        );
        thread::Builder::new()
            .name(name)
            .spawn(move || worker.run())?;

        Ok((
            Sender {
                input: input_tx,
                gate: Arc::new(Gate::new()),
                capacity: self.input_capacity,
            },
            Receiver {
                output: output_rx,
                capacity: self.output_capacity,
            },
        ))
    }
}

// ============================================================================
// Sender
// ============================================================================

/// The sending half of an elastic queue.
///
/// Cloning a `Sender` adds another producer on the same queue. Calling
/// [`close`](Sender::close) on any clone closes the queue for all of them.
///
/// # Example
///
/// ```
/// use nexus_elastic::channel;
/// use std::thread;
///
/// let (tx, rx) = channel::<u32>();
/// let tx2 = tx.clone();
///
/// let h = thread::spawn(move || tx2.send(1).unwrap());
/// tx.send(2).unwrap();
/// h.join().unwrap();
/// drop(tx);
///
/// let mut got: Vec<u32> = rx.iter().collect();
/// got.sort_unstable();
/// assert_eq!(got, [1, 2]);
/// ```
pub struct Sender<T> {
    input: cb::Sender<Envelope<T>>,
    gate: Arc<Gate>,
    capacity: usize,
}

impl<T> Sender<T> {
    /// Sends a message into the queue.
    ///
    /// Waits only while the input handoff is full; the worker empties it
    /// regardless of how far behind the consumer is.
    ///
    /// # Errors
    ///
    /// Returns `Err(SendError(value))` if the queue has been closed, or if
    /// every receiver was dropped and the worker has shut down.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_elastic::channel;
    ///
    /// let (tx, rx) = channel::<i32>();
    ///
    /// tx.send(1).unwrap();
    /// tx.close();
    /// assert!(tx.send(2).is_err());
    /// # drop(rx);
    /// ```
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        if !self.gate.enter() {
            return Err(SendError(value));
        }

        let result = match self.input.send(Envelope::Item(value)) {
            Ok(()) => Ok(()),
            Err(cb::SendError(envelope)) => Err(SendError(envelope.into_item())),
        };

        self.leave();
        result
    }

    /// Attempts to send a message without waiting on the input handoff.
    ///
    /// # Errors
    ///
    /// - `Err(TrySendError::Full(value))` if the input handoff is full right now
    /// - `Err(TrySendError::Closed(value))` if the queue has been closed
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_elastic::{channel, TrySendError};
    ///
    /// let (tx, rx) = channel::<i32>();
    ///
    /// // Full only reflects the input handoff; retrying succeeds once the
    /// // worker has pulled from it.
    /// let mut value = 1;
    /// loop {
    ///     match tx.try_send(value) {
    ///         Ok(()) => break,
    ///         Err(TrySendError::Full(v)) => value = v,
    ///         Err(TrySendError::Closed(_)) => unreachable!(),
    ///     }
    /// }
    ///
    /// tx.close();
    /// assert!(matches!(tx.try_send(2), Err(TrySendError::Closed(2))));
    /// assert_eq!(rx.recv().unwrap(), 1);
    /// ```
    pub fn try_send(&self, value: T) -> Result<(), TrySendError<T>> {
        if !self.gate.enter() {
            return Err(TrySendError::Closed(value));
        }

        let result = match self.input.try_send(Envelope::Item(value)) {
            Ok(()) => Ok(()),
            Err(cb::TrySendError::Full(envelope)) => {
                Err(TrySendError::Full(envelope.into_item()))
            }
            Err(cb::TrySendError::Disconnected(envelope)) => {
                Err(TrySendError::Closed(envelope.into_item()))
            }
        };

        self.leave();
        result
    }

    /// Closes the queue for every clone of this sender.
    ///
    /// Items already accepted are delivered before receivers observe the
    /// close. Calling `close` more than once, from any clone, is a no-op.
    ///
    /// May wait briefly for room in the input handoff to enqueue the close
    /// marker.
    pub fn close(&self) {
        match self.gate.close() {
            Close::Signal => {
                debug!("elastic queue closed");
                self.signal_close();
            }
            Close::Deferred => debug!("elastic queue closed, waiting on in-flight sends"),
            Close::AlreadyClosed => {}
        }
    }

    /// Returns `true` once [`close`](Sender::close) has been called on any
    /// clone.
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_elastic::channel;
    ///
    /// let (tx, _rx) = channel::<i32>();
    /// let tx2 = tx.clone();
    /// assert!(!tx2.is_closed());
    ///
    /// tx.close();
    /// assert!(tx2.is_closed());
    /// ```
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.gate.is_closed()
    }

    /// Returns the capacity of the input handoff.
    ///
    /// This bounds how many sends can complete before the worker runs, not
    /// how many items the queue holds.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn leave(&self) {
        if self.gate.leave() {
            debug!("last in-flight send finished, signalling close");
            self.signal_close();
        }
    }

    fn signal_close(&self) {
        // The worker is already gone if every receiver was dropped.
        let _ = self.input.send(Envelope::Close);
    }
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            input: self.input.clone(),
            gate: Arc::clone(&self.gate),
            capacity: self.capacity,
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("capacity", &self.capacity())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Receiver
// ============================================================================

/// The receiving half of an elastic queue.
///
/// Cloning a `Receiver` adds another consumer; each item is delivered to
/// exactly one of them.
///
/// # Example
///
/// ```
/// use nexus_elastic::channel;
/// use std::thread;
///
/// let (tx, rx) = channel::<i32>();
///
/// thread::spawn(move || {
///     tx.send(42).unwrap();
/// });
///
/// assert_eq!(rx.recv().unwrap(), 42);
/// ```
pub struct Receiver<T> {
    output: cb::Receiver<T>,
    capacity: usize,
}

impl<T> Receiver<T> {
    /// Receives a message, blocking until one is available.
    ///
    /// # Errors
    ///
    /// Returns `Err(RecvError)` once the queue is closed and every accepted
    /// item has been received. From then on it returns immediately.
    pub fn recv(&self) -> Result<T, RecvError> {
        self.output.recv().map_err(|cb::RecvError| RecvError)
    }

    /// Attempts to receive a message without blocking.
    ///
    /// # Errors
    ///
    /// - `Err(TryRecvError::Empty)` if nothing is ready on the output handoff
    /// - `Err(TryRecvError::Closed)` if the queue is closed and drained
    ///
    /// # Example
    ///
    /// ```
    /// use nexus_elastic::{channel, TryRecvError};
    ///
    /// let (tx, rx) = channel::<i32>();
    /// assert_eq!(rx.try_recv(), Err(TryRecvError::Empty));
    ///
    /// drop(tx);
    /// // The worker closes the output shortly after.
    /// while rx.try_recv() == Err(TryRecvError::Empty) {
    ///     std::thread::yield_now();
    /// }
    /// assert_eq!(rx.try_recv(), Err(TryRecvError::Closed));
    /// ```
    pub fn try_recv(&self) -> Result<T, TryRecvError> {
        self.output.try_recv().map_err(|err| match err {
            cb::TryRecvError::Empty => TryRecvError::Empty,
            cb::TryRecvError::Disconnected => TryRecvError::Closed,
        })
    }

    /// Returns a blocking iterator that ends when the queue is closed and
    /// drained.
    pub const fn iter(&self) -> Iter<'_, T> {
        Iter { receiver: self }
    }

    /// Returns an iterator over the items ready on the output handoff right
    /// now, without blocking.
    pub const fn try_iter(&self) -> TryIter<'_, T> {
        TryIter { receiver: self }
    }

    /// Returns the number of items ready on the output handoff.
    ///
    /// Items still held by the worker are not counted.
    #[inline]
    pub fn len(&self) -> usize {
        self.output.len()
    }

    /// Returns `true` if nothing is ready on the output handoff.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.output.is_empty()
    }

    /// Returns the capacity of the output handoff.
    #[inline]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            output: self.output.clone(),
            capacity: self.capacity,
        }
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("capacity", &self.capacity())
            .field("ready", &self.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Iterators
// ============================================================================

/// Blocking iterator returned by [`Receiver::iter`].
#[derive(Debug)]
pub struct Iter<'a, T> {
    receiver: &'a Receiver<T>,
}

impl<T> Iterator for Iter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

/// Non-blocking iterator returned by [`Receiver::try_iter`].
#[derive(Debug)]
pub struct TryIter<'a, T> {
    receiver: &'a Receiver<T>,
}

impl<T> Iterator for TryIter<'_, T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.receiver.try_recv().ok()
    }
}

/// Owning blocking iterator, from `Receiver::into_iter`.
#[derive(Debug)]
pub struct IntoIter<T> {
    receiver: Receiver<T>,
}

impl<T> Iterator for IntoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

impl<'a, T> IntoIterator for &'a Receiver<T> {
    type Item = T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T> IntoIterator for Receiver<T> {
    type Item = T;
    type IntoIter = IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        IntoIter { receiver: self }
    }
}
