//! The relay thread between the input and output handoffs.
//!
//! ```text
//! send() ──> input ──> [ worker: Overflow (unbounded) ] ──> output ──> recv()
//!           bounded                                        bounded
//! ```
//!
//! While the overflow holds anything, the worker races "push head to output"
//! against "pull from input" with a [`Select`]. When several operations are
//! ready `Select` picks one at random, so neither side starves the other.
//!
//! ```text
//! Running ──(input closed, overflow non-empty)──> Draining ──> Closed
//!    └──────────(input closed, overflow empty)────────────────────┘
//! ```

use crossbeam_channel::{Receiver, Select, SendError, Sender};
use tracing::{debug, trace, warn};

use crate::overflow::Overflow;

/// What travels on the input handoff.
pub(crate) enum Envelope<T> {
    Item(T),
    /// Pushed once, behind every admitted item.
    Close,
}

impl<T> Envelope<T> {
    /// Recovers the item from an envelope that failed to send.
    pub(crate) fn into_item(self) -> T {
        match self {
            Self::Item(item) => item,
            Self::Close => unreachable!("close marker returned from an item send"),
        }
    }
}

pub(crate) struct Worker<T> {
    input: Receiver<Envelope<T>>,
    output: Sender<T>,
    overflow: Overflow<T>,
}

/// How a relay pass over a non-empty overflow ended.
enum Relay {
    Emptied,
    InputClosed,
    OutputGone,
}

/// How the worker terminated.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Exit {
    /// Every admitted item was delivered and the output closed.
    Closed,
    /// All receivers were dropped; this many items were discarded.
    Abandoned(usize),
}

impl<T> Worker<T> {
    pub(crate) fn new(
        input: Receiver<Envelope<T>>,
        output: Sender<T>,
        overflow: Overflow<T>,
    ) -> Self {
        Self {
            input,
            output,
            overflow,
        }
    }

    /// Runs until the input closes or every receiver is gone.
    ///
    /// Dropping `self` on return closes the output handoff (receivers see
    /// disconnection once drained) and the input handoff (pending sends fail).
    pub(crate) fn run(self) -> Exit {
        let Self {
            input,
            output,
            mut overflow,
        } = self;

        debug!(
            input_capacity = input.capacity(),
            output_capacity = output.capacity(),
            overflow_capacity = overflow.capacity(),
            "elastic worker started"
        );

        let mut sel = Select::new();
        let send_op = sel.send(&output);
        sel.recv(&input);

        let exit = loop {
            match input.recv() {
                Ok(Envelope::Item(item)) => overflow.push_back(item),
                Ok(Envelope::Close) | Err(_) => break Exit::Closed,
            }

            match relay(&mut sel, send_op, &input, &output, &mut overflow) {
                Relay::Emptied => {}
                Relay::InputClosed => break drain(&output, &mut overflow),
                Relay::OutputGone => break Exit::Abandoned(overflow.len()),
            }

            let peak = overflow.capacity();
            if overflow.recycle() {
                trace!(
                    peak,
                    capacity = overflow.capacity(),
                    "overflow recycled after burst"
                );
            }
        };

        match exit {
            Exit::Closed => debug!("elastic worker closed"),
            Exit::Abandoned(discarded) => {
                warn!(discarded, "all receivers dropped, discarding buffered items");
            }
        }
        exit
    }
}

/// Moves items until the overflow empties or either side closes.
fn relay<T>(
    sel: &mut Select<'_>,
    send_op: usize,
    input: &Receiver<Envelope<T>>,
    output: &Sender<T>,
    overflow: &mut Overflow<T>,
) -> Relay {
    while let Some(head) = overflow.pop_front() {
        let oper = sel.select();
        if oper.index() == send_op {
            if let Err(SendError(head)) = oper.send(output, head) {
                overflow.push_front(head);
                return Relay::OutputGone;
            }
        } else {
            overflow.push_front(head);
            match oper.recv(input) {
                Ok(Envelope::Item(item)) => overflow.push_back(item),
                Ok(Envelope::Close) | Err(_) => return Relay::InputClosed,
            }
        }
    }
    Relay::Emptied
}

/// Delivers everything still buffered, in order.
fn drain<T>(output: &Sender<T>, overflow: &mut Overflow<T>) -> Exit {
    debug_assert!(!overflow.is_empty());
    debug!(remaining = overflow.len(), "input closed, draining overflow");

    let mut items = overflow.drain();
    for item in items.by_ref() {
        if output.send(item).is_err() {
            return Exit::Abandoned(items.len() + 1);
        }
    }
    Exit::Closed
}
