use thiserror::Error;

/// Error returned by [`Sender::send`](crate::Sender::send) once the queue is
/// closed.
///
/// Contains the message that could not be sent, allowing recovery of the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("elastic queue closed")]
pub struct SendError<T>(pub T);

impl<T> SendError<T> {
    /// Returns the message that could not be sent.
    pub fn into_inner(self) -> T {
        self.0
    }
}

/// Error returned by [`Receiver::recv`](crate::Receiver::recv).
///
/// The queue was closed and every item admitted before the close has already
/// been received. Further calls keep returning this error without blocking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("elastic queue closed and drained")]
pub struct RecvError;

/// Error returned by [`Sender::try_send`](crate::Sender::try_send).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TrySendError<T> {
    /// The input handoff is full. Only the handoff is bounded; the message
    /// will be accepted once the worker pulls from it.
    #[error("elastic queue input full")]
    Full(T),

    /// The queue is closed.
    #[error("elastic queue closed")]
    Closed(T),
}

impl<T> TrySendError<T> {
    /// Returns the message that could not be sent.
    pub fn into_inner(self) -> T {
        match self {
            Self::Full(v) | Self::Closed(v) => v,
        }
    }

    /// Returns `true` if this error is the `Full` variant.
    pub const fn is_full(&self) -> bool {
        matches!(self, Self::Full(_))
    }

    /// Returns `true` if this error is the `Closed` variant.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

impl<T> From<SendError<T>> for TrySendError<T> {
    fn from(err: SendError<T>) -> Self {
        Self::Closed(err.0)
    }
}

/// Error returned by [`Receiver::try_recv`](crate::Receiver::try_recv).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TryRecvError {
    /// Nothing is ready on the output handoff yet.
    #[error("elastic queue empty")]
    Empty,

    /// The queue is closed and drained.
    #[error("elastic queue closed and drained")]
    Closed,
}

impl TryRecvError {
    /// Returns `true` if this error is the `Empty` variant.
    pub const fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns `true` if this error is the `Closed` variant.
    pub const fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl From<RecvError> for TryRecvError {
    fn from(_: RecvError) -> Self {
        Self::Closed
    }
}
