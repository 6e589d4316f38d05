pub mod channels;
pub mod queue;

mod buffer;
mod chan;
mod item;

pub use chan::{Channel, Reader};

use std::rc::Rc;

use thiserror::Error;

/// Replay depth that retains the full history. With `0` no history is kept
/// (event-emitter semantics) and with `1` only the most recent value is
/// replayed to new readers (store semantics).
pub const REPLAY_ALL: usize = usize::MAX;

/// Terminal failure of a channel. Cheap to clone; every reader that reaches
/// the point of failure re-observes the same error.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("{reason}")]
pub struct ChannelError {
	reason: Rc<str>,
}

impl ChannelError {
	pub fn new(reason: impl Into<Rc<str>>) -> Self {
		ChannelError {
			reason: reason.into(),
		}
	}

	pub fn reason(&self) -> &str {
		&self.reason
	}
}

impl From<&str> for ChannelError {
	fn from(reason: &str) -> Self {
		ChannelError::new(reason)
	}
}

impl From<String> for ChannelError {
	fn from(reason: String) -> Self {
		ChannelError::new(reason)
	}
}

/// One resolved step of a channel: a value, a normal close, or an error.
pub(crate) type Step<T> = Result<Option<T>, ChannelError>;

/// Capability of channels that accept writes.
pub trait Writable<T> {
	/// False once the channel reached a terminal step.
	fn writable(&self) -> bool;

	/// Appends a value. Returns false when the channel is no longer
	/// writable; the value is dropped in that case.
	fn put(&self, value: T) -> bool;

	/// Terminates the channel normally.
	fn close(&self);

	/// Terminates the channel with an error that every reader will
	/// re-observe.
	fn fail(&self, error: ChannelError);
}
