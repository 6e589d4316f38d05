use crate::pipe::buffer::Buffer;
use crate::pipe::chan::{Channel, Reader};
use crate::pipe::{ChannelError, Writable};

/// A writable FIFO queue that is also a channel. Values put while no
/// reader is waiting are kept as history (full replay by default), so a
/// reader attached later still drains everything in producer order.
pub struct Queue<T>
where
	T: Clone + 'static,
{
	buffer: Buffer<T>,
}

impl<T> Clone for Queue<T>
where
	T: Clone + 'static,
{
	fn clone(&self) -> Self {
		Queue {
			buffer: self.buffer.clone(),
		}
	}
}

impl<T> Default for Queue<T>
where
	T: Clone + 'static,
{
	fn default() -> Self {
		Queue::new()
	}
}

impl<T> Queue<T>
where
	T: Clone + 'static,
{
	pub fn new() -> Self {
		Queue {
			buffer: Buffer::new(),
		}
	}

	/// The queue as a readable channel. Clones share this queue's history.
	pub fn channel(&self) -> Channel<T> {
		Channel::from_buffer(self.buffer.clone())
	}

	pub fn reader(&self) -> Reader<T> {
		self.channel().reader()
	}

	/// Adjusts the replay depth for readers attached from now on.
	pub fn remember(&self, limit: usize) -> &Self {
		self.buffer.remember(limit);
		self
	}

	/// Terminates the queue with an error; every reader reaching this
	/// point observes the same rejection.
	pub fn error(&self, reason: impl Into<ChannelError>) {
		self.buffer.fail(reason.into());
	}
}

impl<T> Writable<T> for Queue<T>
where
	T: Clone + 'static,
{
	fn writable(&self) -> bool {
		self.buffer.writable()
	}

	fn put(&self, value: T) -> bool {
		self.buffer.put(value)
	}

	fn close(&self) {
		self.buffer.close();
	}

	fn fail(&self, error: ChannelError) {
		self.buffer.fail(error);
	}
}

pub fn queue<T: Clone + 'static>() -> Queue<T> {
	Queue::new()
}
