use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::{FutureExt, Stream, StreamExt};

use crate::pipe::buffer::{Buffer, Cursor, Source};
use crate::pipe::channels;
use crate::pipe::ChannelError;

/// Canonical handle to a channel: a logical ordered sequence of values
/// terminated by a normal close or an error. Iterators, collections,
/// futures, and streams all normalize into one of these; cloning the
/// handle shares the same underlying instance, so a stateful one-shot
/// source is never silently duplicated.
pub struct Channel<T>
where
	T: Clone + 'static,
{
	repr: Repr<T>,
}

enum Repr<T>
where
	T: Clone + 'static,
{
	/// Shared history; all readers observe one production sequence.
	Buffer(Buffer<T>),

	/// Repeatable collection; every reader runs a fresh iteration.
	Collection(Rc<dyn Fn() -> Box<dyn Iterator<Item = T>>>),
}

impl<T> Clone for Channel<T>
where
	T: Clone + 'static,
{
	fn clone(&self) -> Self {
		Channel {
			repr: match &self.repr {
				Repr::Buffer(buffer) => Repr::Buffer(buffer.clone()),
				Repr::Collection(factory) => Repr::Collection(factory.clone()),
			},
		}
	}
}

impl<T> Channel<T>
where
	T: Clone + 'static,
{
	pub(crate) fn from_buffer(buffer: Buffer<T>) -> Self {
		Channel {
			repr: Repr::Buffer(buffer),
		}
	}

	/// A channel over a re-iterable collection. Each reader re-runs the
	/// iteration, so iterating twice completes fully both times.
	pub fn from_collection<C>(collection: C) -> Self
	where
		C: IntoIterator<Item = T> + Clone + 'static,
	{
		Channel {
			repr: Repr::Collection(Rc::new(move || {
				Box::new(collection.clone().into_iter()) as Box<dyn Iterator<Item = T>>
			})),
		}
	}

	/// A channel over a one-shot iterator. Readers share a single pass;
	/// once drained, later readers see an already-closed channel.
	pub fn from_iter<I>(iter: I) -> Self
	where
		I: IntoIterator<Item = T>,
		I::IntoIter: 'static,
	{
		Self::from_buffer(Buffer::with_source(
			Source::Iter(Box::new(iter.into_iter())),
			0,
		))
	}

	/// A single-value channel: resolves once, yields the value, then
	/// closes.
	pub fn from_future<F>(future: F) -> Self
	where
		F: Future<Output = T> + 'static,
	{
		Self::from_try_future(future.map(Ok::<T, ChannelError>))
	}

	/// Like [`Channel::from_future`], but a rejection becomes the sticky
	/// terminal error, re-observed by every reader.
	pub fn from_try_future<F, E>(future: F) -> Self
	where
		F: Future<Output = Result<T, E>> + 'static,
		E: Into<ChannelError>,
	{
		Self::from_buffer(Buffer::with_source(
			Source::Future(future.map(|result| result.map_err(Into::into)).boxed_local()),
			0,
		))
	}

	pub fn from_stream<S>(stream: S) -> Self
	where
		S: Stream<Item = T> + 'static,
	{
		Self::from_try_stream(stream.map(Ok::<T, ChannelError>))
	}

	pub fn from_try_stream<S, E>(stream: S) -> Self
	where
		S: Stream<Item = Result<T, E>> + 'static,
		E: Into<ChannelError>,
	{
		Self::from_buffer(Buffer::with_source(
			Source::Stream(
				stream
					.map(|result| result.map_err(Into::into))
					.boxed_local(),
			),
			0,
		))
	}

	/// Sets how many recent values are replayed to new readers: `0` none,
	/// `1` the latest, [`crate::REPLAY_ALL`] everything. Chainable.
	pub fn remember(self, limit: usize) -> Self {
		if let Repr::Buffer(buffer) = &self.repr {
			buffer.remember(limit);
		}
		self
	}

	/// An independent reading cursor. Implements [`Stream`].
	pub fn reader(&self) -> Reader<T> {
		Reader {
			repr: match &self.repr {
				Repr::Buffer(buffer) => ReaderRepr::Cursor(buffer.cursor()),
				Repr::Collection(factory) => ReaderRepr::Iter(factory()),
			},
			done: false,
		}
	}

	/// The first value a fresh reader would observe, or `None` when the
	/// channel closes without one.
	pub async fn first(&self) -> Result<Option<T>, ChannelError> {
		match self.reader().next().await {
			Some(Ok(value)) => Ok(Some(value)),
			Some(Err(error)) => Err(error),
			None => Ok(None),
		}
	}

	/// Drains a fresh reader into a vector.
	pub async fn collect(&self) -> Result<Vec<T>, ChannelError> {
		let mut reader = self.reader();
		let mut out = Vec::new();
		while let Some(step) = reader.next().await {
			out.push(step?);
		}
		Ok(out)
	}

	// ..........................
	// COMBINATORS
	//

	/// Per-value transform. Close and error pass through unchanged.
	pub fn map<U, F>(&self, func: F) -> Channel<U>
	where
		U: Clone + 'static,
		F: FnMut(T) -> U + 'static,
	{
		channels::map(self, func)
	}

	/// Keeps only values matching the predicate.
	pub fn filter<F>(&self, func: F) -> Channel<T>
	where
		F: FnMut(&T) -> bool + 'static,
	{
		channels::filter(self, func)
	}

	/// Transform that may skip: a `None` return produces no output for
	/// that input.
	pub fn filter_map<U, F>(&self, func: F) -> Channel<U>
	where
		U: Clone + 'static,
		F: FnMut(T) -> Option<U> + 'static,
	{
		channels::filter_map(self, func)
	}

	/// Stateful left fold emitting the accumulator after each accepted
	/// input. A `None` return skips the input without emitting or touching
	/// the accumulator.
	pub fn fold<S, F>(&self, seed: S, func: F) -> Channel<S>
	where
		S: Clone + Unpin + 'static,
		F: FnMut(&S, T) -> Option<S> + 'static,
	{
		channels::fold(self, seed, func)
	}

	/// Collects the input into a growing vector, emitted per input.
	pub fn append(&self) -> Channel<Vec<T>>
	where
		T: Unpin,
	{
		channels::append(self)
	}

	/// Skips values equal to the previously emitted one.
	pub fn dedup(&self) -> Channel<T>
	where
		T: PartialEq,
	{
		channels::dedup(self)
	}

	/// At most one output per turn, always the most recent value seen.
	pub fn debounce(&self) -> Channel<T>
	where
		T: Unpin,
	{
		channels::debounce(self)
	}

	/// Replays up to `limit` of this channel's output to new readers.
	pub fn repeat(&self, limit: usize) -> Channel<T> {
		channels::repeat(self, limit)
	}
}

impl<T> From<Vec<T>> for Channel<T>
where
	T: Clone + 'static,
{
	fn from(values: Vec<T>) -> Self {
		Channel::from_collection(values)
	}
}

/// A reading cursor over a channel, usable as a [`Stream`] of results.
/// Fused: after the terminal step it keeps returning `None`. An error is
/// yielded once per reader; attach a fresh reader to re-observe it.
pub struct Reader<T>
where
	T: Clone + 'static,
{
	repr: ReaderRepr<T>,
	done: bool,
}

enum ReaderRepr<T>
where
	T: Clone + 'static,
{
	Cursor(Cursor<T>),
	Iter(Box<dyn Iterator<Item = T>>),
}

impl<T> Stream for Reader<T>
where
	T: Clone + 'static,
{
	type Item = Result<T, ChannelError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		if this.done {
			return Poll::Ready(None);
		}
		match &mut this.repr {
			ReaderRepr::Iter(iter) => match iter.next() {
				Some(value) => Poll::Ready(Some(Ok(value))),
				None => {
					this.done = true;
					Poll::Ready(None)
				}
			},
			ReaderRepr::Cursor(cursor) => match cursor.poll_step(cx) {
				Poll::Ready(Ok(Some(value))) => Poll::Ready(Some(Ok(value))),
				Poll::Ready(Ok(None)) => {
					this.done = true;
					Poll::Ready(None)
				}
				Poll::Ready(Err(error)) => {
					this.done = true;
					Poll::Ready(Some(Err(error)))
				}
				Poll::Pending => Poll::Pending,
			},
		}
	}
}

