use std::cell::{Cell, RefCell};
use std::future::Future;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::future::LocalBoxFuture;
use futures::stream::LocalBoxStream;
use futures::Stream;

use crate::pipe::item::Item;
use crate::pipe::{ChannelError, Step, REPLAY_ALL};

/// Pull source feeding a buffer. Writer-driven buffers (queues) have none.
pub(crate) enum Source<T> {
	/// Synchronous pull source; produces without suspending.
	Iter(Box<dyn Iterator<Item = T>>),

	/// Single-value asynchronous source.
	Future(LocalBoxFuture<'static, Result<T, ChannelError>>),

	/// Asynchronous pull source.
	Stream(LocalBoxStream<'static, Result<T, ChannelError>>),

	/// A single-shot source already produced its value.
	Drained,
}

/// The multi-reader FIFO/history workhorse. History is a persistent linked
/// list of items; every reader holds an independent cursor into it. The
/// buffer decides how much resolved history to replay to fresh readers
/// (`limit`), and readers that catch up to the production frontier suspend
/// on an "unput" placeholder until a producer or the source resolves it.
pub(crate) struct Buffer<T> {
	inner: Rc<BufferInner<T>>,
}

struct BufferInner<T> {
	/// Replay depth for fresh readers.
	limit: Cell<usize>,

	source: RefCell<Option<Source<T>>>,

	/// Oldest retained item, where fresh readers begin.
	start: RefCell<Option<Rc<Item<T>>>>,

	/// Newest item.
	top: RefCell<Option<Rc<Item<T>>>>,

	/// Oldest unresolved placeholder. Consumed by `put` in call order.
	unput: RefCell<Option<Rc<Item<T>>>>,

	/// Resolved replayable values between `start` and the frontier.
	replay: Cell<usize>,

	/// Sticky terminal step, set once by close or error.
	terminal: RefCell<Option<Step<T>>>,

	tokens: Cell<u64>,
}

impl<T> Clone for Buffer<T> {
	fn clone(&self) -> Self {
		Buffer {
			inner: self.inner.clone(),
		}
	}
}

enum Located<T> {
	Item(Rc<Item<T>>),
	Terminal(Step<T>),
	Frontier,
}

impl<T> Buffer<T>
where
	T: Clone + 'static,
{
	pub fn new() -> Self {
		Self::with_limit(REPLAY_ALL)
	}

	pub fn with_limit(limit: usize) -> Self {
		Self::build(None, limit)
	}

	pub fn with_source(source: Source<T>, limit: usize) -> Self {
		Self::build(Some(source), limit)
	}

	fn build(source: Option<Source<T>>, limit: usize) -> Self {
		Buffer {
			inner: Rc::new(BufferInner {
				limit: Cell::new(limit),
				source: RefCell::new(source),
				start: RefCell::new(None),
				top: RefCell::new(None),
				unput: RefCell::new(None),
				replay: Cell::new(0),
				terminal: RefCell::new(None),
				tokens: Cell::new(0),
			}),
		}
	}

	/// Adjusts the replay depth used for future pruning.
	pub fn remember(&self, limit: usize) {
		self.inner.limit.set(limit);
	}

	pub fn limit(&self) -> usize {
		self.inner.limit.get()
	}

	pub fn writable(&self) -> bool {
		self.inner.terminal.borrow().is_none()
	}

	pub fn put(&self, value: T) -> bool {
		self.put_step(Ok(Some(value)))
	}

	pub fn close(&self) -> bool {
		self.put_step(Ok(None))
	}

	pub fn fail(&self, error: ChannelError) -> bool {
		self.put_step(Err(error))
	}

	/// The write primitive. A value resolves the oldest unput placeholder
	/// if one exists, otherwise appends to history, except with a zero
	/// limit and no waiting reader, where it is dropped outright. Terminal
	/// steps seal the buffer. Returns false once sealed.
	pub(crate) fn put_step(&self, step: Step<T>) -> bool {
		let inner = &*self.inner;
		if inner.terminal.borrow().is_some() {
			tracing::debug!("write after terminal ignored");
			return false;
		}
		match step {
			Ok(Some(_)) => {
				let unput = inner.unput.borrow().clone();
				if let Some(item) = unput {
					*inner.unput.borrow_mut() = item.next();
					item.resolve(step);
					inner.replay.set(inner.replay.get() + 1);
				} else if inner.limit.get() == 0 {
					// fire-and-forget: history disabled, nobody waiting
				} else {
					self.append(Item::ready(step));
					inner.replay.set(inner.replay.get() + 1);
				}
			}
			terminal => self.finish(terminal),
		}
		true
	}

	/// Seals the buffer: the terminal step becomes sticky and the whole
	/// pending suffix resolves with it, waking every suspended reader.
	fn finish(&self, step: Step<T>) {
		let inner = &*self.inner;
		{
			let mut terminal = inner.terminal.borrow_mut();
			if terminal.is_some() {
				return;
			}
			*terminal = Some(step.clone());
		}
		tracing::trace!(ok = step.is_ok(), "channel terminal");
		let mut cursor = inner.unput.borrow_mut().take();
		while let Some(item) = cursor {
			let next = item.next();
			item.resolve(step.clone());
			cursor = next;
		}
	}

	fn append(&self, item: Rc<Item<T>>) {
		let inner = &*self.inner;
		let prior = inner.top.borrow_mut().replace(item.clone());
		if let Some(prior) = prior {
			prior.set_next(item.clone());
		}
		if inner.start.borrow().is_none() {
			*inner.start.borrow_mut() = Some(item);
		}
	}

	/// Moves the fresh-reader window forward per the replay limit. Never
	/// passes the unresolved frontier; terminal items do not count.
	fn prune(&self) {
		let inner = &*self.inner;
		let limit = inner.limit.get();
		if limit == 0 {
			if inner.replay.get() > 0 {
				tracing::trace!(dropped = inner.replay.get(), "history pruned");
			}
			let frontier = inner.unput.borrow().clone();
			*inner.start.borrow_mut() = frontier;
			inner.replay.set(0);
		} else {
			while inner.replay.get() > limit {
				let next = inner.start.borrow().as_ref().and_then(|item| item.next());
				*inner.start.borrow_mut() = next;
				inner.replay.set(inner.replay.get() - 1);
			}
		}
	}

	pub fn cursor(&self) -> Cursor<T> {
		let token = self.inner.tokens.get();
		self.inner.tokens.set(token + 1);
		Cursor {
			buffer: self.clone(),
			prior: None,
			waiting: None,
			token,
		}
	}

	/// The read primitive: where does a cursor go after `prior`?
	fn locate(&self, prior: Option<&Rc<Item<T>>>) -> Located<T> {
		let inner = &*self.inner;
		match prior {
			Some(prior) => match prior.next() {
				Some(next) => Located::Item(next),
				None => match inner.terminal.borrow().clone() {
					Some(step) => Located::Terminal(step),
					None => Located::Frontier,
				},
			},
			None => {
				self.prune();
				let start = inner.start.borrow().clone();
				match start {
					Some(item) => Located::Item(item),
					None => match inner.terminal.borrow().clone() {
						Some(step) => Located::Terminal(step),
						None => Located::Frontier,
					},
				}
			}
		}
	}

	/// Grows the frontier by one item. Synchronous sources resolve right
	/// away; asynchronous (or writer-driven) ones get an unput placeholder.
	/// Returns `None` when the source reached its terminal instead.
	fn advance(&self) -> Option<Rc<Item<T>>> {
		let inner = &*self.inner;
		let fetched = fetch_sync(&mut inner.source.borrow_mut());
		match fetched {
			Some(Ok(Some(value))) => {
				let item = Item::ready(Ok(Some(value)));
				self.append(item.clone());
				inner.replay.set(inner.replay.get() + 1);
				Some(item)
			}
			Some(step) => {
				self.finish(step);
				None
			}
			None => {
				let item = Item::pending();
				self.append(item.clone());
				let mut unput = self.inner.unput.borrow_mut();
				if unput.is_none() {
					*unput = Some(item.clone());
				}
				drop(unput);
				Some(item)
			}
		}
	}

	fn has_source(&self) -> bool {
		self.inner.source.borrow().is_some()
	}
}

/// Synchronous fetch for iterator-backed and drained sources.
fn fetch_sync<T>(slot: &mut Option<Source<T>>) -> Option<Step<T>> {
	match slot.as_mut() {
		Some(Source::Iter(iter)) => match iter.next() {
			Some(value) => Some(Ok(Some(value))),
			None => {
				*slot = Some(Source::Drained);
				Some(Ok(None))
			}
		},
		Some(Source::Drained) => Some(Ok(None)),
		_ => None,
	}
}

/// Polls an asynchronous source for its next step.
fn poll_source<T>(slot: &mut Option<Source<T>>, cx: &mut Context<'_>) -> Poll<Step<T>> {
	match slot.as_mut() {
		Some(Source::Future(future)) => match future.as_mut().poll(cx) {
			Poll::Ready(Ok(value)) => {
				*slot = Some(Source::Drained);
				Poll::Ready(Ok(Some(value)))
			}
			Poll::Ready(Err(error)) => {
				*slot = Some(Source::Drained);
				Poll::Ready(Err(error))
			}
			Poll::Pending => Poll::Pending,
		},
		Some(Source::Stream(stream)) => match stream.as_mut().poll_next(cx) {
			Poll::Ready(Some(Ok(value))) => Poll::Ready(Ok(Some(value))),
			Poll::Ready(Some(Err(error))) => Poll::Ready(Err(error)),
			Poll::Ready(None) => Poll::Ready(Ok(None)),
			Poll::Pending => Poll::Pending,
		},
		_ => Poll::Ready(Ok(None)),
	}
}

/// One reader's position in a buffer. Independent cursors share the same
/// immutable history backbone; values are observed in producer-call order
/// regardless of how many cursors exist or when each started.
pub(crate) struct Cursor<T> {
	buffer: Buffer<T>,
	prior: Option<Rc<Item<T>>>,
	waiting: Option<Rc<Item<T>>>,
	token: u64,
}

impl<T> Cursor<T>
where
	T: Clone + 'static,
{
	pub fn poll_step(&mut self, cx: &mut Context<'_>) -> Poll<Step<T>> {
		loop {
			let item = match &self.waiting {
				Some(item) => item.clone(),
				None => match self.buffer.locate(self.prior.as_ref()) {
					Located::Terminal(step) => return Poll::Ready(step),
					Located::Item(item) => item,
					Located::Frontier => match self.buffer.advance() {
						Some(item) => item,
						// the source went terminal; locate again
						None => continue,
					},
				},
			};

			if let Some(step) = item.step() {
				self.waiting = None;
				self.prior = Some(item);
				return Poll::Ready(step);
			}

			// unresolved: any waiter at the frontier may drive the source;
			// the last poller's waker wins and resolution wakes them all
			if self.buffer.has_source() {
				let polled = {
					let mut source = self.buffer.inner.source.borrow_mut();
					poll_source(&mut source, cx)
				};
				if let Poll::Ready(step) = polled {
					self.buffer.put_step(step);
					continue;
				}
			}

			item.park(self.token, cx.waker());
			self.waiting = Some(item);
			return Poll::Pending;
		}
	}
}

impl<T> Drop for Cursor<T> {
	fn drop(&mut self) {
		if let Some(item) = &self.waiting {
			// hand the source poll over to the remaining waiters
			item.unpark(self.token, true);
		}
	}
}

#[cfg(test)]
mod tests {
	use std::task::{Context, Poll};

	use futures::task::noop_waker;

	use super::{Buffer, Cursor};
	use crate::pipe::Step;

	fn poll<T: Clone + 'static>(cursor: &mut Cursor<T>) -> Poll<Step<T>> {
		let waker = noop_waker();
		let mut cx = Context::from_waker(&waker);
		cursor.poll_step(&mut cx)
	}

	#[test]
	fn replays_history_to_late_readers() {
		let buffer: Buffer<i32> = Buffer::new();
		buffer.put(1);
		buffer.put(2);
		buffer.close();

		let mut cursor = buffer.cursor();
		assert_eq!(poll(&mut cursor), Poll::Ready(Ok(Some(1))));
		assert_eq!(poll(&mut cursor), Poll::Ready(Ok(Some(2))));
		assert_eq!(poll(&mut cursor), Poll::Ready(Ok(None)));
	}

	#[test]
	fn zero_limit_drops_unobserved_values() {
		let buffer: Buffer<i32> = Buffer::with_limit(0);
		buffer.put(1);

		let mut cursor = buffer.cursor();
		assert_eq!(poll(&mut cursor), Poll::Pending);

		buffer.put(2);
		assert_eq!(poll(&mut cursor), Poll::Ready(Ok(Some(2))));
	}

	#[test]
	fn single_value_window_keeps_latest() {
		let buffer: Buffer<i32> = Buffer::with_limit(1);
		buffer.put(1);
		buffer.put(2);
		buffer.put(3);
		buffer.close();

		let mut cursor = buffer.cursor();
		assert_eq!(poll(&mut cursor), Poll::Ready(Ok(Some(3))));
		assert_eq!(poll(&mut cursor), Poll::Ready(Ok(None)));
	}

	#[test]
	fn puts_resolve_placeholders_in_call_order() {
		let buffer: Buffer<i32> = Buffer::with_limit(0);
		let mut first = buffer.cursor();
		let mut second = buffer.cursor();
		assert_eq!(poll(&mut first), Poll::Pending);
		assert_eq!(poll(&mut second), Poll::Pending);

		buffer.put(7);
		assert_eq!(poll(&mut first), Poll::Ready(Ok(Some(7))));
		assert_eq!(poll(&mut second), Poll::Ready(Ok(Some(7))));
	}

	#[test]
	fn sealed_buffers_reject_writes() {
		let buffer: Buffer<i32> = Buffer::new();
		assert!(buffer.put(1));
		buffer.fail("died".into());
		assert!(!buffer.put(2));
		assert!(!buffer.writable());
	}
}
