use std::cell::RefCell;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll};

use futures::channel::oneshot;
use futures::Stream;

use crate::pipe::chan::{Channel, Reader};
use crate::pipe::queue::Queue;
use crate::pipe::{ChannelError, Writable};

/// A state transition. Returning `None` leaves the state untouched and
/// emits nothing.
pub type Action<S> = Box<dyn FnOnce(&S) -> Option<S>>;

/// Actions travel through the queue in shared single-take cells so the
/// queue stays cloneable while each action runs exactly once.
type ActionCell<S> = Rc<RefCell<Option<Action<S>>>>;

struct StateStream<S>
where
	S: Clone + 'static,
{
	reader: Reader<ActionCell<S>>,
	value: S,
	seeded: bool,
}

impl<S> Stream for StateStream<S>
where
	S: Clone + Unpin + 'static,
{
	type Item = Result<S, ChannelError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		if !this.seeded {
			this.seeded = true;
			return Poll::Ready(Some(Ok(this.value.clone())));
		}
		loop {
			match Pin::new(&mut this.reader).poll_next(cx) {
				Poll::Ready(Some(Ok(cell))) => {
					let action = cell.borrow_mut().take();
					let Some(action) = action else {
						continue;
					};
					match action(&this.value) {
						Some(next) => {
							this.value = next;
							return Poll::Ready(Some(Ok(this.value.clone())));
						}
						None => continue,
					}
				}
				Poll::Ready(Some(Err(error))) => return Poll::Ready(Some(Err(error))),
				Poll::Ready(None) => return Poll::Ready(None),
				Poll::Pending => return Poll::Pending,
			}
		}
	}
}

/// A shared store: a queue of state transitions folded over a seed value,
/// replayed with depth one so every new reader immediately sees the
/// current value and then all future transitions. Transitions run lazily,
/// in order, driven by whoever reads the output.
pub struct State<S>
where
	S: Clone + 'static,
{
	actions: Queue<ActionCell<S>>,
	output: Channel<S>,
}

impl<S> Clone for State<S>
where
	S: Clone + 'static,
{
	fn clone(&self) -> Self {
		State {
			actions: self.actions.clone(),
			output: self.output.clone(),
		}
	}
}

/// Builds a [`State`] seeded with `seed`. The seed is the first value any
/// reader attached from the start observes.
pub fn state<S>(seed: S) -> State<S>
where
	S: Clone + Unpin + 'static,
{
	let actions: Queue<ActionCell<S>> = Queue::new();
	let output = Channel::from_try_stream(StateStream {
		reader: actions.reader(),
		value: seed,
		seeded: false,
	})
	.remember(1);
	State { actions, output }
}

impl<S> State<S>
where
	S: Clone + 'static,
{
	/// The store as a readable channel of state values.
	pub fn channel(&self) -> Channel<S> {
		self.output.clone()
	}

	pub fn reader(&self) -> Reader<S> {
		self.output.reader()
	}

	/// Queues a transition. Returns false once the store is closed.
	pub fn put(&self, action: impl FnOnce(&S) -> Option<S> + 'static) -> bool {
		self.actions
			.put(Rc::new(RefCell::new(Some(Box::new(action) as Action<S>))))
	}

	/// Queues a plain replacement value.
	pub fn set(&self, value: S) -> bool {
		self.put(move |_| Some(value))
	}

	/// Like [`State::put`], but resolves once the transition has run,
	/// yielding the state it produced. Note that transitions only run
	/// while someone reads the store.
	pub fn update(
		&self,
		action: impl FnOnce(&S) -> Option<S> + 'static,
	) -> impl std::future::Future<Output = Result<S, ChannelError>> {
		let (sender, receiver) = oneshot::channel();
		let accepted = self.put(move |prior| {
			let next = action(prior);
			let seen = next.clone().unwrap_or_else(|| prior.clone());
			let _ = sender.send(seen);
			next
		});
		async move {
			if !accepted {
				return Err(ChannelError::new("state is closed"));
			}
			receiver
				.await
				.map_err(|_| ChannelError::new("state closed before the update ran"))
		}
	}

	pub fn writable(&self) -> bool {
		self.actions.writable()
	}

	/// Closes the store; readers finish after draining queued transitions.
	pub fn close(&self) {
		self.actions.close();
	}

	/// Rejects the store; readers observe the error after draining queued
	/// transitions ahead of it.
	pub fn error(&self, reason: impl Into<ChannelError>) {
		self.actions.error(reason);
	}
}
