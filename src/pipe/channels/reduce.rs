use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::pipe::chan::{Channel, Reader};
use crate::pipe::ChannelError;

struct FoldStream<T, S>
where
	T: Clone + 'static,
{
	reader: Reader<T>,
	state: S,
	func: Box<dyn FnMut(&S, T) -> Option<S>>,
}

impl<T, S> Stream for FoldStream<T, S>
where
	T: Clone + 'static,
	S: Clone + Unpin + 'static,
{
	type Item = Result<S, ChannelError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		loop {
			match Pin::new(&mut this.reader).poll_next(cx) {
				Poll::Ready(Some(Ok(value))) => match (this.func)(&this.state, value) {
					Some(next) => {
						this.state = next;
						return Poll::Ready(Some(Ok(this.state.clone())));
					}
					// skip: no emission, accumulator untouched
					None => continue,
				},
				Poll::Ready(Some(Err(error))) => return Poll::Ready(Some(Err(error))),
				Poll::Ready(None) => return Poll::Ready(None),
				Poll::Pending => return Poll::Pending,
			}
		}
	}
}

/// Stateful left fold over a channel, like `Iterator::fold` except one
/// accumulator value is emitted per accepted input. The reducer returning
/// `None` skips the input entirely.
pub fn fold<T, S, F>(input: &Channel<T>, seed: S, func: F) -> Channel<S>
where
	T: Clone + 'static,
	S: Clone + Unpin + 'static,
	F: FnMut(&S, T) -> Option<S> + 'static,
{
	Channel::from_try_stream(FoldStream {
		reader: input.reader(),
		state: seed,
		func: Box::new(func),
	})
}

/// Collects every value into a growing vector, emitted once per input.
pub fn append<T>(input: &Channel<T>) -> Channel<Vec<T>>
where
	T: Clone + Unpin + 'static,
{
	fold(input, Vec::new(), |prior, next| {
		let mut out = prior.clone();
		out.push(next);
		Some(out)
	})
}
