use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::pipe::chan::{Channel, Reader};
use crate::pipe::ChannelError;

enum Tail {
	Live,
	/// Input terminated; emit the held value first, then the terminal.
	Closing(Option<ChannelError>),
	Done,
}

struct DebounceStream<T>
where
	T: Clone + 'static,
{
	reader: Reader<T>,
	latest: Option<T>,
	tail: Tail,
}

impl<T> Stream for DebounceStream<T>
where
	T: Clone + Unpin + 'static,
{
	type Item = Result<T, ChannelError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		loop {
			match &mut this.tail {
				Tail::Live => {}
				Tail::Closing(error) => {
					let error = error.take();
					this.tail = Tail::Done;
					return match error {
						Some(error) => Poll::Ready(Some(Err(error))),
						None => Poll::Ready(None),
					};
				}
				Tail::Done => return Poll::Ready(None),
			}

			match Pin::new(&mut this.reader).poll_next(cx) {
				// drain everything available this turn, keep the newest
				Poll::Ready(Some(Ok(value))) => {
					this.latest = Some(value);
				}
				Poll::Ready(Some(Err(error))) => {
					this.tail = Tail::Closing(Some(error));
					if let Some(value) = this.latest.take() {
						return Poll::Ready(Some(Ok(value)));
					}
				}
				Poll::Ready(None) => {
					this.tail = Tail::Closing(None);
					if let Some(value) = this.latest.take() {
						return Poll::Ready(Some(Ok(value)));
					}
				}
				Poll::Pending => {
					return match this.latest.take() {
						Some(value) => Poll::Ready(Some(Ok(value))),
						None => Poll::Pending,
					};
				}
			}
		}
	}
}

/// Emits at most one value per turn of the consumer: everything available
/// in one synchronous stretch collapses to the most recent value. The held
/// value is flushed before a close or error surfaces.
pub fn debounce<T>(input: &Channel<T>) -> Channel<T>
where
	T: Clone + Unpin + 'static,
{
	Channel::from_try_stream(DebounceStream {
		reader: input.reader(),
		latest: None,
		tail: Tail::Live,
	})
}
