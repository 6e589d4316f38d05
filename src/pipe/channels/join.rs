use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::pipe::chan::{Channel, Reader};
use crate::pipe::ChannelError;

struct JoinStream<T>
where
	T: Clone + 'static,
{
	readers: Vec<Option<Reader<T>>>,

	/// Next input polled first, rotated for fairness.
	rotate: usize,
}

impl<T> Stream for JoinStream<T>
where
	T: Clone + 'static,
{
	type Item = Result<T, ChannelError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		let len = this.readers.len();

		for offset in 0..len {
			let index = (this.rotate + offset) % len;
			let Some(reader) = this.readers[index].as_mut() else {
				continue;
			};
			match Pin::new(reader).poll_next(cx) {
				Poll::Ready(Some(Ok(value))) => {
					this.rotate = (index + 1) % len;
					return Poll::Ready(Some(Ok(value)));
				}
				Poll::Ready(Some(Err(error))) => {
					// first error wins; remaining output is discarded
					this.readers.iter_mut().for_each(|slot| *slot = None);
					return Poll::Ready(Some(Err(error)));
				}
				Poll::Ready(None) => {
					this.readers[index] = None;
				}
				Poll::Pending => {}
			}
		}

		if this.readers.iter().all(Option::is_none) {
			Poll::Ready(None)
		} else {
			Poll::Pending
		}
	}
}

/// Fans the input channels into one stream, emitting values in the order
/// they are produced. An input that closes leaves the race; the join
/// closes when every input has. The first error from any input rejects the
/// whole join.
pub fn join<T>(inputs: &[Channel<T>]) -> Channel<T>
where
	T: Clone + 'static,
{
	Channel::from_try_stream(JoinStream {
		readers: inputs.iter().map(|input| Some(input.reader())).collect(),
		rotate: 0,
	})
}
