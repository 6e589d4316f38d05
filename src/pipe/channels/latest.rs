use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use fxhash::FxHashMap;

use crate::pipe::chan::{Channel, Reader};
use crate::pipe::ChannelError;

struct LatestStream<T>
where
	T: Clone + 'static,
{
	readers: Vec<Option<Reader<T>>>,
	slots: Vec<Option<T>>,
}

impl<T> Stream for LatestStream<T>
where
	T: Clone + Unpin + 'static,
{
	type Item = Result<Vec<T>, ChannelError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		loop {
			let mut progressed = false;
			for index in 0..this.readers.len() {
				let Some(reader) = this.readers[index].as_mut() else {
					continue;
				};
				match Pin::new(reader).poll_next(cx) {
					Poll::Ready(Some(Ok(value))) => {
						progressed = true;
						this.slots[index] = Some(value);
						if this.slots.iter().all(Option::is_some) {
							let snapshot = this
								.slots
								.iter()
								.map(|slot| slot.clone().unwrap())
								.collect();
							return Poll::Ready(Some(Ok(snapshot)));
						}
					}
					Poll::Ready(Some(Err(error))) => {
						this.readers.iter_mut().for_each(|slot| *slot = None);
						return Poll::Ready(Some(Err(error)));
					}
					Poll::Ready(None) => {
						progressed = true;
						this.readers[index] = None;
					}
					Poll::Pending => {}
				}
			}
			if this.readers.iter().all(Option::is_none) {
				return Poll::Ready(None);
			}
			if !progressed {
				return Poll::Pending;
			}
		}
	}
}

/// Emits a positional snapshot of the most recent value from every input
/// each time any input produces one, but only once every input has
/// reported at least once. Closes when all inputs close; fails fast on the
/// first error.
pub fn latest<T>(inputs: &[Channel<T>]) -> Channel<Vec<T>>
where
	T: Clone + Unpin + 'static,
{
	Channel::from_try_stream(LatestStream {
		readers: inputs.iter().map(|input| Some(input.reader())).collect(),
		slots: vec![None; inputs.len()],
	})
}

/// Like [`latest`], but snapshots are keyed maps.
pub fn latest_named<T>(inputs: &[(&'static str, Channel<T>)]) -> Channel<FxHashMap<&'static str, T>>
where
	T: Clone + Unpin + 'static,
{
	let names: Vec<&'static str> = inputs.iter().map(|(name, _)| *name).collect();
	let channels: Vec<Channel<T>> = inputs.iter().map(|(_, input)| input.clone()).collect();
	latest(&channels).map(move |snapshot| {
		names
			.iter()
			.copied()
			.zip(snapshot)
			.collect::<FxHashMap<_, _>>()
	})
}

struct Latest2Stream<A, B>
where
	A: Clone + 'static,
	B: Clone + 'static,
{
	left: Option<Reader<A>>,
	right: Option<Reader<B>>,
	left_slot: Option<A>,
	right_slot: Option<B>,
}

impl<A, B> Stream for Latest2Stream<A, B>
where
	A: Clone + Unpin + 'static,
	B: Clone + Unpin + 'static,
{
	type Item = Result<(A, B), ChannelError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		loop {
			let mut progressed = false;
			let mut fresh = false;

			if let Some(reader) = this.left.as_mut() {
				match Pin::new(reader).poll_next(cx) {
					Poll::Ready(Some(Ok(value))) => {
						progressed = true;
						fresh = true;
						this.left_slot = Some(value);
					}
					Poll::Ready(Some(Err(error))) => {
						this.left = None;
						this.right = None;
						return Poll::Ready(Some(Err(error)));
					}
					Poll::Ready(None) => {
						progressed = true;
						this.left = None;
					}
					Poll::Pending => {}
				}
			}

			if !fresh {
				if let Some(reader) = this.right.as_mut() {
					match Pin::new(reader).poll_next(cx) {
						Poll::Ready(Some(Ok(value))) => {
							progressed = true;
							fresh = true;
							this.right_slot = Some(value);
						}
						Poll::Ready(Some(Err(error))) => {
							this.left = None;
							this.right = None;
							return Poll::Ready(Some(Err(error)));
						}
						Poll::Ready(None) => {
							progressed = true;
							this.right = None;
						}
						Poll::Pending => {}
					}
				}
			}

			if fresh {
				if let (Some(left), Some(right)) = (&this.left_slot, &this.right_slot) {
					return Poll::Ready(Some(Ok((left.clone(), right.clone()))));
				}
				continue;
			}
			if this.left.is_none() && this.right.is_none() {
				return Poll::Ready(None);
			}
			if !progressed {
				return Poll::Pending;
			}
		}
	}
}

/// Heterogeneous two-channel [`latest`], emitting tuple snapshots.
pub fn latest2<A, B>(left: &Channel<A>, right: &Channel<B>) -> Channel<(A, B)>
where
	A: Clone + Unpin + 'static,
	B: Clone + Unpin + 'static,
{
	Channel::from_try_stream(Latest2Stream {
		left: Some(left.reader()),
		right: Some(right.reader()),
		left_slot: None,
		right_slot: None,
	})
}
