use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;

use crate::pipe::chan::{Channel, Reader};
use crate::pipe::ChannelError;

/// Per-value transform that may skip. The closure returning `None` means
/// "no output for this input"; it is the sentinel behind `map`, `filter`,
/// and `dedup` alike. Close and error pass through unchanged.
struct SieveStream<T, U>
where
	T: Clone + 'static,
{
	reader: Reader<T>,
	func: Box<dyn FnMut(T) -> Option<U>>,
}

impl<T, U> Stream for SieveStream<T, U>
where
	T: Clone + 'static,
{
	type Item = Result<U, ChannelError>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();
		loop {
			match Pin::new(&mut this.reader).poll_next(cx) {
				Poll::Ready(Some(Ok(value))) => match (this.func)(value) {
					Some(out) => return Poll::Ready(Some(Ok(out))),
					None => continue,
				},
				Poll::Ready(Some(Err(error))) => return Poll::Ready(Some(Err(error))),
				Poll::Ready(None) => return Poll::Ready(None),
				Poll::Pending => return Poll::Pending,
			}
		}
	}
}

fn sieve<T, U>(input: &Channel<T>, func: Box<dyn FnMut(T) -> Option<U>>) -> Channel<U>
where
	T: Clone + 'static,
	U: Clone + 'static,
{
	Channel::from_try_stream(SieveStream {
		reader: input.reader(),
		func,
	})
}

/// Transforms every value of the input channel.
pub fn map<T, U, F>(input: &Channel<T>, mut func: F) -> Channel<U>
where
	T: Clone + 'static,
	U: Clone + 'static,
	F: FnMut(T) -> U + 'static,
{
	sieve(input, Box::new(move |value| Some(func(value))))
}

/// Keeps only values matching the predicate.
pub fn filter<T, F>(input: &Channel<T>, mut func: F) -> Channel<T>
where
	T: Clone + 'static,
	F: FnMut(&T) -> bool + 'static,
{
	sieve(
		input,
		Box::new(move |value| if func(&value) { Some(value) } else { None }),
	)
}

/// Transform with skipping: a `None` return drops the input.
pub fn filter_map<T, U, F>(input: &Channel<T>, func: F) -> Channel<U>
where
	T: Clone + 'static,
	U: Clone + 'static,
	F: FnMut(T) -> Option<U> + 'static,
{
	sieve(input, Box::new(func))
}

/// Skips values equal to the previously emitted one.
pub fn dedup<T>(input: &Channel<T>) -> Channel<T>
where
	T: Clone + PartialEq + 'static,
{
	let mut prior: Option<T> = None;
	sieve(
		input,
		Box::new(move |value| {
			if prior.as_ref() == Some(&value) {
				return None;
			}
			prior = Some(value.clone());
			Some(value)
		}),
	)
}
