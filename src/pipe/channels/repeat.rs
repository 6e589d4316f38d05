use futures::StreamExt;

use crate::pipe::buffer::{Buffer, Source};
use crate::pipe::chan::Channel;

/// Stores up to `limit` of the input's output and replays it to new
/// readers. `0` allows concurrent readers without any replay (later
/// readers only share future values), `1` replays the most recent value
/// (store semantics), [`crate::REPLAY_ALL`] replays everything.
///
/// Closes when the input closes; rejects when the input rejects.
pub fn repeat<T>(input: &Channel<T>, limit: usize) -> Channel<T>
where
	T: Clone + 'static,
{
	Channel::from_buffer(Buffer::with_source(
		Source::Stream(input.reader().boxed_local()),
		limit,
	))
}
