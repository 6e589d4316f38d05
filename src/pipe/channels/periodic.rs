use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use tokio::time::{sleep_until, Instant, Sleep};

use crate::pipe::chan::Channel;

struct PeriodicStream {
	period: Duration,
	count: u64,
	next_at: Option<Instant>,
	sleep: Option<Pin<Box<Sleep>>>,
}

impl Stream for PeriodicStream {
	type Item = u64;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();

		// lazy start: the clock begins on first read
		let Some(next_at) = this.next_at else {
			this.next_at = Some(Instant::now() + this.period);
			return Poll::Ready(Some(0));
		};

		loop {
			if Instant::now() >= next_at {
				this.count += 1;
				this.next_at = Some(next_at + this.period);
				this.sleep = None;
				return Poll::Ready(Some(this.count));
			}
			let sleep = this
				.sleep
				.get_or_insert_with(|| Box::pin(sleep_until(next_at)));
			match sleep.as_mut().poll(cx) {
				Poll::Ready(()) => {
					this.sleep = None;
				}
				Poll::Pending => return Poll::Pending,
			}
		}
	}
}

/// Emits an incrementing counter once per `period`. Nothing runs until the
/// first read; a reader that pauses and resumes catches up in a tight
/// burst of the missed ticks, then waits for true time again.
pub fn periodic(period: Duration) -> Channel<u64> {
	Channel::from_stream(PeriodicStream {
		period,
		count: 0,
		next_at: None,
		sleep: None,
	})
}
