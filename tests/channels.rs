use std::time::Duration;

use futures::{stream, StreamExt};
use reflow::{
	join, latest, latest2, latest_named, periodic, queue, Channel, ChannelError, Writable,
};

#[tokio::test]
async fn map_transforms_every_value() {
	let ch = Channel::from_collection(vec![1, 2, 3]);
	assert_eq!(ch.map(|n| n * 10).collect().await.unwrap(), vec![10, 20, 30]);
}

#[tokio::test]
async fn filter_keeps_matching_values() {
	let ch = Channel::from_collection(vec![1, 2, 3, 4, 5]);
	assert_eq!(
		ch.filter(|n| n % 2 == 1).collect().await.unwrap(),
		vec![1, 3, 5]
	);
}

#[tokio::test]
async fn filter_map_skips_on_none() {
	let ch = Channel::from_collection(vec![1, 2, 3, 4]);
	let out = ch
		.filter_map(|n| if n % 2 == 0 { Some(n * 100) } else { None })
		.collect()
		.await
		.unwrap();
	assert_eq!(out, vec![200, 400]);
}

#[tokio::test]
async fn fold_emits_the_accumulator_per_accepted_input() {
	let ch = Channel::from_collection(vec![1, 2, 3, 4]);
	let sums = ch
		.fold(0, |acc, n| if n == 3 { None } else { Some(acc + n) })
		.collect()
		.await
		.unwrap();
	// 3 is skipped entirely: no emission, accumulator untouched
	assert_eq!(sums, vec![1, 3, 7]);
}

#[tokio::test]
async fn append_collects_growing_snapshots() {
	let ch = Channel::from_collection(vec![1, 2, 3]);
	assert_eq!(
		ch.append().collect().await.unwrap(),
		vec![vec![1], vec![1, 2], vec![1, 2, 3]]
	);
}

#[tokio::test]
async fn dedup_skips_consecutive_duplicates() {
	let ch = Channel::from_collection(vec![1, 1, 2, 2, 2, 1]);
	assert_eq!(ch.dedup().collect().await.unwrap(), vec![1, 2, 1]);
}

#[tokio::test]
async fn errors_pass_through_transforms() {
	let ch: Channel<i32> = Channel::from_try_stream(stream::iter(vec![
		Ok(1),
		Ok(2),
		Err(ChannelError::new("bad")),
	]));
	assert_eq!(ch.map(|n| n + 1).collect().await, Err(ChannelError::new("bad")));
}

#[tokio::test]
async fn debounce_collapses_synchronous_bursts() {
	let q = queue::<i32>();
	q.put(1);
	q.put(2);
	q.put(3);

	let debounced = q.channel().debounce();
	let mut reader = debounced.reader();
	assert_eq!(reader.next().await, Some(Ok(3)));

	q.put(4);
	q.put(5);
	assert_eq!(reader.next().await, Some(Ok(5)));

	q.close();
	assert_eq!(reader.next().await, None);
}

#[tokio::test]
async fn debounce_flushes_before_the_error_surfaces() {
	let q = queue::<i32>();
	q.put(1);
	q.put(2);
	q.error("late");

	let debounced = q.channel().debounce();
	let mut reader = debounced.reader();
	assert_eq!(reader.next().await, Some(Ok(2)));
	assert_eq!(reader.next().await, Some(Err(ChannelError::new("late"))));
	assert_eq!(reader.next().await, None);
}

#[tokio::test]
async fn join_merges_in_arrival_order_and_closes() {
	let a = Channel::from_collection(vec![1, 3]);
	let b = Channel::from_collection(vec![2, 4]);
	let joined = join(&[a, b]);
	assert_eq!(joined.collect().await.unwrap(), vec![1, 2, 3, 4]);
}

#[tokio::test(start_paused = true)]
async fn join_emits_in_production_order_and_fails_fast() {
	let a: Channel<i32> = Channel::from_try_stream(stream::unfold(0, |step| async move {
		match step {
			0 => Some((Ok(1), 1)),
			1 => {
				tokio::time::sleep(Duration::from_millis(10)).await;
				Some((Ok(2), 2))
			}
			2 => Some((Err(ChannelError::new("boom")), 3)),
			_ => None,
		}
	}));
	let b: Channel<i32> = Channel::from_stream(stream::unfold(0, |step| async move {
		match step {
			0 => Some((10, 1)),
			1 => {
				tokio::time::sleep(Duration::from_millis(15)).await;
				Some((20, 2))
			}
			_ => None,
		}
	}));

	let mut reader = join(&[a, b]).reader();
	let mut seen = Vec::new();
	let mut failure = None;
	while let Some(step) = reader.next().await {
		match step {
			Ok(value) => seen.push(value),
			Err(error) => failure = Some(error),
		}
	}

	// interleaved in time order; b's last value is discarded by the failure
	assert_eq!(seen, vec![1, 10, 2]);
	assert_eq!(failure, Some(ChannelError::new("boom")));
}

#[tokio::test]
async fn latest_waits_for_all_inputs_before_snapshotting() {
	let qa = queue::<i32>();
	let qb = queue::<i32>();
	let ch = latest(&[qa.channel(), qb.channel()]);
	let mut reader = ch.reader();

	qa.put(1);
	qb.put(10);
	assert_eq!(reader.next().await, Some(Ok(vec![1, 10])));

	qa.put(2);
	assert_eq!(reader.next().await, Some(Ok(vec![2, 10])));

	qa.close();
	qb.close();
	assert_eq!(reader.next().await, None);
}

#[tokio::test]
async fn latest2_pairs_heterogeneous_channels() {
	let numbers = queue::<i32>();
	let labels = queue::<&'static str>();
	let ch = latest2(&numbers.channel(), &labels.channel());
	let mut reader = ch.reader();

	numbers.put(1);
	labels.put("one");
	assert_eq!(reader.next().await, Some(Ok((1, "one"))));

	labels.put("two");
	assert_eq!(reader.next().await, Some(Ok((1, "two"))));

	numbers.close();
	labels.close();
	assert_eq!(reader.next().await, None);
}

#[tokio::test]
async fn latest_named_snapshots_by_key() {
	let qa = queue::<i32>();
	let qb = queue::<i32>();
	let ch = latest_named(&[("left", qa.channel()), ("right", qb.channel())]);
	let mut reader = ch.reader();

	qa.put(1);
	qb.put(2);
	let snapshot = reader.next().await.unwrap().unwrap();
	assert_eq!(snapshot["left"], 1);
	assert_eq!(snapshot["right"], 2);
}

#[tokio::test(start_paused = true)]
async fn periodic_ticks_lazily_and_catches_up() {
	let ch = periodic(Duration::from_millis(100));
	let mut reader = ch.reader();

	assert_eq!(reader.next().await, Some(Ok(0)));
	assert_eq!(reader.next().await, Some(Ok(1)));
	assert_eq!(reader.next().await, Some(Ok(2)));

	// stop reading for a few periods
	tokio::time::sleep(Duration::from_millis(350)).await;

	// missed ticks arrive in a burst without waiting
	let burst_started = tokio::time::Instant::now();
	assert_eq!(reader.next().await, Some(Ok(3)));
	assert_eq!(reader.next().await, Some(Ok(4)));
	assert_eq!(reader.next().await, Some(Ok(5)));
	assert_eq!(burst_started.elapsed(), Duration::ZERO);

	// caught up: the next tick waits for true time again
	assert_eq!(reader.next().await, Some(Ok(6)));
	assert!(burst_started.elapsed() >= Duration::from_millis(50));
}
