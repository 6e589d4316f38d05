use std::fmt::{self, Debug};
use std::hash::Hash;
use std::ops::Deref;

/// A value paired with its fxhash. The hash is the unit of change
/// detection: two values with equal hashes are treated as the same state.
pub struct Hashed<T> {
	pub value: T,
	pub hash: u64,
}

impl<T> Hashed<T> {
	pub fn new(value: T) -> Self
	where
		T: Hash,
	{
		let hash = fxhash::hash64(&value);
		Hashed { value, hash }
	}
}

impl<T> Deref for Hashed<T> {
	type Target = T;

	fn deref(&self) -> &Self::Target {
		&self.value
	}
}

impl<T> Debug for Hashed<T>
where
	T: Debug,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		self.value.fmt(f)
	}
}

/// Compares a freshly produced value against the prior one and keeps the
/// prior when both hash the same, so downstream values never observe a
/// change that isn't one. Returns the surviving value and whether it
/// actually differs from the prior.
pub fn reuse<T: Hash>(next: T, prior: Option<Hashed<T>>) -> (Hashed<T>, bool) {
	let next = Hashed::new(next);
	match prior {
		Some(prior) if prior.hash == next.hash => (prior, false),
		_ => (next, true),
	}
}

#[cfg(test)]
mod tests {
	use super::reuse;
	use super::Hashed;

	#[test]
	fn keeps_prior_on_equal_state() {
		let prior = Hashed::new(vec![1, 2, 3]);
		let (kept, changed) = reuse(vec![1, 2, 3], Some(prior));
		assert!(!changed);
		assert_eq!(*kept, vec![1, 2, 3]);

		let (next, changed) = reuse(vec![1, 2], Some(kept));
		assert!(changed);
		assert_eq!(*next, vec![1, 2]);
	}
}
