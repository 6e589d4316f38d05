use std::cell::RefCell;
use std::collections::BTreeMap;
use std::hash::Hash;

use crate::reactor::computed::{ComputeFn, Computed};
use crate::reactor::reactor::Reactor;

/// Explicit registry of computed values keyed by a caller-supplied stable
/// key. Entries live until the owner releases them; nothing is evicted
/// behind the caller's back.
pub struct Memo<K, T>
where
	K: Ord + 'static,
	T: Hash + 'static,
{
	reactor: Reactor,
	entries: RefCell<BTreeMap<K, Computed<T>>>,
}

impl<K, T> Memo<K, T>
where
	K: Ord + 'static,
	T: Hash + 'static,
{
	pub fn new() -> Self {
		Self::new_in(&Reactor::current())
	}

	pub fn new_in(reactor: &Reactor) -> Self {
		Memo {
			reactor: reactor.clone(),
			entries: RefCell::new(BTreeMap::new()),
		}
	}

	/// Returns the cached computed value for `key`, creating it with `make`
	/// on first use. The same key always yields the same instance.
	pub fn get_or_insert(&self, key: K, make: impl FnOnce() -> ComputeFn<T>) -> Computed<T> {
		let mut entries = self.entries.borrow_mut();
		entries
			.entry(key)
			.or_insert_with(|| Computed::new_in(&self.reactor, make()))
			.clone()
	}

	pub fn contains(&self, key: &K) -> bool {
		self.entries.borrow().contains_key(key)
	}

	/// Drops the entry for `key`. Must be called by the owner when the
	/// keyed object goes away.
	pub fn release(&self, key: &K) -> bool {
		self.entries.borrow_mut().remove(key).is_some()
	}

	pub fn clear(&self) {
		self.entries.borrow_mut().clear();
	}

	pub fn len(&self) -> usize {
		self.entries.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.borrow().is_empty()
	}
}

impl<K, T> Default for Memo<K, T>
where
	K: Ord + 'static,
	T: Hash + 'static,
{
	fn default() -> Self {
		Memo::new()
	}
}
