use std::cell::{Cell, RefCell};
use std::hash::Hash;
use std::rc::{Rc, Weak};

use fxhash::{FxHashMap, FxHashSet};

use crate::reactor::atom::Atom;
use crate::reactor::reactor::Reactor;
use crate::reactor::revision::Revision;
use crate::reactor::{ChangeSet, Track};

/// Tracked collections: explicit wrappers over the native collections that
/// call `accessed`/`changed` around their own method bodies. Entry reads
/// track per-entry atoms; structural operations (adding or removing
/// entries) change the collection itself, so whole-collection readers see
/// shape changes while entry readers only see their entry.

pub struct TrackedMap<K, V>
where
	K: Hash + Eq + 'static,
	V: Hash + 'static,
{
	body: Rc<MapBody<K, V>>,
}

struct MapBody<K, V>
where
	K: Hash + Eq + 'static,
	V: Hash + 'static,
{
	reactor: Reactor,
	entries: RefCell<FxHashMap<K, Atom<V>>>,
	changed: Cell<Revision>,
	this: Weak<MapBody<K, V>>,
}

impl<K, V> Clone for TrackedMap<K, V>
where
	K: Hash + Eq,
	V: Hash,
{
	fn clone(&self) -> Self {
		TrackedMap {
			body: self.body.clone(),
		}
	}
}

impl<K, V> Default for TrackedMap<K, V>
where
	K: Hash + Eq,
	V: Hash,
{
	fn default() -> Self {
		TrackedMap::new()
	}
}

impl<K, V> TrackedMap<K, V>
where
	K: Hash + Eq + 'static,
	V: Hash + 'static,
{
	pub fn new() -> Self {
		Self::new_in(&Reactor::current())
	}

	pub fn new_in(reactor: &Reactor) -> Self {
		TrackedMap {
			body: Rc::new_cyclic(|this| MapBody {
				reactor: reactor.clone(),
				entries: RefCell::new(FxHashMap::default()),
				changed: Cell::new(Revision::NEVER),
				this: this.clone(),
			}),
		}
	}

	/// Sets an entry. Writing an existing key only touches that entry's
	/// atom; adding a key changes the map itself.
	pub fn insert(&self, key: K, value: V) {
		let existing = self.body.entries.borrow().get(&key).cloned();
		match existing {
			Some(atom) => atom.set(value),
			None => {
				self.body
					.entries
					.borrow_mut()
					.insert(key, Atom::new_in(&self.body.reactor, value));
				self.body.record_change();
			}
		}
	}

	pub fn get(&self, key: &K) -> Option<V>
	where
		V: Clone,
	{
		self.body.track_access();
		let atom = self.body.entries.borrow().get(key).cloned();
		atom.map(|atom| atom.get().clone())
	}

	pub fn remove(&self, key: &K) -> bool {
		let removed = self.body.entries.borrow_mut().remove(key).is_some();
		if removed {
			self.body.record_change();
		}
		removed
	}

	pub fn contains_key(&self, key: &K) -> bool {
		self.body.track_access();
		self.body.entries.borrow().contains_key(key)
	}

	pub fn len(&self) -> usize {
		self.body.track_access();
		self.body.entries.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		self.body.entries.borrow_mut().clear();
		self.body.record_change();
	}

	pub fn keys(&self) -> Vec<K>
	where
		K: Clone,
	{
		self.body.track_access();
		self.body.entries.borrow().keys().cloned().collect()
	}

	/// Snapshot of the whole map. Reads every entry, so readers depend on
	/// both the shape and every value.
	pub fn entries(&self) -> Vec<(K, V)>
	where
		K: Clone,
		V: Clone,
	{
		self.body.track_access();
		self.body
			.entries
			.borrow()
			.iter()
			.map(|(key, atom)| (key.clone(), atom.get().clone()))
			.collect()
	}
}

impl<K, V> MapBody<K, V>
where
	K: Hash + Eq + 'static,
	V: Hash + 'static,
{
	fn track_access(&self) {
		let this = self.this.upgrade().expect("map body gone") as Rc<dyn Track>;
		self.reactor.accessed(this);
	}

	fn record_change(&self) {
		let rev = self.reactor.changed(self.this.clone() as Weak<dyn Track>);
		self.changed.set(rev);
		self.reactor.schedule();
	}
}

impl<K, V> Track for MapBody<K, V>
where
	K: Hash + Eq + 'static,
	V: Hash + 'static,
{
	fn validate(&self, as_of: Revision, _changes: Option<&ChangeSet>) -> bool {
		self.changed.get() <= as_of
	}
}

impl<K, V> Drop for MapBody<K, V>
where
	K: Hash + Eq + 'static,
	V: Hash + 'static,
{
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn Track>;
		self.reactor.release(&this);
	}
}

pub struct TrackedSet<T>
where
	T: Hash + Eq + 'static,
{
	body: Rc<SetBody<T>>,
}

struct SetBody<T>
where
	T: Hash + Eq + 'static,
{
	reactor: Reactor,
	items: RefCell<FxHashSet<T>>,
	changed: Cell<Revision>,
	this: Weak<SetBody<T>>,
}

impl<T> Clone for TrackedSet<T>
where
	T: Hash + Eq,
{
	fn clone(&self) -> Self {
		TrackedSet {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for TrackedSet<T>
where
	T: Hash + Eq,
{
	fn default() -> Self {
		TrackedSet::new()
	}
}

impl<T> TrackedSet<T>
where
	T: Hash + Eq + 'static,
{
	pub fn new() -> Self {
		Self::new_in(&Reactor::current())
	}

	pub fn new_in(reactor: &Reactor) -> Self {
		TrackedSet {
			body: Rc::new_cyclic(|this| SetBody {
				reactor: reactor.clone(),
				items: RefCell::new(FxHashSet::default()),
				changed: Cell::new(Revision::NEVER),
				this: this.clone(),
			}),
		}
	}

	pub fn insert(&self, item: T) -> bool {
		let added = self.body.items.borrow_mut().insert(item);
		if added {
			self.body.record_change();
		}
		added
	}

	pub fn remove(&self, item: &T) -> bool {
		let removed = self.body.items.borrow_mut().remove(item);
		if removed {
			self.body.record_change();
		}
		removed
	}

	pub fn contains(&self, item: &T) -> bool {
		self.body.track_access();
		self.body.items.borrow().contains(item)
	}

	pub fn len(&self) -> usize {
		self.body.track_access();
		self.body.items.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		self.body.items.borrow_mut().clear();
		self.body.record_change();
	}

	pub fn to_vec(&self) -> Vec<T>
	where
		T: Clone,
	{
		self.body.track_access();
		self.body.items.borrow().iter().cloned().collect()
	}
}

impl<T> SetBody<T>
where
	T: Hash + Eq + 'static,
{
	fn track_access(&self) {
		let this = self.this.upgrade().expect("set body gone") as Rc<dyn Track>;
		self.reactor.accessed(this);
	}

	fn record_change(&self) {
		let rev = self.reactor.changed(self.this.clone() as Weak<dyn Track>);
		self.changed.set(rev);
		self.reactor.schedule();
	}
}

impl<T> Track for SetBody<T>
where
	T: Hash + Eq + 'static,
{
	fn validate(&self, as_of: Revision, _changes: Option<&ChangeSet>) -> bool {
		self.changed.get() <= as_of
	}
}

impl<T> Drop for SetBody<T>
where
	T: Hash + Eq + 'static,
{
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn Track>;
		self.reactor.release(&this);
	}
}

pub struct TrackedVec<T>
where
	T: Hash + 'static,
{
	body: Rc<VecBody<T>>,
}

struct VecBody<T>
where
	T: Hash + 'static,
{
	reactor: Reactor,
	items: RefCell<Vec<Atom<T>>>,
	changed: Cell<Revision>,
	this: Weak<VecBody<T>>,
}

impl<T> Clone for TrackedVec<T>
where
	T: Hash,
{
	fn clone(&self) -> Self {
		TrackedVec {
			body: self.body.clone(),
		}
	}
}

impl<T> Default for TrackedVec<T>
where
	T: Hash,
{
	fn default() -> Self {
		TrackedVec::new()
	}
}

impl<T> TrackedVec<T>
where
	T: Hash + 'static,
{
	pub fn new() -> Self {
		Self::new_in(&Reactor::current())
	}

	pub fn new_in(reactor: &Reactor) -> Self {
		TrackedVec {
			body: Rc::new_cyclic(|this| VecBody {
				reactor: reactor.clone(),
				items: RefCell::new(Vec::new()),
				changed: Cell::new(Revision::NEVER),
				this: this.clone(),
			}),
		}
	}

	pub fn push(&self, value: T) {
		self.body
			.items
			.borrow_mut()
			.push(Atom::new_in(&self.body.reactor, value));
		self.body.record_change();
	}

	pub fn pop(&self) -> bool {
		let popped = self.body.items.borrow_mut().pop().is_some();
		if popped {
			self.body.record_change();
		}
		popped
	}

	pub fn get(&self, index: usize) -> Option<T>
	where
		T: Clone,
	{
		self.body.track_access();
		let atom = self.body.items.borrow().get(index).cloned();
		atom.map(|atom| atom.get().clone())
	}

	/// Writes one element in place; only readers of that element are
	/// invalidated.
	pub fn set(&self, index: usize, value: T) -> bool {
		let atom = self.body.items.borrow().get(index).cloned();
		match atom {
			Some(atom) => {
				atom.set(value);
				true
			}
			None => false,
		}
	}

	pub fn remove(&self, index: usize) -> bool {
		let mut items = self.body.items.borrow_mut();
		if index >= items.len() {
			return false;
		}
		items.remove(index);
		drop(items);
		self.body.record_change();
		true
	}

	pub fn len(&self) -> usize {
		self.body.track_access();
		self.body.items.borrow().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn clear(&self) {
		self.body.items.borrow_mut().clear();
		self.body.record_change();
	}

	pub fn to_vec(&self) -> Vec<T>
	where
		T: Clone,
	{
		self.body.track_access();
		self.body
			.items
			.borrow()
			.iter()
			.map(|atom| atom.get().clone())
			.collect()
	}
}

impl<T> VecBody<T>
where
	T: Hash + 'static,
{
	fn track_access(&self) {
		let this = self.this.upgrade().expect("vec body gone") as Rc<dyn Track>;
		self.reactor.accessed(this);
	}

	fn record_change(&self) {
		let rev = self.reactor.changed(self.this.clone() as Weak<dyn Track>);
		self.changed.set(rev);
		self.reactor.schedule();
	}
}

impl<T> Track for VecBody<T>
where
	T: Hash + 'static,
{
	fn validate(&self, as_of: Revision, _changes: Option<&ChangeSet>) -> bool {
		self.changed.get() <= as_of
	}
}

impl<T> Drop for VecBody<T>
where
	T: Hash + 'static,
{
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn Track>;
		self.reactor.release(&this);
	}
}
