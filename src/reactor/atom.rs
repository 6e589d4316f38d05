use std::cell::{Cell, Ref, RefCell};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::rc::{Rc, Weak};

use crate::reactor::reactor::Reactor;
use crate::reactor::reuse::Hashed;
use crate::reactor::revision::Revision;
use crate::reactor::{ChangeSet, Track};

/// A single mutable tracked cell. Reading records an access against the
/// atom; writing records a change unless the new value hashes the same as
/// the current one.
pub struct Atom<T: 'static> {
	body: Rc<AtomBody<T>>,
}

impl<T: 'static> Clone for Atom<T> {
	fn clone(&self) -> Self {
		Atom {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct AtomBody<T: 'static> {
	reactor: Reactor,
	value: RefCell<Option<Hashed<T>>>,
	changed: Cell<Revision>,
	this: Weak<AtomBody<T>>,
}

impl<T> Atom<T>
where
	T: 'static,
{
	pub fn new(value: T) -> Self
	where
		T: Hash,
	{
		Self::new_in(&Reactor::current(), value)
	}

	pub fn new_in(reactor: &Reactor, value: T) -> Self
	where
		T: Hash,
	{
		Self::build(reactor, Some(Hashed::new(value)))
	}

	/// An atom with no value yet. Reads go through [`Atom::get_or`] until
	/// the first `set`.
	pub fn empty() -> Self {
		Self::empty_in(&Reactor::current())
	}

	pub fn empty_in(reactor: &Reactor) -> Self {
		Self::build(reactor, None)
	}

	fn build(reactor: &Reactor, value: Option<Hashed<T>>) -> Self {
		Atom {
			body: Rc::new_cyclic(|this| AtomBody {
				reactor: reactor.clone(),
				value: RefCell::new(value),
				changed: Cell::new(Revision::NEVER),
				this: this.clone(),
			}),
		}
	}

	/// Current value. Panics if the atom was created empty and never set;
	/// use [`Atom::get_or`] for that case.
	pub fn get(&self) -> Ref<'_, T> {
		self.body.track_access();
		Ref::map(self.body.value.borrow(), |slot| {
			&slot.as_ref().expect("atom has no value").value
		})
	}

	pub fn try_get(&self) -> Option<Ref<'_, T>> {
		self.body.track_access();
		let slot = self.body.value.borrow();
		if slot.is_none() {
			return None;
		}
		Some(Ref::map(slot, |slot| &slot.as_ref().unwrap().value))
	}

	/// Current value, or `default` when the atom was never set.
	pub fn get_or(&self, default: T) -> T
	where
		T: Clone,
	{
		self.body.track_access();
		match &*self.body.value.borrow() {
			Some(slot) => slot.value.clone(),
			None => default,
		}
	}

	pub fn set(&self, value: T)
	where
		T: Hash,
	{
		let _ = self.body.replace(value);
	}

	/// Stores `value` and returns the prior one. Records a change only when
	/// the state actually differs.
	pub fn replace(&self, value: T) -> Option<T>
	where
		T: Hash,
	{
		self.body.replace(value)
	}

	/// Mutates the value in place; a change is recorded only if the hash
	/// moved.
	pub fn update(&self, func: impl FnOnce(&mut T))
	where
		T: Hash,
	{
		self.body.update(func)
	}

	/// Derived value computed from this atom.
	pub fn map<F, R>(&self, func: F) -> crate::reactor::computed::Computed<R>
	where
		F: Fn(&T) -> R + 'static,
		R: Hash + 'static,
		T: Hash,
	{
		let this = self.clone();
		crate::reactor::computed::Computed::new_in(
			&self.body.reactor,
			Box::new(move |_| func(&this.get())),
		)
	}

	/// Weak handle usable with the reactor's graph queries.
	pub fn as_track(&self) -> Weak<dyn Track> {
		self.body.this.clone() as Weak<dyn Track>
	}
}

impl<T> Default for Atom<T>
where
	T: Default + Hash + 'static,
{
	fn default() -> Self {
		Atom::new(T::default())
	}
}

impl<T> AtomBody<T>
where
	T: 'static,
{
	fn track_access(&self) {
		let this = self.this.upgrade().expect("atom body gone") as Rc<dyn Track>;
		self.reactor.accessed(this);
	}

	fn replace(&self, value: T) -> Option<T>
	where
		T: Hash,
	{
		let next = Hashed::new(value);
		let hash = next.hash;
		let prior = self.value.borrow_mut().replace(next);
		let moved = prior.as_ref().map_or(true, |p| p.hash != hash);
		if moved {
			self.record_change();
		}
		prior.map(|p| p.value)
	}

	fn update(&self, func: impl FnOnce(&mut T))
	where
		T: Hash,
	{
		let moved = {
			let mut slot = self.value.borrow_mut();
			let slot = slot.as_mut().expect("atom has no value");
			func(&mut slot.value);
			let hash = fxhash::hash64(&slot.value);
			if slot.hash != hash {
				slot.hash = hash;
				true
			} else {
				false
			}
		};
		if moved {
			self.record_change();
		}
	}

	fn record_change(&self) {
		let rev = self.reactor.changed(self.this.clone() as Weak<dyn Track>);
		self.changed.set(rev);
		self.reactor.schedule();
	}
}

impl<T> Track for AtomBody<T>
where
	T: 'static,
{
	fn validate(&self, as_of: Revision, _changes: Option<&ChangeSet>) -> bool {
		self.changed.get() <= as_of
	}
}

impl<T: 'static> Drop for AtomBody<T> {
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn Track>;
		self.reactor.release(&this);
	}
}

impl<T: 'static> Hash for Atom<T> {
	fn hash<H: Hasher>(&self, state: &mut H) {
		match &*self.body.value.borrow() {
			Some(slot) => state.write_u64(slot.hash),
			None => state.write_u64(0),
		}
	}
}

impl<T> Debug for Atom<T>
where
	T: Debug + 'static,
{
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &*self.body.value.borrow() {
			Some(slot) => slot.value.fmt(f),
			None => f.write_str("<empty>"),
		}
	}
}
