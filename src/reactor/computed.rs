use std::cell::{Cell, Ref, RefCell};
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::reactor::reactor::Reactor;
use crate::reactor::reuse::{reuse, Hashed};
use crate::reactor::revision::Revision;
use crate::reactor::{ChangeSet, Track};

/// Pure derivation over tracked inputs. Receives the prior value, if any.
pub type ComputeFn<T> = Box<dyn Fn(Option<&T>) -> T>;

/// A cached value derived from other tracked values. Recomputed lazily on
/// read when invalid; never walked by the flush pass.
pub struct Computed<T>
where
	T: Hash + 'static,
{
	body: Rc<ComputedBody<T>>,
}

impl<T> Clone for Computed<T>
where
	T: Hash,
{
	fn clone(&self) -> Self {
		Computed {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct ComputedBody<T>
where
	T: Hash + 'static,
{
	reactor: Reactor,
	func: ComputeFn<T>,
	value: RefCell<Option<Hashed<T>>>,

	/// Revision of the last recompute that produced a different value, or
	/// CONSTANT once a recompute captured no dependencies.
	computed: Cell<Revision>,

	/// Revision as of which the dependency walk last succeeded.
	validated: Cell<Revision>,

	this: Weak<ComputedBody<T>>,
}

impl<T> Computed<T>
where
	T: Hash + 'static,
{
	pub fn new(func: ComputeFn<T>) -> Self {
		Self::new_in(&Reactor::current(), func)
	}

	pub fn new_in(reactor: &Reactor, func: ComputeFn<T>) -> Self {
		Computed {
			body: Rc::new_cyclic(|this| ComputedBody {
				reactor: reactor.clone(),
				func,
				value: RefCell::new(None),
				computed: Cell::new(Revision::NEVER),
				validated: Cell::new(Revision::NEVER),
				this: this.clone(),
			}),
		}
	}

	/// Current value, recomputing first when invalid. Records an access
	/// against the computed value itself.
	///
	/// Staleness is judged against this value's own last-validated
	/// revision: the cached value survives exactly until one of its
	/// captured dependencies changes past that point.
	pub fn get(&self) -> Ref<'_, T> {
		self.body.track_access();
		let as_of = self.body.validated.get();
		if !self.body.validate(as_of, None) {
			self.body.recompute();
		}
		Ref::map(self.body.value.borrow(), |slot| {
			&slot.as_ref().expect("computed produced no value").value
		})
	}

	/// Forces the next access to recompute.
	pub fn invalidate(&self) {
		self.body.computed.set(Revision::NEVER);
		self.body.validated.set(Revision::NEVER);
		let this = self.body.this.clone() as Weak<dyn Track>;
		let _ = self.body.reactor.changed(this);
		self.body.reactor.schedule();
	}

	/// True when a recompute captured no dependencies and the value can
	/// never change again.
	pub fn is_constant(&self) -> bool {
		self.body.computed.get() == Revision::CONSTANT
	}

	pub(crate) fn validate(&self, as_of: Revision, changes: Option<&ChangeSet>) -> bool {
		self.body.validate(as_of, changes)
	}

	pub(crate) fn value_hash(&self) -> Option<u64> {
		self.body.value.borrow().as_ref().map(|slot| slot.hash)
	}

	/// Weak handle usable with the reactor's graph queries.
	pub fn as_track(&self) -> Weak<dyn Track> {
		self.body.this.clone() as Weak<dyn Track>
	}
}

impl<T> ComputedBody<T>
where
	T: Hash + 'static,
{
	fn track_access(&self) {
		let this = self.this.upgrade().expect("computed body gone") as Rc<dyn Track>;
		self.reactor.accessed(this);
	}

	fn recompute(&self) {
		let prior = self.value.borrow_mut().take();
		let reactor = self.reactor.clone();
		let this = self.this.clone() as Weak<dyn Track>;

		let (next, accessed) =
			reactor.capture(|| (self.func)(prior.as_ref().map(|slot| &slot.value)));
		let (next, moved) = reuse(next, prior);
		let constant = accessed.is_empty();

		if moved {
			let rev = reactor.record(this.clone());
			self.computed
				.set(if constant { Revision::CONSTANT } else { rev });
		} else if constant {
			self.computed.set(Revision::CONSTANT);
		}
		self.validated.set(reactor.top());
		*self.value.borrow_mut() = Some(next);
		reactor.set_dependencies(&this, accessed);

		// state is consistent now; a flush may run
		if moved {
			reactor.schedule();
		}
	}
}

impl<T> Track for ComputedBody<T>
where
	T: Hash + 'static,
{
	/// Answers whether the value a caller saw as of `as_of` is still
	/// current: false once this value itself changed past `as_of`, or any
	/// captured dependency did.
	fn validate(&self, as_of: Revision, changes: Option<&ChangeSet>) -> bool {
		let computed = self.computed.get();
		if computed == Revision::CONSTANT {
			return true;
		}
		if computed == Revision::NEVER {
			return false;
		}
		if computed > as_of {
			return false;
		}
		if self.validated.get() >= self.reactor.top() {
			return true;
		}

		let this = self.this.clone() as Weak<dyn Track>;
		for dep in self.reactor.dependencies_of(&this, false) {
			if let Some(changes) = changes {
				if !changes.contains(&dep) {
					continue;
				}
			}
			let valid = match dep.upgrade() {
				Some(dep) => dep.validate(as_of, changes),
				// a dropped dependency can no longer change
				None => true,
			};
			if !valid {
				return false;
			}
		}
		self.validated.set(self.reactor.top());
		true
	}
}

impl<T> Drop for ComputedBody<T>
where
	T: Hash + 'static,
{
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn Track>;
		self.reactor.release(&this);
	}
}
