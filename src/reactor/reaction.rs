use std::cell::{Ref, RefCell};
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::reactor::computed::{ComputeFn, Computed};
use crate::reactor::reactor::Reactor;
use crate::reactor::reuse::Hashed;
use crate::reactor::revision::Revision;
use crate::reactor::{ChangeSet, React, Track};

/// Side effect run when a reaction's value changes: `(new, prior)`.
pub type UpdateFn<T> = Box<dyn Fn(&T, Option<&T>)>;

/// A computed value that also runs a side effect when its value changes.
/// Registered reactions are revalidated eagerly during every flush, whether
/// or not anything reads them.
pub struct Reaction<T>
where
	T: Clone + Hash + 'static,
{
	body: Rc<ReactionBody<T>>,
}

impl<T> Clone for Reaction<T>
where
	T: Clone + Hash,
{
	fn clone(&self) -> Self {
		Reaction {
			body: self.body.clone(),
		}
	}
}

pub(crate) struct ReactionBody<T>
where
	T: Clone + Hash + 'static,
{
	reactor: Reactor,
	computed: Computed<T>,
	update: UpdateFn<T>,

	/// Value as of the last time the side effect ran.
	prior: RefCell<Option<Hashed<T>>>,

	this: Weak<ReactionBody<T>>,
}

impl<T> Reaction<T>
where
	T: Clone + Hash + 'static,
{
	pub fn new(func: ComputeFn<T>, update: UpdateFn<T>) -> Self {
		Self::new_in(&Reactor::current(), func, update)
	}

	pub fn new_in(reactor: &Reactor, func: ComputeFn<T>, update: UpdateFn<T>) -> Self {
		Reaction {
			body: Rc::new_cyclic(|this| ReactionBody {
				reactor: reactor.clone(),
				computed: Computed::new_in(reactor, func),
				update,
				prior: RefCell::new(None),
				this: this.clone(),
			}),
		}
	}

	/// Registers with the reactor, scheduling a flush that runs the
	/// reaction for the first time.
	pub fn register(&self) {
		let this = self.body.this.clone() as Weak<dyn React>;
		self.body.reactor.register(this);
	}

	pub fn unregister(&self) {
		let this = self.body.this.clone() as Weak<dyn React>;
		self.body.reactor.unregister(&this);
	}

	/// Recomputes now and runs the side effect if the value changed.
	pub fn trigger(&self) {
		self.body.trigger();
	}

	/// Current value, recomputing when invalid. Does not run the side
	/// effect.
	pub fn get(&self) -> Ref<'_, T> {
		self.body.computed.get()
	}
}

impl<T> ReactionBody<T>
where
	T: Clone + Hash + 'static,
{
	fn trigger(&self) {
		let value = self.computed.get();
		let hash = self.computed.value_hash().expect("reaction has no value");
		let mut prior = self.prior.borrow_mut();
		let fire = match &*prior {
			Some(prior) => prior.hash != hash,
			None => true,
		};
		if fire {
			(self.update)(&value, prior.as_ref().map(|prior| &prior.value));
			*prior = Some(Hashed {
				value: value.clone(),
				hash,
			});
		}
	}
}

impl<T> Track for ReactionBody<T>
where
	T: Clone + Hash + 'static,
{
	fn validate(&self, as_of: Revision, changes: Option<&ChangeSet>) -> bool {
		self.computed.validate(as_of, changes)
	}
}

impl<T> React for ReactionBody<T>
where
	T: Clone + Hash + 'static,
{
	fn trigger(&self) {
		ReactionBody::trigger(self)
	}
}

impl<T> Drop for ReactionBody<T>
where
	T: Clone + Hash + 'static,
{
	fn drop(&mut self) {
		let this = self.this.clone() as Weak<dyn React>;
		self.reactor.purge(&this);
	}
}
