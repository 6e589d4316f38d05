pub mod atom;
pub mod collections;
pub mod computed;
pub mod memo;
pub mod reaction;
#[allow(clippy::module_inception)]
pub mod reactor;
pub mod reuse;
pub mod revision;

mod addr;

use std::collections::BTreeSet;
use std::rc::{Rc, Weak};

use crate::reactor::addr::{ByRc, ByWeak};
use crate::reactor::reactor::Reactor;
use crate::reactor::revision::Revision;

/// The capability every tracked value implements. A reactor only ever talks
/// to values through this trait; concrete kinds (atoms, computed values,
/// reactions, tracked collections) are a small closed set.
pub trait Track: 'static {
	/// True if the value is still unchanged as of the `as_of` flush point.
	///
	/// When `changes` is supplied it holds every value known to have
	/// changed since that point (including transitive dependents), and a
	/// dependency absent from it may be skipped without re-validation.
	fn validate(&self, as_of: Revision, changes: Option<&ChangeSet>) -> bool;
}

/// A reaction registered with a reactor. Reactions are the only tracked
/// values walked eagerly during a flush; everything else revalidates on
/// demand.
pub trait React: Track {
	/// Called during flush when validation failed. Expected to bring the
	/// reaction up to date and run its side effect.
	fn trigger(&self);
}

/// Set of values known to have changed since the last flush, keyed by body
/// address. Held weakly; the reactor never owns tracked values.
#[derive(Default)]
pub struct ChangeSet {
	pub(crate) set: BTreeSet<ByWeak<dyn Track>>,
}

impl ChangeSet {
	pub(crate) fn insert(&mut self, value: Weak<dyn Track>) -> bool {
		self.set.insert(ByWeak::new(value))
	}

	pub(crate) fn remove(&mut self, value: &Weak<dyn Track>) -> bool {
		self.set.remove(&ByWeak::new(value.clone()))
	}

	pub fn contains(&self, value: &Weak<dyn Track>) -> bool {
		self.set.contains(&ByWeak::new(value.clone()))
	}

	pub fn len(&self) -> usize {
		self.set.len()
	}

	pub fn is_empty(&self) -> bool {
		self.set.is_empty()
	}
}

/// Accesses recorded during one `capture` frame. Holds strong references so
/// captured dependencies stay alive until they are registered as edges.
#[derive(Default)]
pub struct AccessSet {
	pub(crate) set: BTreeSet<ByRc<dyn Track>>,
}

impl AccessSet {
	pub(crate) fn insert(&mut self, value: Rc<dyn Track>) -> bool {
		self.set.insert(ByRc::new(value))
	}

	pub fn len(&self) -> usize {
		self.set.len()
	}

	pub fn is_empty(&self) -> bool {
		self.set.is_empty()
	}

	pub fn iter(&self) -> impl Iterator<Item = &Rc<dyn Track>> {
		self.set.iter().map(|addr| addr.get())
	}
}

/// Runs `func` as one transaction on the current reactor: every change
/// recorded inside shares one revision and one flush at the end.
pub fn batch<R>(func: impl FnOnce() -> R) -> R {
	Reactor::current().batch(func)
}

/// True while a `batch` is active on the current reactor.
pub fn in_batch() -> bool {
	Reactor::current().in_batch()
}
