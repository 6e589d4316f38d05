use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet};
use std::rc::{Rc, Weak};

use crate::reactor::addr::ByWeak;
use crate::reactor::revision::Revision;
use crate::reactor::{AccessSet, ChangeSet, React, Track};

type Edges = BTreeSet<ByWeak<dyn Track>>;

thread_local! {
	static CURRENT: Reactor = Reactor::new();
}

/// The dependency graph engine. Records accesses while capturing, records
/// changes, keeps the dependency/dependent maps as mirror images, and runs
/// the flush pass that re-triggers invalidated reactions.
///
/// A `Reactor` is a cheap handle; clones share the same graph. Every thread
/// has a default instance ([`Reactor::current`]) for convenience, but all
/// value constructors also accept an explicit reactor so independent graphs
/// can coexist.
pub struct Reactor {
	inner: Rc<ReactorInner>,
}

struct ReactorInner {
	/// Current revision. Bumped on the first change after a flush.
	top: Cell<Revision>,

	/// Revision as of the last completed flush.
	flushed: Cell<Revision>,

	/// Pending change set, taken by the flush loop.
	changes: RefCell<Option<ChangeSet>>,

	/// Stack of capture frames. Accesses record into the innermost frame
	/// only, so nested captures stay isolated.
	frames: RefCell<Vec<AccessSet>>,

	/// `dependencies[v]` is the set captured during v's last recompute.
	dependencies: RefCell<BTreeMap<ByWeak<dyn Track>, Edges>>,

	/// Mirror image: `dependents[d]` contains v iff `dependencies[v]`
	/// contains d.
	dependents: RefCell<BTreeMap<ByWeak<dyn Track>, Edges>>,

	/// Registered reactions with retain counts.
	reactions: RefCell<BTreeMap<ByWeak<dyn React>, usize>>,

	batch: Cell<usize>,
	flushing: Cell<bool>,
	scheduled: Cell<bool>,
}

impl Clone for Reactor {
	fn clone(&self) -> Self {
		Reactor {
			inner: self.inner.clone(),
		}
	}
}

impl Default for Reactor {
	fn default() -> Self {
		Reactor::new()
	}
}

impl Reactor {
	pub fn new() -> Reactor {
		Reactor {
			inner: Rc::new(ReactorInner {
				top: Cell::new(Revision::INITIAL),
				flushed: Cell::new(Revision::NEVER),
				changes: RefCell::new(None),
				frames: RefCell::new(Vec::new()),
				dependencies: RefCell::new(BTreeMap::new()),
				dependents: RefCell::new(BTreeMap::new()),
				reactions: RefCell::new(BTreeMap::new()),
				batch: Cell::new(0),
				flushing: Cell::new(false),
				scheduled: Cell::new(false),
			}),
		}
	}

	/// The thread's default reactor.
	pub fn current() -> Reactor {
		CURRENT.with(|reactor| reactor.clone())
	}

	pub fn top(&self) -> Revision {
		self.inner.top.get()
	}

	pub fn flushed(&self) -> Revision {
		self.inner.flushed.get()
	}

	// ..........................
	// CORE API
	//

	/// Call whenever a tracked value is read. Inside a `capture` this adds
	/// the value to the active frame's access set; otherwise it is a no-op.
	pub fn accessed(&self, value: Rc<dyn Track>) {
		let mut frames = self.inner.frames.borrow_mut();
		if let Some(frame) = frames.last_mut() {
			frame.insert(value);
		}
	}

	/// Call just after a tracked value's state changed. The first change
	/// since the last flush starts a new revision; changes recorded within
	/// the same stretch share it.
	///
	/// The flush is scheduled, not run: it happens at the end of the
	/// enclosing batch or at the next schedule point, so the caller can
	/// finish updating its own bookkeeping with the returned revision
	/// first. Callers outside a batch follow with [`Reactor::flush`] once
	/// consistent.
	pub fn changed(&self, value: Weak<dyn Track>) -> Revision {
		let rev = self.record(value);
		self.inner.scheduled.set(true);
		rev
	}

	/// Records a change without scheduling. Used where the caller still has
	/// state to settle before a flush may run.
	pub(crate) fn record(&self, value: Weak<dyn Track>) -> Revision {
		let inner = &*self.inner;
		let mut changes = self.inner.changes.borrow_mut();
		let changes = changes.get_or_insert_with(|| {
			inner.top.set(inner.top.get().bump());
			ChangeSet::default()
		});
		changes.insert(value);
		inner.top.get()
	}

	/// Runs `func` with a fresh access frame and returns its result paired
	/// with everything accessed during the call. Reentrant; nested captures
	/// do not leak into the outer frame.
	pub fn capture<R>(&self, func: impl FnOnce() -> R) -> (R, AccessSet) {
		self.inner.frames.borrow_mut().push(AccessSet::default());
		let frame = PopFrame {
			frames: &self.inner.frames,
		};
		let ret = func();
		(ret, frame.take())
	}

	/// True if `value` is valid as of the last flush.
	pub fn validate(&self, value: &dyn Track, changes: Option<&ChangeSet>) -> bool {
		value.validate(self.inner.flushed.get(), changes)
	}

	// ..........................
	// DEPENDENCIES
	//

	/// Replaces the dependency set of `value`, keeping the dependents map
	/// the exact mirror image.
	pub fn set_dependencies(&self, value: &Weak<dyn Track>, deps: AccessSet) {
		let key = ByWeak::new(value.clone());
		let next: Edges = deps
			.set
			.iter()
			.map(|dep| ByWeak::new(Rc::downgrade(dep.get())))
			.collect();

		let mut dependencies = self.inner.dependencies.borrow_mut();
		let mut dependents = self.inner.dependents.borrow_mut();

		let prior = if next.is_empty() {
			dependencies.remove(&key)
		} else {
			dependencies.insert(key.clone(), next.clone())
		};

		if let Some(prior) = prior {
			for gone in prior.difference(&next) {
				if let Some(set) = dependents.get_mut(gone) {
					set.remove(&key);
				}
			}
		}

		for dep in &next {
			dependents
				.entry(dep.clone())
				.or_default()
				.insert(key.clone());
		}
	}

	/// Dependencies captured by `value` during its last recompute. With
	/// `expand`, includes indirect dependencies as well.
	pub fn dependencies_of(&self, value: &Weak<dyn Track>, expand: bool) -> Vec<Weak<dyn Track>> {
		walk(&self.inner.dependencies.borrow(), value, expand)
	}

	/// Values that depend on `value`. With `expand`, includes indirect
	/// dependents as well.
	pub fn dependents_of(&self, value: &Weak<dyn Track>, expand: bool) -> Vec<Weak<dyn Track>> {
		walk(&self.inner.dependents.borrow(), value, expand)
	}

	/// Expands a change set to the transitive closure of its dependents.
	fn expand_dependents(&self, changes: ChangeSet) -> ChangeSet {
		let dependents = self.inner.dependents.borrow();
		let mut out = changes.set;
		let mut stack: Vec<ByWeak<dyn Track>> = out.iter().cloned().collect();
		while let Some(cur) = stack.pop() {
			if let Some(next) = dependents.get(&cur) {
				for dep in next {
					if out.insert(dep.clone()) {
						stack.push(dep.clone());
					}
				}
			}
		}
		ChangeSet { set: out }
	}

	/// Removes every graph entry owned by `value`. Bodies call this from
	/// their `Drop`; the reactor never evicts on its own.
	pub(crate) fn release(&self, value: &Weak<dyn Track>) {
		let key = ByWeak::new(value.clone());

		{
			let mut dependencies = self.inner.dependencies.borrow_mut();
			let mut dependents = self.inner.dependents.borrow_mut();

			if let Some(deps) = dependencies.remove(&key) {
				for dep in deps {
					if let Some(set) = dependents.get_mut(&dep) {
						set.remove(&key);
					}
				}
			}

			if let Some(users) = dependents.remove(&key) {
				for user in users {
					if let Some(set) = dependencies.get_mut(&user) {
						set.remove(&key);
					}
				}
			}
		}

		if let Some(changes) = self.inner.changes.borrow_mut().as_mut() {
			changes.remove(value);
		}
	}

	// ..........................
	// REACTIONS
	//

	/// Registers a reaction for eager revalidation during flush. Retain
	/// counted: registering twice requires unregistering twice. The
	/// reaction is held weakly; the caller keeps ownership.
	pub fn register(&self, reaction: Weak<dyn React>) {
		let fresh = {
			let mut reactions = self.inner.reactions.borrow_mut();
			let count = reactions.entry(ByWeak::new(reaction)).or_insert(0);
			*count += 1;
			*count == 1
		};
		if fresh {
			self.schedule();
		}
	}

	/// Drops one retain count; the reaction leaves the active set when the
	/// count reaches zero.
	pub fn unregister(&self, reaction: &Weak<dyn React>) {
		let key = ByWeak::new(reaction.clone());
		let mut reactions = self.inner.reactions.borrow_mut();
		if let Some(count) = reactions.get_mut(&key) {
			*count -= 1;
			if *count == 0 {
				reactions.remove(&key);
			}
		}
	}

	/// Removes a reaction entirely, ignoring retain counts. Used by bodies
	/// on drop.
	pub(crate) fn purge(&self, reaction: &Weak<dyn React>) {
		self.inner
			.reactions
			.borrow_mut()
			.remove(&ByWeak::new(reaction.clone()));
	}

	// ..........................
	// PROCESSING CHANGES
	//

	/// Marks a flush as needed and runs it right away unless one is
	/// already running, a batch is open, or a capture is in progress (the
	/// flush then happens when the outermost of those completes).
	pub(crate) fn schedule(&self) {
		let inner = &*self.inner;
		inner.scheduled.set(true);
		if inner.batch.get() == 0 && !inner.flushing.get() && inner.frames.borrow().is_empty() {
			self.flush();
		}
	}

	/// Processes pending changes: expands them to their transitive
	/// dependent closure and triggers every registered reaction that fails
	/// validation against it. Loops while triggered reactions record new
	/// changes, then advances the flush point.
	pub fn flush(&self) {
		let inner = &*self.inner;
		if inner.flushing.get() {
			return;
		}
		inner.flushing.set(true);

		loop {
			inner.scheduled.set(false);
			let closure = match inner.changes.borrow_mut().take() {
				Some(changes) => self.expand_dependents(changes),
				None => ChangeSet::default(),
			};

			inner
				.reactions
				.borrow_mut()
				.retain(|key, _| key.is_alive());
			let reactions: Vec<Weak<dyn React>> = inner
				.reactions
				.borrow()
				.keys()
				.map(|key| key.weak().clone())
				.collect();

			tracing::trace!(
				changed = closure.len(),
				reactions = reactions.len(),
				"flush pass"
			);

			for weak in reactions {
				if let Some(reaction) = weak.upgrade() {
					if !reaction.validate(inner.flushed.get(), Some(&closure)) {
						reaction.trigger();
					}
				}
			}

			if inner.changes.borrow().is_none() && !inner.scheduled.get() {
				break;
			}
		}

		inner.flushed.set(inner.top.get());
		inner.flushing.set(false);
	}

	/// Runs `func` as one transaction: changes recorded inside share one
	/// revision, and the flush runs once when the outermost batch ends.
	pub fn batch<R>(&self, func: impl FnOnce() -> R) -> R {
		let inner = &*self.inner;
		inner.batch.set(inner.batch.get() + 1);
		let guard = BatchGuard { reactor: self };
		let ret = func();
		drop(guard);
		ret
	}

	pub fn in_batch(&self) -> bool {
		self.inner.batch.get() > 0
	}

	/// Factory sugar so call sites read `reactor.atom(..)`.
	pub fn atom<T: std::hash::Hash + 'static>(&self, value: T) -> crate::reactor::atom::Atom<T> {
		crate::reactor::atom::Atom::new_in(self, value)
	}

	pub fn computed<T: std::hash::Hash + 'static>(
		&self,
		func: crate::reactor::computed::ComputeFn<T>,
	) -> crate::reactor::computed::Computed<T> {
		crate::reactor::computed::Computed::new_in(self, func)
	}

	pub fn reaction<T: Clone + std::hash::Hash + 'static>(
		&self,
		func: crate::reactor::computed::ComputeFn<T>,
		update: crate::reactor::reaction::UpdateFn<T>,
	) -> crate::reactor::reaction::Reaction<T> {
		crate::reactor::reaction::Reaction::new_in(self, func, update)
	}
}

fn walk(
	edges: &BTreeMap<ByWeak<dyn Track>, Edges>,
	value: &Weak<dyn Track>,
	expand: bool,
) -> Vec<Weak<dyn Track>> {
	let key = ByWeak::new(value.clone());
	let Some(direct) = edges.get(&key) else {
		return Vec::new();
	};
	if !expand {
		return direct.iter().map(|dep| dep.weak().clone()).collect();
	}
	let mut seen: Edges = direct.clone();
	let mut stack: Vec<ByWeak<dyn Track>> = direct.iter().cloned().collect();
	while let Some(cur) = stack.pop() {
		if let Some(next) = edges.get(&cur) {
			for dep in next {
				if dep != &key && seen.insert(dep.clone()) {
					stack.push(dep.clone());
				}
			}
		}
	}
	seen.iter().map(|dep| dep.weak().clone()).collect()
}

struct PopFrame<'a> {
	frames: &'a RefCell<Vec<AccessSet>>,
}

impl<'a> PopFrame<'a> {
	fn take(self) -> AccessSet {
		let frames = self.frames;
		std::mem::forget(self);
		frames.borrow_mut().pop().unwrap_or_default()
	}
}

impl Drop for PopFrame<'_> {
	fn drop(&mut self) {
		// unwound out of a capture; keep the stack balanced
		self.frames.borrow_mut().pop();
	}
}

struct BatchGuard<'a> {
	reactor: &'a Reactor,
}

impl Drop for BatchGuard<'_> {
	fn drop(&mut self) {
		let inner = &*self.reactor.inner;
		inner.batch.set(inner.batch.get() - 1);
		if inner.batch.get() == 0
			&& inner.scheduled.get()
			&& !inner.flushing.get()
			&& !std::thread::panicking()
		{
			self.reactor.flush();
		}
	}
}
