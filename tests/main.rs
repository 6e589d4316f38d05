use std::cell::Cell;
use std::rc::Rc;

use mockall::predicate::eq;
use reflow::{batch, computed, reaction, Atom, Computed, Memo, Reaction, Reactor};
use reflow::{TrackedMap, TrackedSet, TrackedVec};

mod mock;

use mock::{SharedSpy, Spy};

#[test]
fn computed_tracks_its_inputs() {
	let a = Atom::new(10_u64);
	assert_eq!(*a.get(), 10);

	let b = Computed::new(Box::new({
		let a = a.clone();
		move |_| *a.get() + 10
	}));

	assert_eq!(*b.get(), 20);
	a.set(20);
	assert_eq!(*b.get(), 30);
}

#[test]
fn reaction_coalesces_batched_changes() {
	let a = Atom::new(10_u64);
	let b = Computed::new(Box::new({
		let a = a.clone();
		move |_| *a.get() + 10
	}));

	let spy = SharedSpy::new();
	spy.get().expect_trigger().once().with(eq(30)).return_const(());

	let r = Reaction::new(
		Box::new({
			let a = a.clone();
			let b = b.clone();
			move |_| *a.get() + *b.get()
		}),
		Box::new({
			let spy = spy.clone();
			move |value: &u64, _prior: Option<&u64>| spy.get().trigger(*value)
		}),
	);
	r.register();
	spy.get().checkpoint();

	// four synchronous writes share one revision and one flush
	spy.get().expect_trigger().once().with(eq(50)).return_const(());
	batch(|| {
		a.set(20);
		a.set(20);
		a.set(20);
		a.set(20);
	});
	spy.get().checkpoint();

	assert_eq!(*b.get(), 30);
	r.unregister();
}

#[test]
fn unchanged_writes_do_not_trigger() {
	let a = Atom::new(1_u64);
	let spy = SharedSpy::new();
	spy.get().expect_trigger().once().with(eq(1)).return_const(());

	let r = Reaction::new(
		Box::new({
			let a = a.clone();
			move |_| *a.get()
		}),
		Box::new({
			let spy = spy.clone();
			move |value: &u64, _prior: Option<&u64>| spy.get().trigger(*value)
		}),
	);
	r.register();
	spy.get().checkpoint();

	spy.get().expect_trigger().times(0).return_const(());
	batch(|| a.set(1));
	spy.get().checkpoint();
	r.unregister();
}

#[test]
fn unread_computed_is_never_recomputed() {
	let reactor = Reactor::new();
	let a = reactor.atom(1_u64);
	let runs = Rc::new(Cell::new(0_u32));

	let c = reactor.computed(Box::new({
		let a = a.clone();
		let runs = runs.clone();
		move |_| {
			runs.set(runs.get() + 1);
			*a.get() * 2
		}
	}));

	a.set(2);
	reactor.flush();
	assert_eq!(runs.get(), 0);

	assert_eq!(*c.get(), 4);
	assert_eq!(runs.get(), 1);
}

#[test]
fn computed_value_is_cached_between_reads() {
	let reactor = Reactor::new();
	let a = reactor.atom(2_u64);
	let runs = Rc::new(Cell::new(0_u32));

	let doubled = reactor.computed(Box::new({
		let a = a.clone();
		let runs = runs.clone();
		move |_| {
			runs.set(runs.get() + 1);
			*a.get() * 2
		}
	}));

	assert_eq!(*doubled.get(), 4);
	assert_eq!(*doubled.get(), 4);
	assert_eq!(runs.get(), 1);

	a.set(3);
	assert_eq!(*doubled.get(), 6);
	assert_eq!(runs.get(), 2);
}

#[test]
fn equal_recomputes_do_not_ripple() {
	let reactor = Reactor::new();
	let a = reactor.atom(2_u64);
	let parity = reactor.computed(Box::new({
		let a = a.clone();
		move |_| *a.get() % 2
	}));

	let spy = SharedSpy::new();
	spy.get().expect_trigger().once().with(eq(0)).return_const(());

	let r = reactor.reaction(
		Box::new({
			let parity = parity.clone();
			move |_| *parity.get()
		}),
		Box::new({
			let spy = spy.clone();
			move |value: &u64, _prior: Option<&u64>| spy.get().trigger(*value)
		}),
	);
	r.register();
	spy.get().checkpoint();

	// parity recomputes but resolves to the same value; nothing fires
	spy.get().expect_trigger().times(0).return_const(());
	a.set(4);
	spy.get().checkpoint();
	r.unregister();
}

#[test]
fn dependency_free_computed_becomes_constant() {
	let reactor = Reactor::new();
	let runs = Rc::new(Cell::new(0_u32));
	let c = reactor.computed(Box::new({
		let runs = runs.clone();
		move |_| {
			runs.set(runs.get() + 1);
			42_u64
		}
	}));

	assert_eq!(*c.get(), 42);
	assert_eq!(*c.get(), 42);
	assert_eq!(runs.get(), 1);
	assert!(c.is_constant());

	c.invalidate();
	assert_eq!(*c.get(), 42);
	assert_eq!(runs.get(), 2);
}

#[test]
fn recompute_receives_the_prior_value() {
	let reactor = Reactor::new();
	let a = reactor.atom(1_u64);
	let sum = reactor.computed(Box::new({
		let a = a.clone();
		move |prior: Option<&u64>| prior.copied().unwrap_or(0) + *a.get()
	}));

	assert_eq!(*sum.get(), 1);
	a.set(2);
	assert_eq!(*sum.get(), 3);
}

#[test]
fn nested_captures_stay_isolated() {
	let reactor = Reactor::new();
	let a = reactor.atom(1_u64);
	let b = reactor.atom(2_u64);

	let ((), outer) = reactor.capture(|| {
		let _ = a.get();
		let ((), inner) = reactor.capture(|| {
			let _ = b.get();
		});
		assert_eq!(inner.len(), 1);
	});
	assert_eq!(outer.len(), 1);
}

#[test]
fn registration_is_retain_counted() {
	let reactor = Reactor::new();
	let a = reactor.atom(1_u64);
	let hits = Rc::new(Cell::new(0_u32));

	let r = reactor.reaction(
		Box::new({
			let a = a.clone();
			move |_| *a.get()
		}),
		Box::new({
			let hits = hits.clone();
			move |_: &u64, _: Option<&u64>| hits.set(hits.get() + 1)
		}),
	);

	r.register();
	r.register();
	assert_eq!(hits.get(), 1);

	r.unregister();
	a.set(2);
	assert_eq!(hits.get(), 2);

	r.unregister();
	a.set(3);
	assert_eq!(hits.get(), 2);
}

#[test]
fn independent_reactors_do_not_interfere() {
	let first = Reactor::new();
	let second = Reactor::new();
	let a1 = first.atom(1_u64);
	let a2 = second.atom(1_u64);
	let hits = Rc::new(Cell::new(0_u32));

	let r = first.reaction(
		Box::new({
			let a1 = a1.clone();
			move |_| *a1.get()
		}),
		Box::new({
			let hits = hits.clone();
			move |_: &u64, _: Option<&u64>| hits.set(hits.get() + 1)
		}),
	);
	r.register();
	assert_eq!(hits.get(), 1);

	a2.set(5);
	assert_eq!(hits.get(), 1);

	a1.set(5);
	assert_eq!(hits.get(), 2);
}

#[test]
fn empty_atoms_fall_back_to_defaults() {
	let a: Atom<u64> = Atom::empty();
	assert_eq!(a.get_or(7), 7);
	a.set(1);
	assert_eq!(a.get_or(7), 1);
}

#[test]
fn atom_map_derives_a_computed() {
	let a = Atom::new(3_u64);
	let tripled = a.map(|value| value * 3);
	assert_eq!(*tripled.get(), 9);
	a.set(4);
	assert_eq!(*tripled.get(), 12);
}

#[test]
fn tracked_map_invalidates_entry_and_shape_readers() {
	let reactor = Reactor::new();
	let map: TrackedMap<&'static str, u64> = TrackedMap::new_in(&reactor);
	map.insert("a", 1);

	let spy = SharedSpy::new();
	spy.get().expect_trigger().once().with(eq(1)).return_const(());

	let r = reactor.reaction(
		Box::new({
			let map = map.clone();
			move |_| map.get(&"a").unwrap_or(0)
		}),
		Box::new({
			let spy = spy.clone();
			move |value: &u64, _prior: Option<&u64>| spy.get().trigger(*value)
		}),
	);
	r.register();
	spy.get().checkpoint();

	// entry write reaches readers of that entry
	spy.get().expect_trigger().once().with(eq(5)).return_const(());
	map.insert("a", 5);
	spy.get().checkpoint();

	// a structural change revalidates, but the entry is unchanged
	spy.get().expect_trigger().times(0).return_const(());
	map.insert("b", 9);
	spy.get().checkpoint();

	assert_eq!(map.len(), 2);
	assert!(map.remove(&"b"));
	r.unregister();
}

#[test]
fn tracked_collections_record_shape_changes() {
	let reactor = Reactor::new();
	let set: TrackedSet<&'static str> = TrackedSet::new_in(&reactor);
	let vec: TrackedVec<u64> = TrackedVec::new_in(&reactor);

	vec.push(1);
	vec.push(2);
	set.insert("x");

	let total = reactor.computed(Box::new({
		let set = set.clone();
		let vec = vec.clone();
		move |_| vec.to_vec().iter().sum::<u64>() + set.len() as u64
	}));

	assert_eq!(*total.get(), 4);

	vec.set(0, 10);
	assert_eq!(*total.get(), 13);

	set.insert("y");
	assert_eq!(*total.get(), 14);

	vec.pop();
	assert_eq!(*total.get(), 12);

	assert!(set.contains(&"x"));
	assert_eq!(vec.get(0), Some(10));
}

#[test]
fn memo_caches_by_key_until_released() {
	let reactor = Reactor::new();
	let runs = Rc::new(Cell::new(0_u32));
	let memo: Memo<&'static str, u64> = Memo::new_in(&reactor);

	let c1 = memo.get_or_insert("answer", || {
		Box::new({
			let runs = runs.clone();
			move |_| {
				runs.set(runs.get() + 1);
				42
			}
		})
	});
	let c2 = memo.get_or_insert("answer", || Box::new(|_| unreachable!()));

	assert_eq!(*c1.get(), 42);
	assert_eq!(*c2.get(), 42);
	assert_eq!(runs.get(), 1);

	assert!(memo.release(&"answer"));
	assert!(!memo.contains(&"answer"));
	assert!(memo.is_empty());
}

#[test]
fn macros_build_reactive_values() {
	let a = Atom::new(1_u64);
	let c = computed!((a) _prior => *a.get() * 10);
	assert_eq!(*c.get(), 10);

	batch! {
		a.set(3);
	};
	assert_eq!(*c.get(), 30);

	let hits = Rc::new(Cell::new(0_u32));
	let counter = hits.clone();
	let r = reaction!((a) _prior => *a.get(), move |_value: &u64, _prior: Option<&u64>| {
		counter.set(counter.get() + 1)
	});
	r.register();
	assert_eq!(hits.get(), 1);
	a.set(4);
	assert_eq!(hits.get(), 2);
	r.unregister();
}
