use std::cell::RefCell;
use std::rc::Rc;
use std::task::Waker;

use smallvec::SmallVec;

use crate::pipe::Step;

/// One slot of a buffer's persistent history: a singly linked list node
/// holding an eventually-resolved step. Readers hold `Rc` cursors into the
/// chain, so a cursor keeps its own suffix of history alive regardless of
/// how far the buffer's replay window has moved.
pub(crate) struct Item<T> {
	state: RefCell<ItemState<T>>,
	next: RefCell<Option<Rc<Item<T>>>>,
}

enum ItemState<T> {
	/// An "unput" placeholder: readers parked here wait for a producer.
	Pending {
		wakers: SmallVec<[(u64, Waker); 2]>,
	},
	Ready(Step<T>),
}

impl<T: Clone> Item<T> {
	/// The resolved step, if any.
	pub fn step(&self) -> Option<Step<T>> {
		match &*self.state.borrow() {
			ItemState::Ready(step) => Some(step.clone()),
			ItemState::Pending { .. } => None,
		}
	}
}

impl<T> Item<T> {
	pub fn pending() -> Rc<Self> {
		Rc::new(Item {
			state: RefCell::new(ItemState::Pending {
				wakers: SmallVec::new(),
			}),
			next: RefCell::new(None),
		})
	}

	pub fn ready(step: Step<T>) -> Rc<Self> {
		Rc::new(Item {
			state: RefCell::new(ItemState::Ready(step)),
			next: RefCell::new(None),
		})
	}

	/// Resolves the placeholder exactly once and wakes every parked
	/// reader. Resolving an already-resolved item is a no-op.
	pub fn resolve(&self, step: Step<T>) {
		let wakers = {
			let mut state = self.state.borrow_mut();
			match &mut *state {
				ItemState::Ready(_) => return,
				ItemState::Pending { wakers } => {
					let wakers = std::mem::take(wakers);
					*state = ItemState::Ready(step);
					wakers
				}
			}
		};
		for (_, waker) in wakers {
			waker.wake();
		}
	}

	/// Registers or refreshes a reader's waker.
	pub fn park(&self, token: u64, waker: &Waker) {
		if let ItemState::Pending { wakers } = &mut *self.state.borrow_mut() {
			match wakers.iter_mut().find(|(slot, _)| *slot == token) {
				Some((_, slot)) => slot.clone_from(waker),
				None => wakers.push((token, waker.clone())),
			}
		}
	}

	/// Removes a reader's waker. With `wake_rest` the remaining parked
	/// readers are woken so one of them takes over driving the source.
	pub fn unpark(&self, token: u64, wake_rest: bool) {
		let woken = {
			let mut state = self.state.borrow_mut();
			match &mut *state {
				ItemState::Ready(_) => return,
				ItemState::Pending { wakers } => {
					wakers.retain(|(slot, _)| *slot != token);
					if wake_rest {
						wakers.iter().map(|(_, waker)| waker.clone()).collect()
					} else {
						SmallVec::<[Waker; 2]>::new()
					}
				}
			}
		};
		for waker in woken {
			waker.wake();
		}
	}

	pub fn next(&self) -> Option<Rc<Item<T>>> {
		self.next.borrow().clone()
	}

	pub fn set_next(&self, item: Rc<Item<T>>) {
		let mut next = self.next.borrow_mut();
		debug_assert!(next.is_none(), "history item relinked");
		*next = Some(item);
	}
}
