use std::cmp::Ordering;
use std::rc::{Rc, Weak};

/// Wrappers that order and compare reference-counted pointers by the address
/// of their allocation. The vtable half of a fat pointer is dropped, so the
/// same body seen through different traits keeps a single identity.

pub(crate) struct ByRc<T: ?Sized> {
	ptr: Rc<T>,
}

impl<T: ?Sized> ByRc<T> {
	pub fn new(ptr: Rc<T>) -> Self {
		ByRc { ptr }
	}

	pub fn get(&self) -> &Rc<T> {
		&self.ptr
	}

	fn key(&self) -> *const () {
		Rc::as_ptr(&self.ptr) as *const ()
	}
}

impl<T: ?Sized> Clone for ByRc<T> {
	fn clone(&self) -> Self {
		ByRc {
			ptr: self.ptr.clone(),
		}
	}
}

impl<T: ?Sized> PartialEq for ByRc<T> {
	fn eq(&self, other: &Self) -> bool {
		self.key() == other.key()
	}
}

impl<T: ?Sized> Eq for ByRc<T> {}

impl<T: ?Sized> Ord for ByRc<T> {
	fn cmp(&self, other: &Self) -> Ordering {
		self.key().cmp(&other.key())
	}
}

impl<T: ?Sized> PartialOrd for ByRc<T> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}

pub(crate) struct ByWeak<T: ?Sized> {
	ptr: Weak<T>,
}

impl<T: ?Sized> ByWeak<T> {
	pub fn new(ptr: Weak<T>) -> Self {
		ByWeak { ptr }
	}

	pub fn weak(&self) -> &Weak<T> {
		&self.ptr
	}

	pub fn is_alive(&self) -> bool {
		self.ptr.strong_count() > 0
	}

	fn key(&self) -> *const () {
		Weak::as_ptr(&self.ptr) as *const ()
	}
}

impl<T: ?Sized> Clone for ByWeak<T> {
	fn clone(&self) -> Self {
		ByWeak {
			ptr: self.ptr.clone(),
		}
	}
}

impl<T: ?Sized> PartialEq for ByWeak<T> {
	fn eq(&self, other: &Self) -> bool {
		self.key() == other.key()
	}
}

impl<T: ?Sized> Eq for ByWeak<T> {}

impl<T: ?Sized> Ord for ByWeak<T> {
	fn cmp(&self, other: &Self) -> Ordering {
		self.key().cmp(&other.key())
	}
}

impl<T: ?Sized> PartialOrd for ByWeak<T> {
	fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
		Some(self.cmp(other))
	}
}
