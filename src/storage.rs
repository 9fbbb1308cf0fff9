use std::cell::RefCell;
use std::rc::Rc;

use fxhash::FxHashMap;

use crate::slot::SlotCell;

/// Per-object sparse lookup from a property's key to its slot, created
/// lazily on first use. Compatibility properties keep only their plain
/// backing field inline; the slot lives here. Cloning shares the same
/// storage.
#[derive(Clone, Default)]
pub struct BindingStorage {
	slots: Rc<RefCell<FxHashMap<usize, Rc<SlotCell>>>>,
}

impl BindingStorage {
	pub fn new() -> Self {
		Self::default()
	}

	pub(crate) fn slot(&self, key: usize) -> Option<Rc<SlotCell>> {
		self.slots.borrow().get(&key).cloned()
	}

	pub(crate) fn slot_or_create(&self, key: usize) -> Rc<SlotCell> {
		self.slots
			.borrow_mut()
			.entry(key)
			.or_insert_with(SlotCell::new)
			.clone()
	}

	pub(crate) fn remove(&self, key: usize) {
		self.slots.borrow_mut().remove(&key);
	}

	// public because the integration tests assert on lazy creation
	#[doc(hidden)]
	pub fn slot_count(&self) -> usize {
		self.slots.borrow().len()
	}
}
