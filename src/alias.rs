use std::rc::{Rc, Weak};

use crate::observer::{ChangeHandler, ObserverId, ObserverKind};
use crate::property::{Property, PropertyStorage};
use crate::slot::SlotCell;

/// A second name for an existing property. The alias owns its own
/// observer chain; notifications of the source are forwarded into it,
/// so handlers registered on the alias fire when the source changes.
/// Reads and writes delegate to the source. The alias unlinks itself
/// when dropped and turns inert when the source is dropped.
pub struct PropertyAlias<T> {
	source: Weak<PropertyStorage<T>>,
	source_cell: Weak<SlotCell>,
	cell: Rc<SlotCell>,
	link: ObserverId,
}

impl<T: 'static> PropertyAlias<T> {
	pub fn new(source: &Property<T>) -> Self {
		let cell = SlotCell::new();
		let link = source
			.data
			.cell
			.add_observer(ObserverKind::Alias(Rc::downgrade(&cell)));
		PropertyAlias {
			source: Rc::downgrade(&source.data),
			source_cell: Rc::downgrade(&source.data.cell),
			cell,
			link,
		}
	}

	pub fn is_valid(&self) -> bool {
		self.source.strong_count() > 0
	}

	/// Reads the aliased property, with the same dependency
	/// registration and binding pull as a direct read. `None` when the
	/// source no longer exists.
	pub fn value(&self) -> Option<T>
	where
		T: Clone,
	{
		let data = self.source.upgrade()?;
		Some(Property::from_storage(data).get())
	}

	/// Writes through to the aliased property. Reports whether the
	/// source still existed.
	pub fn set_value(&self, value: T) -> bool {
		match self.source.upgrade() {
			Some(data) => {
				Property::from_storage(data).set_value(value);
				true
			}
			None => false,
		}
	}

	/// Observes the aliased property through the alias's own chain.
	pub fn on_change(&self, func: impl Fn() + 'static) -> ChangeHandler {
		let id = self.cell.add_observer(ObserverKind::ChangeHandler(Rc::new(func)));
		ChangeHandler {
			slot: Rc::downgrade(&self.cell),
			id,
		}
	}
}

impl<T> Drop for PropertyAlias<T> {
	fn drop(&mut self) {
		if let Some(cell) = self.source_cell.upgrade() {
			cell.remove_observer(self.link);
		}
	}
}
