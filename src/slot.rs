use std::cell::RefCell;
use std::rc::Rc;

use crate::binding::{BindingData, WriteBack};
use crate::observer::{self, NotifyState, ObserverId, ObserverKind, ObserverList};

/// The storage slot attached to each reactive property. Either nothing
/// is interested in the value, or observers watch it directly, or a
/// binding feeds it. An explicit tagged variant; the discriminant is
/// authoritative by construction.
pub(crate) enum SlotState {
	Empty,
	Observed(ObserverList),
	Bound(Rc<BindingData>),
}

/// A property's slot, shared so that dependency edges and aliases can
/// hold weak references to it.
pub(crate) struct SlotCell {
	state: RefCell<SlotState>,
}

impl SlotCell {
	pub fn new() -> Rc<Self> {
		Rc::new(SlotCell {
			state: RefCell::new(SlotState::Empty),
		})
	}

	pub fn binding(&self) -> Option<Rc<BindingData>> {
		match &*self.state.borrow() {
			SlotState::Bound(binding) => Some(binding.clone()),
			_ => None,
		}
	}

	pub fn has_binding(&self) -> bool {
		matches!(&*self.state.borrow(), SlotState::Bound(_))
	}

	pub fn holds_binding(&self, binding: &Rc<BindingData>) -> bool {
		match &*self.state.borrow() {
			SlotState::Bound(current) => Rc::ptr_eq(current, binding),
			_ => false,
		}
	}

	/// Adds an observer to whatever currently tracks this slot's
	/// dependents: the binding's output chain when bound, the slot's own
	/// list otherwise.
	pub fn add_observer(&self, kind: ObserverKind) -> ObserverId {
		let mut state = self.state.borrow_mut();
		match &mut *state {
			SlotState::Bound(binding) => binding.add_output_observer(kind),
			SlotState::Observed(list) => list.insert(kind),
			SlotState::Empty => {
				let mut list = ObserverList::default();
				let id = list.insert(kind);
				*state = SlotState::Observed(list);
				id
			}
		}
	}

	pub fn remove_observer(&self, id: ObserverId) {
		let mut state = self.state.borrow_mut();
		match &mut *state {
			SlotState::Bound(binding) => {
				binding.remove_output_observer(id);
			}
			SlotState::Observed(list) => {
				list.remove(id);
				if list.is_empty() {
					*state = SlotState::Empty;
				}
			}
			SlotState::Empty => {}
		}
	}

	pub fn observer_count(&self) -> usize {
		match &*self.state.borrow() {
			SlotState::Bound(binding) => binding.output_observer_count(),
			SlotState::Observed(list) => list.len(),
			SlotState::Empty => 0,
		}
	}

	fn snapshot_observers(&self) -> Vec<ObserverKind> {
		match &*self.state.borrow() {
			SlotState::Bound(binding) => binding.snapshot_observers(),
			SlotState::Observed(list) => list.snapshot(),
			SlotState::Empty => Vec::new(),
		}
	}

	pub fn notify_observers(&self, triggering: Option<&Rc<BindingData>>, state: &mut NotifyState) {
		let observers = self.snapshot_observers();
		observer::notify(observers, triggering, state);
	}

	/// Installs a binding: the previous binding (or the slot itself)
	/// hands its observer chain over, the old binding is detached, the
	/// new one is marked dirty. Eager bindings evaluate on the spot and
	/// notify through their write-through wrapper; lazy installs notify
	/// the inherited observers so dependents do not go stale.
	pub fn install_binding(
		&self,
		binding: Rc<BindingData>,
		writer: WriteBack,
	) -> Option<Rc<BindingData>> {
		let (old, observers) = {
			let mut state = self.state.borrow_mut();
			match std::mem::replace(&mut *state, SlotState::Empty) {
				SlotState::Bound(old) => {
					if Rc::ptr_eq(&old, &binding) {
						*state = SlotState::Bound(old.clone());
						return Some(old);
					}
					let observers = old.take_observers();
					(Some(old), observers)
				}
				SlotState::Observed(list) => (None, list),
				SlotState::Empty => (None, ObserverList::default()),
			}
		};

		if let Some(old) = &old {
			old.detach_from_property();
		}

		binding.attach(writer, observers);
		binding.set_dirty(true);
		*self.state.borrow_mut() = SlotState::Bound(binding.clone());

		tracing::trace!(location = %binding.source_location(), "binding installed");

		if binding.is_eager() {
			let _ = Rc::clone(&binding).evaluate_if_dirty_and_return_changed();
		} else {
			let mut notify_state = NotifyState::pending();
			self.notify_observers(Some(&binding), &mut notify_state);
		}

		old
	}

	/// Detaches any installed binding, handing its observer chain back
	/// to the slot. Used when a value is assigned directly, overriding
	/// the binding.
	pub fn remove_binding(&self) -> Option<Rc<BindingData>> {
		let old = {
			let mut state = self.state.borrow_mut();
			match std::mem::replace(&mut *state, SlotState::Empty) {
				SlotState::Bound(binding) => {
					let observers = binding.take_observers();
					if !observers.is_empty() {
						*state = SlotState::Observed(observers);
					}
					Some(binding)
				}
				other => {
					*state = other;
					None
				}
			}
		};

		if let Some(binding) = &old {
			binding.detach_from_property();
		}
		old
	}
}
