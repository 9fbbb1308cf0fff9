use std::cell::Cell;
use std::rc::{Rc, Weak};

use fxhash::FxBuildHasher;
use indexmap::IndexMap;

use crate::binding::BindingData;
use crate::slot::SlotCell;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub(crate) struct ObserverId(u64);

thread_local! {
	static NEXT_OBSERVER_ID: Cell<u64> = const { Cell::new(0) };
}

impl ObserverId {
	pub fn next() -> Self {
		NEXT_OBSERVER_ID.with(|next| {
			let id = next.get();
			next.set(id + 1);
			ObserverId(id)
		})
	}
}

/// One party interested in a value change. The three capabilities of
/// the observer chain: invalidate a dependent binding, run a callback,
/// or forward the notification into an alias's own chain.
#[derive(Clone)]
pub(crate) enum ObserverKind {
	Dependency(Weak<BindingData>),
	ChangeHandler(Rc<dyn Fn()>),
	Alias(Weak<SlotCell>),
}

/// Insertion-ordered observer registry. Ids are process-unique, so a
/// list can be handed from a slot to a binding and back without
/// invalidating outstanding [`ChangeHandler`] guards. `swap_remove`
/// keeps unlink O(1) regardless of position.
#[derive(Default)]
pub(crate) struct ObserverList {
	entries: IndexMap<ObserverId, ObserverKind, FxBuildHasher>,
}

impl ObserverList {
	pub fn insert(&mut self, kind: ObserverKind) -> ObserverId {
		let id = ObserverId::next();
		self.entries.insert(id, kind);
		id
	}

	pub fn remove(&mut self, id: ObserverId) -> bool {
		self.entries.swap_remove(&id).is_some()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn merge(&mut self, other: ObserverList) {
		for (id, kind) in other.entries {
			self.entries.insert(id, kind);
		}
	}

	pub fn snapshot(&self) -> Vec<ObserverKind> {
		self.entries.values().cloned().collect()
	}
}

/// Shared state of one notification walk. `changed` starts optimistic;
/// once a triggering binding is evaluated and turns out to produce the
/// same value, the walk stops so downstream handlers never fire for a
/// non-change.
pub(crate) struct NotifyState {
	known_changed: bool,
	changed: bool,
}

impl NotifyState {
	/// The value was already written and differs from the old one.
	pub fn known_changed() -> Self {
		NotifyState {
			known_changed: true,
			changed: true,
		}
	}

	/// A binding went dirty; whether the value differs is only known
	/// after the binding is evaluated.
	pub fn pending() -> Self {
		NotifyState {
			known_changed: false,
			changed: true,
		}
	}
}

/// Depth-first notification over a snapshot of an observer chain.
/// Dependency edges mark their binding dirty (which recurses into that
/// binding's own observers), change handlers run immediately, alias
/// edges continue the walk in the aliased slot's chain.
pub(crate) fn notify(
	observers: Vec<ObserverKind>,
	triggering: Option<&Rc<BindingData>>,
	state: &mut NotifyState,
) {
	if !state.changed {
		return;
	}

	for kind in observers {
		match kind {
			ObserverKind::Dependency(binding) => {
				if let Some(binding) = binding.upgrade() {
					binding.mark_dirty_and_notify();
				}
			}
			ObserverKind::ChangeHandler(handler) => {
				if !state.known_changed {
					state.known_changed = true;
					state.changed = match triggering {
						Some(binding) => Rc::clone(binding).evaluate_if_dirty_and_return_changed(),
						None => true,
					};
				}
				if !state.changed {
					return;
				}
				handler();
			}
			ObserverKind::Alias(slot) => {
				if let Some(slot) = slot.upgrade() {
					slot.notify_observers(triggering, state);
					if !state.changed {
						return;
					}
				}
			}
		}
	}
}

/// Keeps a change callback registered. Dropping the handler unlinks it
/// from whichever observer chain currently holds it.
#[must_use = "the callback stops observing when the handler is dropped"]
pub struct ChangeHandler {
	pub(crate) slot: Weak<SlotCell>,
	pub(crate) id: ObserverId,
}

impl Drop for ChangeHandler {
	fn drop(&mut self) {
		if let Some(slot) = self.slot.upgrade() {
			slot.remove_observer(self.id);
		}
	}
}
