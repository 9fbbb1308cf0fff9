use std::cell::RefCell;
use std::rc::Rc;

use crate::binding::BindingData;
use crate::slot::SlotCell;

thread_local! {
	static STATUS: BindingStatus = BindingStatus::default();
}

/// Per-thread evaluation state: the stack of bindings currently being
/// evaluated and the stack of compatibility properties currently inside
/// their write-through wrapper. Everything in this engine is
/// single-threaded; cross-thread sharing of a binding graph is not
/// supported.
#[derive(Default)]
struct BindingStatus {
	evaluating: RefCell<Vec<Rc<BindingData>>>,
	compat: RefCell<Vec<usize>>,
}

pub(crate) fn currently_evaluating_binding() -> Option<Rc<BindingData>> {
	STATUS.with(|status| status.evaluating.borrow().last().cloned())
}

pub(crate) fn in_compat_wrapper(key: usize) -> bool {
	STATUS.with(|status| status.compat.borrow().last() == Some(&key))
}

/// Registers the slot being read as a dependency of the binding on top
/// of the evaluation stack, if any. A binding reading its own slot is
/// short-circuited here; the loop itself is reported by the `updating`
/// guard when the read pulls the binding.
pub(crate) fn register_with_currently_evaluating(slot: &Rc<SlotCell>) {
	let Some(binding) = currently_evaluating_binding() else {
		return;
	};
	if slot.holds_binding(&binding) {
		return;
	}
	binding.add_dependency(slot);
}

/// Scoped frame naming a binding as "currently evaluating". The pop is
/// tied to drop so it happens on every exit path, including evaluation
/// failure.
pub(crate) struct BindingEvaluationFrame;

impl BindingEvaluationFrame {
	pub fn push(binding: Rc<BindingData>) -> Self {
		STATUS.with(|status| status.evaluating.borrow_mut().push(binding));
		BindingEvaluationFrame
	}
}

impl Drop for BindingEvaluationFrame {
	fn drop(&mut self) {
		STATUS.with(|status| {
			status.evaluating.borrow_mut().pop();
		});
	}
}

/// Scoped frame marking a compatibility property as inside its
/// write-through wrapper, so the owning setter does not re-register the
/// property as observing its own binding and does not tear the binding
/// down when it writes the value back.
pub(crate) struct CompatPropertyFrame;

impl CompatPropertyFrame {
	pub fn push(key: usize) -> Self {
		STATUS.with(|status| status.compat.borrow_mut().push(key));
		CompatPropertyFrame
	}
}

impl Drop for CompatPropertyFrame {
	fn drop(&mut self) {
		STATUS.with(|status| {
			status.compat.borrow_mut().pop();
		});
	}
}
