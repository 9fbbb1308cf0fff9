use std::any::{Any, TypeId};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::marker::PhantomData;
use std::panic::Location;
use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use crate::error::BindingError;
use crate::evaluation::BindingEvaluationFrame;
use crate::observer::{self, NotifyState, ObserverId, ObserverKind, ObserverList};
use crate::slot::SlotCell;

/// Erased binding expression. Produces the new value boxed; the
/// write-back installed at attach time knows the concrete target.
pub(crate) type EvalFn = Box<dyn Fn() -> Result<Box<dyn Any>, BindingError>>;

/// Erased write-back: stores the freshly computed value into the
/// property the binding feeds and reports whether it actually changed.
/// For compatibility properties this is the write-through wrapper that
/// runs the owning setter.
pub(crate) type WriteBack = Rc<dyn Fn(Box<dyn Any>) -> bool>;

/// A dependency recorded during the last evaluation: which slot we
/// observe and the id of our observer in that slot's chain.
pub(crate) struct DependencyEdge {
	slot: Weak<SlotCell>,
	id: ObserverId,
}

/// The shared core of a binding. Reference counted because a caller may
/// hold a detached copy of a previously installed binding; the slot
/// holds one reference while the binding is installed.
pub(crate) struct BindingData {
	// needs re-evaluation before the next read
	dirty: Cell<bool>,
	// currently being evaluated; the re-entrancy/loop guard
	updating: Cell<bool>,
	// push discipline: evaluate immediately instead of on next read
	eager: Cell<bool>,
	eval: EvalFn,
	writer: RefCell<Option<WriteBack>>,
	// inline capacity for the common case; a binding rarely reads more
	// than four properties
	dependencies: RefCell<SmallVec<[DependencyEdge; 4]>>,
	// observers of this binding's output; while the binding is
	// installed, the slot's observer chain lives here
	observers: RefCell<ObserverList>,
	error: RefCell<Option<BindingError>>,
	location: &'static Location<'static>,
	value_type: TypeId,
}

impl BindingData {
	pub fn new(
		value_type: TypeId,
		eval: EvalFn,
		location: &'static Location<'static>,
	) -> Rc<Self> {
		Rc::new(BindingData {
			dirty: Cell::new(true),
			updating: Cell::new(false),
			eager: Cell::new(false),
			eval,
			writer: RefCell::new(None),
			dependencies: RefCell::new(SmallVec::new_const()),
			observers: RefCell::new(ObserverList::default()),
			error: RefCell::new(None),
			location,
			value_type,
		})
	}

	pub fn value_type(&self) -> TypeId {
		self.value_type
	}

	pub fn source_location(&self) -> &'static Location<'static> {
		self.location
	}

	pub fn error(&self) -> Option<BindingError> {
		self.error.borrow().clone()
	}

	pub fn set_eager(&self, eager: bool) {
		self.eager.set(eager);
	}

	pub fn is_eager(&self) -> bool {
		self.eager.get()
	}

	pub fn set_dirty(&self, dirty: bool) {
		self.dirty.set(dirty);
	}

	/// Installs the binding on a property: the write-back for the
	/// concrete storage plus the observer chain inherited from the slot
	/// or from the binding it replaces.
	pub fn attach(&self, writer: WriteBack, observers: ObserverList) {
		*self.writer.borrow_mut() = Some(writer);
		self.observers.borrow_mut().merge(observers);
	}

	/// Reverts [`attach`] and drops every dependency recorded during the
	/// last evaluation. A detached binding is inert until reinstalled.
	pub fn detach_from_property(&self) {
		*self.writer.borrow_mut() = None;
		self.clear_dependency_observers();
	}

	pub fn take_observers(&self) -> ObserverList {
		std::mem::take(&mut *self.observers.borrow_mut())
	}

	pub fn add_output_observer(&self, kind: ObserverKind) -> ObserverId {
		self.observers.borrow_mut().insert(kind)
	}

	pub fn remove_output_observer(&self, id: ObserverId) -> bool {
		self.observers.borrow_mut().remove(id)
	}

	pub fn output_observer_count(&self) -> usize {
		self.observers.borrow().len()
	}

	pub fn snapshot_observers(&self) -> Vec<ObserverKind> {
		self.observers.borrow().snapshot()
	}

	/// Records that `slot` was read while this binding was evaluating.
	pub fn add_dependency(self: Rc<Self>, slot: &Rc<SlotCell>) {
		let id = slot.add_observer(ObserverKind::Dependency(Rc::downgrade(&self)));
		self.dependencies.borrow_mut().push(DependencyEdge {
			slot: Rc::downgrade(slot),
			id,
		});
	}

	/// Unlinks every dependency observer. Dependencies are recomputed
	/// fresh on every evaluation because a conditional expression may
	/// read different properties each time.
	fn clear_dependency_observers(&self) {
		let edges = std::mem::take(&mut *self.dependencies.borrow_mut());
		for edge in edges {
			if let Some(slot) = edge.slot.upgrade() {
				slot.remove_observer(edge.id);
			}
		}
	}

	/// The evaluation protocol. Returns whether the stored value
	/// actually changed, so callers can suppress redundant downstream
	/// notifications.
	pub fn evaluate_if_dirty_and_return_changed(self: Rc<Self>) -> bool {
		if !self.dirty.get() {
			return false;
		}
		if self.updating.get() {
			tracing::error!(location = %self.location, "binding loop detected");
			*self.error.borrow_mut() = Some(BindingError::BindingLoop);
			return false;
		}

		self.updating.set(true);
		*self.error.borrow_mut() = None;
		self.clear_dependency_observers();

		let changed = {
			let _frame = BindingEvaluationFrame::push(self.clone());
			match (self.eval)() {
				Ok(value) => {
					if self.error.borrow().is_some() {
						// a loop was recorded while the expression ran;
						// keep the prior value
						false
					} else {
						let writer = self.writer.borrow().clone();
						match writer {
							Some(write) => write(value),
							None => false,
						}
					}
				}
				Err(error) => {
					*self.error.borrow_mut() = Some(error);
					false
				}
			}
		};

		self.dirty.set(false);
		self.updating.set(false);
		changed
	}

	/// Invalidation entry point. A binding already dirty is skipped,
	/// which terminates cascades through cyclic dependency graphs that
	/// never evaluate concurrently.
	pub fn mark_dirty_and_notify(self: Rc<Self>) {
		if self.dirty.get() {
			return;
		}
		self.dirty.set(true);

		if self.eager.get() {
			// the write-through wrapper runs the owning setter, which
			// performs its own change notification
			let _ = self.evaluate_if_dirty_and_return_changed();
			return;
		}

		let observers = self.snapshot_observers();
		let mut state = NotifyState::pending();
		observer::notify(observers, Some(&self), &mut state);
	}
}

impl Drop for BindingData {
	fn drop(&mut self) {
		// the last handle is gone; make sure no slot still points a
		// dependency observer at us
		self.clear_dependency_observers();
	}
}

/// Type-erased handle to a binding. Cloning shares the same underlying
/// binding state.
#[derive(Clone)]
pub struct UntypedPropertyBinding {
	pub(crate) data: Rc<BindingData>,
}

impl UntypedPropertyBinding {
	/// The `TypeId` of the value the expression produces. Checked when
	/// the binding is installed into a property.
	pub fn value_type(&self) -> TypeId {
		self.data.value_type()
	}

	pub fn error(&self) -> Option<BindingError> {
		self.data.error()
	}

	pub fn source_location(&self) -> &'static Location<'static> {
		self.data.source_location()
	}
}

/// A computed expression attachable to a [`Property`](crate::Property)
/// of the same value type. Holding a detached binding keeps it alive;
/// it can be installed again later.
pub struct PropertyBinding<T> {
	untyped: UntypedPropertyBinding,
	marker: PhantomData<fn() -> T>,
}

impl<T> fmt::Debug for PropertyBinding<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PropertyBinding")
			.field("source_location", &self.untyped.source_location())
			.finish_non_exhaustive()
	}
}

impl<T> Clone for PropertyBinding<T> {
	fn clone(&self) -> Self {
		PropertyBinding {
			untyped: self.untyped.clone(),
			marker: PhantomData,
		}
	}
}

impl<T: 'static> PropertyBinding<T> {
	#[track_caller]
	pub fn new(func: impl Fn() -> T + 'static) -> Self {
		Self::try_new(move || Ok(func()))
	}

	/// A binding whose expression can fail. Failure is captured as
	/// [`BindingError::EvaluationFailed`] on the binding; the property
	/// keeps its previous value.
	#[track_caller]
	pub fn try_new(func: impl Fn() -> Result<T, String> + 'static) -> Self {
		let location = Location::caller();
		let eval: EvalFn = Box::new(move || {
			func()
				.map(|value| Box::new(value) as Box<dyn Any>)
				.map_err(BindingError::EvaluationFailed)
		});
		PropertyBinding {
			untyped: UntypedPropertyBinding {
				data: BindingData::new(TypeId::of::<T>(), eval, location),
			},
			marker: PhantomData,
		}
	}

	pub(crate) fn from_data(data: Rc<BindingData>) -> Self {
		PropertyBinding {
			untyped: UntypedPropertyBinding { data },
			marker: PhantomData,
		}
	}

	pub fn into_untyped(self) -> UntypedPropertyBinding {
		self.untyped
	}

	pub fn error(&self) -> Option<BindingError> {
		self.untyped.error()
	}

	pub fn source_location(&self) -> &'static Location<'static> {
		self.untyped.source_location()
	}
}

impl<T: 'static> From<PropertyBinding<T>> for UntypedPropertyBinding {
	fn from(binding: PropertyBinding<T>) -> Self {
		binding.into_untyped()
	}
}
