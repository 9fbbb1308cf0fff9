use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::Rc;

use crate::binding::{PropertyBinding, UntypedPropertyBinding, WriteBack};
use crate::error::BindingError;
use crate::evaluation;
use crate::hashed::{hash_of, HashFn, Hashed};
use crate::observer::{ChangeHandler, NotifyState, ObserverKind};
use crate::slot::SlotCell;

/// A reactive value: either an ordinary value or a computed expression
/// over other properties. Reads inside a binding expression are
/// tracked automatically; changes invalidate dependent bindings and
/// run registered change handlers. Cloning shares the same property.
pub struct Property<T> {
	pub(crate) data: Rc<PropertyStorage<T>>,
}

pub(crate) struct PropertyStorage<T> {
	value: RefCell<Hashed<T>>,
	hasher: Option<HashFn<T>>,
	pub(crate) cell: Rc<SlotCell>,
}

impl<T> Clone for Property<T> {
	fn clone(&self) -> Self {
		Property {
			data: self.data.clone(),
		}
	}
}

impl<T> Default for Property<T>
where
	T: Default + Hash + 'static,
{
	fn default() -> Self {
		Property::new(Default::default())
	}
}

impl<T: Hash + 'static> Property<T> {
	pub fn new(value: T) -> Self {
		Self::with_hasher(value, Some(hash_of::<T>))
	}
}

impl<T: 'static> Property<T> {
	/// A property whose value type has no usable equality. Every write
	/// and every recomputation counts as a change.
	pub fn opaque(value: T) -> Self {
		Self::with_hasher(value, None)
	}

	fn with_hasher(value: T, hasher: Option<HashFn<T>>) -> Self {
		Property {
			data: Rc::new(PropertyStorage {
				value: RefCell::new(Hashed::new(value, hasher)),
				hasher,
				cell: SlotCell::new(),
			}),
		}
	}

	pub(crate) fn from_storage(data: Rc<PropertyStorage<T>>) -> Self {
		Property { data }
	}

	/// Reads the value. If a binding is installed and dirty it is
	/// evaluated first; if another binding is currently evaluating, this
	/// property is recorded as one of its dependencies.
	pub fn value(&self) -> Ref<'_, T> {
		evaluation::register_with_currently_evaluating(&self.data.cell);
		if let Some(binding) = self.data.cell.binding() {
			let _ = binding.evaluate_if_dirty_and_return_changed();
		}
		Ref::map(self.data.value.borrow(), |hashed| &hashed.value)
	}

	/// Clone-out convenience for [`value`](Self::value).
	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.value().clone()
	}

	/// Reads the stored value without pulling a dirty binding and
	/// without registering a dependency.
	pub fn value_bypassing_bindings(&self) -> Ref<'_, T> {
		Ref::map(self.data.value.borrow(), |hashed| &hashed.value)
	}

	/// Assigns a value directly, overriding any installed binding.
	/// Observers are only notified when the value actually changed.
	pub fn set_value(&self, value: T) {
		self.data.cell.remove_binding();
		if !self.data.store(value) {
			return;
		}
		let mut state = NotifyState::known_changed();
		self.data.cell.notify_observers(None, &mut state);
	}

	/// Installs a binding, returning the previously installed one.
	pub fn set_binding(
		&self,
		binding: PropertyBinding<T>,
	) -> Result<Option<PropertyBinding<T>>, BindingError> {
		self.set_binding_untyped(binding.into_untyped())
	}

	/// Installs a type-erased binding. Rejected with
	/// [`BindingError::TypeMismatch`] when the binding's value type does
	/// not match `T`; prior state is left untouched.
	pub fn set_binding_untyped(
		&self,
		binding: UntypedPropertyBinding,
	) -> Result<Option<PropertyBinding<T>>, BindingError> {
		if binding.value_type() != TypeId::of::<T>() {
			return Err(BindingError::TypeMismatch);
		}

		let storage = Rc::downgrade(&self.data);
		let writer: WriteBack = Rc::new(move |boxed: Box<dyn Any>| {
			let Some(storage) = storage.upgrade() else {
				return false;
			};
			match boxed.downcast::<T>() {
				Ok(value) => storage.store(*value),
				Err(_) => false,
			}
		});

		let old = self.data.cell.install_binding(binding.data, writer);
		Ok(old.map(PropertyBinding::from_data))
	}

	/// Binds this property to an expression. Properties read by the
	/// expression become dependencies; the expression is re-evaluated
	/// lazily on the next read after any of them change.
	#[track_caller]
	pub fn bind(
		&self,
		func: impl Fn() -> T + 'static,
	) -> Result<Option<PropertyBinding<T>>, BindingError> {
		self.set_binding(PropertyBinding::new(func))
	}

	/// [`bind`](Self::bind) for fallible expressions.
	#[track_caller]
	pub fn try_bind(
		&self,
		func: impl Fn() -> Result<T, String> + 'static,
	) -> Result<Option<PropertyBinding<T>>, BindingError> {
		self.set_binding(PropertyBinding::try_new(func))
	}

	pub fn has_binding(&self) -> bool {
		self.data.cell.has_binding()
	}

	/// The installed binding, if any, without detaching it.
	pub fn binding(&self) -> Option<PropertyBinding<T>> {
		self.data.cell.binding().map(PropertyBinding::from_data)
	}

	/// Detaches and returns the installed binding. The property keeps
	/// its last evaluated value.
	pub fn take_binding(&self) -> Option<PropertyBinding<T>> {
		self.data
			.cell
			.remove_binding()
			.map(PropertyBinding::from_data)
	}

	/// The error captured by the installed binding's last evaluation.
	pub fn binding_error(&self) -> Option<BindingError> {
		self.data.cell.binding().and_then(|binding| binding.error())
	}

	/// Runs `func` whenever this property's value changes. The callback
	/// stays registered for the lifetime of the returned handler.
	pub fn on_change(&self, func: impl Fn() + 'static) -> ChangeHandler {
		let id = self
			.data
			.cell
			.add_observer(ObserverKind::ChangeHandler(Rc::new(func)));
		ChangeHandler {
			slot: Rc::downgrade(&self.data.cell),
			id,
		}
	}

	/// Like [`on_change`](Self::on_change), but also invokes the
	/// callback once immediately.
	pub fn subscribe(&self, func: impl Fn() + 'static) -> ChangeHandler {
		func();
		self.on_change(func)
	}

	// public because the integration tests assert on it
	#[doc(hidden)]
	pub fn observer_count(&self) -> usize {
		self.data.cell.observer_count()
	}
}

impl<T: 'static> PropertyStorage<T> {
	/// Writes the value; reports false (and skips the write) when the
	/// hash says nothing changed.
	pub(crate) fn store(&self, value: T) -> bool {
		self.value.borrow_mut().replace(value, self.hasher)
	}
}

impl<T> Debug for Property<T>
where
	T: Debug + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.value_bypassing_bindings().fmt(f)
	}
}
