use std::any::{Any, TypeId};
use std::cell::{Ref, RefCell};
use std::fmt::Debug;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::binding::{PropertyBinding, UntypedPropertyBinding, WriteBack};
use crate::error::BindingError;
use crate::evaluation::{self, CompatPropertyFrame};
use crate::hashed::{hash_of, HashFn, Hashed};
use crate::observer::{ChangeHandler, NotifyState, ObserverKind};
use crate::storage::BindingStorage;

type Setter<T> = Box<dyn Fn(&CompatProperty<T>, T)>;

/// An eagerly evaluated property for code paths that must see a
/// synchronously updated plain field rather than a lazily recomputed
/// one. A binding installed here pushes every recomputed value through
/// the owning setter immediately; the slot lives in the object's
/// [`BindingStorage`] instead of inline.
pub struct CompatProperty<T> {
	data: Rc<CompatData<T>>,
}

struct CompatData<T> {
	value: RefCell<Hashed<T>>,
	hasher: Option<HashFn<T>>,
	setter: Option<Setter<T>>,
	storage: BindingStorage,
	this: Weak<CompatData<T>>,
}

impl<T> Clone for CompatProperty<T> {
	fn clone(&self) -> Self {
		CompatProperty {
			data: self.data.clone(),
		}
	}
}

impl<T: Hash + 'static> CompatProperty<T> {
	pub fn new(storage: &BindingStorage, value: T) -> Self {
		Self::build(storage, value, Some(hash_of::<T>), None)
	}

	/// A compatibility property with an owning setter. The setter is
	/// invoked with every new value the binding pushes; it performs the
	/// actual write by calling [`set_value`](Self::set_value), plus
	/// whatever imperative side effects the owner needs.
	pub fn with_setter(
		storage: &BindingStorage,
		value: T,
		setter: impl Fn(&CompatProperty<T>, T) + 'static,
	) -> Self {
		Self::build(storage, value, Some(hash_of::<T>), Some(Box::new(setter)))
	}
}

impl<T: 'static> CompatProperty<T> {
	fn build(
		storage: &BindingStorage,
		value: T,
		hasher: Option<HashFn<T>>,
		setter: Option<Setter<T>>,
	) -> Self {
		CompatProperty {
			data: Rc::new_cyclic(|this| CompatData {
				value: RefCell::new(Hashed::new(value, hasher)),
				hasher,
				setter,
				storage: storage.clone(),
				this: this.clone(),
			}),
		}
	}

	/// The key of this property in its [`BindingStorage`].
	fn key(&self) -> usize {
		Rc::as_ptr(&self.data) as usize
	}

	/// Reads the backing field. Inside the property's own write-through
	/// wrapper this is a plain read; otherwise a dirty binding is
	/// pulled first and the read registers with whatever binding is
	/// currently evaluating.
	pub fn value(&self) -> Ref<'_, T> {
		let key = self.key();
		if !evaluation::in_compat_wrapper(key) {
			let cell = match self.data.storage.slot(key) {
				Some(cell) => Some(cell),
				None if evaluation::currently_evaluating_binding().is_some() => {
					Some(self.data.storage.slot_or_create(key))
				}
				None => None,
			};
			if let Some(cell) = cell {
				evaluation::register_with_currently_evaluating(&cell);
				if let Some(binding) = cell.binding() {
					let _ = binding.evaluate_if_dirty_and_return_changed();
				}
			}
		}
		Ref::map(self.data.value.borrow(), |hashed| &hashed.value)
	}

	pub fn get(&self) -> T
	where
		T: Clone,
	{
		self.value().clone()
	}

	/// Imperative write. Outside the write-through wrapper this
	/// overrides and removes any installed binding; inside it the
	/// binding stays and the write is the binding's own result landing
	/// in the field.
	pub fn set_value(&self, value: T) {
		let key = self.key();
		let cell = self.data.storage.slot(key);
		if let Some(cell) = &cell {
			if !evaluation::in_compat_wrapper(key) {
				cell.remove_binding();
			}
		}
		if !self.data.value.borrow_mut().replace(value, self.data.hasher) {
			return;
		}
		if let Some(cell) = cell {
			let mut state = NotifyState::known_changed();
			cell.notify_observers(None, &mut state);
		}
	}

	/// Installs a binding in the eager discipline: it is evaluated
	/// immediately and the setter is invoked with the result, and every
	/// later dependency change pushes synchronously the same way.
	pub fn set_binding(
		&self,
		binding: PropertyBinding<T>,
	) -> Result<Option<PropertyBinding<T>>, BindingError> {
		self.set_binding_untyped(binding.into_untyped())
	}

	pub fn set_binding_untyped(
		&self,
		binding: UntypedPropertyBinding,
	) -> Result<Option<PropertyBinding<T>>, BindingError> {
		if binding.value_type() != TypeId::of::<T>() {
			return Err(BindingError::TypeMismatch);
		}

		let key = self.key();
		let weak = self.data.this.clone();
		let writer: WriteBack = Rc::new(move |boxed: Box<dyn Any>| {
			let Some(data) = weak.upgrade() else {
				return false;
			};
			let value = match boxed.downcast::<T>() {
				Ok(value) => *value,
				Err(_) => return false,
			};
			// candidate equal to the current value: skip the setter
			if !data.differs(&value) {
				return false;
			}
			let _frame = CompatPropertyFrame::push(key);
			let property = CompatProperty { data: data.clone() };
			match &data.setter {
				Some(setter) => setter(&property, value),
				None => property.set_value(value),
			}
			true
		});

		binding.data.set_eager(true);
		let cell = self.data.storage.slot_or_create(key);
		let old = cell.install_binding(binding.data, writer);
		Ok(old.map(PropertyBinding::from_data))
	}

	pub fn has_binding(&self) -> bool {
		self.data
			.storage
			.slot(self.key())
			.map(|cell| cell.has_binding())
			.unwrap_or(false)
	}

	pub fn binding(&self) -> Option<PropertyBinding<T>> {
		self.data
			.storage
			.slot(self.key())?
			.binding()
			.map(PropertyBinding::from_data)
	}

	pub fn take_binding(&self) -> Option<PropertyBinding<T>> {
		self.data
			.storage
			.slot(self.key())?
			.remove_binding()
			.map(PropertyBinding::from_data)
	}

	pub fn binding_error(&self) -> Option<BindingError> {
		self.data
			.storage
			.slot(self.key())?
			.binding()
			.and_then(|binding| binding.error())
	}

	pub fn on_change(&self, func: impl Fn() + 'static) -> ChangeHandler {
		let cell = self.data.storage.slot_or_create(self.key());
		let id = cell.add_observer(ObserverKind::ChangeHandler(Rc::new(func)));
		ChangeHandler {
			slot: Rc::downgrade(&cell),
			id,
		}
	}

	pub fn subscribe(&self, func: impl Fn() + 'static) -> ChangeHandler {
		func();
		self.on_change(func)
	}
}

impl<T> CompatData<T> {
	fn differs(&self, value: &T) -> bool {
		match (self.value.borrow().hash, self.hasher) {
			(Some(current), Some(hasher)) => hasher(value) != current,
			_ => true,
		}
	}
}

impl<T> Drop for CompatData<T> {
	fn drop(&mut self) {
		// the slot in the object's storage is keyed by our address
		let key = self as *const CompatData<T> as usize;
		self.storage.remove(key);
	}
}

impl<T> Debug for CompatProperty<T>
where
	T: Debug + 'static,
{
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		self.data.value.borrow().value.fmt(f)
	}
}
