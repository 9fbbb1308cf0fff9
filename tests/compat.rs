use std::cell::RefCell;
use std::rc::Rc;

use bindery::{BindingError, BindingStorage, CompatProperty, Property, PropertyBinding};
use mockall::predicate::eq;

mod mock;

use mock::{SharedMock, Spy};

fn logging_compat(storage: &BindingStorage, log: &Rc<RefCell<Vec<i32>>>) -> CompatProperty<i32> {
	CompatProperty::with_setter(storage, 0, {
		let log = log.clone();
		move |property, value| {
			log.borrow_mut().push(value);
			property.set_value(value);
		}
	})
}

#[test]
fn eager_binding_pushes_through_the_setter() {
	let storage = BindingStorage::new();
	let a = Property::new(3);
	let log = Rc::new(RefCell::new(Vec::new()));
	let c = logging_compat(&storage, &log);

	// installation evaluates immediately, no read required
	c.set_binding(PropertyBinding::new({
		let a = a.clone();
		move || a.get() * 2
	}))
	.unwrap();
	assert_eq!(*log.borrow(), [6]);
	assert_eq!(*c.value(), 6);

	// a dependency change pushes synchronously
	a.set_value(4);
	assert_eq!(*log.borrow(), [6, 8]);
	assert_eq!(*c.value(), 8);
}

#[test]
fn unchanged_recomputation_skips_the_setter() {
	let storage = BindingStorage::new();
	let a = Property::new(7);
	let log = Rc::new(RefCell::new(Vec::new()));
	let c = logging_compat(&storage, &log);

	c.set_binding(PropertyBinding::new({
		let a = a.clone();
		move || a.get().min(5)
	}))
	.unwrap();
	assert_eq!(*log.borrow(), [5]);

	a.set_value(9);
	assert_eq!(*log.borrow(), [5]);
	assert_eq!(*c.value(), 5);
}

#[test]
fn direct_write_overrides_the_binding() {
	let storage = BindingStorage::new();
	let a = Property::new(3);
	let log = Rc::new(RefCell::new(Vec::new()));
	let c = logging_compat(&storage, &log);

	c.set_binding(PropertyBinding::new({
		let a = a.clone();
		move || a.get() * 2
	}))
	.unwrap();
	assert_eq!(*log.borrow(), [6]);

	c.set_value(100);
	assert!(!c.has_binding());
	assert_eq!(a.observer_count(), 0);

	a.set_value(10);
	assert_eq!(*log.borrow(), [6]);
	assert_eq!(*c.value(), 100);
}

#[test]
fn compat_properties_are_observable_dependencies() {
	let storage = BindingStorage::new();
	let a = Property::new(3);
	let c = CompatProperty::new(&storage, 0);

	c.set_binding(PropertyBinding::new({
		let a = a.clone();
		move || a.get() * 2
	}))
	.unwrap();

	let b = Property::new(0);
	b.bind({
		let c = c.clone();
		move || c.get() + 1
	})
	.unwrap();
	assert_eq!(*b.value(), 7);

	a.set_value(5);
	assert_eq!(*b.value(), 11);
}

#[test]
fn default_setter_writes_through() {
	let storage = BindingStorage::new();
	let a = Property::new(3);
	let c = CompatProperty::new(&storage, 0);
	let mock = SharedMock::new();

	let _handler = c.on_change({
		let mock = mock.clone();
		let c = c.clone();
		move || mock.get().trigger(*c.value() as i64)
	});

	mock.get().expect_trigger().with(eq(6)).times(1).return_const(());
	c.set_binding(PropertyBinding::new({
		let a = a.clone();
		move || a.get() * 2
	}))
	.unwrap();
	mock.get().checkpoint();

	assert_eq!(*c.value(), 6);

	mock.get().expect_trigger().with(eq(8)).times(1).return_const(());
	a.set_value(4);
	mock.get().checkpoint();
}

#[test]
fn eager_binding_loop_is_reported() {
	let storage = BindingStorage::new();
	let c = CompatProperty::new(&storage, 0);

	c.set_binding(PropertyBinding::new({
		let c = c.clone();
		move || *c.value() + 1
	}))
	.unwrap();

	assert_eq!(*c.value(), 0);
	assert_eq!(c.binding_error(), Some(BindingError::BindingLoop));
}

#[test]
fn type_mismatch_rejected_before_installation() {
	let storage = BindingStorage::new();
	let c = CompatProperty::new(&storage, 1i32);

	let wrong = PropertyBinding::new(|| 2.5f64).into_untyped();
	assert_eq!(
		c.set_binding_untyped(wrong).unwrap_err(),
		BindingError::TypeMismatch
	);
	assert!(!c.has_binding());
	assert_eq!(*c.value(), 1);
}

#[test]
fn slots_are_created_lazily_and_torn_down() {
	let storage = BindingStorage::new();
	let a = Property::new(1);

	let c = CompatProperty::new(&storage, 0);
	assert_eq!(storage.slot_count(), 0);

	c.set_binding(PropertyBinding::new({
		let a = a.clone();
		move || a.get()
	}))
	.unwrap();
	assert_eq!(storage.slot_count(), 1);

	drop(c);
	assert_eq!(storage.slot_count(), 0);
	assert_eq!(a.observer_count(), 0);
}

#[test]
fn take_binding_stops_the_push() {
	let storage = BindingStorage::new();
	let a = Property::new(3);
	let log = Rc::new(RefCell::new(Vec::new()));
	let c = logging_compat(&storage, &log);

	c.set_binding(PropertyBinding::new({
		let a = a.clone();
		move || a.get() * 2
	}))
	.unwrap();
	assert_eq!(*log.borrow(), [6]);

	let taken = c.take_binding().unwrap();
	assert!(taken.error().is_none());

	a.set_value(5);
	assert_eq!(*log.borrow(), [6]);
	assert_eq!(*c.value(), 6);
}
