pub mod macros;

mod alias;
mod binding;
mod compat;
mod error;
mod evaluation;
mod hashed;
mod observer;
mod property;
mod slot;
mod storage;

pub use alias::PropertyAlias;
pub use binding::{PropertyBinding, UntypedPropertyBinding};
pub use compat::CompatProperty;
pub use error::BindingError;
pub use observer::ChangeHandler;
pub use property::Property;
pub use storage::BindingStorage;
