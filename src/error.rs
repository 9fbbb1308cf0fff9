use thiserror::Error;

/// Everything that can go wrong around a binding. Evaluation errors are
/// captured on the binding itself and queried afterwards; they never
/// abort notification of unrelated observers.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindingError {
	/// A binding re-entered its own evaluation, either by reading its
	/// owning property or through a cycle of dependent bindings.
	#[error("binding loop detected")]
	BindingLoop,

	/// The binding expression reported failure. The property keeps its
	/// previous value.
	#[error("binding evaluation failed: {0}")]
	EvaluationFailed(String),

	/// The binding produces a different value type than the property it
	/// was installed into. The installation is rejected and prior state
	/// is left untouched.
	#[error("binding value type does not match the property")]
	TypeMismatch,
}
