pub use enclose::*;

/// Builds a [`PropertyBinding`](crate::PropertyBinding), optionally
/// clone-capturing the listed variables:
///
/// ```ignore
/// let b = bind!((a) => a.get() + 1);
/// ```
#[macro_export]
macro_rules! bind {
    (( $($d_tt:tt)* ) => $($b:tt)*) => {
        $crate::PropertyBinding::new($crate::macros::enclose!(($( $d_tt )*) move || { $($b)* }))
    };
    (=> $($b:tt)*) => {
        $crate::PropertyBinding::new(move || { $($b)* })
    };
}
