pub use enclose::*;

/// Builds a [`Computed`](crate::Computed) from an expression body. The
/// parenthesized list clones the named handles into the closure.
///
/// ```ignore
/// let b = computed!((a) prior => *a.get() + 10);
/// ```
#[macro_export]
macro_rules! computed {
    (( $($d_tt:tt)* ) $prior:ident => $($b:tt)*) => {
        $crate::Computed::new($crate::macros::enclose!(($( $d_tt )*) Box::new(move |$prior: Option<&_>| { $($b)* })))
    };
    ($prior:ident => $($b:tt)*) => {
        $crate::Computed::new(Box::new(move |$prior: Option<&_>| { $($b)* }))
    };
}

/// Builds a [`Reaction`](crate::Reaction) from a compute body and an update
/// callback.
///
/// ```ignore
/// let r = reaction!((a) _prior => *a.get(), |value, _prior| log(value));
/// ```
#[macro_export]
macro_rules! reaction {
    (( $($d_tt:tt)* ) $prior:ident => $body:expr, $update:expr) => {
        $crate::Reaction::new(
            $crate::macros::enclose!(($( $d_tt )*) Box::new(move |$prior: Option<&_>| $body)),
            Box::new($update),
        )
    };
    ($prior:ident => $body:expr, $update:expr) => {
        $crate::Reaction::new(Box::new(move |$prior: Option<&_>| $body), Box::new($update))
    };
}

/// Runs a block as one transaction on the current reactor.
#[macro_export]
macro_rules! batch {
    ($($b:tt)*) => {
        $crate::reactor::batch(|| { $($b)* })
    };
}
