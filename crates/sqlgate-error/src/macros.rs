/// gate_err!(code, msg) constructs a boxed [GateError], to be used for further
/// processing, e.g. typically used in `.map_err(|_| gate_err!(..))`, etc
///
/// [GateError]: crate::GateError
#[macro_export]
macro_rules! gate_err {
    ($code:expr, $($arg:tt)*) => {
        Box::new($crate::GateError::new(
            $code,
            format!($($arg)*),
        ))
    };
}

/// err! constructs a boxed [GateError] and immediately wraps it in an `Err`
/// variant of a `Result`, typically used in `return err!(...)`, etc
///
/// [GateError]: crate::GateError
#[macro_export]
macro_rules! err {
    ($code:expr, $($arg:tt)*) => {
        Err($crate::gate_err!($code, $($arg)*))
    };
}

#[macro_export]
macro_rules! unexpected_err {
    ($($arg:tt)*) => {
        Err(Box::new($crate::GateError::new(
            $crate::ErrorCode::Unexpected,
            format!($($arg)*),
        )))
    }
}
