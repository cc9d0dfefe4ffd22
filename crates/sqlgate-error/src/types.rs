use std::{
    backtrace::Backtrace,
    error::Error as StdError,
    fmt::{self, Debug, Display, Formatter},
    io,
};

use crate::ErrorCode;

pub type GateResult<T, E = Box<GateError>> = Result<T, E>;

/// A wrapped source error. Kept as a trait object so the leaf error crate
/// does not have to know about every library the rest of the workspace uses.
pub struct WrappedError(Box<dyn StdError + Send + Sync + 'static>);

impl WrappedError {
    pub fn new(err: impl StdError + Send + Sync + 'static) -> Self {
        WrappedError(Box::new(err))
    }

    pub fn as_dyn(&self) -> &(dyn StdError + 'static) {
        self.0.as_ref()
    }
}

impl Display for WrappedError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl Debug for WrappedError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Debug::fmt(&self.0, f)
    }
}

pub struct GateError {
    pub code: ErrorCode,
    pub context: String,
    cause: Option<WrappedError>,
    backtrace: Backtrace,
}

impl Debug for GateError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("GateError")
            .field("code", &self.code)
            .field("context", &self.context)
            .field("cause", &self.cause)
            .finish()
    }
}

impl Display for GateError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{}", self.context)?;
        if let Some(cause) = &self.cause {
            if !self.context.is_empty() {
                write!(f, ": ")?;
            }
            write!(f, "{cause}")?;
        }
        Ok(())
    }
}

impl StdError for GateError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.cause.as_ref().map(|e| e.as_dyn())
    }
}

impl GateError {
    pub fn new(code: ErrorCode, context: impl Into<String>) -> Self {
        GateError {
            code,
            context: context.into(),
            cause: None,
            backtrace: Backtrace::capture(),
        }
    }

    pub fn with_cause(mut self, cause: impl StdError + Send + Sync + 'static) -> Self {
        self.cause = Some(WrappedError::new(cause));
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// The deepest non-blank message in the cause chain. This is what gets
    /// surfaced to users for database-origin failures, where the outermost
    /// layers tend to repeat generic wrapper text.
    pub fn root_message(&self) -> String {
        let mut best = self.context.trim().to_string();
        let mut source: Option<&dyn StdError> = self.source();
        while let Some(err) = source {
            let msg = err.to_string();
            if !msg.trim().is_empty() {
                best = msg.trim().to_string();
            }
            source = err.source();
        }
        best
    }
}

impl From<io::Error> for Box<GateError> {
    fn from(err: io::Error) -> Self {
        let kind = err.kind();
        Box::new(GateError::new(ErrorCode::IoError, format!("IO error: {kind}")).with_cause(err))
    }
}

/// Walk an error's source chain and return the deepest non-blank message.
pub fn deepest_message(err: &(dyn StdError + 'static)) -> String {
    let mut best = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let msg = inner.to_string();
        if !msg.trim().is_empty() {
            best = msg;
        }
        source = inner.source();
    }
    best.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Leaf(&'static str);
    impl Display for Leaf {
        fn fmt(&self, f: &mut Formatter) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }
    impl StdError for Leaf {}

    #[test]
    fn test_display_with_cause() {
        let err = GateError::new(ErrorCode::ExecutionError, "statement failed")
            .with_cause(Leaf("ORA-00942: table or view does not exist"));
        assert_eq!(
            err.to_string(),
            "statement failed: ORA-00942: table or view does not exist"
        );
    }

    #[test]
    fn test_root_message_skips_blank_layers() {
        let err = GateError::new(ErrorCode::ExecutionError, "outer").with_cause(Leaf("inner leaf"));
        assert_eq!(err.root_message(), "inner leaf");
    }

    #[test]
    fn test_macros_box_the_error() {
        let err: Box<GateError> = gate_err!(ErrorCode::InvalidArgument, "sql must not be {}", "blank");
        assert_eq!(err.code, ErrorCode::InvalidArgument);
        assert_eq!(err.context, "sql must not be blank");

        let res: GateResult<()> = err!(ErrorCode::SessionNotFound, "no such session");
        assert_eq!(res.unwrap_err().code, ErrorCode::SessionNotFound);
    }
}
