use thiserror::Error;

#[derive(Debug, Error)]
#[error(transparent)]
pub struct Error(Box<ErrorKind>);

pub type StdErrorBoxed = Box<dyn std::error::Error + Send + Sync + 'static>;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Returns [`ErrorKind::InvalidArgument`] for `name` unless `cond` holds.
///
/// The message defaults to the failed condition; a format string can report the
/// offending values instead.
#[macro_export]
macro_rules! verify_arg {
    ($name:ident, $cond:expr) => {
        $crate::verify_arg!($name, $cond, "`{}` does not hold", stringify!($cond))
    };
    ($name:ident, $cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Err($crate::error::Error::invalid_arg(
                stringify!($name),
                format!($($msg)+),
            ));
        }
    };
}

/// Returns [`ErrorKind::InvalidFormat`] for `name` unless `cond` holds.
#[macro_export]
macro_rules! verify_data {
    ($name:ident, $cond:expr) => {
        $crate::verify_data!($name, $cond, "`{}` does not hold", stringify!($cond))
    };
    ($name:ident, $cond:expr, $($msg:tt)+) => {
        if !$cond {
            return Err($crate::error::Error::invalid_format_msg(
                stringify!($name),
                format!($($msg)+),
            ));
        }
    };
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        self.0.as_ref()
    }

    pub fn into_kind(self) -> ErrorKind {
        *self.0
    }

    pub fn invalid_format_msg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidFormat {
                element: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_arg(name: impl Into<String>, message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidArgument {
                name: name.into(),
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn invalid_definition(message: impl Into<String>) -> Error {
        Error(
            ErrorKind::InvalidDefinition {
                message: message.into(),
            }
            .into(),
        )
    }

    pub fn out_of_bounds(element: impl Into<String>, index: u64, len: u64) -> Error {
        Error(
            ErrorKind::OutOfBounds {
                element: element.into(),
                index,
                len,
            }
            .into(),
        )
    }

    pub fn closed(resource: impl Into<String>) -> Error {
        Error(
            ErrorKind::Closed {
                resource: resource.into(),
            }
            .into(),
        )
    }

    pub fn unsupported_accessor(accessor: impl Into<String>) -> Error {
        Error(
            ErrorKind::UnsupportedAccessor {
                accessor: accessor.into(),
            }
            .into(),
        )
    }

    pub fn value_read(accessor: impl Into<String>, args: Vec<String>, source: Error) -> Error {
        Error(
            ErrorKind::ValueRead {
                accessor: accessor.into(),
                args,
                source,
            }
            .into(),
        )
    }

    pub fn conversion<E>(field: impl Into<String>, source: E) -> Error
    where
        E: Into<StdErrorBoxed>,
    {
        Error(
            ErrorKind::Conversion {
                field: field.into(),
                source: source.into(),
            }
            .into(),
        )
    }

    pub fn io(context: impl Into<String>, source: std::io::Error) -> Error {
        Error(
            ErrorKind::Io {
                context: context.into(),
                source,
            }
            .into(),
        )
    }

    /// Folds a list of failures into a single outcome.
    ///
    /// No failures yield `Ok(())`, a single failure is returned as is, and several
    /// failures are wrapped into [`ErrorKind::Multiple`] keeping every original cause.
    pub fn aggregate(mut errors: Vec<Error>) -> Result<()> {
        match errors.len() {
            0 => Ok(()),
            1 => Err(errors.remove(0)),
            _ => Err(ErrorKind::Multiple { errors }.into()),
        }
    }

    /// Returns `true` if this error reports an operation on a closed resource.
    pub fn is_closed(&self) -> bool {
        matches!(self.kind(), ErrorKind::Closed { .. })
    }
}

#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("invalid argument {name}: {message}")]
    InvalidArgument { name: String, message: String },

    #[error("invalid definition: {message}")]
    InvalidDefinition { message: String },

    #[error("invalid format for '{element}': {message}")]
    InvalidFormat { element: String, message: String },

    #[error("index {index} is out of bounds for '{element}' of length {len}")]
    OutOfBounds {
        element: String,
        index: u64,
        len: u64,
    },

    #[error("'{resource}' is closed")]
    Closed { resource: String },

    #[error("unsupported accessor '{accessor}'")]
    UnsupportedAccessor { accessor: String },

    #[error("failed to read value of '{accessor}' ({}): {source}", .args.join(", "))]
    ValueRead {
        accessor: String,
        args: Vec<String>,
        source: Error,
    },

    #[error("failed to convert value of '{field}': {source}")]
    Conversion {
        field: String,
        source: StdErrorBoxed,
    },

    #[error("IO error for '{context}': {source}")]
    Io {
        context: String,
        source: std::io::Error,
    },

    #[error("{} errors occurred: {}", .errors.len(), join_errors(.errors))]
    Multiple { errors: Vec<Error> },
}

fn join_errors(errors: &[Error]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Error(kind.into())
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::io("", e)
    }
}

#[cfg(test)]
mod tests {
    use super::{Error, ErrorKind, Result};

    fn check_width(width: usize, len: usize) -> Result<usize> {
        verify_arg!(width, width > 0);
        verify_data!(len, len % width == 0, "{len} keys do not split into rows of {width}");
        Ok(len / width)
    }

    #[test]
    fn test_verify_macros() {
        assert_eq!(check_width(3, 9).unwrap(), 3);

        let err = check_width(0, 9).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidArgument { name, message }
                if name == "width" && message == "`width > 0` does not hold"
        ));

        let err = check_width(4, 9).unwrap_err();
        assert!(matches!(
            err.kind(),
            ErrorKind::InvalidFormat { element, message }
                if element == "len" && message == "9 keys do not split into rows of 4"
        ));
    }

    #[test]
    fn test_aggregate_keeps_single_error() {
        assert!(Error::aggregate(vec![]).is_ok());

        let err = Error::aggregate(vec![Error::closed("channel")]).unwrap_err();
        assert!(err.is_closed());
    }

    #[test]
    fn test_aggregate_multiple_errors() {
        let err = Error::aggregate(vec![
            Error::io("close a", std::io::ErrorKind::Other.into()),
            Error::io("close b", std::io::ErrorKind::Other.into()),
        ])
        .unwrap_err();
        match err.kind() {
            ErrorKind::Multiple { errors } => assert_eq!(errors.len(), 2),
            other => panic!("unexpected {other:?}"),
        }
        assert!(err.to_string().starts_with("2 errors occurred"));
    }

    #[test]
    fn test_value_read_message() {
        let err = Error::value_read(
            "items",
            vec!["3".to_string()],
            Error::invalid_format_msg("number", "unexpected character"),
        );
        let message = err.to_string();
        assert!(message.contains("'items' (3)"), "{message}");
        assert!(std::error::Error::source(&err).is_some());
    }
}
