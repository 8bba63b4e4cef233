use std::fmt;
use std::path::PathBuf;

/// Result type alias for the application
pub type Result<T> = std::result::Result<T, Error>;

/// Errors from loading configuration and reading user input.
///
/// Schema compilation itself never returns these: problems found while
/// compiling are recorded as [`Degradation`]s and compilation continues.
#[derive(Debug)]
pub enum Error {
    IoError(std::io::Error),
    InvalidArgument(String),
    ConfigError { file: PathBuf, message: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::InvalidArgument(msg) => write!(f, "invalid argument: {}", msg),
            Error::ConfigError { file, message } => {
                write!(f, "invalid configuration {}: {}", file.display(), message)
            }
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::IoError(err)
    }
}

/// A condition absorbed during compilation that reduced schema precision.
///
/// None of these abort a build. They are collected on the
/// [`SchemaRegistry`](crate::registry::SchemaRegistry) so callers can report them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Degradation {
    /// An annotation clause could not be parsed and was dropped.
    MalformedAnnotation {
        namespace: &'static str,
        clause: String,
        reason: String,
    },
    /// Two distinct types wanted the same schema name; the later one was qualified.
    NameCollision {
        requested: String,
        assigned: String,
    },
    /// A type had no schema mapping and compiled to an open schema.
    UnsupportedKind { type_name: String },
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Degradation::MalformedAnnotation {
                namespace,
                clause,
                reason,
            } => write!(f, "dropped {} clause `{}`: {}", namespace, clause, reason),
            Degradation::NameCollision {
                requested,
                assigned,
            } => write!(
                f,
                "schema name `{}` already taken, registered as `{}`",
                requested, assigned
            ),
            Degradation::UnsupportedKind { type_name } => {
                write!(f, "no schema mapping for `{}`, emitted an open schema", type_name)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::ConfigError {
            file: PathBuf::from("openapi-docs.yaml"),
            message: "routes: invalid type".into(),
        };
        assert_eq!(
            err.to_string(),
            "invalid configuration openapi-docs.yaml: routes: invalid type"
        );

        let io = Error::from(std::io::Error::new(std::io::ErrorKind::NotFound, "gone"));
        assert!(std::error::Error::source(&io).is_some());
    }

    #[test]
    fn test_degradation_display() {
        let collision = Degradation::NameCollision {
            requested: "Item".into(),
            assigned: "shop.Item".into(),
        };
        assert_eq!(
            collision.to_string(),
            "schema name `Item` already taken, registered as `shop.Item`"
        );
    }
}
