//! Error taxonomy for building, parsing and executing commands.
//!
//! Errors fall into three stages that never overlap at runtime:
//!
//! - [`BuildError`]: raised once while assembling the tree and registry.
//!   A registry that failed to build does not exist, so these never reach
//!   per-dispatch code paths.
//! - [`ParseError`]: raised before any command body runs. Recoverable and
//!   free of side effects.
//! - [`DispatchError::Unhandled`]: a body failed and its error handler
//!   chose not to recover.
//!
//! [`DispatchError`] wraps all of them so callers that parse and execute in
//! one step get a single error type, and [`ErrorKind`] gives a flat
//! classification for matching.

use std::fmt;

use thiserror::Error;

/// Boxed failure raised by a command body.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A descriptor whose declared parent was never found in the batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedRef {
    /// Local id of the orphaned descriptor.
    pub id: String,
    /// Parent id it pointed at.
    pub parent: String,
}

impl fmt::Display for UnresolvedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.id, self.parent)
    }
}

fn join_refs(refs: &[UnresolvedRef]) -> String {
    refs.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Tree and registry construction errors.
///
/// All of these are fatal: the registry is not usable until the offending
/// declarations are fixed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    /// Id is empty or contains `.` or whitespace.
    #[error("invalid command id: {0:?}")]
    InvalidId(String),
    /// Alias is empty or contains whitespace.
    #[error("invalid alias {alias:?} on command {id}")]
    InvalidAlias { id: String, alias: String },
    /// Effective prefix contains whitespace and could never match a token.
    #[error("invalid prefix {prefix:?} on command {id}")]
    InvalidPrefix { id: String, prefix: String },
    /// Descriptor names itself as its parent.
    #[error("command declares itself as its parent: {0}")]
    SelfParent(String),
    /// Two descriptors in one batch share an id.
    #[error("duplicate command id in batch: {0}")]
    DuplicateId(String),
    /// Descriptors whose parent ids never resolved (includes cycles).
    #[error("unresolved parent reference(s): {}", join_refs(.0))]
    UnresolvedParent(Vec<UnresolvedRef>),
    /// Two commands claim the same alias within one scope.
    #[error("alias {prefix}{alias} is claimed by both {first} and {second}")]
    DuplicateAlias {
        prefix: String,
        alias: String,
        first: String,
        second: String,
    },
}

/// Input parsing errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Input is empty or does not start with any registered prefix.
    #[error("no registered prefix matches input {input:?}")]
    NoPrefix { input: String },
    /// Prefix matched but no enabled root command has the alias.
    #[error("no command {prefix}{alias}")]
    NotFound { prefix: String, alias: String },
}

/// Flat classification of [`DispatchError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Unhandled,
    NotFound,
    NoPrefix,
    BuildError,
    Internal,
}

/// Any error a dispatch can produce.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    /// A body failed and its error handler re-raised the failure.
    #[error("command {command} failed: {source}")]
    Unhandled {
        /// Fully-qualified id of the failing command.
        command: String,
        #[source]
        source: BoxError,
    },

    /// Broken engine invariant (for example a disabled node in a resolved
    /// chain, or a worker that vanished without reporting).
    #[error("internal dispatch error: {0}")]
    Internal(String),
}

impl DispatchError {
    /// Returns the flat classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Build(_) => ErrorKind::BuildError,
            Self::Parse(ParseError::NoPrefix { .. }) => ErrorKind::NoPrefix,
            Self::Parse(ParseError::NotFound { .. }) => ErrorKind::NotFound,
            Self::Unhandled { .. } => ErrorKind::Unhandled,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Fully-qualified id of the command involved, when there is one.
    pub fn command(&self) -> Option<&str> {
        match self {
            Self::Unhandled { command, .. } => Some(command.as_str()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_parent_message_lists_every_ref() {
        let err = BuildError::UnresolvedParent(vec![
            UnresolvedRef {
                id: "a".into(),
                parent: "x".into(),
            },
            UnresolvedRef {
                id: "b".into(),
                parent: "y".into(),
            },
        ]);
        assert_eq!(
            err.to_string(),
            "unresolved parent reference(s): a -> x, b -> y"
        );
    }

    #[test]
    fn test_kind_classification() {
        let err: DispatchError = ParseError::NoPrefix {
            input: "?x".into(),
        }
        .into();
        assert_eq!(err.kind(), ErrorKind::NoPrefix);

        let err: DispatchError = BuildError::SelfParent("a".into()).into();
        assert_eq!(err.kind(), ErrorKind::BuildError);

        let err = DispatchError::Unhandled {
            command: "main.sub1".into(),
            source: "boom".into(),
        };
        assert_eq!(err.kind(), ErrorKind::Unhandled);
        assert_eq!(err.command(), Some("main.sub1"));
    }
}
