//! Error types for the communication registry.

use super::value::ValueType;
use super::CommunicationKind;

/// Errors surfaced by registration, lookup and invocation of communications.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CommunicationError {
    /// The name violates the communication-name grammar.
    #[error("name {0:?} is invalid, allowed characters are ASCII alphanumerics plus -_+")]
    InvalidName(String),

    /// Another entry with the same name exists in the target namespace.
    #[error("{kind} {name:?} is already defined in this namespace")]
    AlreadyDefined {
        kind: CommunicationKind,
        name: String,
    },

    /// No namespace exists at the given path.
    #[error("namespace at {0:?} does not exist")]
    NamespaceNotFound(String),

    /// No entry with the given name exists in the resolved namespace.
    #[error("{kind} {name:?} is not defined")]
    NotDefined {
        kind: CommunicationKind,
        name: String,
    },

    /// The entry exists but is a different communication kind.
    #[error("{name:?} is a {actual}, expected a {expected}")]
    KindMismatch {
        name: String,
        expected: CommunicationKind,
        actual: CommunicationKind,
    },

    /// A required invocation argument is absent.
    #[error("argument {0:?} must be present")]
    MissingArgument(String),

    /// An invocation argument carries the wrong type tag.
    #[error("argument {name:?} is a {actual}, expected a {expected}")]
    ArgumentType {
        name: String,
        expected: ValueType,
        actual: ValueType,
    },

    /// The flag already has a claimant.
    #[error("flag {0:?} has already been claimed")]
    FlagAlreadyClaimed(String),

    /// Flag membership was queried without a prior successful claim.
    #[error("flag {0:?} was queried without a successful claim")]
    IllegalFlagAccess(String),

    /// An implementor does not satisfy the extension point's capability spec.
    #[error("implementor of extension point {point:?} is missing method {method:?}")]
    ImplementorMismatch { point: String, method: String },

    /// A handler reported a domain failure of its own.
    #[error("handler failed: {0}")]
    Handler(String),
}

pub type Result<T> = std::result::Result<T, CommunicationError>;
