//! Errors surfaced by registration and by the parse walk.

use std::fmt;

use thiserror::Error;

use crate::parser::ParserFailure;
use crate::sender::SenderKind;

/// Why the per-node gate denied access.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DeniedReason {
    /// The permission expression did not hold for the sender.
    Permission,
    /// No command behind the node accepts the sender's kind.
    SenderKind,
}

impl fmt::Display for DeniedReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Permission => f.write_str("missing permission"),
            Self::SenderKind => f.write_str("wrong sender kind"),
        }
    }
}

/// An error produced while parsing or executing a command line.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No root literal matched the first token.
    #[error("unknown command {input:?}")]
    NoSuchCommand {
        /// The first token of the input.
        input: String,
    },

    /// A unique path was known but the input was malformed or truncated.
    #[error("invalid command syntax, usage: {usage}")]
    InvalidSyntax {
        /// Component names from the root to the failing node.
        chain: Vec<String>,
        /// Components parsed successfully before the failure.
        parsed: Vec<String>,
        /// Host-formatted usage string for the failing node.
        usage: String,
    },

    /// The gate denied access at some node.
    #[error("no permission for \"{}\": {reason}", chain.join(" "))]
    NoPermission {
        /// Component names from the root to the denying node.
        chain: Vec<String>,
        /// Whether the permission or the sender kind failed.
        reason: DeniedReason,
    },

    /// The resolved command rejects the sender's kind.
    #[error("\"{}\" requires a {required} sender, got {actual}", chain.join(" "))]
    InvalidSenderKind {
        /// Component names of the resolved command.
        chain: Vec<String>,
        /// The kind the command requires.
        required: SenderKind,
        /// The kind of the actual sender.
        actual: SenderKind,
    },

    /// A parser or preprocessor explicitly failed on a committed branch.
    ///
    /// This is the only parser failure that propagates; uncommitted failures
    /// are recovered silently so that sibling nodes can be tried.
    #[error("failed to parse argument for \"{}\"", chain.join(" "))]
    ArgumentParse {
        /// Component names from the root to the failing node.
        chain: Vec<String>,
        /// The underlying parser failure.
        #[source]
        failure: ParserFailure,
    },

    /// The command's handler returned an error after a successful parse.
    #[error("command handler failed")]
    Handler(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The preflight hook rejected the request before walking.
    #[error("request rejected: {0}")]
    Rejected(String),
}

/// An error raised while inserting a command into the tree.
///
/// Registration pre-validates against the live tree, so a failed insert
/// leaves the tree untouched.
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Two sibling nodes could accept the same next token.
    #[error("ambiguous children of \"{parent}\": \"{child}\"")]
    AmbiguousNode {
        /// Name of the parent component (empty for the root).
        parent: String,
        /// Name of the offending child component.
        child: String,
    },

    /// A leaf without an owning command was found during verification.
    #[error("leaf component \"{component}\" owns no command")]
    NoCommandInLeaf {
        /// Name of the ownerless leaf component.
        component: String,
    },

    /// Two different commands claimed the same terminal node.
    #[error("duplicate command at \"{}\"", chain.join(" "))]
    DuplicateCommand {
        /// Component names of the contested node.
        chain: Vec<String>,
    },

    /// A command tried to start with a non-literal component.
    #[error("root child \"{name}\" must be a literal")]
    NonLiteralRootChild {
        /// Name of the offending component.
        name: String,
    },

    /// A component name contained characters outside `[A-Za-z0-9_-]`.
    #[error("invalid component name {name:?}")]
    InvalidComponentName {
        /// The rejected name.
        name: String,
    },

    /// A required component was declared after an optional one.
    #[error("required component \"{name}\" follows an optional component")]
    RequiredAfterOptional {
        /// Name of the misplaced component.
        name: String,
    },

    /// The command was built without a handler.
    #[error("command has no handler")]
    MissingHandler,

    /// Two flags of one command share a name or short form.
    #[error("duplicate flag \"{name}\"")]
    DuplicateFlag {
        /// The duplicated flag name or short form.
        name: String,
    },
}
