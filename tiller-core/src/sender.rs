//! Module defining the sender side of a command request.

use std::fmt;

/// Tag identifying the concrete kind of a command sender.
///
/// Hosts typically expose one kind per transport (player, console, remote
/// admin, ...). Commands may require a specific kind; the tree unions the
/// kinds of all commands reachable through a node so that walks can gate
/// early.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SenderKind(&'static str);

impl SenderKind {
    /// The kind that matches every sender.
    pub const ANY: SenderKind = SenderKind("any");

    /// Creates a kind with the given stable name.
    #[must_use]
    pub const fn named(name: &'static str) -> Self {
        Self(name)
    }

    /// Returns the stable name of this kind.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.0
    }

    /// Returns `true` for [`SenderKind::ANY`].
    #[must_use]
    pub fn is_any(&self) -> bool {
        *self == Self::ANY
    }
}

impl fmt::Display for SenderKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// The sender of a command.
///
/// The engine is generic over the host's sender type; the only thing it needs
/// from it is a kind classification (and the bounds that let it travel
/// through the async walks).
pub trait CommandSender: Send + Sync + 'static {
    /// Returns the kind of this sender, used to match sender-type
    /// requirements. Defaults to [`SenderKind::ANY`].
    fn kind(&self) -> SenderKind {
        SenderKind::ANY
    }
}

/// The unit sender, for hosts (and tests) that do not distinguish senders.
impl CommandSender for () {}
