//! External registration interface.

use std::sync::Arc;

use crate::command::Command;
use crate::component::CommandComponent;

/// Host hook advertised commands are reported to.
///
/// Called during insertion and recursive deletion; return values are of no
/// interest to the engine, so the methods have none.
pub trait RegistrationHandler<S>: Send + Sync {
    /// A command was registered with the tree.
    fn register(&self, command: &Arc<Command<S>>);

    /// A root component (and its whole subtree) was removed.
    fn unregister_root(&self, component: &Arc<CommandComponent<S>>);
}

/// The default handler: does nothing.
pub struct NoopRegistrationHandler;

impl<S> RegistrationHandler<S> for NoopRegistrationHandler {
    fn register(&self, _command: &Arc<Command<S>>) {}

    fn unregister_root(&self, _component: &Arc<CommandComponent<S>>) {}
}
