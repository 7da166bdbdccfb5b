//! Dispatcher behaviour toggles.

/// Settings read by the engine at well-defined decision points.
///
/// `liberal_flag_parsing` is read at insertion time (it moves the flag
/// insertion index), `enforce_intermediary_permissions` during requirement
/// propagation, and `force_suggestion` after the suggestion walk.
#[derive(Clone, Copy, Debug, Default)]
pub struct Settings {
    /// Attach flags after the last literal component instead of after the
    /// final component, letting them appear between positional arguments.
    pub liberal_flag_parsing: bool,
    /// A node owning a command keeps exactly that command's permission
    /// instead of the OR-combined union of its subtree.
    pub enforce_intermediary_permissions: bool,
    /// Emit a single empty suggestion when a suggestion walk produces none,
    /// for platforms that require at least one candidate.
    pub force_suggestion: bool,
}
