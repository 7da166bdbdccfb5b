//! The command tree: prefix-shared storage, insertion, verification and
//! requirement propagation.

pub mod parse;
pub mod suggest;

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use smallvec::SmallVec;

use crate::command::Command;
use crate::component::{CommandComponent, ComponentKind};
use crate::error::RegistrationError;
use crate::permission::Permission;
use crate::sender::{CommandSender, SenderKind};
use crate::settings::Settings;

/// Metadata computed by requirement propagation.
///
/// `permission` is `None` only on a node that has never been propagated;
/// verification runs after every insert, so walks always see it populated.
pub(crate) struct NodeMeta<S> {
    pub(crate) permission: Option<Permission<S>>,
    pub(crate) sender_kinds: SmallVec<[SenderKind; 2]>,
}

impl<S> Default for NodeMeta<S> {
    fn default() -> Self {
        Self {
            permission: None,
            sender_kinds: SmallVec::new(),
        }
    }
}

/// One position in the tree.
///
/// The tree exclusively owns its nodes; parents are held weakly. The optional
/// owning command is present on terminal nodes and on intermediate executors.
pub struct CommandNode<S> {
    component: Option<Arc<CommandComponent<S>>>,
    children: RwLock<SmallVec<[Arc<CommandNode<S>>; 4]>>,
    parent: RwLock<Weak<CommandNode<S>>>,
    owner: RwLock<Option<Arc<Command<S>>>>,
    meta: RwLock<NodeMeta<S>>,
}

impl<S: CommandSender> CommandNode<S> {
    fn new_root() -> Arc<Self> {
        Arc::new(Self {
            component: None,
            children: RwLock::new(SmallVec::new()),
            parent: RwLock::new(Weak::new()),
            owner: RwLock::new(None),
            meta: RwLock::new(NodeMeta::default()),
        })
    }

    fn with_component(component: Arc<CommandComponent<S>>) -> Arc<Self> {
        Arc::new(Self {
            component: Some(component),
            children: RwLock::new(SmallVec::new()),
            parent: RwLock::new(Weak::new()),
            owner: RwLock::new(None),
            meta: RwLock::new(NodeMeta::default()),
        })
    }

    /// The component at this position; `None` only for the root.
    #[must_use]
    pub fn component(&self) -> Option<&Arc<CommandComponent<S>>> {
        self.component.as_ref()
    }

    /// Whether this is the root node.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.component.is_none()
    }

    /// Snapshot of the children, literals first.
    #[must_use]
    pub fn children(&self) -> Vec<Arc<CommandNode<S>>> {
        self.children.read().iter().cloned().collect()
    }

    /// Whether this node has no children.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        self.children.read().is_empty()
    }

    /// The command owned by this node, if any.
    #[must_use]
    pub fn owner(&self) -> Option<Arc<Command<S>>> {
        self.owner.read().clone()
    }

    /// The parent node, unless this is the root.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<CommandNode<S>>> {
        self.parent.read().upgrade()
    }

    /// The components from the root to this node, in order.
    #[must_use]
    pub fn chain_components(&self) -> Vec<Arc<CommandComponent<S>>> {
        let mut chain = Vec::new();
        if let Some(component) = &self.component {
            chain.push(Arc::clone(component));
        }
        let mut cursor = self.parent();
        while let Some(node) = cursor {
            if let Some(component) = node.component() {
                chain.push(Arc::clone(component));
            }
            cursor = node.parent();
        }
        chain.reverse();
        chain
    }

    /// The component names from the root to this node.
    #[must_use]
    pub fn chain_names(&self) -> Vec<String> {
        self.chain_components()
            .iter()
            .map(|c| c.name().to_owned())
            .collect()
    }

    /// Whether `token` matches this node's component as a literal.
    #[must_use]
    pub fn accepts_literal(&self, token: &str) -> bool {
        self.component
            .as_ref()
            .is_some_and(|c| c.accepts_literal(token))
    }

    pub(crate) fn kind(&self) -> Option<ComponentKind> {
        self.component.as_ref().map(|c| c.kind())
    }

    fn find_equal_child(&self, component: &CommandComponent<S>) -> Option<Arc<CommandNode<S>>> {
        self.children
            .read()
            .iter()
            .find(|child| child.component.as_deref() == Some(component))
            .cloned()
    }

    fn add_child(parent: &Arc<Self>, child: Arc<Self>) {
        *child.parent.write() = Arc::downgrade(parent);
        let mut children = parent.children.write();
        children.push(child);
        children.sort_by_key(|c| c.component.as_ref().map_or(0, |comp| comp.sort_precedence()));
    }

    fn set_owner(&self, command: Arc<Command<S>>) {
        *self.owner.write() = Some(command);
    }

    /// Clones this node's propagated gate metadata.
    pub(crate) fn gate_data(&self) -> (Option<Permission<S>>, SmallVec<[SenderKind; 2]>) {
        let meta = self.meta.read();
        (meta.permission.clone(), meta.sender_kinds.clone())
    }

    fn name_or_empty(&self) -> String {
        self.component
            .as_ref()
            .map_or_else(String::new, |c| c.name().to_owned())
    }
}

/// Follows `children[0]` from `node` until a node owning a command is found.
///
/// Used for "empty input on an optional component": the walk returns the
/// first command reachable along the unique path. Verification's ambiguity
/// rules keep the choice deterministic.
pub(crate) fn first_owned_descendant<S: CommandSender>(
    node: &Arc<CommandNode<S>>,
) -> Option<Arc<Command<S>>> {
    let mut cursor = Arc::clone(node);
    loop {
        if let Some(command) = cursor.owner() {
            return Some(command);
        }
        let next = cursor.children().first().cloned()?;
        cursor = next;
    }
}

/// The prefix-shared trie of command components.
///
/// Mutations run under a single write lock that also covers verification and
/// propagation; readers never take it. A walk sees a consistent snapshot of
/// each node's children, and the host is responsible for quiescence before
/// removal.
pub struct CommandTree<S> {
    root: Arc<CommandNode<S>>,
    write_lock: Mutex<()>,
}

impl<S: CommandSender> CommandTree<S> {
    /// Creates an empty tree.
    #[must_use]
    pub fn new() -> Self {
        Self {
            root: CommandNode::<S>::new_root(),
            write_lock: Mutex::new(()),
        }
    }

    /// The root node.
    #[must_use]
    pub fn root(&self) -> &Arc<CommandNode<S>> {
        &self.root
    }

    /// Inserts a command, then verifies and re-propagates the whole tree.
    ///
    /// Insertion pre-validates against the live tree, so a failed call leaves
    /// the tree exactly as it was.
    pub fn insert(
        &self,
        command: Arc<Command<S>>,
        settings: &Settings,
    ) -> Result<(), RegistrationError> {
        let _guard = self.write_lock.lock();

        let expanded = Self::expanded_chain(&command, settings);
        self.validate_insertion(&expanded, &command)?;

        let mut current = Arc::clone(&self.root);
        for component in &expanded {
            current = match current.find_equal_child(component) {
                Some(existing) => {
                    if let (Some(into), Some(from)) = (
                        existing.component().and_then(|c| c.literal_parser()),
                        component.literal_parser(),
                    ) && !Arc::ptr_eq(into, from)
                    {
                        for alias in from.all_names() {
                            into.insert_alias(alias);
                        }
                    }
                    existing
                }
                None => {
                    let node = CommandNode::with_component(Arc::clone(component));
                    CommandNode::add_child(&current, Arc::clone(&node));
                    node
                }
            };
        }

        if let Some(existing) = current.owner()
            && !Arc::ptr_eq(&existing, &command)
        {
            return Err(RegistrationError::DuplicateCommand {
                chain: current.chain_names(),
            });
        }
        current.set_owner(Arc::clone(&command));

        self.verify_node(&self.root)?;
        self.propagate(settings);
        Ok(())
    }

    /// Removes the root literal accepting `name`, with its whole subtree.
    ///
    /// Returns the removed node so the caller can notify its registration
    /// handler. The tree is re-propagated afterwards.
    pub fn remove_root(&self, name: &str, settings: &Settings) -> Option<Arc<CommandNode<S>>> {
        let _guard = self.write_lock.lock();
        let removed = {
            let mut children = self.root.children.write();
            let index = children.iter().position(|child| child.accepts_literal(name))?;
            children.remove(index)
        };
        self.propagate(settings);
        Some(removed)
    }

    /// The flag insertion index: the index in the non-flag component list
    /// after which the flag component is woven into the chain.
    fn flag_insertion_index(command: &Command<S>, settings: &Settings) -> usize {
        let components = command.components();
        let last = components.len().saturating_sub(1);
        if settings.liberal_flag_parsing {
            components
                .iter()
                .rposition(|c| c.kind() == ComponentKind::Literal)
                .unwrap_or(last)
        } else {
            last
        }
    }

    /// The component chain with the flag component woven in at every index
    /// at or past the flag insertion index.
    fn expanded_chain(
        command: &Arc<Command<S>>,
        settings: &Settings,
    ) -> Vec<Arc<CommandComponent<S>>> {
        let flag_index = Self::flag_insertion_index(command, settings);
        let mut expanded = Vec::with_capacity(command.components().len() + 2);
        for (index, component) in command.components().iter().enumerate() {
            expanded.push(Arc::clone(component));
            if let Some(flag) = command.flag_component()
                && index >= flag_index
            {
                expanded.push(Arc::clone(flag));
            }
        }
        expanded
    }

    /// Checks that inserting `expanded` cannot corrupt the tree.
    fn validate_insertion(
        &self,
        expanded: &[Arc<CommandComponent<S>>],
        command: &Arc<Command<S>>,
    ) -> Result<(), RegistrationError> {
        let mut current = Some(Arc::clone(&self.root));
        for component in expanded {
            let Some(node) = current else {
                // The rest of the chain lands in a freshly created subtree.
                break;
            };
            if node.is_root() && component.kind() != ComponentKind::Literal {
                return Err(RegistrationError::NonLiteralRootChild {
                    name: component.name().to_owned(),
                });
            }
            match node.find_equal_child(component) {
                Some(existing) => {
                    if let Some(from) = component.literal_parser() {
                        // Alias extension must keep sibling alias sets disjoint.
                        for sibling in node.children() {
                            if Arc::ptr_eq(&sibling, &existing) {
                                continue;
                            }
                            if let Some(other) = sibling.component().and_then(|c| c.literal_parser())
                                && from.intersects(other)
                            {
                                return Err(RegistrationError::AmbiguousNode {
                                    parent: node.name_or_empty(),
                                    child: component.name().to_owned(),
                                });
                            }
                        }
                    } else if component.kind() == ComponentKind::Flag {
                        // A merged flag node must carry the same flag set.
                        let same_flags = existing
                            .component()
                            .and_then(|c| c.flag_parser().cloned())
                            .zip(component.flag_parser().cloned())
                            .is_some_and(|(a, b)| Arc::ptr_eq(&a, &b));
                        if !same_flags {
                            return Err(RegistrationError::AmbiguousNode {
                                parent: node.name_or_empty(),
                                child: component.name().to_owned(),
                            });
                        }
                    }
                    current = Some(existing);
                }
                None => {
                    match component.kind() {
                        ComponentKind::Literal => {
                            if let Some(from) = component.literal_parser() {
                                for sibling in node.children() {
                                    if let Some(other) =
                                        sibling.component().and_then(|c| c.literal_parser())
                                        && from.intersects(other)
                                    {
                                        return Err(RegistrationError::AmbiguousNode {
                                            parent: node.name_or_empty(),
                                            child: component.name().to_owned(),
                                        });
                                    }
                                }
                            }
                        }
                        ComponentKind::Variable | ComponentKind::Flag => {
                            let has_dynamic = node.children().iter().any(|child| {
                                child
                                    .kind()
                                    .is_some_and(|kind| kind != ComponentKind::Literal)
                            });
                            if has_dynamic {
                                return Err(RegistrationError::AmbiguousNode {
                                    parent: node.name_or_empty(),
                                    child: component.name().to_owned(),
                                });
                            }
                        }
                    }
                    current = None;
                }
            }
        }

        if let Some(node) = current
            && let Some(existing) = node.owner()
            && !Arc::ptr_eq(&existing, command)
        {
            return Err(RegistrationError::DuplicateCommand {
                chain: node.chain_names(),
            });
        }
        Ok(())
    }

    /// Re-checks the tree invariants.
    fn verify_node(&self, node: &Arc<CommandNode<S>>) -> Result<(), RegistrationError> {
        let children = node.children();

        if node.is_root() {
            for child in &children {
                if child.kind() != Some(ComponentKind::Literal) {
                    return Err(RegistrationError::NonLiteralRootChild {
                        name: child.name_or_empty(),
                    });
                }
            }
        }

        let mut dynamic_seen = false;
        for child in &children {
            if child.kind().is_some_and(|kind| kind != ComponentKind::Literal) {
                if dynamic_seen {
                    return Err(RegistrationError::AmbiguousNode {
                        parent: node.name_or_empty(),
                        child: child.name_or_empty(),
                    });
                }
                dynamic_seen = true;
            }
        }

        for (index, first) in children.iter().enumerate() {
            let Some(first_literal) = first.component().and_then(|c| c.literal_parser()) else {
                continue;
            };
            for second in children.iter().skip(index + 1) {
                if let Some(second_literal) = second.component().and_then(|c| c.literal_parser())
                    && first_literal.intersects(second_literal)
                {
                    return Err(RegistrationError::AmbiguousNode {
                        parent: node.name_or_empty(),
                        child: second.name_or_empty(),
                    });
                }
            }
        }

        if children.is_empty() && !node.is_root() && node.owner().is_none() {
            return Err(RegistrationError::NoCommandInLeaf {
                component: node.name_or_empty(),
            });
        }

        for child in &children {
            self.verify_node(child)?;
        }
        Ok(())
    }

    /// Recomputes the gate metadata on every node.
    ///
    /// Each node ends up with the OR-union of the permissions, and the union
    /// of the sender kinds, of every command reachable through it. With
    /// `enforce_intermediary_permissions` on, a node owning a command keeps
    /// exactly that command's permission instead.
    fn propagate(&self, settings: &Settings) {
        Self::reset_meta(&self.root);

        let mut owners = Vec::new();
        Self::collect_owned(&self.root, &mut owners);

        for (node, command) in &owners {
            let permission = command.permission().clone();
            let kind = command.sender_kind().unwrap_or(SenderKind::ANY);
            let mut cursor = Some(Arc::clone(node));
            while let Some(current) = cursor {
                {
                    let mut meta = current.meta.write();
                    meta.permission = Some(match meta.permission.take() {
                        Some(existing) => existing.or(permission.clone()),
                        None => permission.clone(),
                    });
                    if !meta.sender_kinds.contains(&kind) {
                        meta.sender_kinds.push(kind);
                    }
                }
                cursor = current.parent();
            }
        }

        if settings.enforce_intermediary_permissions {
            for (node, command) in &owners {
                node.meta.write().permission = Some(command.permission().clone());
            }
        }
    }

    fn reset_meta(node: &Arc<CommandNode<S>>) {
        *node.meta.write() = NodeMeta::default();
        for child in node.children() {
            Self::reset_meta(&child);
        }
    }

    fn collect_owned(
        node: &Arc<CommandNode<S>>,
        owners: &mut Vec<(Arc<CommandNode<S>>, Arc<Command<S>>)>,
    ) {
        if let Some(command) = node.owner() {
            owners.push((Arc::clone(node), command));
        }
        for child in node.children() {
            Self::collect_owned(&child, owners);
        }
    }
}

impl<S: CommandSender> Default for CommandTree<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{Command, handler_fn};
    use crate::parser::standard::IntegerParser;
    use crate::permission::PermissionChecker;

    fn command(builder: crate::command::CommandBuilder<()>) -> Arc<Command<()>> {
        Arc::new(builder.handler(handler_fn(|_| Ok(()))).build().expect("valid command"))
    }

    fn names(node: &Arc<CommandNode<()>>) -> Vec<String> {
        node.children()
            .iter()
            .map(|c| c.name_or_empty())
            .collect()
    }

    #[test]
    fn test_insert_builds_shared_prefix() {
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(command(Command::builder("test").literal("foo")), &settings)
            .expect("insert foo");
        tree.insert(command(Command::builder("test").literal("bar")), &settings)
            .expect("insert bar");

        assert_eq!(names(tree.root()), vec!["test"]);
        let test = tree.root().children().first().cloned().expect("test node");
        assert_eq!(names(&test), vec!["foo", "bar"]);
    }

    #[test]
    fn test_insert_merges_literal_aliases() {
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(
            command(Command::builder("teleport").alias("tp")),
            &settings,
        )
        .expect("first insert");
        tree.insert(
            command(Command::builder("teleport").alias("tpto").literal("here")),
            &settings,
        )
        .expect("second insert");

        let node = tree.root().children().first().cloned().expect("node");
        assert!(node.accepts_literal("tp"));
        assert!(node.accepts_literal("tpto"));
    }

    #[test]
    fn test_two_dynamic_children_are_ambiguous() {
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(
            command(Command::builder("cmd").required("x", IntegerParser::new())),
            &settings,
        )
        .expect("first insert");
        let result = tree.insert(
            command(Command::builder("cmd").required("y", IntegerParser::new())),
            &settings,
        );
        assert!(matches!(result, Err(RegistrationError::AmbiguousNode { .. })));
        // The failed insert must not have touched the tree.
        let cmd = tree.root().children().first().cloned().expect("cmd node");
        assert_eq!(names(&cmd), vec!["x"]);
    }

    #[test]
    fn test_intersecting_literal_aliases_are_ambiguous() {
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(
            command(Command::builder("cmd").literal_with_aliases("first", ["shared"])),
            &settings,
        )
        .expect("first insert");
        let result = tree.insert(
            command(Command::builder("cmd").literal_with_aliases("second", ["SHARED"])),
            &settings,
        );
        assert!(matches!(result, Err(RegistrationError::AmbiguousNode { .. })));
    }

    #[test]
    fn test_duplicate_command_is_rejected() {
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(command(Command::builder("dup")), &settings)
            .expect("first insert");
        let result = tree.insert(command(Command::builder("dup")), &settings);
        assert!(matches!(
            result,
            Err(RegistrationError::DuplicateCommand { chain }) if chain == vec!["dup"]
        ));
    }

    #[test]
    fn test_intermediate_executor_is_allowed() {
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(command(Command::builder("first")), &settings)
            .expect("short form");
        tree.insert(
            command(Command::builder("first").required("n", IntegerParser::new())),
            &settings,
        )
        .expect("long form");

        let first = tree.root().children().first().cloned().expect("first");
        assert!(first.owner().is_some());
        assert_eq!(names(&first), vec!["n"]);
    }

    #[test]
    fn test_propagation_unions_permissions() {
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(
            command(
                Command::builder("test")
                    .literal("foo")
                    .permission(crate::permission::Permission::atom("p1")),
            ),
            &settings,
        )
        .expect("foo");
        tree.insert(
            command(
                Command::builder("test")
                    .literal("bar")
                    .permission(crate::permission::Permission::atom("p2")),
            ),
            &settings,
        )
        .expect("bar");

        struct OnlyP2;
        impl PermissionChecker<()> for OnlyP2 {
            fn has_permission(&self, _sender: &(), permission: &str) -> bool {
                permission == "p2"
            }
        }

        let test = tree.root().children().first().cloned().expect("test");
        let (permission, kinds) = test.gate_data();
        let permission = permission.expect("propagated");
        assert!(permission.evaluate(&OnlyP2, &()));
        assert!(kinds.contains(&SenderKind::ANY));

        let foo = test.children().first().cloned().expect("foo");
        let (permission, _) = foo.gate_data();
        assert!(!permission.expect("propagated").evaluate(&OnlyP2, &()));
    }

    #[test]
    fn test_enforce_intermediary_permissions_overrides_union() {
        let settings = Settings {
            enforce_intermediary_permissions: true,
            ..Settings::default()
        };
        let tree = CommandTree::<()>::new();
        tree.insert(
            command(
                Command::builder("first")
                    .permission(crate::permission::Permission::atom("own")),
            ),
            &settings,
        )
        .expect("short form");
        tree.insert(
            command(
                Command::builder("first")
                    .required("n", IntegerParser::new())
                    .permission(crate::permission::Permission::atom("other")),
            ),
            &settings,
        )
        .expect("long form");

        struct OnlyOther;
        impl PermissionChecker<()> for OnlyOther {
            fn has_permission(&self, _sender: &(), permission: &str) -> bool {
                permission == "other"
            }
        }

        let first = tree.root().children().first().cloned().expect("first");
        let (permission, _) = first.gate_data();
        // The node's own command wins over the union: "other" alone no
        // longer satisfies the gate at "first".
        assert!(!permission.expect("propagated").evaluate(&OnlyOther, &()));
    }

    #[test]
    fn test_remove_root_detaches_subtree() {
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(command(Command::builder("gone").literal("sub")), &settings)
            .expect("insert");
        tree.insert(command(Command::builder("kept")), &settings)
            .expect("insert");

        let removed = tree.remove_root("gone", &settings).expect("removed");
        assert_eq!(removed.name_or_empty(), "gone");
        assert_eq!(names(tree.root()), vec!["kept"]);
        assert!(tree.remove_root("gone", &settings).is_none());
    }

    #[test]
    fn test_flag_component_is_woven_at_the_tail() {
        use crate::parser::flag::CommandFlag;
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(
            command(
                Command::builder("cmd")
                    .required("x", IntegerParser::new())
                    .flag(CommandFlag::builder("verbose").build()),
            ),
            &settings,
        )
        .expect("insert");

        let cmd = tree.root().children().first().cloned().expect("cmd");
        let x = cmd.children().first().cloned().expect("x");
        let flags = x.children().first().cloned().expect("flag node");
        assert_eq!(flags.kind(), Some(ComponentKind::Flag));
        assert!(flags.owner().is_some());
        assert!(x.owner().is_none());
    }

    #[test]
    fn test_liberal_flag_parsing_weaves_after_last_literal() {
        use crate::parser::flag::CommandFlag;
        let settings = Settings {
            liberal_flag_parsing: true,
            ..Settings::default()
        };
        let tree = CommandTree::<()>::new();
        tree.insert(
            command(
                Command::builder("cmd")
                    .required("x", IntegerParser::new())
                    .flag(CommandFlag::builder("verbose").build()),
            ),
            &settings,
        )
        .expect("insert");

        // cmd -> flags -> x -> flags
        let cmd = tree.root().children().first().cloned().expect("cmd");
        let flags = cmd.children().first().cloned().expect("first flag node");
        assert_eq!(flags.kind(), Some(ComponentKind::Flag));
        let x = flags.children().first().cloned().expect("x");
        assert_eq!(x.name_or_empty(), "x");
        let tail = x.children().first().cloned().expect("tail flag node");
        assert_eq!(tail.kind(), Some(ComponentKind::Flag));
        assert!(tail.owner().is_some());
    }

    #[test]
    fn test_first_owned_descendant_follows_single_path() {
        let tree = CommandTree::<()>::new();
        let settings = Settings::default();
        tree.insert(
            command(Command::builder("a").literal("b").literal("c")),
            &settings,
        )
        .expect("insert");

        let a = tree.root().children().first().cloned().expect("a");
        let found = first_owned_descendant(&a).expect("command at c");
        assert_eq!(found.root_name(), "a");
    }
}
