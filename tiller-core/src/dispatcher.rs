//! The engine facade: registration, parsing, suggestion and execution.

use std::sync::Arc;

use crate::command::Command;
use crate::component::{CommandComponent, ComponentKind};
use crate::context::CommandContext;
use crate::error::{DeniedReason, DispatchError, RegistrationError};
use crate::input::CommandInput;
use crate::permission::{AllowAllChecker, Permission, PermissionChecker};
use crate::registration::{NoopRegistrationHandler, RegistrationHandler};
use crate::sender::{CommandSender, SenderKind};
use crate::settings::Settings;
use crate::suggestion::{FilteringSuggestionProcessor, Suggestion, SuggestionProcessor};
use crate::tree::{CommandNode, CommandTree};

/// Renders a usage string for a node, consumed by syntax failure messages.
pub trait SyntaxFormatter<S>: Send + Sync {
    /// Formats the chain leading to `node` for `sender`.
    fn format(
        &self,
        sender: &S,
        chain: &[Arc<CommandComponent<S>>],
        node: &CommandNode<S>,
    ) -> String;
}

/// The default formatter: `literal <required> [optional]`, with the node's
/// child alternatives appended.
pub struct DefaultSyntaxFormatter;

impl DefaultSyntaxFormatter {
    fn format_component<S: CommandSender>(component: &CommandComponent<S>) -> String {
        match component.kind() {
            ComponentKind::Literal => component.name().to_owned(),
            ComponentKind::Variable if component.is_required() => {
                format!("<{}>", component.name())
            }
            ComponentKind::Variable => format!("[{}]", component.name()),
            ComponentKind::Flag => String::from("[flags]"),
        }
    }
}

impl<S: CommandSender> SyntaxFormatter<S> for DefaultSyntaxFormatter {
    fn format(
        &self,
        _sender: &S,
        chain: &[Arc<CommandComponent<S>>],
        node: &CommandNode<S>,
    ) -> String {
        let mut parts: Vec<String> = chain
            .iter()
            .map(|component| Self::format_component(component))
            .collect();

        let children = node.children();
        let alternatives: Vec<String> = children
            .iter()
            .filter_map(|child| child.component().map(|c| Self::format_component(c)))
            .collect();
        match alternatives.len() {
            0 => {}
            1 => parts.extend(alternatives),
            _ => parts.push(format!("({})", alternatives.join("|"))),
        }
        parts.join(" ")
    }
}

/// Host hook run at the entry of parse and suggest, before any walking.
///
/// The service-pipeline attachment point: rejecting here stops the request
/// without touching the tree.
pub trait PreflightHook<S>: Send + Sync {
    /// Accepts or rejects the request.
    fn check(&self, context: &mut CommandContext<S>, input: &CommandInput) -> Result<(), String>;
}

/// A successful parse: the resolved command plus the context holding every
/// parsed argument.
pub struct ParseOutcome<S> {
    /// The command selected by the walk.
    pub command: Arc<Command<S>>,
    /// The context carrying the typed argument values.
    pub context: CommandContext<S>,
}

impl<S: CommandSender + std::fmt::Debug> std::fmt::Debug for ParseOutcome<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParseOutcome")
            .field("command", &self.command)
            .field("context", &self.context)
            .finish()
    }
}

/// Parses, suggests and dispatches commands over a shared [`CommandTree`].
pub struct CommandDispatcher<S> {
    tree: CommandTree<S>,
    settings: Settings,
    permission_checker: Arc<dyn PermissionChecker<S>>,
    registration_handler: Arc<dyn RegistrationHandler<S>>,
    suggestion_processor: Arc<dyn SuggestionProcessor<S>>,
    syntax_formatter: Arc<dyn SyntaxFormatter<S>>,
    preflight: Option<Arc<dyn PreflightHook<S>>>,
}

impl<S: CommandSender> CommandDispatcher<S> {
    /// Creates a dispatcher with default settings and hooks.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    /// Starts building a customised dispatcher.
    #[must_use]
    pub fn builder() -> CommandDispatcherBuilder<S> {
        CommandDispatcherBuilder {
            settings: Settings::default(),
            permission_checker: Arc::new(AllowAllChecker),
            registration_handler: Arc::new(NoopRegistrationHandler),
            suggestion_processor: Arc::new(FilteringSuggestionProcessor),
            syntax_formatter: Arc::new(DefaultSyntaxFormatter),
            preflight: None,
        }
    }

    /// The active settings.
    #[must_use]
    pub const fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The underlying tree.
    #[must_use]
    pub const fn tree(&self) -> &CommandTree<S> {
        &self.tree
    }

    /// Registers a command and advertises it to the registration handler.
    pub fn register(&self, command: Command<S>) -> Result<(), RegistrationError> {
        let command = Arc::new(command);
        if let Err(error) = self.tree.insert(Arc::clone(&command), &self.settings) {
            log::warn!(
                "failed to register command {:?}: {error}",
                command.root_name()
            );
            return Err(error);
        }
        self.registration_handler.register(&command);
        Ok(())
    }

    /// Removes a root literal and its whole subtree.
    ///
    /// Returns whether anything was removed. The registration handler is
    /// notified with the removed root component.
    pub fn delete_recursively(&self, name: &str) -> bool {
        match self.tree.remove_root(name, &self.settings) {
            Some(node) => {
                if let Some(component) = node.component() {
                    self.registration_handler.unregister_root(component);
                }
                true
            }
            None => false,
        }
    }

    /// Parses `input` into a command and a fully populated context.
    ///
    /// The returned future suspends only at parser and preprocessor
    /// boundaries; dropping it cancels the walk, and no further parsers are
    /// invoked afterwards. Timeouts are the caller's business.
    pub async fn parse(&self, sender: S, input: &str) -> Result<ParseOutcome<S>, DispatchError> {
        let mut context = CommandContext::new(sender);
        let mut input = CommandInput::new(input);

        if let Some(hook) = &self.preflight {
            hook.check(&mut context, &input)
                .map_err(DispatchError::Rejected)?;
        }

        let command = self
            .parse_walk(self.tree.root(), &mut context, &mut input)
            .await?;

        if let Some(required) = command.sender_kind() {
            let actual = context.sender().kind();
            if !required.is_any() && required != actual {
                return Err(DispatchError::InvalidSenderKind {
                    chain: command
                        .components()
                        .iter()
                        .map(|c| c.name().to_owned())
                        .collect(),
                    required,
                    actual,
                });
            }
        }

        Ok(ParseOutcome { command, context })
    }

    /// Parses and immediately runs the resolved command's handler.
    pub async fn execute(&self, sender: S, input: &str) -> Result<(), DispatchError> {
        let ParseOutcome {
            command,
            mut context,
        } = self.parse(sender, input).await?;
        command
            .handler()
            .execute(&mut context)
            .await
            .map_err(DispatchError::Handler)
    }

    /// Returns completion candidates for the (possibly partial) `input`.
    ///
    /// Never fails; denied or unparsable branches simply contribute nothing.
    pub async fn suggestions(&self, sender: S, input: &str) -> Vec<Suggestion> {
        let mut context = CommandContext::new(sender);
        context.set_suggesting(true);
        context.set_suggestion_prefix(input.rsplit(' ').next().unwrap_or(""));
        let mut command_input = CommandInput::new(input);

        if let Some(hook) = &self.preflight
            && hook.check(&mut context, &command_input).is_err()
        {
            return self.finish_suggestions(&context, Vec::new());
        }

        let collected = self
            .suggest_walk(self.tree.root(), &mut context, &mut command_input)
            .await;
        self.finish_suggestions(&context, collected)
    }

    fn finish_suggestions(
        &self,
        context: &CommandContext<S>,
        collected: Vec<Suggestion>,
    ) -> Vec<Suggestion> {
        let mut suggestions = self.suggestion_processor.process(context, collected);
        if suggestions.is_empty() && self.settings.force_suggestion {
            suggestions.push(Suggestion::new(""));
        }
        suggestions
    }

    /// The per-node access gate, combining the propagated sender kinds and
    /// permission union.
    pub(crate) fn gate(&self, node: &CommandNode<S>, sender: &S) -> Result<(), DeniedReason> {
        let (permission, kinds) = node.gate_data();

        if !kinds.is_empty()
            && !kinds.contains(&SenderKind::ANY)
            && !kinds.contains(&sender.kind())
        {
            return Err(DeniedReason::SenderKind);
        }

        let permission = permission.unwrap_or(Permission::Always);
        if permission.evaluate(self.permission_checker.as_ref(), sender) {
            Ok(())
        } else {
            Err(DeniedReason::Permission)
        }
    }

    /// Final permission check on a resolved command, at its owning node.
    pub(crate) fn check_command_permission(
        &self,
        node: &CommandNode<S>,
        command: &Command<S>,
        sender: &S,
    ) -> Result<(), DispatchError> {
        if command
            .permission()
            .evaluate(self.permission_checker.as_ref(), sender)
        {
            Ok(())
        } else {
            Err(DispatchError::NoPermission {
                chain: node.chain_names(),
                reason: DeniedReason::Permission,
            })
        }
    }

    /// Builds an [`DispatchError::InvalidSyntax`] for `node`, formatting the
    /// usage through the host's syntax formatter.
    pub(crate) fn invalid_syntax(
        &self,
        node: &CommandNode<S>,
        context: &CommandContext<S>,
    ) -> DispatchError {
        let chain = node.chain_components();
        let usage = self
            .syntax_formatter
            .format(context.sender(), &chain, node);
        DispatchError::InvalidSyntax {
            chain: node.chain_names(),
            parsed: context.successful_components(),
            usage,
        }
    }
}

impl<S: CommandSender> Default for CommandDispatcher<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for [`CommandDispatcher`].
pub struct CommandDispatcherBuilder<S> {
    settings: Settings,
    permission_checker: Arc<dyn PermissionChecker<S>>,
    registration_handler: Arc<dyn RegistrationHandler<S>>,
    suggestion_processor: Arc<dyn SuggestionProcessor<S>>,
    syntax_formatter: Arc<dyn SyntaxFormatter<S>>,
    preflight: Option<Arc<dyn PreflightHook<S>>>,
}

impl<S: CommandSender> CommandDispatcherBuilder<S> {
    /// Sets the settings.
    #[must_use]
    pub fn settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    /// Sets the permission checker.
    #[must_use]
    pub fn permission_checker(mut self, checker: impl PermissionChecker<S> + 'static) -> Self {
        self.permission_checker = Arc::new(checker);
        self
    }

    /// Sets the registration handler.
    #[must_use]
    pub fn registration_handler(mut self, handler: impl RegistrationHandler<S> + 'static) -> Self {
        self.registration_handler = Arc::new(handler);
        self
    }

    /// Sets the suggestion post-processor.
    #[must_use]
    pub fn suggestion_processor(
        mut self,
        processor: impl SuggestionProcessor<S> + 'static,
    ) -> Self {
        self.suggestion_processor = Arc::new(processor);
        self
    }

    /// Sets the syntax formatter.
    #[must_use]
    pub fn syntax_formatter(mut self, formatter: impl SyntaxFormatter<S> + 'static) -> Self {
        self.syntax_formatter = Arc::new(formatter);
        self
    }

    /// Installs a preflight hook.
    #[must_use]
    pub fn preflight(mut self, hook: impl PreflightHook<S> + 'static) -> Self {
        self.preflight = Some(Arc::new(hook));
        self
    }

    /// Finishes the dispatcher.
    #[must_use]
    pub fn build(self) -> CommandDispatcher<S> {
        CommandDispatcher {
            tree: CommandTree::new(),
            settings: self.settings,
            permission_checker: self.permission_checker,
            registration_handler: self.registration_handler,
            suggestion_processor: self.suggestion_processor,
            syntax_formatter: self.syntax_formatter,
            preflight: self.preflight,
        }
    }
}
