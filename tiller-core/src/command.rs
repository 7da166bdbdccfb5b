//! Commands and the fluent builder used to declare them.

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::component::{CommandComponent, ComponentKind};
use crate::context::CommandContext;
use crate::error::RegistrationError;
use crate::parser::ArgumentParser;
use crate::parser::flag::CommandFlag;
use crate::permission::Permission;
use crate::sender::{CommandSender, SenderKind};

/// The error type command handlers may fail with.
pub type HandlerError = Box<dyn Error + Send + Sync>;

/// Executes a command once its arguments have been parsed into the context.
pub trait CommandHandler<S>: Send + Sync {
    /// Runs the command. Parsed values are read from the context under the
    /// component names they were declared with.
    fn execute<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
    ) -> BoxFuture<'a, Result<(), HandlerError>>;
}

struct FnHandler<F>(F);

impl<S, F> CommandHandler<S> for FnHandler<F>
where
    S: CommandSender,
    F: Fn(&mut CommandContext<S>) -> Result<(), HandlerError> + Send + Sync,
{
    fn execute<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
    ) -> BoxFuture<'a, Result<(), HandlerError>> {
        Box::pin(async move { (self.0)(context) })
    }
}

/// Wraps a synchronous closure as a [`CommandHandler`].
pub fn handler_fn<S, F>(f: F) -> impl CommandHandler<S>
where
    S: CommandSender,
    F: Fn(&mut CommandContext<S>) -> Result<(), HandlerError> + Send + Sync,
{
    FnHandler(f)
}

/// A declared command: an ordered component chain, an optional flag group, a
/// handler, a permission expression and an optional sender-kind requirement.
///
/// Immutable after construction; the tree holds commands for as long as it
/// references them.
pub struct Command<S> {
    components: Vec<Arc<CommandComponent<S>>>,
    flag_component: Option<Arc<CommandComponent<S>>>,
    handler: Arc<dyn CommandHandler<S>>,
    permission: Permission<S>,
    sender_kind: Option<SenderKind>,
}

impl<S: CommandSender> Command<S> {
    /// Starts building a command whose first literal is `name`.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CommandBuilder<S> {
        CommandBuilder {
            components: vec![Arc::new(CommandComponent::literal(
                name,
                Vec::<String>::new(),
            ))],
            flags: Vec::new(),
            permission: Permission::Always,
            sender_kind: None,
            handler: None,
        }
    }

    /// The non-flag components, in declaration order.
    #[must_use]
    pub fn components(&self) -> &[Arc<CommandComponent<S>>] {
        &self.components
    }

    /// The aggregated flag component, if the command declares flags.
    #[must_use]
    pub fn flag_component(&self) -> Option<&Arc<CommandComponent<S>>> {
        self.flag_component.as_ref()
    }

    /// The handler invoked after a successful parse.
    #[must_use]
    pub fn handler(&self) -> &Arc<dyn CommandHandler<S>> {
        &self.handler
    }

    /// The permission required to run this command.
    #[must_use]
    pub fn permission(&self) -> &Permission<S> {
        &self.permission
    }

    /// The sender kind this command requires, if any.
    #[must_use]
    pub const fn sender_kind(&self) -> Option<SenderKind> {
        self.sender_kind
    }

    /// The name of the root literal.
    #[must_use]
    pub fn root_name(&self) -> &str {
        self.components
            .first()
            .map_or("", |component| component.name())
    }
}

impl<S: CommandSender> fmt::Debug for Command<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names: Vec<&str> = self.components.iter().map(|c| c.name()).collect();
        f.debug_struct("Command")
            .field("components", &names)
            .field("sender_kind", &self.sender_kind)
            .finish_non_exhaustive()
    }
}

/// Fluent builder for [`Command`].
pub struct CommandBuilder<S> {
    components: Vec<Arc<CommandComponent<S>>>,
    flags: Vec<CommandFlag<S>>,
    permission: Permission<S>,
    sender_kind: Option<SenderKind>,
    handler: Option<Arc<dyn CommandHandler<S>>>,
}

impl<S: CommandSender> CommandBuilder<S> {
    /// Adds an alias to the root literal.
    #[must_use]
    pub fn alias(self, alias: impl Into<String>) -> Self {
        if let Some(literal) = self.components.first().and_then(|c| c.literal_parser()) {
            literal.insert_alias(alias);
        }
        self
    }

    /// Appends a literal component.
    #[must_use]
    pub fn literal(self, name: impl Into<String>) -> Self {
        self.component(CommandComponent::literal(name, Vec::<String>::new()))
    }

    /// Appends a literal component with aliases.
    #[must_use]
    pub fn literal_with_aliases(
        self,
        name: impl Into<String>,
        aliases: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        self.component(CommandComponent::literal(name, aliases))
    }

    /// Appends a required variable component.
    #[must_use]
    pub fn required(self, name: impl Into<String>, parser: impl ArgumentParser<S> + 'static) -> Self {
        self.component(CommandComponent::required(name, parser))
    }

    /// Appends an optional variable component.
    #[must_use]
    pub fn optional(self, name: impl Into<String>, parser: impl ArgumentParser<S> + 'static) -> Self {
        self.component(CommandComponent::optional(name, parser))
    }

    /// Appends an optional component with a parsed default.
    #[must_use]
    pub fn optional_with_default(
        self,
        name: impl Into<String>,
        parser: impl ArgumentParser<S> + 'static,
        default: impl Into<String>,
    ) -> Self {
        self.component(CommandComponent::optional(name, parser).with_default_parsed(default))
    }

    /// Appends a pre-built component.
    #[must_use]
    pub fn component(mut self, component: CommandComponent<S>) -> Self {
        self.components.push(Arc::new(component));
        self
    }

    /// Declares a flag.
    #[must_use]
    pub fn flag(mut self, flag: CommandFlag<S>) -> Self {
        self.flags.push(flag);
        self
    }

    /// Sets the permission expression.
    #[must_use]
    pub fn permission(mut self, permission: Permission<S>) -> Self {
        self.permission = permission;
        self
    }

    /// Restricts the command to senders of the given kind.
    #[must_use]
    pub fn sender_kind(mut self, kind: SenderKind) -> Self {
        self.sender_kind = Some(kind);
        self
    }

    /// Sets the handler.
    #[must_use]
    pub fn handler(mut self, handler: impl CommandHandler<S> + 'static) -> Self {
        self.handler = Some(Arc::new(handler));
        self
    }

    /// Validates the declaration and produces the command.
    pub fn build(self) -> Result<Command<S>, RegistrationError> {
        let handler = self.handler.ok_or(RegistrationError::MissingHandler)?;

        for component in &self.components {
            if !CommandComponent::<S>::is_valid_name(component.name()) {
                return Err(RegistrationError::InvalidComponentName {
                    name: component.name().to_owned(),
                });
            }
        }

        if let Some(first) = self.components.first()
            && first.kind() != ComponentKind::Literal
        {
            return Err(RegistrationError::NonLiteralRootChild {
                name: first.name().to_owned(),
            });
        }

        // Required components must form a prefix of the chain.
        let mut seen_optional = false;
        for component in &self.components {
            if component.is_required() && seen_optional {
                return Err(RegistrationError::RequiredAfterOptional {
                    name: component.name().to_owned(),
                });
            }
            if !component.is_required() {
                seen_optional = true;
            }
        }

        let mut long_names: Vec<String> = Vec::new();
        let mut shorts: Vec<char> = Vec::new();
        for flag in &self.flags {
            if !CommandComponent::<S>::is_valid_name(flag.name()) {
                return Err(RegistrationError::InvalidComponentName {
                    name: flag.name().to_owned(),
                });
            }
            for name in std::iter::once(flag.name()).chain(flag.aliases().iter().map(String::as_str))
            {
                if long_names.iter().any(|n| n.eq_ignore_ascii_case(name)) {
                    return Err(RegistrationError::DuplicateFlag {
                        name: name.to_owned(),
                    });
                }
                long_names.push(name.to_owned());
            }
            if let Some(short) = flag.short() {
                if shorts.contains(&short) {
                    return Err(RegistrationError::DuplicateFlag {
                        name: short.to_string(),
                    });
                }
                shorts.push(short);
            }
        }

        let flag_component = if self.flags.is_empty() {
            None
        } else {
            Some(Arc::new(CommandComponent::flags(self.flags)))
        };

        Ok(Command {
            components: self.components,
            flag_component,
            handler,
            permission: self.permission,
            sender_kind: self.sender_kind,
        })
    }
}
