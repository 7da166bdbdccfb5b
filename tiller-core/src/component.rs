//! Command components: the per-position descriptors a command is made of.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::flag::{CommandFlag, FlagParser};
use crate::parser::standard::LiteralParser;
use crate::parser::{ArgumentParser, ErasedParser, ParsedValue, ParserFailure};
use crate::sender::CommandSender;
use crate::suggestion::{Suggestion, SuggestionProvider};

/// The kind of a component.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ComponentKind {
    /// Matches its own name or an alias.
    Literal,
    /// Produces a typed value from input.
    Variable,
    /// An off-path flag group.
    Flag,
}

/// What happens when a component receives no input.
pub enum DefaultValue<S> {
    /// A literal string appended to the input stream, as if typed, feeding
    /// back through regular parsing.
    Parsed(String),
    /// A host callback producing the already-parsed value, bypassing the
    /// parser entirely.
    Computed(Arc<dyn Fn(&mut CommandContext<S>) -> ParsedValue + Send + Sync>),
}

impl<S> fmt::Debug for DefaultValue<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Self::Parsed(text) => f.debug_tuple("Parsed").field(text).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
        }
    }
}

/// A check run against the raw input before a component's parser.
///
/// Preprocessors peek but never consume; the immutable input reference makes
/// that part of the signature.
pub trait ComponentPreprocessor<S>: Send + Sync {
    /// Accepts or rejects the input ahead of parsing.
    fn preprocess<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Result<(), ParserFailure>>;
}

/// One positional element of a command declaration.
pub struct CommandComponent<S> {
    name: String,
    kind: ComponentKind,
    required: bool,
    parser: Arc<dyn ErasedParser<S>>,
    literal: Option<Arc<LiteralParser>>,
    flag: Option<Arc<FlagParser<S>>>,
    default_value: Option<DefaultValue<S>>,
    suggestion_provider: Option<Arc<dyn SuggestionProvider<S>>>,
    preprocessors: Vec<Arc<dyn ComponentPreprocessor<S>>>,
}

impl<S: CommandSender> CommandComponent<S> {
    /// Creates a literal component with optional aliases.
    #[must_use]
    pub fn literal(
        name: impl Into<String>,
        aliases: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let name = name.into();
        let literal = Arc::new(LiteralParser::new(name.clone(), aliases));
        let parser: Arc<dyn ErasedParser<S>> = Arc::clone(&literal) as Arc<dyn ErasedParser<S>>;
        Self {
            name,
            kind: ComponentKind::Literal,
            required: true,
            parser,
            literal: Some(literal),
            flag: None,
            default_value: None,
            suggestion_provider: None,
            preprocessors: Vec::new(),
        }
    }

    /// Creates a required variable component.
    #[must_use]
    pub fn required(name: impl Into<String>, parser: impl ArgumentParser<S> + 'static) -> Self {
        Self::variable(name, parser, true)
    }

    /// Creates an optional variable component.
    #[must_use]
    pub fn optional(name: impl Into<String>, parser: impl ArgumentParser<S> + 'static) -> Self {
        Self::variable(name, parser, false)
    }

    fn variable(
        name: impl Into<String>,
        parser: impl ArgumentParser<S> + 'static,
        required: bool,
    ) -> Self {
        Self {
            name: name.into(),
            kind: ComponentKind::Variable,
            required,
            parser: Arc::new(parser),
            literal: None,
            flag: None,
            default_value: None,
            suggestion_provider: None,
            preprocessors: Vec::new(),
        }
    }

    /// Creates the flag component aggregating a command's flags.
    #[must_use]
    pub fn flags(flags: impl IntoIterator<Item = CommandFlag<S>>) -> Self {
        let flag = Arc::new(FlagParser::new(flags));
        let parser: Arc<dyn ErasedParser<S>> = Arc::clone(&flag) as Arc<dyn ErasedParser<S>>;
        Self {
            name: String::from("flags"),
            kind: ComponentKind::Flag,
            required: false,
            parser,
            literal: None,
            flag: Some(flag),
            default_value: None,
            suggestion_provider: None,
            preprocessors: Vec::new(),
        }
    }

    /// Sets a parsed default: text appended to the input when the component
    /// receives none.
    #[must_use]
    pub fn with_default_parsed(mut self, text: impl Into<String>) -> Self {
        self.default_value = Some(DefaultValue::Parsed(text.into()));
        self
    }

    /// Sets a computed default: a host callback producing the value directly.
    #[must_use]
    pub fn with_default_computed<T: Send + Sync + 'static>(
        mut self,
        compute: impl Fn(&mut CommandContext<S>) -> T + Send + Sync + 'static,
    ) -> Self {
        self.default_value = Some(DefaultValue::Computed(Arc::new(move |context| {
            Box::new(compute(context)) as ParsedValue
        })));
        self
    }

    /// Overrides where this component's suggestions come from.
    #[must_use]
    pub fn with_suggestion_provider(
        mut self,
        provider: impl SuggestionProvider<S> + 'static,
    ) -> Self {
        self.suggestion_provider = Some(Arc::new(provider));
        self
    }

    /// Appends a preprocessor; they run in registration order and the first
    /// failure short-circuits.
    #[must_use]
    pub fn with_preprocessor(mut self, preprocessor: impl ComponentPreprocessor<S> + 'static) -> Self {
        self.preprocessors.push(Arc::new(preprocessor));
        self
    }

    /// The component name; also the context key its value is stored under.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The component kind.
    #[must_use]
    pub const fn kind(&self) -> ComponentKind {
        self.kind
    }

    /// Whether input for this component is mandatory.
    #[must_use]
    pub const fn is_required(&self) -> bool {
        self.required
    }

    /// The literal parser, for literal components.
    #[must_use]
    pub fn literal_parser(&self) -> Option<&Arc<LiteralParser>> {
        self.literal.as_ref()
    }

    /// The flag parser, for flag components.
    #[must_use]
    pub fn flag_parser(&self) -> Option<&Arc<FlagParser<S>>> {
        self.flag.as_ref()
    }

    /// The default value strategy, if any.
    #[must_use]
    pub fn default_value(&self) -> Option<&DefaultValue<S>> {
        self.default_value.as_ref()
    }

    /// Whether this component's parser consumes to end-of-input.
    #[must_use]
    pub fn is_greedy(&self) -> bool {
        self.parser.is_greedy()
    }

    /// Whether `token` matches this component as a literal.
    #[must_use]
    pub fn accepts_literal(&self, token: &str) -> bool {
        self.literal.as_ref().is_some_and(|l| l.accepts(token))
    }

    /// Runs the preprocessors in order; the first failure short-circuits.
    pub fn preprocess<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Result<(), ParserFailure>> {
        Box::pin(async move {
            for preprocessor in &self.preprocessors {
                preprocessor.preprocess(context, input).await?;
            }
            Ok(())
        })
    }

    /// Runs the parser, type-erased.
    pub fn parse<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<ParsedValue, ParserFailure>> {
        self.parser.parse_erased(context, input)
    }

    /// Returns suggestions from the provider, falling back to the parser.
    pub fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>> {
        match &self.suggestion_provider {
            Some(provider) => provider.suggestions(context, input),
            None => self.parser.suggestions_erased(context, input),
        }
    }

    /// Literal components sort ahead of variable and flag components.
    pub(crate) const fn sort_precedence(&self) -> u8 {
        match self.kind {
            ComponentKind::Literal => 0,
            ComponentKind::Variable | ComponentKind::Flag => 1,
        }
    }

    /// Whether `name` is a legal component name.
    #[must_use]
    pub fn is_valid_name(name: &str) -> bool {
        !name.is_empty()
            && name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    }
}

/// Components compare by `(required, name)`; that pair also drives
/// de-duplication when command chains are merged into the tree.
impl<S> PartialEq for CommandComponent<S> {
    fn eq(&self, other: &Self) -> bool {
        self.required == other.required && self.name == other.name
    }
}

impl<S> Eq for CommandComponent<S> {}

impl<S> fmt::Debug for CommandComponent<S> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("CommandComponent")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("required", &self.required)
            .finish_non_exhaustive()
    }
}
