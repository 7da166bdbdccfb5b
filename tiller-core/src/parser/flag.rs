//! The flag subsystem.
//!
//! Flags are off-path arguments recognised by their `-x` / `--long` spelling.
//! A single flag component aggregates every flag of a command; the component
//! is attached into the tree at the flag insertion index, so flags may appear
//! anywhere in the remaining input, in any order.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ErasedParser, ParserFailure};
use crate::sender::CommandSender;
use crate::suggestion::Suggestion;

/// What happens when one flag appears more than once.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FlagRepeatPolicy {
    /// Later occurrences are ignored.
    #[default]
    FirstWins,
    /// Later occurrences replace earlier ones.
    Replace,
    /// Every occurrence is kept, in input order.
    Append,
}

/// One declared flag: a long name, an optional short form and an optional
/// value parser. Flags without a value parser are presence flags and store
/// `true` when given.
pub struct CommandFlag<S> {
    name: String,
    short: Option<char>,
    aliases: Vec<String>,
    value_parser: Option<Arc<dyn ErasedParser<S>>>,
    repeat_policy: FlagRepeatPolicy,
}

impl<S: CommandSender> CommandFlag<S> {
    /// Starts building a flag with the given long name.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CommandFlagBuilder<S> {
        CommandFlagBuilder {
            name: name.into(),
            short: None,
            aliases: Vec::new(),
            value_parser: None,
            repeat_policy: FlagRepeatPolicy::default(),
        }
    }

    /// The long name, without the leading dashes.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The short form, if any.
    #[must_use]
    pub const fn short(&self) -> Option<char> {
        self.short
    }

    /// Additional long aliases.
    #[must_use]
    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    /// Whether this flag expects a value.
    #[must_use]
    pub const fn has_value(&self) -> bool {
        self.value_parser.is_some()
    }

    /// The repeat policy for this flag.
    #[must_use]
    pub const fn repeat_policy(&self) -> FlagRepeatPolicy {
        self.repeat_policy
    }

    /// The parser for this flag's value, if any.
    #[must_use]
    pub fn value_parser(&self) -> Option<&Arc<dyn ErasedParser<S>>> {
        self.value_parser.as_ref()
    }

    fn matches_long(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
            || self.aliases.iter().any(|a| a.eq_ignore_ascii_case(name))
    }
}

/// Builder for [`CommandFlag`].
pub struct CommandFlagBuilder<S> {
    name: String,
    short: Option<char>,
    aliases: Vec<String>,
    value_parser: Option<Arc<dyn ErasedParser<S>>>,
    repeat_policy: FlagRepeatPolicy,
}

impl<S: CommandSender> CommandFlagBuilder<S> {
    /// Sets the single-character short form.
    #[must_use]
    pub const fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    /// Adds a long alias.
    #[must_use]
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    /// Makes this a value flag, parsed by `parser`.
    #[must_use]
    pub fn value_parser(mut self, parser: impl ArgumentParser<S> + 'static) -> Self {
        self.value_parser = Some(Arc::new(parser));
        self
    }

    /// Sets the repeat policy.
    #[must_use]
    pub const fn repeat_policy(mut self, policy: FlagRepeatPolicy) -> Self {
        self.repeat_policy = policy;
        self
    }

    /// Finishes the flag.
    #[must_use]
    pub fn build(self) -> CommandFlag<S> {
        CommandFlag {
            name: self.name,
            short: self.short,
            aliases: self.aliases,
            value_parser: self.value_parser,
            repeat_policy: self.repeat_policy,
        }
    }
}

/// Where inside a flag construct the suggester currently is.
///
/// Recorded in the context's flag slot by the suggestion walk so that the
/// flag parser can offer the right candidates.
pub enum FlagSuggestionState<S> {
    /// Not inside a flag construct.
    Idle,
    /// The last partial token looks like a flag name.
    TypingName {
        /// The partial flag token, including its dashes.
        partial: String,
    },
    /// A value flag was completed and its value is being typed.
    TypingValue {
        /// The flag whose value is being typed.
        flag: Arc<CommandFlag<S>>,
        /// The partial value token.
        partial: String,
    },
}

/// Marker value stored for a successfully parsed flag group.
///
/// The flag values themselves land in the context's flag store, keyed by
/// flag name.
#[derive(Clone, Copy, Debug, Default)]
pub struct FlagExtraction;

/// Parses any number of consecutive flags from the input.
///
/// Consuming zero flags is a success; the parser stops at the first token
/// that is not flag-shaped. A flag-shaped token that resolves to no known
/// flag, or a value flag without a parsable value, is a failure.
pub struct FlagParser<S> {
    flags: Vec<Arc<CommandFlag<S>>>,
}

impl<S: CommandSender> FlagParser<S> {
    /// Creates a parser over the given flags.
    #[must_use]
    pub fn new(flags: impl IntoIterator<Item = CommandFlag<S>>) -> Self {
        Self {
            flags: flags.into_iter().map(Arc::new).collect(),
        }
    }

    /// The flags this parser recognises.
    #[must_use]
    pub fn flags(&self) -> &[Arc<CommandFlag<S>>] {
        &self.flags
    }

    /// Whether `token` is shaped like a flag.
    ///
    /// A leading dash followed by a digit or dot is a negative number, not a
    /// flag, so value parsers downstream still get to see it.
    #[must_use]
    pub fn is_flag_token(token: &str) -> bool {
        let Some(rest) = token.strip_prefix('-') else {
            return false;
        };
        !rest.is_empty() && !rest.starts_with(|c: char| c.is_ascii_digit() || c == '.')
    }

    fn find_long(&self, name: &str) -> Option<Arc<CommandFlag<S>>> {
        self.flags.iter().find(|f| f.matches_long(name)).cloned()
    }

    fn find_short(&self, short: char) -> Option<Arc<CommandFlag<S>>> {
        self.flags.iter().find(|f| f.short == Some(short)).cloned()
    }

    /// How many tokens the flag starting at `token` will consume, or `None`
    /// when `token` does not resolve to a known flag.
    pub(crate) fn token_cost(&self, token: &str) -> Option<usize> {
        if !Self::is_flag_token(token) {
            return None;
        }
        if let Some(name) = token.strip_prefix("--") {
            let flag = self.find_long(name)?;
            return Some(if flag.has_value() { 2 } else { 1 });
        }
        let shorts = &token[1..];
        let mut chars = shorts.chars();
        let first = chars.next()?;
        if chars.next().is_none() {
            let flag = self.find_short(first)?;
            Some(if flag.has_value() { 2 } else { 1 })
        } else {
            // Grouped shorts must all be presence flags.
            shorts
                .chars()
                .try_fold(1, |cost, c| {
                    let flag = self.find_short(c)?;
                    (!flag.has_value()).then_some(cost)
                })
        }
    }

    /// Parses exactly one flag (with its value, if any) from the input.
    pub(crate) async fn parse_one(
        &self,
        context: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<(), ParserFailure> {
        let token = input.peek_string().to_owned();
        if !Self::is_flag_token(&token) {
            return Err(ParserFailure::new(token, "expected a flag"));
        }

        if let Some(name) = token.strip_prefix("--") {
            let Some(flag) = self.find_long(name) else {
                return Err(ParserFailure::new(token, "unknown flag"));
            };
            input.read_string();
            return self.parse_value(&flag, context, input).await;
        }

        let shorts = &token[1..];
        if shorts.chars().count() == 1 {
            let Some(flag) = shorts.chars().next().and_then(|c| self.find_short(c)) else {
                return Err(ParserFailure::new(token, "unknown flag"));
            };
            input.read_string();
            return self.parse_value(&flag, context, input).await;
        }

        // Grouped shorts: resolve everything before consuming anything.
        let mut resolved = Vec::new();
        for c in shorts.chars() {
            let Some(flag) = self.find_short(c) else {
                return Err(ParserFailure::new(&token, format!("unknown flag -{c}")));
            };
            if flag.has_value() {
                return Err(ParserFailure::new(
                    &token,
                    format!("flag -{c} takes a value and cannot be grouped"),
                ));
            }
            resolved.push(flag);
        }
        input.read_string();
        for flag in resolved {
            context.store_flag_value(flag.name(), Box::new(true), flag.repeat_policy());
        }
        Ok(())
    }

    async fn parse_value(
        &self,
        flag: &Arc<CommandFlag<S>>,
        context: &mut CommandContext<S>,
        input: &mut CommandInput,
    ) -> Result<(), ParserFailure> {
        let Some(parser) = &flag.value_parser else {
            context.store_flag_value(flag.name(), Box::new(true), flag.repeat_policy());
            return Ok(());
        };
        if input.is_empty_ignoring_whitespace() {
            return Err(ParserFailure::new(
                "",
                format!("missing value for --{}", flag.name()),
            ));
        }
        let value = parser.parse_erased(context, input).await?;
        context.store_flag_value(flag.name(), value, flag.repeat_policy());
        Ok(())
    }

    /// Classifies where in a flag construct the cursor currently is.
    ///
    /// Used by the suggestion walk, which records the result in the context
    /// so that value suggestions come from the right flag's parser.
    #[must_use]
    pub fn parse_current_flag(&self, input: &CommandInput) -> FlagSuggestionState<S> {
        let mut probe = input.clone();
        let mut pending: Option<Arc<CommandFlag<S>>> = None;

        loop {
            let remaining = probe.remaining_input();
            if remaining.trim().is_empty() {
                return match pending {
                    Some(flag) => FlagSuggestionState::TypingValue {
                        flag,
                        partial: String::new(),
                    },
                    None => FlagSuggestionState::Idle,
                };
            }
            let partial_at_end =
                probe.remaining_tokens() == 1 && !remaining.ends_with(char::is_whitespace);
            if partial_at_end {
                let partial = probe.peek_string().to_owned();
                return match pending {
                    Some(flag) => FlagSuggestionState::TypingValue { flag, partial },
                    None if partial.starts_with('-') && !Self::is_number_like(&partial) => {
                        FlagSuggestionState::TypingName { partial }
                    }
                    None => FlagSuggestionState::Idle,
                };
            }

            let token = probe.read_string();
            if pending.take().is_some() {
                // The token was the pending flag's value.
                continue;
            }
            if Self::is_flag_token(&token) {
                if let Some(name) = token.strip_prefix("--") {
                    pending = self.find_long(name).filter(|f| f.has_value());
                } else if token.chars().count() == 2 {
                    pending = token
                        .chars()
                        .nth(1)
                        .and_then(|c| self.find_short(c))
                        .filter(|f| f.has_value());
                }
            }
        }
    }

    fn is_number_like(token: &str) -> bool {
        token
            .strip_prefix('-')
            .is_some_and(|rest| rest.starts_with(|c: char| c.is_ascii_digit() || c == '.'))
    }

    fn name_suggestions(&self, partial: &str) -> Vec<Suggestion> {
        let partial = partial.to_lowercase();
        let mut suggestions = Vec::new();
        for flag in &self.flags {
            let mut forms = vec![format!("--{}", flag.name())];
            forms.extend(flag.aliases().iter().map(|a| format!("--{a}")));
            if let Some(short) = flag.short() {
                forms.push(format!("-{short}"));
            }
            for form in forms {
                if form.to_lowercase().starts_with(&partial) && !form.eq_ignore_ascii_case(&partial)
                {
                    suggestions.push(Suggestion::new(form));
                }
            }
        }
        suggestions
    }
}

impl<S: CommandSender> ArgumentParser<S> for FlagParser<S> {
    type Output = FlagExtraction;

    fn parse<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>> {
        Box::pin(async move {
            loop {
                let at_flag = {
                    let token = input.peek_string();
                    !token.is_empty() && Self::is_flag_token(token)
                };
                if !at_flag {
                    break;
                }
                self.parse_one(context, input).await?;
            }
            Ok(FlagExtraction)
        })
    }

    fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>> {
        Box::pin(async move {
            match context.flag_state() {
                Some(FlagSuggestionState::TypingValue { flag, .. }) => match flag.value_parser() {
                    Some(parser) => parser.suggestions_erased(context, input).await,
                    None => Vec::new(),
                },
                Some(FlagSuggestionState::TypingName { partial }) => {
                    self.name_suggestions(partial)
                }
                Some(FlagSuggestionState::Idle) | None => self.name_suggestions(""),
            }
        })
    }
}
