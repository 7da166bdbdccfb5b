//! The argument parser contract and its object-safe form.

pub mod flag;
pub mod standard;

use std::any::Any;

use futures::FutureExt;
use futures::future::BoxFuture;
use thiserror::Error;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::sender::CommandSender;
use crate::suggestion::Suggestion;

/// A type-erased parsed value, stored in the context under the component name.
pub type ParsedValue = Box<dyn Any + Send + Sync>;

/// An explicit parser failure.
///
/// Carries the text the parser attempted to consume. Whether a failure is
/// recovered silently or surfaced to the caller is decided by the walk, not
/// by the parser.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
#[error("cannot parse {attempted:?}: {message}")]
pub struct ParserFailure {
    attempted: String,
    message: String,
}

impl ParserFailure {
    /// Creates a failure for the given attempted text.
    #[must_use]
    pub fn new(attempted: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            attempted: attempted.into(),
            message: message.into(),
        }
    }

    /// The text the parser tried to consume.
    #[must_use]
    pub fn attempted(&self) -> &str {
        &self.attempted
    }

    /// A short description of what went wrong.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Consumes input and produces a typed value, or fails.
///
/// A parser consumes zero or more tokens from the input. On failure it must
/// leave the cursor where it started; the peek-then-read idiom makes that the
/// natural shape, and the tree restores the cursor defensively in any case.
/// Both operations are futures so that parsers may consult external state;
/// the walk suspends exactly at these boundaries.
pub trait ArgumentParser<S: CommandSender>: Send + Sync {
    /// The value this parser produces.
    type Output: Send + Sync + 'static;

    /// Parses a value from the input.
    fn parse<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>>;

    /// Returns completion candidates for the token at the cursor.
    ///
    /// Non-mutating; the default returns nothing.
    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        _input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>> {
        futures::future::ready(Vec::new()).boxed()
    }

    /// Whether this parser consumes to the end of the input.
    ///
    /// Greedy leaves are suggested from the original cursor instead of being
    /// parsed first.
    fn is_greedy(&self) -> bool {
        false
    }
}

/// Object-safe form of [`ArgumentParser`], produced by a blanket impl.
///
/// The tree stores parsers in this form; values come back type-erased and are
/// recovered through the typed context accessors.
pub trait ErasedParser<S: CommandSender>: Send + Sync {
    /// Type-erased [`ArgumentParser::parse`].
    fn parse_erased<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<ParsedValue, ParserFailure>>;

    /// Type-erased [`ArgumentParser::suggestions`].
    fn suggestions_erased<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>>;

    /// See [`ArgumentParser::is_greedy`].
    fn is_greedy(&self) -> bool;
}

impl<S: CommandSender, P: ArgumentParser<S>> ErasedParser<S> for P {
    fn parse_erased<'a>(
        &'a self,
        context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<ParsedValue, ParserFailure>> {
        Box::pin(async move {
            self.parse(context, input)
                .await
                .map(|value| Box::new(value) as ParsedValue)
        })
    }

    fn suggestions_erased<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>> {
        self.suggestions(context, input)
    }

    fn is_greedy(&self) -> bool {
        <P as ArgumentParser<S>>::is_greedy(self)
    }
}
