//! A fixed-choice parser.

use futures::future::BoxFuture;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserFailure};
use crate::sender::CommandSender;
use crate::suggestion::Suggestion;

/// Accepts one word out of a fixed set, yielding the canonical spelling.
///
/// The enum-flavoured parser: hosts list the variant names once and get
/// case-insensitive matching and suggestions for free.
pub struct ChoiceParser {
    choices: Vec<String>,
}

impl ChoiceParser {
    /// Creates a parser over the given choices.
    #[must_use]
    pub fn new(choices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// The accepted choices, in declaration order.
    #[must_use]
    pub fn choices(&self) -> &[String] {
        &self.choices
    }
}

impl<S: CommandSender> ArgumentParser<S> for ChoiceParser {
    type Output = String;

    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>> {
        Box::pin(async move {
            let token = input.peek_string();
            let Some(choice) = self
                .choices
                .iter()
                .find(|choice| choice.eq_ignore_ascii_case(token))
            else {
                return Err(ParserFailure::new(
                    token,
                    format!("expected one of: {}", self.choices.join(", ")),
                ));
            };
            let choice = choice.clone();
            input.read_string();
            Ok(choice)
        })
    }

    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>> {
        Box::pin(async move {
            let prefix = input.peek_string().to_lowercase();
            self.choices
                .iter()
                .filter(|choice| choice.to_lowercase().starts_with(&prefix))
                .map(Suggestion::new)
                .collect()
        })
    }
}
