//! A boolean parser.

use futures::future::BoxFuture;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserFailure};
use crate::sender::CommandSender;
use crate::suggestion::Suggestion;

/// Parses "true" or "false", case-insensitively.
pub struct BooleanParser;

impl<S: CommandSender> ArgumentParser<S> for BooleanParser {
    type Output = bool;

    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>> {
        Box::pin(async move {
            let token = input.peek_string();
            let value = if token.eq_ignore_ascii_case("true") {
                true
            } else if token.eq_ignore_ascii_case("false") {
                false
            } else {
                return Err(ParserFailure::new(token, "expected true or false"));
            };
            input.read_string();
            Ok(value)
        })
    }

    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>> {
        Box::pin(async move {
            let prefix = input.peek_string().to_lowercase();
            let mut suggestions = vec![Suggestion::new("true"), Suggestion::new("false")];
            suggestions.retain(|s| s.text.starts_with(&prefix));
            suggestions
        })
    }
}
