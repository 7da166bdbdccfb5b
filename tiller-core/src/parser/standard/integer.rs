//! An integer parser.

use futures::future::BoxFuture;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserFailure};
use crate::sender::CommandSender;

/// Parses a 64-bit signed integer, optionally bounded.
pub struct IntegerParser {
    min: Option<i64>,
    max: Option<i64>,
}

impl IntegerParser {
    /// Creates an unbounded integer parser.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    /// Creates an integer parser with bounds.
    #[must_use]
    pub const fn bounded(min: Option<i64>, max: Option<i64>) -> Self {
        Self { min, max }
    }
}

impl Default for IntegerParser {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CommandSender> ArgumentParser<S> for IntegerParser {
    type Output = i64;

    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>> {
        Box::pin(async move {
            let token = input.peek_string();
            let value: i64 = token
                .parse()
                .map_err(|_| ParserFailure::new(token, "expected an integer"))?;

            if let Some(min) = self.min
                && value < min
            {
                return Err(ParserFailure::new(token, format!("must be at least {min}")));
            }
            if let Some(max) = self.max
                && value > max
            {
                return Err(ParserFailure::new(token, format!("must be at most {max}")));
            }

            input.read_string();
            Ok(value)
        })
    }
}
