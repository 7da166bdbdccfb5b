//! String parsers: single token, quoted and greedy modes.

use futures::future::BoxFuture;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserFailure};
use crate::sender::CommandSender;

/// How much input a [`StringParser`] consumes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StringMode {
    /// One whitespace-delimited token.
    Single,
    /// One token, or a `'...'` / `"..."` span that may contain whitespace.
    /// Backslash escapes the quote character and itself.
    Quoted,
    /// Everything to the end of the input.
    Greedy,
}

/// Parses strings in one of the [`StringMode`]s.
pub struct StringParser {
    mode: StringMode,
}

impl StringParser {
    /// A parser consuming a single token.
    #[must_use]
    pub const fn single() -> Self {
        Self {
            mode: StringMode::Single,
        }
    }

    /// A parser accepting quoted spans.
    #[must_use]
    pub const fn quoted() -> Self {
        Self {
            mode: StringMode::Quoted,
        }
    }

    /// A parser consuming the rest of the input.
    #[must_use]
    pub const fn greedy() -> Self {
        Self {
            mode: StringMode::Greedy,
        }
    }

    /// The mode this parser operates in.
    #[must_use]
    pub const fn mode(&self) -> StringMode {
        self.mode
    }

    fn parse_single(input: &mut CommandInput) -> Result<String, ParserFailure> {
        let token = input.read_string();
        if token.is_empty() {
            Err(ParserFailure::new("", "expected a string"))
        } else {
            Ok(token)
        }
    }

    fn parse_quoted(input: &mut CommandInput) -> Result<String, ParserFailure> {
        let start = input.cursor();
        input.skip_whitespace(input.remaining_length());

        let remaining = input.remaining_input();
        let Some(quote) = remaining.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            input.set_cursor(start);
            return Self::parse_single(input);
        };

        let mut value = String::new();
        let mut escaped = false;
        let mut consumed = None;
        for (offset, c) in remaining.char_indices().skip(1) {
            if escaped {
                if c == quote || c == '\\' {
                    value.push(c);
                } else {
                    value.push('\\');
                    value.push(c);
                }
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == quote {
                consumed = Some(offset + c.len_utf8());
                break;
            } else {
                value.push(c);
            }
        }

        match consumed {
            Some(consumed) => {
                input.advance_by(consumed);
                input.skip_whitespace(1);
                Ok(value)
            }
            None => {
                let attempted = remaining.to_owned();
                input.set_cursor(start);
                Err(ParserFailure::new(attempted, "unterminated quoted string"))
            }
        }
    }

    fn parse_greedy(input: &mut CommandInput) -> Result<String, ParserFailure> {
        let start = input.cursor();
        input.skip_whitespace(input.remaining_length());
        let rest = input.remaining_input().to_owned();
        if rest.is_empty() {
            input.set_cursor(start);
            return Err(ParserFailure::new("", "expected a string"));
        }
        input.advance_by(rest.len());
        Ok(rest)
    }
}

impl<S: CommandSender> ArgumentParser<S> for StringParser {
    type Output = String;

    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>> {
        Box::pin(async move {
            match self.mode {
                StringMode::Single => Self::parse_single(input),
                StringMode::Quoted => Self::parse_quoted(input),
                StringMode::Greedy => Self::parse_greedy(input),
            }
        })
    }

    fn is_greedy(&self) -> bool {
        self.mode == StringMode::Greedy
    }
}
