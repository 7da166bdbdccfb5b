//! A floating point parser.

use futures::future::BoxFuture;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserFailure};
use crate::sender::CommandSender;

/// Parses a 64-bit float, optionally bounded.
pub struct FloatParser {
    min: Option<f64>,
    max: Option<f64>,
}

impl FloatParser {
    /// Creates an unbounded float parser.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            min: None,
            max: None,
        }
    }

    /// Creates a float parser with bounds.
    #[must_use]
    pub const fn bounded(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }
}

impl Default for FloatParser {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: CommandSender> ArgumentParser<S> for FloatParser {
    type Output = f64;

    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>> {
        Box::pin(async move {
            let token = input.peek_string();
            let value: f64 = token
                .parse()
                .map_err(|_| ParserFailure::new(token, "expected a number"))?;
            if !value.is_finite() {
                return Err(ParserFailure::new(token, "expected a finite number"));
            }

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

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(parser: &FloatParser, text: &str) -> Result<f64, ParserFailure> {
        let mut context = CommandContext::new(());
        let mut input = CommandInput::new(text);
        futures::executor::block_on(ArgumentParser::<()>::parse(parser, &mut context, &mut input))
    }

    #[test]
    fn test_parses_floats() {
        let parser = FloatParser::new();
        assert!((parse(&parser, "2.5").expect("valid float") - 2.5).abs() < f64::EPSILON);
        assert!(parse(&parser, "x").is_err());
        assert!(parse(&parser, "NaN").is_err());
    }

    #[test]
    fn test_bounds() {
        let parser = FloatParser::bounded(Some(0.0), None);
        assert!(parse(&parser, "-0.5").is_err());
    }
}
