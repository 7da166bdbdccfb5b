//! A duration parser.

use std::time::Duration;

use futures::future::BoxFuture;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserFailure};
use crate::sender::CommandSender;
use crate::suggestion::Suggestion;

/// Units accepted by [`DurationParser`], largest first.
const UNITS: [(char, u64); 4] = [('d', 86_400), ('h', 3_600), ('m', 60), ('s', 1)];

/// Parses durations written as `<n>d<n>h<n>m<n>s`, e.g. `2d12h7m34s`.
///
/// Each unit may appear at most once and units must be in decreasing order.
pub struct DurationParser;

impl DurationParser {
    fn unit_rank(unit: char) -> Option<usize> {
        UNITS.iter().position(|(c, _)| *c == unit)
    }

    fn parse_token(token: &str) -> Result<Duration, ParserFailure> {
        if token.is_empty() {
            return Err(ParserFailure::new(token, "expected a duration"));
        }

        let mut total = 0_u64;
        let mut last_rank: Option<usize> = None;
        let mut digits = String::new();
        for c in token.chars() {
            if c.is_ascii_digit() {
                digits.push(c);
                continue;
            }
            if digits.is_empty() {
                return Err(ParserFailure::new(token, format!("missing number before '{c}'")));
            }
            let Some(rank) = Self::unit_rank(c) else {
                return Err(ParserFailure::new(token, format!("unknown unit '{c}'")));
            };
            if last_rank.is_some_and(|last| rank <= last) {
                return Err(ParserFailure::new(token, format!("unit '{c}' out of order")));
            }
            let amount: u64 = digits
                .parse()
                .map_err(|_| ParserFailure::new(token, "number too large"))?;
            total = total.saturating_add(amount.saturating_mul(UNITS[rank].1));
            last_rank = Some(rank);
            digits.clear();
        }
        if !digits.is_empty() {
            return Err(ParserFailure::new(token, "missing unit after number"));
        }

        Ok(Duration::from_secs(total))
    }
}

impl<S: CommandSender> ArgumentParser<S> for DurationParser {
    type Output = Duration;

    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>> {
        Box::pin(async move {
            let duration = Self::parse_token(input.peek_string())?;
            input.read_string();
            Ok(duration)
        })
    }

    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>> {
        Box::pin(async move {
            let partial = input.peek_string();
            if partial.is_empty() {
                return (1..=9)
                    .map(|digit| Suggestion::new(digit.to_string()))
                    .collect();
            }

            let max_used = partial
                .chars()
                .filter_map(Self::unit_rank)
                .max();
            let unused = UNITS
                .iter()
                .enumerate()
                .filter(|(rank, _)| max_used.is_none_or(|used| *rank > used));

            match partial.chars().last() {
                // "12" -> 12d, 12h, 12m, 12s
                Some(c) if c.is_ascii_digit() => unused
                    .map(|(_, (unit, _))| Suggestion::new(format!("{partial}{unit}")))
                    .collect(),
                // "1d" -> 1d1h, 1d1m, 1d1s
                Some(_) => unused
                    .map(|(_, (unit, _))| Suggestion::new(format!("{partial}1{unit}")))
                    .collect(),
                None => Vec::new(),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Duration, ParserFailure> {
        let mut context = CommandContext::new(());
        let mut input = CommandInput::new(text);
        futures::executor::block_on(ArgumentParser::<()>::parse(
            &DurationParser,
            &mut context,
            &mut input,
        ))
    }

    fn suggest(text: &str) -> Vec<String> {
        let context = CommandContext::new(());
        let input = CommandInput::new(text);
        futures::executor::block_on(ArgumentParser::<()>::suggestions(
            &DurationParser,
            &context,
            &input,
        ))
        .into_iter()
        .map(|s| s.text)
        .collect()
    }

    #[test]
    fn test_full_duration() {
        let expected = 2 * 86_400 + 12 * 3_600 + 7 * 60 + 34;
        assert_eq!(parse("2d12h7m34s").expect("valid"), Duration::from_secs(expected));
    }

    #[test]
    fn test_single_unit() {
        assert_eq!(parse("90s").expect("valid"), Duration::from_secs(90));
    }

    #[test]
    fn test_bare_unit_fails() {
        assert!(parse("d").is_err());
    }

    #[test]
    fn test_missing_unit_fails() {
        assert!(parse("12").is_err());
    }

    #[test]
    fn test_repeated_or_unordered_units_fail() {
        assert!(parse("1d1d").is_err());
        assert!(parse("1h1d").is_err());
    }

    #[test]
    fn test_suggestions_after_digit() {
        assert_eq!(suggest("1"), vec!["1d", "1h", "1m", "1s"]);
    }

    #[test]
    fn test_suggestions_after_unit_skip_used_units() {
        assert_eq!(suggest("1d"), vec!["1d1h", "1d1m", "1d1s"]);
        assert_eq!(suggest("1d2h"), vec!["1d2h1m", "1d2h1s"]);
    }

    #[test]
    fn test_suggestions_for_empty_prefix() {
        assert_eq!(suggest("").len(), 9);
    }
}
