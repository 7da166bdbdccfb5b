//! A UUID parser.

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserFailure};
use crate::sender::CommandSender;

/// Parses a hyphenated or simple UUID.
pub struct UuidParser;

impl<S: CommandSender> ArgumentParser<S> for UuidParser {
    type Output = Uuid;

    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>> {
        Box::pin(async move {
            let token = input.peek_string();
            let uuid = Uuid::try_parse(token)
                .map_err(|_| ParserFailure::new(token, "expected a UUID"))?;
            input.read_string();
            Ok(uuid)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Result<Uuid, ParserFailure> {
        let mut context = CommandContext::new(());
        let mut input = CommandInput::new(text);
        futures::executor::block_on(ArgumentParser::<()>::parse(
            &UuidParser,
            &mut context,
            &mut input,
        ))
    }

    #[test]
    fn test_parses_round_trip() {
        let uuid = Uuid::new_v4();
        assert_eq!(parse(&uuid.to_string()).expect("valid"), uuid);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(parse("not-a-uuid").is_err());
    }
}
