//! The literal parser.

use futures::future::BoxFuture;
use parking_lot::RwLock;

use crate::context::CommandContext;
use crate::input::CommandInput;
use crate::parser::{ArgumentParser, ParserFailure};
use crate::sender::CommandSender;
use crate::suggestion::Suggestion;

/// Accepts exactly one fixed word or one of its aliases.
///
/// Matching is case-insensitive and always yields the canonical name. The
/// alias set is mutable because merging a command into an existing prefix
/// extends the aliases of the shared literal in place.
pub struct LiteralParser {
    name: String,
    aliases: RwLock<Vec<String>>,
}

impl LiteralParser {
    /// Creates a parser for `name` with the given additional aliases.
    #[must_use]
    pub fn new(name: impl Into<String>, aliases: impl IntoIterator<Item = impl Into<String>>) -> Self {
        let parser = Self {
            name: name.into(),
            aliases: RwLock::new(Vec::new()),
        };
        for alias in aliases {
            parser.insert_alias(alias);
        }
        parser
    }

    /// The canonical name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Adds an alias, ignoring duplicates and the canonical name itself.
    pub fn insert_alias(&self, alias: impl Into<String>) {
        let alias = alias.into();
        if alias.eq_ignore_ascii_case(&self.name) {
            return;
        }
        let mut aliases = self.aliases.write();
        if !aliases.iter().any(|a| a.eq_ignore_ascii_case(&alias)) {
            aliases.push(alias);
        }
    }

    /// Snapshot of the aliases, canonical name first.
    #[must_use]
    pub fn all_names(&self) -> Vec<String> {
        let mut names = vec![self.name.clone()];
        names.extend(self.aliases.read().iter().cloned());
        names
    }

    /// Whether `token` matches the name or an alias.
    #[must_use]
    pub fn accepts(&self, token: &str) -> bool {
        !token.is_empty()
            && (token.eq_ignore_ascii_case(&self.name)
                || self
                    .aliases
                    .read()
                    .iter()
                    .any(|a| a.eq_ignore_ascii_case(token)))
    }

    /// Whether the alias sets of two literals overlap.
    #[must_use]
    pub fn intersects(&self, other: &LiteralParser) -> bool {
        other.all_names().iter().any(|name| self.accepts(name))
    }
}

impl<S: CommandSender> ArgumentParser<S> for LiteralParser {
    type Output = String;

    fn parse<'a>(
        &'a self,
        _context: &'a mut CommandContext<S>,
        input: &'a mut CommandInput,
    ) -> BoxFuture<'a, Result<Self::Output, ParserFailure>> {
        Box::pin(async move {
            let token = input.peek_string();
            if self.accepts(token) {
                input.read_string();
                Ok(self.name.clone())
            } else {
                Err(ParserFailure::new(
                    token,
                    format!("expected \"{}\"", self.name),
                ))
            }
        })
    }

    fn suggestions<'a>(
        &'a self,
        _context: &'a CommandContext<S>,
        _input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>> {
        Box::pin(async move { self.all_names().into_iter().map(Suggestion::new).collect() })
    }
}
