//! Completion suggestions and the hooks that produce and post-process them.

use futures::future::BoxFuture;

use crate::context::CommandContext;
use crate::input::CommandInput;

/// A single completion candidate.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Suggestion {
    /// The replacement text.
    pub text: String,
    /// Optional tooltip shown next to the candidate.
    pub tooltip: Option<String>,
}

impl Suggestion {
    /// Creates a suggestion without a tooltip.
    #[must_use]
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tooltip: None,
        }
    }

    /// Attaches a tooltip to this suggestion.
    #[must_use]
    pub fn with_tooltip(mut self, tooltip: impl Into<String>) -> Self {
        self.tooltip = Some(tooltip.into());
        self
    }
}

/// Produces completion candidates for a component.
///
/// Components without an explicit provider delegate to their parser's
/// suggestion hook. Providers read the context's current component and any
/// values stored by earlier components.
pub trait SuggestionProvider<S>: Send + Sync {
    /// Returns candidates for the token at the input cursor.
    fn suggestions<'a>(
        &'a self,
        context: &'a CommandContext<S>,
        input: &'a CommandInput,
    ) -> BoxFuture<'a, Vec<Suggestion>>;
}

/// Host hook invoked once with the collected suggestions of a walk.
pub trait SuggestionProcessor<S>: Send + Sync {
    /// Filters or reorders the suggestions according to host rules.
    fn process(&self, context: &CommandContext<S>, suggestions: Vec<Suggestion>) -> Vec<Suggestion>;
}

/// The default processor: keeps candidates matching the partial token being
/// completed (case-insensitive prefix), sorts them and drops duplicates.
pub struct FilteringSuggestionProcessor;

impl<S> SuggestionProcessor<S> for FilteringSuggestionProcessor {
    fn process(
        &self,
        context: &CommandContext<S>,
        mut suggestions: Vec<Suggestion>,
    ) -> Vec<Suggestion> {
        let prefix = context.suggestion_prefix().to_lowercase();
        suggestions.retain(|s| s.text.to_lowercase().starts_with(&prefix));
        suggestions.sort_by(|a, b| a.text.cmp(&b.text));
        suggestions.dedup_by(|a, b| a.text == b.text);
        suggestions
    }
}

/// A processor that returns the suggestions unchanged.
pub struct PassthroughSuggestionProcessor;

impl<S> SuggestionProcessor<S> for PassthroughSuggestionProcessor {
    fn process(&self, _context: &CommandContext<S>, suggestions: Vec<Suggestion>) -> Vec<Suggestion> {
        suggestions
    }
}
