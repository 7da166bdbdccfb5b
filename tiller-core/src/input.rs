//! Cursor-based tokenizer over a command line.

/// A mutable cursor over an otherwise immutable command line.
///
/// All operations are total: reading past the end yields empty strings and
/// never fails. Parsers that consume input and then fail are expected to
/// restore the cursor via [`CommandInput::cursor`] / [`CommandInput::set_cursor`];
/// the tree restores it defensively as well.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandInput {
    input: String,
    cursor: usize,
}

impl CommandInput {
    /// Creates a new input positioned at the start of `input`.
    #[must_use]
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            cursor: 0,
        }
    }

    /// Returns the full underlying string, independent of the cursor.
    #[must_use]
    pub fn input(&self) -> &str {
        &self.input
    }

    /// Returns the current cursor position (a byte offset).
    #[must_use]
    pub const fn cursor(&self) -> usize {
        self.cursor
    }

    /// Restores a cursor position previously obtained from [`CommandInput::cursor`].
    ///
    /// Positions past the end of the input are clamped.
    pub fn set_cursor(&mut self, cursor: usize) {
        self.cursor = cursor.min(self.input.len());
    }

    /// Returns everything from the cursor to the end of the input.
    #[must_use]
    pub fn remaining_input(&self) -> &str {
        &self.input[self.cursor..]
    }

    /// Returns the number of unread bytes.
    #[must_use]
    pub const fn remaining_length(&self) -> usize {
        self.input.len() - self.cursor
    }

    /// Returns `true` when the cursor is at the end of the input.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.cursor >= self.input.len()
    }

    /// Returns `true` when only whitespace remains.
    #[must_use]
    pub fn is_empty_ignoring_whitespace(&self) -> bool {
        self.remaining_input().trim().is_empty()
    }

    /// Returns the next whitespace-delimited token without moving the cursor.
    ///
    /// Leading whitespace is skipped. Returns an empty string when the input
    /// is exhausted.
    #[must_use]
    pub fn peek_string(&self) -> &str {
        let remaining = self.remaining_input();
        let start = remaining.len() - remaining.trim_start().len();
        let token = &remaining[start..];
        match token.find(char::is_whitespace) {
            Some(end) => &token[..end],
            None => token,
        }
    }

    /// Reads the next whitespace-delimited token, advancing the cursor past
    /// the token and one trailing whitespace character.
    pub fn read_string(&mut self) -> String {
        let remaining = self.remaining_input();
        let start = remaining.len() - remaining.trim_start().len();
        let token = match remaining[start..].find(char::is_whitespace) {
            Some(end) => &remaining[start..start + end],
            None => &remaining[start..],
        };
        let token = token.to_owned();
        self.cursor += start + token.len();
        self.skip_whitespace(1);
        token
    }

    /// Advances the cursor past at most `max` whitespace characters.
    pub fn skip_whitespace(&mut self, max: usize) {
        for _ in 0..max {
            let Some(c) = self.remaining_input().chars().next() else {
                return;
            };
            if !c.is_whitespace() {
                return;
            }
            self.cursor += c.len_utf8();
        }
    }

    /// Counts the whitespace-delimited tokens left to read.
    ///
    /// A trailing whitespace counts as one additional empty token, so that a
    /// line ending in a space asks for completions of the *next* argument.
    #[must_use]
    pub fn remaining_tokens(&self) -> usize {
        let remaining = self.remaining_input();
        let tokens = remaining.split_whitespace().count();
        if remaining.ends_with(char::is_whitespace) {
            tokens + 1
        } else {
            tokens
        }
    }

    /// Appends text to the end of the input, as if the user had typed it.
    ///
    /// Used by parsed default values, which feed back through regular parsing.
    pub fn append_string(&mut self, text: &str) {
        self.input.push_str(text);
    }

    /// Advances the cursor by `bytes`, clamped to the end of the input.
    ///
    /// Support primitive for parsers with their own scanning (quoted and
    /// greedy string modes).
    pub fn advance_by(&mut self, bytes: usize) {
        self.set_cursor(self.cursor + bytes);
    }
}
