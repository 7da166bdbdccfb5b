//! The per-request command context.

use std::borrow::Cow;
use std::fmt;
use std::marker::PhantomData;
use std::sync::Arc;

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::component::CommandComponent;
use crate::parser::ParsedValue;
use crate::parser::flag::{FlagRepeatPolicy, FlagSuggestionState};

/// A typed key into the context store.
///
/// The key carries the value type at compile time; retrieval through a key
/// can therefore never downcast to the wrong type by accident.
pub struct ContextKey<T> {
    name: Cow<'static, str>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> ContextKey<T> {
    /// Creates a key with a static name, usable in constants.
    #[must_use]
    pub const fn of(name: &'static str) -> Self {
        Self {
            name: Cow::Borrowed(name),
            _marker: PhantomData,
        }
    }

    /// Creates a key with a runtime name.
    #[must_use]
    pub fn named(name: impl Into<Cow<'static, str>>) -> Self {
        Self {
            name: name.into(),
            _marker: PhantomData,
        }
    }

    /// Returns the key name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The outcome of one component's parse attempt.
#[derive(Clone, Debug)]
pub struct ParsingRecord {
    /// Name of the component that parsed.
    pub component: String,
    /// Cursor position before the attempt.
    pub start: usize,
    /// Cursor position after the attempt.
    pub end: usize,
    /// Whether the parser produced a value.
    pub success: bool,
    /// The raw text covered by the attempt.
    pub captured: String,
}

/// State carried through one parse or suggestion request.
///
/// One context belongs to one in-flight request; it is never shared between
/// concurrent walks. It owns the sender, a heterogeneous key/value store for
/// parsed arguments, the per-component parsing records, and the bookkeeping
/// slots used while suggesting.
pub struct CommandContext<S> {
    sender: S,
    suggesting: bool,
    store: FxHashMap<Cow<'static, str>, ParsedValue>,
    flags: FxHashMap<String, SmallVec<[ParsedValue; 1]>>,
    records: Vec<ParsingRecord>,
    current_component: Option<Arc<CommandComponent<S>>>,
    flag_state: Option<FlagSuggestionState<S>>,
    suggestion_prefix: String,
}

impl<S: fmt::Debug> fmt::Debug for CommandContext<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandContext")
            .field("sender", &self.sender)
            .field("suggesting", &self.suggesting)
            .field("records", &self.records)
            .field("suggestion_prefix", &self.suggestion_prefix)
            .finish_non_exhaustive()
    }
}

impl<S> CommandContext<S> {
    /// Creates a context for a parse request.
    #[must_use]
    pub fn new(sender: S) -> Self {
        Self {
            sender,
            suggesting: false,
            store: FxHashMap::default(),
            flags: FxHashMap::default(),
            records: Vec::new(),
            current_component: None,
            flag_state: None,
            suggestion_prefix: String::new(),
        }
    }

    /// The sender this request is on behalf of.
    pub fn sender(&self) -> &S {
        &self.sender
    }

    /// Whether this context belongs to a suggestion walk.
    #[must_use]
    pub const fn is_suggesting(&self) -> bool {
        self.suggesting
    }

    pub(crate) fn set_suggesting(&mut self, suggesting: bool) {
        self.suggesting = suggesting;
    }

    /// Stores a value under `name`, replacing any previous value.
    pub fn store<T: Send + Sync + 'static>(
        &mut self,
        name: impl Into<Cow<'static, str>>,
        value: T,
    ) {
        self.store.insert(name.into(), Box::new(value));
    }

    pub(crate) fn store_erased(&mut self, name: impl Into<Cow<'static, str>>, value: ParsedValue) {
        self.store.insert(name.into(), value);
    }

    /// Returns the value stored under `name`, if present with type `T`.
    #[must_use]
    pub fn get<T: 'static>(&self, name: &str) -> Option<&T> {
        self.store.get(name)?.downcast_ref()
    }

    /// Returns the stored value or the given default.
    #[must_use]
    pub fn get_or_default<T: Clone + 'static>(&self, name: &str, default: T) -> T {
        self.get(name).cloned().unwrap_or(default)
    }

    /// Returns the stored value or one produced by `supplier`.
    #[must_use]
    pub fn get_or_supply<T: Clone + 'static>(&self, name: &str, supplier: impl FnOnce() -> T) -> T {
        self.get(name).cloned().unwrap_or_else(supplier)
    }

    /// Removes and returns the value stored under `name`.
    pub fn remove<T: 'static>(&mut self, name: &str) -> Option<T> {
        let value = self.store.remove(name)?;
        match value.downcast::<T>() {
            Ok(boxed) => Some(*boxed),
            Err(original) => {
                // Wrong type requested; put the value back untouched.
                self.store.insert(Cow::Owned(name.to_owned()), original);
                None
            }
        }
    }

    /// Typed-key variant of [`CommandContext::store`].
    pub fn store_key<T: Send + Sync + 'static>(&mut self, key: &ContextKey<T>, value: T) {
        self.store(key.name.clone(), value);
    }

    /// Typed-key variant of [`CommandContext::get`].
    #[must_use]
    pub fn get_key<T: 'static>(&self, key: &ContextKey<T>) -> Option<&T> {
        self.get(key.name())
    }

    pub(crate) fn store_flag_value(
        &mut self,
        name: &str,
        value: ParsedValue,
        policy: FlagRepeatPolicy,
    ) {
        let slot = self.flags.entry(name.to_owned()).or_default();
        match policy {
            FlagRepeatPolicy::FirstWins => {
                if slot.is_empty() {
                    slot.push(value);
                }
            }
            FlagRepeatPolicy::Replace => {
                slot.clear();
                slot.push(value);
            }
            FlagRepeatPolicy::Append => slot.push(value),
        }
    }

    /// Returns whether the flag was present in the input.
    #[must_use]
    pub fn has_flag(&self, name: &str) -> bool {
        self.flags.contains_key(name)
    }

    /// Returns the (first) value parsed for a flag.
    #[must_use]
    pub fn flag<T: 'static>(&self, name: &str) -> Option<&T> {
        self.flags.get(name)?.first()?.downcast_ref()
    }

    /// Returns every value parsed for a repeatable flag.
    #[must_use]
    pub fn flag_values<T: 'static>(&self, name: &str) -> Vec<&T> {
        self.flags
            .get(name)
            .into_iter()
            .flatten()
            .filter_map(|v| v.downcast_ref())
            .collect()
    }

    /// Appends one component's parsing record.
    pub fn record_parse(
        &mut self,
        component: impl Into<String>,
        start: usize,
        end: usize,
        success: bool,
        captured: impl Into<String>,
    ) {
        self.records.push(ParsingRecord {
            component: component.into(),
            start,
            end,
            success,
            captured: captured.into(),
        });
    }

    /// The per-component parsing records, in walk order.
    #[must_use]
    pub fn parsing_records(&self) -> &[ParsingRecord] {
        &self.records
    }

    pub(crate) fn successful_components(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|r| r.success)
            .map(|r| r.component.clone())
            .collect()
    }

    /// The component currently asking for suggestions, if any.
    #[must_use]
    pub fn current_component(&self) -> Option<&Arc<CommandComponent<S>>> {
        self.current_component.as_ref()
    }

    pub(crate) fn set_current_component(&mut self, component: Arc<CommandComponent<S>>) {
        self.current_component = Some(component);
    }

    /// The flag construct the suggester is currently inside, if any.
    #[must_use]
    pub fn flag_state(&self) -> Option<&FlagSuggestionState<S>> {
        self.flag_state.as_ref()
    }

    pub(crate) fn set_flag_state(&mut self, state: FlagSuggestionState<S>) {
        self.flag_state = Some(state);
    }

    /// The partial token the suggestion request is completing.
    #[must_use]
    pub fn suggestion_prefix(&self) -> &str {
        &self.suggestion_prefix
    }

    pub(crate) fn set_suggestion_prefix(&mut self, prefix: impl Into<String>) {
        self.suggestion_prefix = prefix.into();
    }
}
