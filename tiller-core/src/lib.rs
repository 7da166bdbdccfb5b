//! # Tiller Core
//!
//! A reusable command-dispatch engine: hosts register structured commands
//! and the engine parses input lines into typed argument sets, produces
//! context-aware completions for partial input, and selects the handler to
//! run. The same engine serves chat platforms, console shells and bot
//! frameworks; the host supplies the sender type, a permission checker and
//! (optionally) a registration adapter.
//!
//! Declared command paths are merged into a single prefix-shared tree of
//! components. Registration verifies the tree (no ambiguous siblings, no
//! ownerless leaves) and propagates permission and sender-kind unions to
//! every node, so the walks can gate access early.
//!
//! Parsing and suggesting are asynchronous walks over that tree: they
//! suspend exactly at parser and preprocessor boundaries, explore siblings
//! in declaration order with literals first, and propagate cancellation by
//! future drop. The tree itself is shared and mostly immutable; mutations
//! run under a single registration lock, readers never take it, and each
//! walk owns its context and input cursor outright.

pub mod command;
pub mod component;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod input;
pub mod parser;
pub mod permission;
pub mod registration;
pub mod sender;
pub mod settings;
pub mod suggestion;
pub mod tree;
