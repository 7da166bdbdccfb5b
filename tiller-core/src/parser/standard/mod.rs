//! Standard argument parsers.
//!
//! These are ordinary consumers of the parser contract; hosts can mix them
//! freely with their own implementations.

pub mod boolean;
pub mod choice;
pub mod duration;
pub mod float;
pub mod integer;
pub mod literal;
pub mod string;
pub mod uuid;

pub use boolean::BooleanParser;
pub use choice::ChoiceParser;
pub use duration::DurationParser;
pub use float::FloatParser;
pub use integer::IntegerParser;
pub use literal::LiteralParser;
pub use string::{StringMode, StringParser};
pub use uuid::UuidParser;
