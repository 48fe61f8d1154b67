//! Text-processing utilities shared between the template source parser
//! ([`crate::cst`]) and the visitor: splitting a string's content into
//! literal runs and `${expr}` placeholders.

pub mod segment;
