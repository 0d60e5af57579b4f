//! Result output
//!
//! Human-readable text for the terminal and a JSON document for tooling.

pub mod json;
pub mod text;
