//! SQL utilities
//!
//! Query generation for catalog nodes.

pub mod generator;

pub use generator::{QueryTemplate, generate, quote_ident};
