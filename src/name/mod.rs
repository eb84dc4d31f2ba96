//! Package name checks.
//!
//! This module handles:
//! - npm naming rules (syntax)
//! - Fuzzy collision matching against existing names

pub mod matcher;
pub mod syntax;

pub use matcher::NameMatcher;
pub use syntax::{check_syntax, SyntaxReport};
