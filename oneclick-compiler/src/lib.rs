//! Compiler for rule records
//!
//! This crate turns the raw attribute bag of a rule record into the
//! typed trigger and action configuration the executor runs.

pub mod compiler;
pub mod error;

pub use compiler::{CompiledAction, CompiledRule, RuleCompiler};
pub use error::CompilerError;
