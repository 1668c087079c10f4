//! Code grading engine: sandboxed execution, output judging, condition
//! checking, and score aggregation for student submissions.
//!
//! The typical entry point is [`Grader::grade`], which runs the whole
//! pipeline for one [`gradex_common::types::GradeRequest`]. The individual
//! stages (`sandbox`, `judge`, `conditions`, `scoring`) are public and
//! usable on their own.

pub mod conditions;
pub mod error;
pub mod grader;
pub mod judge;
pub mod languages;
pub mod sandbox;
pub mod scoring;

pub use conditions::{MergePolicy, SemanticEvaluator, SemanticVerdict};
pub use error::EngineError;
pub use grader::Grader;
pub use languages::{LanguageRegistry, LanguageSpec};
pub use sandbox::{Sandbox, SandboxLimits};
