//! lessonkit-core: Question model, grading, dispatch, and session scoring.
//!
//! This crate defines the lesson data model, the per-variant question views
//! and their correctness rules, and the runner that turns a sequence of
//! answers into a completion summary.

pub mod error;
pub mod grading;
pub mod model;
pub mod parser;
pub mod report;
pub mod runner;
pub mod session;
pub mod traits;
pub mod view;
