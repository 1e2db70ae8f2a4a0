//! Trace-based gas complexity analysis.
//!
//! Deploys a contract, runs one function against a live node, and derives a
//! gas breakdown, complexity metrics, optimization hints and a cost estimate
//! from the node's execution trace.

pub mod advisor;
pub mod compare;
pub mod complexity;
pub mod cost_model;
pub mod error;
pub mod orchestrator;
pub mod report;
pub mod trace_analyzer;

pub use compare::{NetworkAggregate, NetworkComparison, compare_profiles};
pub use error::ProfilerError;
pub use orchestrator::ComplexityAnalyzer;
