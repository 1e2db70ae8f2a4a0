//! Sequencer benchmarking.
//!
//! Submits self-transfers at chosen priority fees, watches them until they
//! settle, and scores how fairly the sequencer treats low-fee traffic.

pub mod error;
pub mod metrics;
pub mod monitor;
pub mod orchestrator;
pub mod report;
pub mod submitter;

pub use error::SequencerError;
pub use orchestrator::{SequencerTester, SessionHandle, fee_ladder};
