//! Pure, CPU-bound pipeline stages: classification, chunking, offset
//! translation, validation, confidence scoring, consistency checking, and
//! deduplication.
//!
//! None of these suspend on I/O — they run to completion once invoked from
//! the orchestrator.

pub mod chunker;
pub mod complexity;
pub mod confidence;
pub mod consistency;
pub mod dedup;
pub mod offset;
pub mod validation;
