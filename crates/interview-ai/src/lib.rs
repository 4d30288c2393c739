//! Telephonic interview round for multi-stage hiring pipelines.
//!
//! Scheduling, live call sessions, recording ingestion, and the asynchronous
//! transcribe, score, and decide pipeline live under [`workflows::telephonic`].

pub mod config;
pub mod error;
pub mod telemetry;
pub mod workflows;
