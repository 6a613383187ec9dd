//! Document processing service: splits text into segments, transforms each
//! with a language model in bounded batches and persists progress after
//! every change so interrupted jobs resume where they stopped.

pub mod api;
pub mod config;
pub mod db;
pub mod engine;
pub mod llm;
pub mod shutdown;
pub mod worker;
