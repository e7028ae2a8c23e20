//! Usage aggregation and CSV reporting for TTS and voice-clone billing records

pub mod cli;
pub mod config;
pub mod services;
pub mod sources;
pub mod types;
