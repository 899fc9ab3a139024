pub mod audio;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod global;
pub mod meet;
pub mod pipeline;
pub mod summarize;
pub mod transcript;
pub mod transcription;
pub mod translate;
