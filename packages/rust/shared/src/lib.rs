//! Shared types, error model, and configuration for reviewforge.
//!
//! This crate is the foundation depended on by all other reviewforge crates.
//! It provides:
//! - [`ReviewForgeError`] and [`RunError`], the error model
//! - Domain types ([`RunRequest`], [`DiscoveredItem`], [`AnalysisResult`],
//!   [`Draft`], [`EvaluationReport`], [`Phase`])
//! - Configuration ([`AppConfig`], [`PipelineConfig`], config loading)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, DefaultsConfig, OpenRouterConfig, PipelineConfig, PipelineSettings, config_dir,
    config_file_path, init_config, load_config, load_config_from, resolve_api_key,
};
pub use error::{Result, ReviewForgeError, RunError};
pub use types::{
    AnalysisOutcome, AnalysisResult, DEFAULT_MAX_ITEMS, DiscoveredItem, Draft, EvaluationReport,
    Feedback, NormalizedCitation, Phase, RunId, RunRequest, SubScores,
};
