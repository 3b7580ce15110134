//! Data models for the inbox orchestrator

mod audiobook;
mod config;
mod error;

pub use audiobook::{Audiobook, Id3Info, OrigFileType, Stage, StructuralKind, strip_release_noise};
pub use config::{
    AdvancedConfig, Config, ConverterConfig, DiagnosticsConfig, DirectoryConfig, OnComplete,
    OverwriteMode, ProcessingConfig, RuntimeConfig,
};
pub use error::OrchestratorError;
