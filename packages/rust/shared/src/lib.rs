//! Shared types, error model, and configuration for sn2n.
//!
//! This crate is the foundation depended on by all other sn2n crates.
//! It provides:
//! - [`Sn2nError`], the unified error type
//! - Block types ([`ContentBlock`], [`RichTextRun`], [`BlockKind`], [`MarkerId`])
//! - Audit types ([`AuditReport`], [`TextNode`], [`Recommendation`])
//! - Configuration ([`AppConfig`], [`ConversionConfig`], [`AuditConfig`], config loading)

pub mod config;
pub mod error;
pub mod report;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, AuditConfig, AuditSection, BatchSection, ConversionConfig, ConversionSection,
    ImagesSection, config_dir, config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, Sn2nError};
pub use report::{
    AuditReport, CountMismatch, ElementCounts, ElementKind, Priority, Recommendation, TextNode,
};
pub use types::{
    Annotations, BlockKind, CalloutStyle, ContentBlock, DeferredBlocks, Highlight, ImageSource,
    MarkerId, RichTextRun, runs_text, walk_blocks,
};
