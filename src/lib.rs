//! dataflux - media-aware directory scanning and rule-based reorganization
//!
//! This library classifies files into media categories by extension, gathers
//! per-category statistics over directory trees, and moves, copies or links
//! files according to priority-ordered rules (with a dry-run mode that plans
//! exactly what a live run would do). Scan filters, the rule document and the
//! log level are configured via TOML.

pub mod cancel;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod file_ops;
pub mod media_category;
pub mod output;
pub mod processor;
pub mod rules;
pub mod scanner;

pub use cancel::CancelToken;
pub use config::{CompiledFilters, Config, ConfigError};
pub use engine::{FileRecord, Report, RuleEngine};
pub use error::{DatafluxError, Result};
pub use media_category::{MediaCategory, classify};
pub use processor::{FileProcessor, ProcessReport};
pub use rules::{Condition, OperationKind, ProcessingRule, RuleSet};
pub use scanner::{DirectoryScanner, ScanResult, ScanStats};

pub use cli::{Args, Command, run_cli};
