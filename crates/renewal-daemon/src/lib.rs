//! Renewal daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (generate, regenerate, classify,
//!   sessions, import, run)

pub mod cli;
pub mod commands;

pub use cli::{Cli, Commands, GenerateArgs};
pub use commands::{
    handle_classify, handle_generate, handle_import, handle_regenerate, handle_sessions,
    init_tracing, load_settings, run_scheduler, ClassifyReport, SessionRow,
};
