//! CLI argument parsing for the renewal daemon.
//!
//! CLI flags override every other configuration source.

use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};

use renewal_engine::{GenerateRequest, Scope};
use renewal_types::{EngineSettings, RecordSource};

/// Renewal Scheduling Engine
///
/// Generates capacity-bounded renewal training sessions for staff whose
/// certifications are about to expire.
#[derive(Parser, Debug)]
#[command(name = "renewal-daemon")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/renewal-engine/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the database directory
    #[arg(long, global = true)]
    pub data: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Daemon commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Generate sessions for upcoming expiries, replacing untouched auto-generated ones
    Generate(GenerateArgs),

    /// Re-bucket existing scheduled sessions under a new capacity
    Regenerate {
        /// New maximum roster size
        #[arg(long)]
        capacity: u32,

        /// Restrict to these requirement ids (repeatable)
        #[arg(long = "requirement")]
        requirements: Vec<String>,

        /// Run timeout in seconds
        #[arg(long)]
        timeout_secs: Option<u64>,
    },

    /// Compute expiry date and status for an issue date
    Classify {
        /// Issue date (YYYY-MM-DD)
        #[arg(long)]
        issue_date: NaiveDate,

        /// Validity period in months; omit for requirements that never expire
        #[arg(long)]
        validity_months: Option<u32>,

        /// Evaluation instant (RFC 3339), defaults to now
        #[arg(long)]
        now: Option<DateTime<Utc>>,
    },

    /// List stored sessions
    Sessions {
        /// Restrict to these requirement ids (repeatable)
        #[arg(long = "requirement")]
        requirements: Vec<String>,
    },

    /// Load a JSON dataset into the store
    Import {
        /// Dataset file
        file: PathBuf,
    },

    /// Run the cron scheduler in the foreground until interrupted
    Run,
}

/// Overrides for one generation run; unset flags fall back to config.
#[derive(Args, Debug, Clone, Default)]
pub struct GenerateArgs {
    /// Record collection (certificates, training-records)
    #[arg(long)]
    pub source: Option<RecordSource>,

    /// Lead time in days before the earliest expiry
    #[arg(long)]
    pub days_before_expiry: Option<u32>,

    /// How far ahead expiries are considered, in days
    #[arg(long)]
    pub lookahead_days: Option<u32>,

    /// Maximum roster size per session
    #[arg(long)]
    pub capacity: Option<u32>,

    /// Session location
    #[arg(long)]
    pub location: Option<String>,

    /// Station code
    #[arg(long)]
    pub airport: Option<String>,

    /// Restrict to these requirement ids (repeatable)
    #[arg(long = "requirement")]
    pub requirements: Vec<String>,

    /// Run timeout in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

impl GenerateArgs {
    /// Merge the flags over the configured defaults.
    pub fn to_request(&self, defaults: &EngineSettings) -> GenerateRequest {
        let mut request = GenerateRequest::from_settings(defaults)
            .with_scope(Scope::requirements(self.requirements.iter().cloned()));
        if let Some(source) = self.source {
            request.source = source;
        }
        if let Some(days) = self.days_before_expiry {
            request.days_before_expiry = days;
        }
        if let Some(days) = self.lookahead_days {
            request.lookahead_days = days;
        }
        if let Some(capacity) = self.capacity {
            request.capacity = capacity;
        }
        if let Some(location) = &self.location {
            request.location = location.clone();
        }
        if self.airport.is_some() {
            request.airport = self.airport.clone();
        }
        request
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_flags() {
        let cli = Cli::parse_from([
            "renewal-daemon",
            "generate",
            "--source",
            "training-records",
            "--capacity",
            "10",
            "--requirement",
            "r1",
            "--requirement",
            "r2",
        ]);
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.source, Some(RecordSource::TrainingRecords));
                assert_eq!(args.capacity, Some(10));
                assert_eq!(args.requirements, vec!["r1", "r2"]);
            }
            other => panic!("Expected Generate command, got {other:?}"),
        }
    }

    #[test]
    fn test_invalid_source_rejected() {
        let result = Cli::try_parse_from(["renewal-daemon", "generate", "--source", "emails"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from([
            "renewal-daemon",
            "sessions",
            "--data",
            "/tmp/db",
            "--log-level",
            "debug",
        ]);
        assert_eq!(cli.data.as_deref(), Some("/tmp/db"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert!(matches!(cli.command, Commands::Sessions { .. }));
    }

    #[test]
    fn test_regenerate_requires_capacity() {
        assert!(Cli::try_parse_from(["renewal-daemon", "regenerate"]).is_err());
        let cli = Cli::parse_from(["renewal-daemon", "regenerate", "--capacity", "8"]);
        assert!(matches!(cli.command, Commands::Regenerate { capacity: 8, .. }));
    }

    #[test]
    fn test_classify_parses_dates() {
        let cli = Cli::parse_from([
            "renewal-daemon",
            "classify",
            "--issue-date",
            "2024-01-31",
            "--validity-months",
            "1",
            "--now",
            "2024-02-20T00:00:00Z",
        ]);
        match cli.command {
            Commands::Classify {
                issue_date,
                validity_months,
                now,
            } => {
                assert_eq!(issue_date, NaiveDate::from_ymd_opt(2024, 1, 31).unwrap());
                assert_eq!(validity_months, Some(1));
                assert!(now.is_some());
            }
            other => panic!("Expected Classify command, got {other:?}"),
        }
    }

    #[test]
    fn test_args_override_defaults() {
        let defaults = EngineSettings::default();
        let args = GenerateArgs {
            capacity: Some(4),
            airport: Some("DXB".to_string()),
            ..Default::default()
        };
        let request = args.to_request(&defaults);
        assert_eq!(request.capacity, 4);
        assert_eq!(request.airport.as_deref(), Some("DXB"));
        assert_eq!(request.lookahead_days, defaults.lookahead_days);
        assert_eq!(request.scope, Scope::All);
    }
}
