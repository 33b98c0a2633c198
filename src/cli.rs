// Command-line interface.
// Parses arguments with clap and runs one command against a session built from the environment.

use std::sync::Arc;

use chrono::{Datelike, Local};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;

use crate::api::{BudgetClient, DistributionSource, ErrorLogRecord};
use crate::cache::{CacheReport, FileStorage, Storage};
use crate::config::{CacheConfig, Config};
use crate::error::{FinError, Result};
use crate::session::Session;

/// fincache - cached access to the finance dashboard API
#[derive(Parser, Debug)]
#[command(name = "fincache")]
#[command(about = "Cached access to the personal-finance API")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging for fincache
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Owner the cache entries are scoped to
    #[arg(long, env = "FINCACHE_OWNER", default_value = "local", global = true)]
    pub owner: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Show the expense distribution for one month
    ///
    /// Examples:
    ///   fincache distribution                   # Current month
    ///   fincache distribution --year 2024 -m 3  # March 2024
    ///   fincache distribution --force           # Bypass the cache
    Distribution {
        /// Year to load (defaults to the current year)
        #[arg(short, long)]
        year: Option<i32>,

        /// Month to select, 1-12 (defaults to the current month)
        #[arg(short, long, value_parser = clap::value_parser!(u32).range(1..=12))]
        month: Option<u32>,

        /// Fetch from the API even if a cached copy is fresh
        #[arg(short, long)]
        force: bool,
    },

    /// Print cache size and hit statistics
    Stats,

    /// Print the logged API errors
    Errors,

    /// Drop cached distributions, for one year or all of them
    Invalidate {
        /// Year to drop (drops every year when omitted)
        #[arg(short, long)]
        year: Option<i32>,
    },
}

/// One selected month, as printed by `distribution`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthReport<'a> {
    pub year: i32,
    pub month: u32,
    pub has_data: bool,
    pub is_current_period: bool,
    pub available_months: &'a [String],
    pub data: Option<&'a Value>,
}

/// Cache report plus raw hit/miss counters, as printed by `stats`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsReport {
    #[serde(flatten)]
    pub cache: CacheReport,
    pub hits: u64,
    pub misses: u64,
}

/// Storage for persisted entries and the error log, if a directory is configured.
pub fn storage_for(config: &CacheConfig) -> Option<Arc<dyn Storage>> {
    config
        .storage_dir
        .clone()
        .map(|dir| Arc::new(FileStorage::new(dir)) as Arc<dyn Storage>)
}

/// Run a parsed command against the live API.
pub async fn run(cli: Cli) -> Result<()> {
    let config = Config::from_env()?;
    let client = Arc::new(BudgetClient::new(&config.api)?);
    let storage = storage_for(&config.cache);

    tracing::debug!(base_url = client.base_url(), owner = %cli.owner, "Starting session");

    let mut session = Session::start(cli.owner.clone(), client, &config, storage);
    let output = execute(&mut session, &cli.command).await;
    // Exiting is not a logout; persisted entries stay for the next run
    drop(session);

    println!("{}", output?);
    Ok(())
}

/// Run one command and render its output as pretty JSON.
pub async fn execute<S: DistributionSource + 'static>(
    session: &mut Session<S>,
    command: &Command,
) -> Result<String> {
    match command {
        Command::Distribution { year, month, force } => {
            let today = Local::now().date_naive();
            let year = year.unwrap_or(today.year());
            let month = month.unwrap_or(today.month());

            if let Err(error) = session.distribution().get_distribution(year, *force).await {
                session.errors().report(error.clone(), Some("distribution"));
                return Err(FinError::Api(error));
            }

            // Already cached by the fetch above
            let mut budget = session.budget_at(month, year)?;
            budget.load().await;
            if let Some(message) = budget.error() {
                return Err(FinError::Other(message.to_string()));
            }

            let report = MonthReport {
                year,
                month,
                has_data: budget.has_data_for_selected_month(),
                is_current_period: budget.is_current_month_year(),
                available_months: budget
                    .data()
                    .map(|payload| payload.available_months.as_slice())
                    .unwrap_or_default(),
                data: budget.current_month_data(),
            };
            Ok(serde_json::to_string_pretty(&report)?)
        }
        Command::Stats => {
            let statistics = session.cache().statistics();
            let report = StatsReport {
                cache: session.cache().stats(),
                hits: statistics.hits,
                misses: statistics.misses,
            };
            Ok(serde_json::to_string_pretty(&report)?)
        }
        Command::Errors => {
            let records: Vec<&ErrorLogRecord> = session.errors().log().records().collect();
            Ok(serde_json::to_string_pretty(&records)?)
        }
        Command::Invalidate { year } => {
            let removed = match year {
                Some(year) => usize::from(session.distribution().invalidate_year(*year)),
                None => session.distribution().invalidate_all(),
            };
            session.cache().lock().persist();
            Ok(serde_json::json!({ "removed": removed }).to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{BudgetPayload, RawError};
    use async_trait::async_trait;
    use std::collections::BTreeMap;

    struct MarchOnly;

    #[async_trait]
    impl DistributionSource for MarchOnly {
        async fn fetch_distribution(
            &self,
            year: i32,
        ) -> std::result::Result<BudgetPayload, RawError> {
            if year < 2000 {
                return Err(RawError::http(404));
            }
            let mut monthly_data = BTreeMap::new();
            monthly_data.insert("03".to_string(), serde_json::json!({ "total": 42 }));
            Ok(BudgetPayload {
                monthly_data,
                available_months: vec!["03".to_string()],
                history: Value::Null,
            })
        }
    }

    fn session() -> Session<MarchOnly> {
        let mut config = Config::default();
        config.cache.storage_dir = None;
        Session::start("tester", Arc::new(MarchOnly), &config, None)
    }

    #[test]
    fn test_parse_distribution_args() {
        let cli = Cli::try_parse_from([
            "fincache",
            "distribution",
            "--year",
            "2024",
            "--month",
            "3",
            "--force",
        ])
        .unwrap();

        assert_eq!(
            cli.command,
            Command::Distribution {
                year: Some(2024),
                month: Some(3),
                force: true,
            }
        );
        assert!(!cli.verbose);
    }

    #[test]
    fn test_month_out_of_range_is_rejected() {
        let result = Cli::try_parse_from(["fincache", "distribution", "--month", "13"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["fincache", "stats", "--verbose", "--owner", "alice"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.owner, "alice");
        assert_eq!(cli.command, Command::Stats);
    }

    #[test]
    fn test_invalidate_help_describes_year() {
        use clap::CommandFactory;

        let mut command = Cli::command();
        let help = command
            .find_subcommand_mut("invalidate")
            .unwrap()
            .render_help()
            .to_string();
        assert!(help.contains("Year to drop"));
    }

    #[test]
    fn test_subcommand_is_required() {
        assert!(Cli::try_parse_from(["fincache"]).is_err());
    }

    #[tokio::test]
    async fn test_distribution_reports_selected_month() {
        let mut session = session();
        let command = Command::Distribution {
            year: Some(2024),
            month: Some(3),
            force: false,
        };

        let output = execute(&mut session, &command).await.unwrap();
        let json: Value = serde_json::from_str(&output).unwrap();

        assert_eq!(json["hasData"], true);
        assert_eq!(json["data"]["total"], 42);
        assert_eq!(json["availableMonths"], serde_json::json!(["03"]));

        // Second lookup by the budget state was a cache hit
        let statistics = session.cache().statistics();
        assert_eq!(statistics.misses, 1);
        assert_eq!(statistics.hits, 1);
    }

    #[tokio::test]
    async fn test_distribution_failure_is_logged() {
        let mut session = session();
        let command = Command::Distribution {
            year: Some(1999),
            month: Some(1),
            force: false,
        };

        let result = execute(&mut session, &command).await;
        assert!(matches!(result, Err(FinError::Api(_))));
        assert_eq!(session.errors().log().len(), 1);

        let output = execute(&mut session, &Command::Errors).await.unwrap();
        assert!(output.contains("NOT_FOUND"));
    }

    #[tokio::test]
    async fn test_invalidate_all() {
        let mut session = session();
        for year in [2023, 2024] {
            session.distribution().get_distribution(year, false).await.unwrap();
        }

        let output = execute(&mut session, &Command::Invalidate { year: None })
            .await
            .unwrap();
        assert_eq!(output, r#"{"removed":2}"#);
        assert_eq!(session.cache().stats().size, 0);
    }
}
