//! CLI commands

use crate::config::StoreConfig;
use crate::core::record::RecordKind;
use crate::core::temporal::{Timestamp, DATE_FORMAT};
use crate::error::{Error, Result};
use crate::query::options::{QueryOptions, SortOrder, DEFAULT_LIMIT};
use chrono::{DateTime, NaiveDate};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Telemetry-Store CLI
#[derive(Parser, Debug)]
#[command(name = "telemetry-store")]
#[command(about = "Segmented persistence and querying for security telemetry")]
pub struct Cli {
    /// Root directory holding segment files
    #[arg(long, global = true, default_value = "./telemetry_data")]
    pub root: PathBuf,

    /// Pending records per segment before a flush is forced
    #[arg(long, global = true, default_value_t = 50)]
    pub buffer_size: usize,

    /// Also write daily rolling log files to this directory
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::default()
            .with_root_dir(&self.root)
            .with_buffer_size(self.buffer_size)
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Ingest a JSON array of records
    Ingest {
        /// Input file; reads stdin when omitted or `-`
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
    /// Query stored records
    Query(QueryArgs),
    /// Print aggregate counts
    Stats,
    /// Delete data older than a timestamp
    Prune {
        /// Cutoff (RFC 3339, YYYY-MM-DD or epoch milliseconds)
        #[arg(short, long, value_parser = parse_timestamp)]
        before: Timestamp,
    },
    /// Delete all stored data
    Clear,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Record types to include (repeatable)
    #[arg(short = 't', long = "type")]
    pub types: Vec<RecordKind>,

    #[arg(short, long)]
    pub domain: Option<String>,

    /// Inclusive lower bound
    #[arg(long, value_parser = parse_timestamp)]
    pub since: Option<Timestamp>,

    /// Inclusive upper bound
    #[arg(long, value_parser = parse_timestamp)]
    pub until: Option<Timestamp>,

    #[arg(short, long, default_value_t = DEFAULT_LIMIT)]
    pub limit: usize,

    #[arg(short, long, default_value_t = 0)]
    pub offset: usize,

    #[arg(long, value_enum, default_value_t = OrderArg::Desc)]
    pub order: OrderArg,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderArg {
    Asc,
    Desc,
}

impl From<OrderArg> for SortOrder {
    fn from(order: OrderArg) -> Self {
        match order {
            OrderArg::Asc => SortOrder::Asc,
            OrderArg::Desc => SortOrder::Desc,
        }
    }
}

impl QueryArgs {
    pub fn to_options(&self) -> QueryOptions {
        let mut options = QueryOptions::new()
            .types(self.types.iter().copied())
            .limit(self.limit)
            .offset(self.offset)
            .order(self.order.into());
        options.domain = self.domain.clone();
        options.since = self.since;
        options.until = self.until;
        options
    }
}

/// Parse epoch milliseconds, an RFC 3339 instant or a bare UTC date
pub fn parse_timestamp(s: &str) -> Result<Timestamp> {
    if let Ok(millis) = s.parse::<i64>() {
        return Ok(Timestamp::from_millis(millis));
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(Timestamp::from_millis(dt.timestamp_millis()));
    }
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .map(Timestamp::start_of_day)
        .map_err(|_| Error::Query(format!("unrecognized timestamp: {s}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_timestamp_forms() {
        assert_eq!(parse_timestamp("1500").unwrap(), Timestamp::from_millis(1500));
        assert_eq!(
            parse_timestamp("2024-01-31T00:00:00Z").unwrap(),
            parse_timestamp("2024-01-31").unwrap()
        );
        assert_eq!(
            parse_timestamp("2024-01-31T01:00:00+01:00").unwrap(),
            parse_timestamp("2024-01-31").unwrap()
        );
        assert!(parse_timestamp("yesterday").is_err());
    }

    #[test]
    fn test_query_args() {
        let cli = Cli::parse_from([
            "telemetry-store",
            "--root",
            "/tmp/t",
            "query",
            "--type",
            "violation",
            "-t",
            "network-request",
            "--since",
            "2024-01-01",
            "--order",
            "asc",
            "-l",
            "5",
        ]);
        assert_eq!(cli.store_config().root_dir, PathBuf::from("/tmp/t"));

        let Commands::Query(args) = cli.command else {
            panic!("expected query command");
        };
        let options = args.to_options();
        assert_eq!(options.types, [RecordKind::Violation, RecordKind::NetworkRequest]);
        assert_eq!(options.limit, 5);
        assert_eq!(options.order, SortOrder::Asc);
        assert!(options.since.is_some());
        assert!(options.until.is_none());
    }
}
