//! CLI argument parsing for Eventboard.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use eventboard::{FilterInput, ModelSelection};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "evb",
    about = "Single-page analytics dashboard over an event-log warehouse",
    version,
    after_help = "Logs are written to: ~/.local/share/eventboard/logs/eventboard.log\n\
                  The project id is read from EVENTBOARD_PROJECT_ID when not given."
)]
pub struct Cli {
    /// Path to a YAML config file (default: ~/.config/eventboard/config.yaml)
    #[arg(short = 'c', long, global = true)]
    pub config: Option<PathBuf>,

    /// Warehouse directory (overrides config)
    #[arg(short = 'w', long, global = true)]
    pub warehouse: Option<PathBuf>,

    /// Project id (overrides config and environment)
    #[arg(short = 'p', long, global = true)]
    pub project: Option<String>,

    /// Emit JSON instead of formatted output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create a local warehouse for the configured project
    Init,

    /// Import raw events from a JSONL file
    Import {
        /// File with one event per line
        file: PathBuf,
    },

    /// Fill the warehouse with random demo events
    Seed {
        /// Number of days ending today
        #[arg(short, long, default_value = "30", value_parser = clap::value_parser!(u32).range(1..=36500))]
        days: u32,

        /// Events per day
        #[arg(short, long, default_value = "200")]
        events: u32,
    },

    /// Print the aggregation query
    Query,

    /// Fetch once and render the dashboard
    Show {
        /// First day shown (YYYY-MM-DD or DD-MM-YYYY, default: earliest)
        #[arg(short, long, value_parser = parse_date)]
        start: Option<NaiveDate>,

        /// Last day shown (default: latest)
        #[arg(short, long, value_parser = parse_date)]
        end: Option<NaiveDate>,

        /// Model name, or "all"
        #[arg(short, long)]
        model: Option<String>,
    },

    /// List the entries of the model selector
    Models,

    /// Interactive session: change filters without re-querying
    Interactive,
}

/// Parse a date given as `YYYY-MM-DD` or `DD-MM-YYYY`.
pub fn parse_date(input: &str) -> Result<NaiveDate, String> {
    let input = input.trim();
    NaiveDate::parse_from_str(input, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(input, "%d-%m-%Y"))
        .map_err(|_| format!("invalid date '{}': expected YYYY-MM-DD or DD-MM-YYYY", input))
}

/// A line typed in an interactive session.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    Filter(FilterInput),
    Show,
    Refresh,
    Help,
    Quit,
}

/// Parse one interactive session line.
pub fn parse_session_line(line: &str) -> Result<SessionCommand, String> {
    let line = line.trim();
    let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    let rest = rest.trim();

    match word {
        "start" => parse_date(rest).map(|d| SessionCommand::Filter(FilterInput::StartDate(d))),
        "end" => parse_date(rest).map(|d| SessionCommand::Filter(FilterInput::EndDate(d))),
        "model" if !rest.is_empty() => Ok(SessionCommand::Filter(FilterInput::Model(
            ModelSelection::from_input(rest),
        ))),
        "model" => Err("usage: model <name|all>".to_string()),
        "reset" => Ok(SessionCommand::Filter(FilterInput::Reset)),
        "show" | "" => Ok(SessionCommand::Show),
        "refresh" => Ok(SessionCommand::Refresh),
        "help" | "?" => Ok(SessionCommand::Help),
        "quit" | "exit" | "q" => Ok(SessionCommand::Quit),
        other => Err(format!("unknown command '{}' (try 'help')", other)),
    }
}

pub const SESSION_HELP: &str = "\
commands:
  start <date>        set the first day shown
  end <date>          set the last day shown
  model <name|all>    restrict to one model
  reset               restore the default filter
  show                render the dashboard
  refresh             drop the cached result and re-query
  quit                leave the session";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(parse_date("2024-01-02"), Ok(expected));
        assert_eq!(parse_date("02-01-2024"), Ok(expected));
        assert!(parse_date("2024/01/02").is_err());
    }

    #[test]
    fn test_parse_session_line() {
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(
            parse_session_line("start 2024-01-02"),
            Ok(SessionCommand::Filter(FilterInput::StartDate(day)))
        );
        assert_eq!(
            parse_session_line("model All Models"),
            Ok(SessionCommand::Filter(FilterInput::Model(ModelSelection::All)))
        );
        assert_eq!(
            parse_session_line("model Aurora"),
            Ok(SessionCommand::Filter(FilterInput::Model(ModelSelection::Model(
                "Aurora".to_string()
            ))))
        );
        assert_eq!(parse_session_line(""), Ok(SessionCommand::Show));
        assert_eq!(parse_session_line("quit"), Ok(SessionCommand::Quit));
        assert!(parse_session_line("model").is_err());
        assert!(parse_session_line("end tomorrow").is_err());
        assert!(parse_session_line("frobnicate").is_err());
    }

    #[test]
    fn test_seed_days_bounded() {
        let cli = Cli::try_parse_from(["evb", "seed", "--days", "7"]).unwrap();
        assert!(matches!(cli.command, Command::Seed { days: 7, events: 200 }));

        assert!(Cli::try_parse_from(["evb", "seed", "--days", "0"]).is_err());
        assert!(Cli::try_parse_from(["evb", "seed", "--days", "100000"]).is_err());
    }
}
