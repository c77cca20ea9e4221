//! Eventboard CLI - analytics dashboard over an event-log warehouse.

use clap::Parser;
use colored::*;
use eventboard::{
    AggregationQuery, AnalyticsClient, Config, Dashboard, DashboardView, FilterInput, ModelSelection, QueryError,
    Warehouse, sample,
};
use eyre::{Context, Result};
use log::info;
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

mod cli;

use cli::{Cli, Command, SESSION_HELP, SessionCommand, parse_session_line};

/// Widest chart bar, in characters.
const CHART_WIDTH: u64 = 40;

fn setup_logging() -> Result<()> {
    let log_dir = dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("eventboard")
        .join("logs");

    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    let log_file = log_dir.join("eventboard.log");

    let target = Box::new(
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_file)
            .context("Failed to open log file")?,
    );

    env_logger::Builder::from_default_env()
        .target(env_logger::Target::Pipe(target))
        .init();

    info!("Logging initialized, writing to: {}", log_file.display());
    Ok(())
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?.with_project_override(cli.project.clone());
    if let Some(dir) = &cli.warehouse {
        config.warehouse = dir.clone();
    }
    Ok(config)
}

fn open_client(config: &Config) -> Result<AnalyticsClient<Warehouse>> {
    let warehouse = Warehouse::open(&config.warehouse)?;
    Ok(AnalyticsClient::new(config.project_id(), warehouse).with_cache_ttl(config.cache_ttl()))
}

fn render(view: &DashboardView, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(view).context("Failed to serialize view")?);
        return Ok(());
    }

    println!("{}", view.title.bold());
    if let Some(subtitle) = &view.subtitle {
        println!("{}", subtitle.dimmed());
    }
    if let Some(filter) = &view.filter {
        println!("{}: {}", "Model".bold(), filter.selected_model);
    }

    if view.is_empty() {
        println!("{}", "No data for the selected filters".dimmed());
        return Ok(());
    }

    println!();
    println!("{}", view.chart_title.bold());
    let max = view.series.iter().map(|p| p.count).max().unwrap_or(0).max(1);
    for point in &view.series {
        let width = (point.count * CHART_WIDTH).div_ceil(max) as usize;
        println!("  {} {} {}", point.date, "█".repeat(width).cyan(), point.count);
    }

    println!();
    println!("{}", view.table_title.bold());
    println!(
        "  {:<10}  {:<12}  {:<10}  {:<12}  {:<12}  {:<12}  {:<12}  {:>6}",
        "date", "model", "variant", "color", "feature", "accessory", "pack", "count"
    );
    for row in &view.rows {
        println!(
            "  {:<10}  {:<12}  {:<10}  {:<12}  {:<12}  {:<12}  {:<12}  {:>6}",
            row.event_date.to_string(),
            row.model_name,
            row.variant_name,
            row.color_name.as_deref().unwrap_or("-"),
            row.feature_name.as_deref().unwrap_or("-"),
            row.accessory_name.as_deref().unwrap_or("-"),
            row.pack_name.as_deref().unwrap_or("-"),
            row.event_count
        );
    }

    Ok(())
}

fn warn_unknown_model(dashboard: &Dashboard, selection: &ModelSelection) {
    if let ModelSelection::Model(name) = selection
        && !dashboard.rows().iter().any(|r| &r.model_name == name)
    {
        eprintln!("{} No rows for model '{}'", "!".yellow(), name);
    }
}

fn interactive(client: &mut AnalyticsClient<Warehouse>, json: bool) -> Result<()> {
    let mut dashboard = Dashboard::new(client.fetch()?);
    render(&dashboard.view(), json)?;
    println!("{}", "Type 'help' for commands".dimmed());

    let stdin = io::stdin();
    loop {
        print!("{} ", ">".blue());
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).context("Failed to read input")? == 0 {
            break;
        }

        match parse_session_line(&line) {
            Ok(SessionCommand::Filter(input)) => {
                if let FilterInput::Model(selection) = &input {
                    warn_unknown_model(&dashboard, selection);
                }
                dashboard.apply(input);
                render(&dashboard.view(), json)?;
            }
            Ok(SessionCommand::Show) => render(&dashboard.view(), json)?,
            Ok(SessionCommand::Refresh) => {
                client.invalidate();
                dashboard.replace_rows(client.fetch()?);
                println!("{} Refreshed: {} row(s)", "✓".green(), dashboard.rows().len());
            }
            Ok(SessionCommand::Help) => println!("{}", SESSION_HELP),
            Ok(SessionCommand::Quit) => break,
            Err(msg) => eprintln!("{} {}", "✗".red(), msg),
        }
    }

    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let json = cli.json;

    match cli.command {
        Command::Init => {
            Warehouse::init(&config.warehouse, config.project_id()).context("Failed to initialize warehouse")?;
            println!(
                "{} Initialized warehouse in {}",
                "✓".green(),
                config.warehouse.display()
            );
        }

        Command::Import { file } => {
            let mut warehouse = Warehouse::open(&config.warehouse)?;
            let stats = warehouse.import_jsonl(&file).context("Failed to import events")?;

            println!("{} Imported {} event(s)", "✓".green(), stats.imported);
            if stats.skipped > 0 {
                println!("  {} {} line(s) skipped, see log", "!".yellow(), stats.skipped);
            }
        }

        Command::Seed { days, events } => {
            let mut warehouse = Warehouse::open(&config.warehouse)?;
            let today = chrono::Utc::now().date_naive();
            let generated = sample::generate(&mut rand::rng(), today, days, events)?;
            let ids = warehouse
                .insert_events(&generated)
                .context("Failed to store demo events")?;

            println!(
                "{} Seeded {} event(s) over {} day(s)",
                "✓".green(),
                ids.len(),
                days
            );
        }

        Command::Query => {
            let query = AggregationQuery::today(config.project_id());
            println!("{} partitions through {}", "--".dimmed(), query.through_suffix());
            println!("{}", query.sql());
        }

        Command::Show { start, end, model } => {
            let mut client = open_client(&config)?;
            let mut dashboard = Dashboard::new(client.fetch()?);

            if let Some(date) = start {
                dashboard.apply(FilterInput::StartDate(date));
            }
            if let Some(date) = end {
                dashboard.apply(FilterInput::EndDate(date));
            }
            if let Some(model) = model {
                let selection = ModelSelection::from_input(&model);
                warn_unknown_model(&dashboard, &selection);
                dashboard.apply(FilterInput::Model(selection));
            }

            render(&dashboard.view(), json)?;
        }

        Command::Models => {
            let mut client = open_client(&config)?;
            let rows = client.fetch()?;
            let options = eventboard::model_options(&rows);

            if json {
                println!("{}", serde_json::to_string_pretty(&options)?);
            } else {
                for option in options {
                    println!("{}", option);
                }
            }
        }

        Command::Interactive => {
            let mut client = open_client(&config)?;
            interactive(&mut client, json)?;
        }
    }

    Ok(())
}

fn main() -> Result<()> {
    setup_logging().context("Failed to setup logging")?;

    let cli = Cli::parse();
    info!("Command: {:?}", std::env::args().collect::<Vec<_>>());

    if let Err(e) = run(cli) {
        match e.downcast_ref::<QueryError>() {
            Some(QueryError::Authentication(_)) => {
                eprintln!("{} {}", "Error:".red().bold(), e);
                eprintln!("  Set {} or pass --project", eventboard::config::PROJECT_ID_ENV);
            }
            _ => eprintln!("{} {:#}", "Error:".red().bold(), e),
        }
        std::process::exit(1);
    }

    Ok(())
}
