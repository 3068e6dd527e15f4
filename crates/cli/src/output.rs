//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};
use tuner_lib::{Provenance, TuneResponse};

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

/// One `key = value` line of a configuration
#[derive(Debug, Clone, PartialEq, Eq, Tabled)]
pub struct ParameterRow {
    #[tabled(rename = "Parameter")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: String,
}

/// Print a success message
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

/// Print an error message
pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

/// Print a warning message
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

/// Print an info message
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Extract parameter assignments, skipping comments and other prose
pub fn parse_parameters(configuration: &str) -> Vec<ParameterRow> {
    configuration
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(name, value)| (name.trim(), value.trim()))
        .filter(|(name, _)| !name.is_empty() && !name.contains(char::is_whitespace))
        .map(|(name, value)| ParameterRow {
            name: name.to_string(),
            value: value.to_string(),
        })
        .collect()
}

/// Color a provenance label
pub fn color_provenance(provenance: Provenance) -> String {
    match provenance {
        Provenance::Oracle => provenance.as_str().green().to_string(),
        Provenance::Heuristic => provenance.as_str().yellow().to_string(),
    }
}

/// Print a tuning response; returns whether it was a success
pub fn print_tune_response(response: &TuneResponse, format: OutputFormat) -> anyhow::Result<bool> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(response)?);
        }
        OutputFormat::Table if response.success => {
            let configuration = response.configuration.as_deref().unwrap_or_default();
            let rows = parse_parameters(configuration);

            if rows.is_empty() {
                print!("{}", configuration);
            } else {
                println!("{}", Table::new(&rows).with(Style::rounded()));
            }

            if let Some(provenance) = response.provenance {
                print_info(&format!("Source: {}", color_provenance(provenance)));
                if provenance == Provenance::Heuristic {
                    print_warning("timescaledb-tune is not installed; values are estimates");
                }
            }
            if let Some(command) = &response.command {
                print_info(&format!("Command: {}", command));
            }
            print_success(&format!("{} parameters", rows.len()));
        }
        OutputFormat::Table => {
            let kind = response
                .kind
                .map(|k| k.to_string())
                .unwrap_or_else(|| "Error".to_string());
            let message = response.error.as_deref().unwrap_or("request failed");
            print_error(&format!("{}: {}", kind, message));
            for issue in &response.issues {
                eprintln!("  - {}", issue);
            }
        }
    }

    Ok(response.success)
}
