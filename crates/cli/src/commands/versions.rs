//! Supported versions and profiles

use anyhow::Result;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};
use tuner_lib::{PgVersion, Profile};

use crate::output::OutputFormat;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Supported {
    pg_versions: Vec<PgVersion>,
    profiles: Vec<Profile>,
}

#[derive(Tabled)]
struct SupportedRow {
    #[tabled(rename = "Setting")]
    setting: &'static str,
    #[tabled(rename = "Accepted values")]
    values: String,
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Print the accepted PostgreSQL versions and workload profiles
pub fn show_versions(format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => {
            let supported = Supported {
                pg_versions: PgVersion::ALL.to_vec(),
                profiles: Profile::ALL.to_vec(),
            };
            println!("{}", serde_json::to_string_pretty(&supported)?);
        }
        OutputFormat::Table => {
            let rows = vec![
                SupportedRow {
                    setting: "--pg-version",
                    values: join(&PgVersion::ALL),
                },
                SupportedRow {
                    setting: "--profile",
                    values: join(&Profile::ALL),
                },
            ];
            println!("{}", Table::new(rows).with(Style::rounded()));
        }
    }

    Ok(())
}
