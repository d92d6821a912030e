//! mail-merge - render a template once per data record
//!
//! Usage: `mail-merge <TEMPLATE> <DATA> <OUTPUT>`

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use mail_merge::{MailMergeError, MergeJob, MergeOptions, MergeReport};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Exit code for invocation errors, matching clap's own usage errors
const EXIT_USAGE: u8 = 2;
const EXIT_FAILURE: u8 = 1;

#[derive(Parser, Debug)]
#[command(
    name = "mail-merge",
    version,
    about = "Merge tabular data into a DOCX or RTF template",
    long_about = "Renders the template once per data record, replacing ${field} placeholders \
                  with the record's values, and writes all renderings into one document.\n\n\
                  Templates: .docx .docm .dotx .dotm .rtf\n\
                  Data: .xlsx .xlsm .xls .xlsb .ods .csv .tsv .txt"
)]
struct Cli {
    /// Template document containing ${field} placeholders
    #[arg(value_name = "TEMPLATE")]
    template: PathBuf,

    /// Spreadsheet or delimited text file; the first row holds the field names
    #[arg(value_name = "DATA")]
    data: PathBuf,

    /// Output document, written in the template's format
    #[arg(value_name = "OUTPUT")]
    output: PathBuf,
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(report) => {
            tracing::info!("{}", report.summary);
            ExitCode::SUCCESS
        }
        Err(err) => {
            tracing::error!("{:#}", err);
            ExitCode::from(exit_code(&err))
        }
    }
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(tracing_subscriber::EnvFilter::new("info"))
        .init();
}

fn run(cli: &Cli) -> anyhow::Result<MergeReport> {
    let job = MergeJob::new(&cli.template, &cli.data, &cli.output)?;
    job.run(&MergeOptions::default())
        .with_context(|| format!("Merge into {} failed", cli.output.display()))
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<MailMergeError>() {
        Some(e) if e.is_usage() => EXIT_USAGE,
        _ => EXIT_FAILURE,
    }
}
