//! Document editor command line
//!
//! Applies a JSON edit job to a PDF, lists its form widgets, or prints its
//! page geometry and metadata. Logs go to stderr; results go to stdout.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use docedit_core::{
    extract_document, CompileReport, DocumentHandle, DocumentMetadata, EditJob, EditorConfig,
    FormCatalog, MutationCompiler, PageGeometry,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "docedit")]
#[command(version, about = "Apply edits to PDF documents")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply a JSON edit job and write the result
    Apply {
        input: PathBuf,

        /// Edit job (JSON)
        #[arg(short, long)]
        job: PathBuf,

        /// Output path (default: tool prefix + input name, next to the input)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Layout configuration (TOML)
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[arg(short, long)]
        password: Option<String>,
    },
    /// List form widgets in screen coordinates
    Fields {
        input: PathBuf,

        /// Pixel width each page is laid out at
        #[arg(short, long, default_value = "800")]
        width: f64,

        #[arg(short, long)]
        password: Option<String>,
    },
    /// Print page geometry and document metadata
    Info {
        input: PathBuf,

        #[arg(short, long)]
        password: Option<String>,
    },
}

#[derive(Debug, Serialize)]
struct DocumentInfo {
    page_count: u32,
    pages: Vec<PageGeometry>,
    metadata: DocumentMetadata,
}

#[derive(Debug)]
struct ApplyOutcome {
    output: PathBuf,
    report: CompileReport,
}

fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match args.command {
        Command::Apply {
            input,
            job,
            output,
            config,
            password,
        } => {
            let config = match config {
                Some(path) => EditorConfig::from_file(&path)
                    .with_context(|| format!("Failed to read config {}", path.display()))?,
                None => EditorConfig::default(),
            };
            let job = read_job(&job)?;
            let outcome = apply(&input, &job, output, &config, password.as_deref(), Utc::now())?;
            for error in &outcome.report.field_errors {
                tracing::warn!("{}", error);
            }
            println!("{}", outcome.output.display());
        }
        Command::Fields {
            input,
            width,
            password,
        } => {
            let handle = load(&input, password.as_deref())?;
            let catalog = FormCatalog::read(handle.document());
            let widgets = extract_document(&handle, &catalog, width);
            println!("{}", serde_json::to_string_pretty(&widgets)?);
        }
        Command::Info { input, password } => {
            let info = info(&load(&input, password.as_deref())?);
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
    }

    Ok(())
}

fn load(path: &Path, password: Option<&str>) -> Result<DocumentHandle> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    DocumentHandle::load(&bytes, password).with_context(|| format!("Failed to open {}", path.display()))
}

fn read_job(path: &Path) -> Result<EditJob> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read job {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("Invalid edit job {}", path.display()))
}

fn info(handle: &DocumentHandle) -> DocumentInfo {
    DocumentInfo {
        page_count: handle.page_count(),
        pages: handle.pages().copied().collect(),
        metadata: handle.metadata(),
    }
}

/// `D:YYYYMMDDHHmmSSZ`
fn pdf_date(now: DateTime<Utc>) -> String {
    now.format("D:%Y%m%d%H%M%SZ").to_string()
}

fn default_output(input: &Path, job: &EditJob) -> PathBuf {
    let name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "document.pdf".to_string());
    input.with_file_name(format!("{}{}", job.name_prefix(), name))
}

fn apply(
    input: &Path,
    job: &EditJob,
    output: Option<PathBuf>,
    config: &EditorConfig,
    password: Option<&str>,
    now: DateTime<Utc>,
) -> Result<ApplyOutcome> {
    if job.is_empty() {
        bail!("Edit job contains no edits");
    }
    let handle = load(input, password)?;
    let catalog = FormCatalog::read(handle.document());

    let mut job = job.clone();
    if let Some(metadata) = job.metadata.as_mut() {
        if metadata.modification_date.is_none() {
            metadata.modification_date = Some(pdf_date(now));
        }
    }

    let (bytes, report) = MutationCompiler::new(config)
        .compile(&handle, &catalog, &job)
        .context("Failed to apply edits")?;

    let output = output.unwrap_or_else(|| default_output(input, &job));
    std::fs::write(&output, bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    tracing::info!(
        "Wrote {} ({} pages touched)",
        output.display(),
        report.pages_touched.len()
    );

    Ok(ApplyOutcome { output, report })
}
