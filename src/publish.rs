use std::fmt;
use std::path::PathBuf;

use anyhow::Context as _;

use crate::cli::PublishArgs;
use crate::config::Config;
use crate::formats::Socials;
use crate::pdf::{PdfEngine, PdfOutcome};
use crate::store::{self, Project};
use crate::{epub, html, pdf};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum PublishTarget {
    Html,
    Epub,
    Pdf,
    #[default]
    All,
}

impl PublishTarget {
    fn includes(self, format: OutputFormat) -> bool {
        match self {
            PublishTarget::All => true,
            PublishTarget::Html => format == OutputFormat::Html,
            PublishTarget::Epub => format == OutputFormat::Epub,
            PublishTarget::Pdf => format == OutputFormat::Pdf,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Html,
    Epub,
    Pdf,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OutputFormat::Html => "html",
            OutputFormat::Epub => "epub",
            OutputFormat::Pdf => "pdf",
        })
    }
}

#[derive(Debug, Clone)]
pub struct FormatResult {
    pub format: OutputFormat,
    pub success: bool,
    pub message: String,
    pub output: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct PublishReport {
    pub results: Vec<FormatResult>,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.results.iter().all(|r| r.success)
    }

    pub fn get(&self, format: OutputFormat) -> Option<&FormatResult> {
        self.results.iter().find(|r| r.format == format)
    }
}

/// Runs each selected builder. A failing builder is recorded and the
/// remaining builders still run.
pub fn publish(
    project: &Project,
    target: PublishTarget,
    socials: &Socials,
    engine: &PdfEngine,
) -> PublishReport {
    let root = project.paths.root();
    let prefs = &project.prefs;
    let chapters = project.chapters.as_slice();
    let mut report = PublishReport::default();

    if target.includes(OutputFormat::Html) {
        let result = match html::build(root, prefs, chapters, socials) {
            Ok(built) => {
                let mut message = format!("{} files written", built.written.len());
                if !built.skipped_chapters.is_empty() {
                    message.push_str(&format!(
                        "; skipped chapters without content: {:?}",
                        built.skipped_chapters
                    ));
                }
                FormatResult {
                    format: OutputFormat::Html,
                    success: true,
                    message,
                    output: Some(project.paths.public_dir().join("index.html")),
                }
            }
            Err(err) => failure(OutputFormat::Html, &err),
        };
        report.results.push(result);
    }

    if target.includes(OutputFormat::Epub) {
        let result = match epub::build(root, prefs, chapters) {
            Ok(path) => FormatResult {
                format: OutputFormat::Epub,
                success: true,
                message: format!("written to {}", path.display()),
                output: Some(path),
            },
            Err(err) => failure(OutputFormat::Epub, &err),
        };
        report.results.push(result);
    }

    if target.includes(OutputFormat::Pdf) {
        let result = match pdf::build(root, prefs, chapters, engine) {
            Ok(PdfOutcome::Written(path)) => FormatResult {
                format: OutputFormat::Pdf,
                success: true,
                message: format!("written to {}", path.display()),
                output: Some(path),
            },
            Ok(PdfOutcome::Disabled) => FormatResult {
                format: OutputFormat::Pdf,
                success: true,
                message: "disabled in preferences".to_owned(),
                output: None,
            },
            Ok(PdfOutcome::EngineUnavailable) => FormatResult {
                format: OutputFormat::Pdf,
                success: false,
                message: format!("pdf engine not available: {}", engine.bin),
                output: None,
            },
            Err(err) => failure(OutputFormat::Pdf, &err),
        };
        report.results.push(result);
    }

    report
}

pub fn run(config: &Config, args: PublishArgs) -> anyhow::Result<()> {
    let project = Project::open(config, &args.project.project)?;
    let socials = store::load_socials(&config.socials_json()).context("load socials")?;
    let report = publish(&project, args.target, &socials, &config.pdf_engine);

    for result in &report.results {
        let status = if result.success { "ok" } else { "FAILED" };
        println!("{}: {status}: {}", result.format, result.message);
    }
    if !report.is_success() {
        anyhow::bail!("publishing {} failed", project.slug);
    }
    Ok(())
}

fn failure(format: OutputFormat, err: &anyhow::Error) -> FormatResult {
    tracing::error!(%format, error = %format!("{err:#}"), "build failed");
    FormatResult {
        format,
        success: false,
        message: format!("{err:#}"),
        output: None,
    }
}
