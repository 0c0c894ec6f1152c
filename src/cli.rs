use clap::{ArgAction, Args, Parser, Subcommand};

use crate::formats::ImportFormat;
use crate::layout::LayoutFormat;
use crate::publish::PublishTarget;

#[derive(Debug, Parser)]
#[command(author, version, about)]
pub struct Cli {
    /// Directory holding `projects/` and the shared `data/` files
    /// (default: `$PUBLINE_HOME` or the current directory).
    #[arg(long, global = true)]
    pub home: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create a new project.
    Init(InitArgs),
    Project {
        #[command(subcommand)]
        command: ProjectCommand,
    },
    Chapter {
        #[command(subcommand)]
        command: ChapterCommand,
    },
    Layout {
        #[command(subcommand)]
        command: LayoutCommand,
    },
    /// Build HTML, EPUB and/or PDF output.
    Publish(PublishArgs),
}

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Story title; the project directory name is derived from it.
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub author: String,

    /// Copyright year or notice.
    #[arg(long)]
    pub copyright: String,
}

#[derive(Debug, Subcommand)]
pub enum ProjectCommand {
    /// List projects under `projects/`.
    List,
    /// Print a project's stored details.
    Show(ProjectArg),
    /// Update a project's details.
    Set(ProjectSetArgs),
    /// Remove a project directory and everything in it.
    Delete(ProjectDeleteArgs),
}

#[derive(Debug, Args)]
pub struct ProjectSetArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[arg(long)]
    pub title: Option<String>,

    #[arg(long)]
    pub author: Option<String>,

    #[arg(long)]
    pub copyright: Option<String>,

    #[arg(long, action = ArgAction::Set)]
    pub pdf_enabled: Option<bool>,

    /// Image to copy into `includes/` and use as the cover.
    #[arg(long)]
    pub cover_image: Option<String>,

    /// Stylesheet to copy over `includes/styles.css`.
    #[arg(long)]
    pub stylesheet: Option<String>,

    /// License short name from `data/licenses.json`; empty string clears it.
    #[arg(long)]
    pub license: Option<String>,

    /// Public base URL of the HTML site; empty string clears it.
    #[arg(long)]
    pub site_url: Option<String>,
}

#[derive(Debug, Args)]
pub struct ProjectDeleteArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    /// Confirm removal.
    #[arg(long)]
    pub yes: bool,
}

#[derive(Debug, Args)]
pub struct ProjectArg {
    /// Project directory name under `projects/`.
    #[arg(long)]
    pub project: String,
}

#[derive(Debug, Subcommand)]
pub enum ChapterCommand {
    List(ProjectArg),
    Add(ChapterAddArgs),
    Edit(ChapterEditArgs),
    Delete(ChapterDeleteArgs),
}

#[derive(Debug, Args)]
pub struct ChapterAddArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[arg(long)]
    pub number: i64,

    #[arg(long)]
    pub title: String,

    /// Discussion link shown under the chapter.
    #[arg(long)]
    pub discussion: Option<String>,

    /// File to import as the chapter body.
    #[arg(long)]
    pub source: Option<String>,

    #[arg(long, value_enum, default_value_t = ImportFormat::Html)]
    pub format: ImportFormat,
}

#[derive(Debug, Args)]
pub struct ChapterEditArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[arg(long)]
    pub number: i64,

    #[arg(long)]
    pub title: Option<String>,

    /// Discussion link; pass an empty string to clear it.
    #[arg(long)]
    pub discussion: Option<String>,

    /// File to re-import as the chapter body.
    #[arg(long)]
    pub source: Option<String>,

    #[arg(long, value_enum, default_value_t = ImportFormat::Html)]
    pub format: ImportFormat,

    #[arg(long, action = ArgAction::Set)]
    pub exclude_from_epub: Option<bool>,

    #[arg(long, action = ArgAction::Set)]
    pub exclude_from_pdf: Option<bool>,

    #[arg(long, action = ArgAction::Set)]
    pub draft: Option<bool>,
}

#[derive(Debug, Args)]
pub struct ChapterDeleteArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[arg(long)]
    pub number: i64,

    /// Also remove the chapter's content file.
    #[arg(long)]
    pub delete_file: bool,
}

#[derive(Debug, Subcommand)]
pub enum LayoutCommand {
    /// Print the effective features for a format.
    Show(LayoutShowArgs),
    /// Store one or more feature values.
    Set(LayoutSetArgs),
}

#[derive(Debug, Args)]
pub struct LayoutShowArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[arg(long, value_enum)]
    pub format: LayoutFormat,
}

#[derive(Debug, Args)]
pub struct LayoutSetArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[arg(long, value_enum)]
    pub format: LayoutFormat,

    /// `KEY=VALUE`; may be repeated.
    #[arg(long = "feature", required = true)]
    pub features: Vec<String>,
}

#[derive(Debug, Args)]
pub struct PublishArgs {
    #[command(flatten)]
    pub project: ProjectArg,

    #[arg(long, value_enum, default_value_t = PublishTarget::All)]
    pub target: PublishTarget,
}
