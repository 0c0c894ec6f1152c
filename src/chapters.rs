use std::path::Path;

use anyhow::Context as _;

use crate::cli::ChapterCommand;
use crate::config::Config;
use crate::formats::{Chapter, ImportFormat};
use crate::import;
use crate::store::Project;

/// Content to load into a chapter's include file.
#[derive(Debug, Clone)]
pub struct ImportRequest<'a> {
    pub source: &'a Path,
    pub format: ImportFormat,
}

/// Fields to change on an existing chapter; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct ChapterEdit<'a> {
    pub title: Option<String>,
    /// `Some("")` clears the link.
    pub discussion: Option<String>,
    pub import: Option<ImportRequest<'a>>,
    pub exclude_from_epub: Option<bool>,
    pub exclude_from_pdf: Option<bool>,
    pub draft: Option<bool>,
}

pub fn list(project: &Project) -> Vec<&Chapter> {
    let mut chapters = project.chapters.iter().collect::<Vec<_>>();
    chapters.sort_by_key(|c| c.number);
    chapters
}

pub fn add(
    project: &mut Project,
    number: i64,
    title: &str,
    discussion: Option<&str>,
    import: Option<ImportRequest<'_>>,
) -> anyhow::Result<()> {
    if project.chapters.iter().any(|c| c.number == number) {
        anyhow::bail!("chapter {number} already exists");
    }

    let mut chapter = Chapter::new(number, title);
    chapter.discussion = discussion
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(str::to_owned);

    match &import {
        Some(request) => {
            chapter.import_format = request.format;
            let content = import::import_content(request.source, request.format)
                .with_context(|| format!("import chapter {number}"))?;
            write_content(project, &chapter, &content)?;
        }
        None => {
            let path = project.paths.chapter_content(&chapter);
            if path.exists() {
                tracing::warn!(path = %path.display(), "keeping existing chapter content");
            } else {
                write_content(project, &chapter, "")?;
            }
        }
    }

    project.chapters.push(chapter);
    project.chapters.sort_by_key(|c| c.number);
    project.save_chapters()?;
    tracing::info!(project = %project.slug, chapter = number, "chapter added");
    Ok(())
}

pub fn edit(project: &mut Project, number: i64, changes: ChapterEdit<'_>) -> anyhow::Result<()> {
    let index = project
        .chapters
        .iter()
        .position(|c| c.number == number)
        .with_context(|| format!("chapter {number} not found"))?;

    let imported = match &changes.import {
        Some(request) => Some((
            request.format,
            import::import_content(request.source, request.format)
                .with_context(|| format!("import chapter {number}"))?,
        )),
        None => None,
    };

    let chapter = &mut project.chapters[index];
    if let Some(title) = changes.title {
        chapter.title = title;
    }
    if let Some(discussion) = changes.discussion {
        let discussion = discussion.trim();
        chapter.discussion = (!discussion.is_empty()).then(|| discussion.to_owned());
    }
    if let Some(value) = changes.exclude_from_epub {
        chapter.exclude_from_epub = value;
    }
    if let Some(value) = changes.exclude_from_pdf {
        chapter.exclude_from_pdf = value;
    }
    if let Some(value) = changes.draft {
        chapter.draft = value;
    }

    if let Some((format, content)) = imported {
        chapter.import_format = format;
        chapter.import_source = format!("includes/chapter_{number}.html");
        let chapter = chapter.clone();
        write_content(project, &chapter, &content)?;
    }

    project.save_chapters()?;
    tracing::info!(project = %project.slug, chapter = number, "chapter updated");
    Ok(())
}

pub fn delete(project: &mut Project, number: i64, delete_file: bool) -> anyhow::Result<()> {
    let index = project
        .chapters
        .iter()
        .position(|c| c.number == number)
        .with_context(|| format!("chapter {number} not found"))?;
    let chapter = project.chapters.remove(index);
    project.save_chapters()?;

    if delete_file {
        let path = project.paths.chapter_content(&chapter);
        if let Err(err) = std::fs::remove_file(&path) {
            tracing::warn!(path = %path.display(), error = %err, "failed to delete chapter file");
        }
    }
    tracing::info!(project = %project.slug, chapter = number, "chapter deleted");
    Ok(())
}

pub fn run(config: &Config, command: ChapterCommand) -> anyhow::Result<()> {
    match command {
        ChapterCommand::List(args) => {
            let project = Project::open(config, &args.project)?;
            for chapter in list(&project) {
                let mut flags = Vec::new();
                if chapter.draft {
                    flags.push("draft");
                }
                if chapter.exclude_from_epub {
                    flags.push("no-epub");
                }
                if chapter.exclude_from_pdf {
                    flags.push("no-pdf");
                }
                if flags.is_empty() {
                    println!("{}\t{}", chapter.number, chapter.title);
                } else {
                    println!("{}\t{}\t[{}]", chapter.number, chapter.title, flags.join(", "));
                }
            }
        }
        ChapterCommand::Add(args) => {
            let mut project = Project::open(config, &args.project.project)?;
            let source = args.source.as_deref().map(Path::new);
            let import = source.map(|source| ImportRequest {
                source,
                format: args.format,
            });
            add(
                &mut project,
                args.number,
                &args.title,
                args.discussion.as_deref(),
                import,
            )?;
        }
        ChapterCommand::Edit(args) => {
            let mut project = Project::open(config, &args.project.project)?;
            let source = args.source.as_deref().map(Path::new);
            let changes = ChapterEdit {
                title: args.title,
                discussion: args.discussion,
                import: source.map(|source| ImportRequest {
                    source,
                    format: args.format,
                }),
                exclude_from_epub: args.exclude_from_epub,
                exclude_from_pdf: args.exclude_from_pdf,
                draft: args.draft,
            };
            edit(&mut project, args.number, changes)?;
        }
        ChapterCommand::Delete(args) => {
            let mut project = Project::open(config, &args.project.project)?;
            delete(&mut project, args.number, args.delete_file)?;
        }
    }
    Ok(())
}

fn write_content(project: &Project, chapter: &Chapter, content: &str) -> anyhow::Result<()> {
    let path = project.paths.chapter_content(chapter);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create dir: {}", parent.display()))?;
    }
    std::fs::write(&path, content)
        .with_context(|| format!("write chapter content: {}", path.display()))
}
