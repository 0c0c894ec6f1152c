use std::io;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::Context as _;

use crate::formats::{Chapter, Preferences, reading_order};
use crate::html::cover_file_name;
use crate::layout::{self, FeatureMap, LayoutFormat};
use crate::markup::escape;
use crate::store::{self, ProjectPaths};

/// External HTML-to-PDF engine (WeasyPrint's command-line interface).
#[derive(Debug, Clone)]
pub struct PdfEngine {
    pub bin: String,
}

impl PdfEngine {
    pub fn from_env() -> Self {
        let bin = std::env::var("PUBLINE_WEASYPRINT_BIN").unwrap_or_else(|_| "weasyprint".to_owned());
        Self { bin }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfOutcome {
    Written(PathBuf),
    /// `pdf_enabled` is off; nothing was touched.
    Disabled,
    /// The engine executable could not be found.
    EngineUnavailable,
}

pub fn build(
    project_root: &Path,
    prefs: &Preferences,
    chapters: &[Chapter],
    engine: &PdfEngine,
) -> anyhow::Result<PdfOutcome> {
    if !prefs.pdf_enabled {
        tracing::info!("pdf generation is disabled for this project");
        return Ok(PdfOutcome::Disabled);
    }

    let paths = ProjectPaths::new(project_root);
    let features = layout::resolve(LayoutFormat::Pdf, prefs);
    let document = render_document(&paths, prefs, chapters, &features)?;

    let out_dir = paths.downloads_dir();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create downloads dir: {}", out_dir.display()))?;
    let out_path = out_dir.join(format!("{}.pdf", prefs.title_slug()));

    let mut input = tempfile::Builder::new()
        .prefix("publine-")
        .suffix(".html")
        .tempfile()
        .context("create pdf input temp file")?;
    input
        .write_all(document.as_bytes())
        .context("write pdf input")?;
    input.flush().context("flush pdf input")?;

    let output = tempfile::Builder::new()
        .prefix(".publine-")
        .suffix(".pdf.tmp")
        .tempfile_in(&out_dir)
        .with_context(|| format!("create temporary pdf in: {}", out_dir.display()))?;

    tracing::info!(engine = %engine.bin, out = %out_path.display(), "render pdf");
    let result = Command::new(&engine.bin)
        .arg("--base-url")
        .arg(paths.root())
        .arg(input.path())
        .arg(output.path())
        .output();
    let result = match result {
        Ok(result) => result,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            tracing::error!(
                engine = %engine.bin,
                "pdf engine not found; install WeasyPrint or set PUBLINE_WEASYPRINT_BIN"
            );
            return Ok(PdfOutcome::EngineUnavailable);
        }
        Err(err) => return Err(err).with_context(|| format!("run pdf engine: {}", engine.bin)),
    };
    if !result.status.success() {
        anyhow::bail!(
            "pdf engine failed ({}): {}",
            result.status,
            String::from_utf8_lossy(&result.stderr)
        );
    }

    output
        .persist(&out_path)
        .map_err(|err| err.error)
        .with_context(|| format!("move pdf into place: {}", out_path.display()))?;
    tracing::info!(path = %out_path.display(), "pdf written");
    Ok(PdfOutcome::Written(out_path))
}

fn render_document(
    paths: &ProjectPaths,
    prefs: &Preferences,
    chapters: &[Chapter],
    features: &FeatureMap,
) -> anyhow::Result<String> {
    let mut body = String::new();

    if features.flag("include_cover_image")
        && let Some(file_name) = cover_file_name(prefs)
    {
        let path = paths.includes_dir().join(file_name);
        if path.is_file() {
            let uri = file_uri(&path)?;
            body.push_str(&format!(
                "<img src=\"{}\" alt=\"Cover Image\" class=\"cover\" />\n",
                escape(&uri)
            ));
        } else {
            tracing::warn!(path = %path.display(), "cover image not found");
        }
    }

    if features.flag("include_title") {
        body.push_str(&format!("<h1>{}</h1>\n", escape(&prefs.story_title)));
    }
    if features.flag("include_author") {
        body.push_str(&format!(
            "<h2 class=\"author\">{}</h2>\n",
            escape(&prefs.story_author)
        ));
    }

    for chapter in reading_order(chapters) {
        if chapter.exclude_from_pdf {
            tracing::debug!(chapter = chapter.number, "excluded from pdf");
            continue;
        }
        let Some(content) = store::read_chapter_body(paths, chapter)? else {
            continue;
        };
        body.push_str(&format!(
            "<section class=\"chapter\">\n<h2>{}</h2>\n<div>{}</div>\n</section>\n",
            escape(&chapter.display_title()),
            content
        ));
    }

    let mut colophon = Vec::new();
    if features.flag("include_copyright") && !prefs.copyright.trim().is_empty() {
        colophon.push(format!(
            "<p>&copy; {} {}</p>",
            escape(&prefs.copyright),
            escape(&prefs.story_author)
        ));
    }
    if features.flag("include_license_block")
        && let Some(license) = &prefs.license
    {
        let mut block = format!("<p>Licensed under {}", escape(license.display_name()));
        if !license.long_name.is_empty() && license.long_name != license.display_name() {
            block.push_str(&format!(" ({})", escape(&license.long_name)));
        }
        if !license.link.is_empty() {
            block.push_str(&format!(": {}", escape(&license.link)));
        }
        block.push_str("</p>");
        colophon.push(block);
    }
    if !colophon.is_empty() {
        body.push_str(&format!(
            "<section class=\"colophon\">\n{}\n</section>\n",
            colophon.join("\n")
        ));
    }

    Ok(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="UTF-8" />
<title>{title}</title>
<style>
{css}</style>
</head>
<body>
{body}</body>
</html>
"#,
        title = escape(&prefs.story_title),
        css = render_page_css(features),
    ))
}

fn render_page_css(features: &FeatureMap) -> String {
    let mut css = String::new();
    css.push_str("body { font-family: serif; }\n");
    css.push_str("h1, h2 { text-align: center; }\n");
    css.push_str("img.cover { width: 100%; height: auto; }\n");
    css.push_str("section.chapter { page-break-before: always; }\n");
    css.push_str(&format!("@page {{ size: {}; }}\n", page_size(features)));
    if features.flag("add_page_numbers") {
        css.push_str("@page { @bottom-center { content: \"Page \" counter(page); } }\n");
    }
    css
}

/// Page size from the layout, limited to characters valid in a CSS `size` value.
fn page_size(features: &FeatureMap) -> &str {
    let raw = features.text("page_size").unwrap_or("A4").trim();
    let valid = !raw.is_empty()
        && raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, ' ' | '-' | '.'));
    if valid {
        raw
    } else {
        tracing::warn!(page_size = raw, "invalid page_size; using A4");
        "A4"
    }
}

fn file_uri(path: &Path) -> anyhow::Result<String> {
    let abs = path
        .canonicalize()
        .with_context(|| format!("resolve path: {}", path.display()))?;
    let url = url::Url::from_file_path(&abs)
        .map_err(|()| anyhow::anyhow!("not a file path: {}", abs.display()))?;
    Ok(url.to_string())
}
