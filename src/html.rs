//! Static site output: one page per chapter plus a table of contents.
//!
//! Layout under the project root:
//!
//! ```text
//! public/index.html
//! public/chapter/<number>.html
//! public/styles.css
//! public/<cover image>
//! ```

use std::path::{Path, PathBuf};

use anyhow::Context as _;

use crate::formats::{Chapter, Links, Preferences, Socials, reading_order};
use crate::layout::{self, FeatureMap, LayoutFormat};
use crate::markup::{escape, markdown_to_html_fragment};
use crate::social;
use crate::store::{self, ProjectPaths};

pub const DEFAULT_CSS: &str = r#"body {
    font-family: Georgia, serif;
    line-height: 1.6;
    max-width: 60ch;
    margin: 2em auto;
    padding: 0 1em;
    background: #fff;
    color: #222;
}
h1, h2, h3 { text-align: center; margin-top: 2em; }
img.cover {
    display: block;
    max-width: 100%;
    height: auto;
    margin: 2em auto;
}
nav, footer {
    text-align: center;
    margin: 2em 0;
    font-size: 0.9em;
}
.chapter-nav .disabled { color: #aaa; }
.download-links, .share-links, .follow-links { text-align: center; margin-bottom: 1em; }
.download-links a, .share-links a, .follow-links a { margin: 0 0.5em; }
a { color: #0077cc; text-decoration: none; }
a:hover { text-decoration: underline; }
@media print {
    nav, footer { display: none; }
}
"#;

const ATTRIBUTION: &str = r#"Powered by <a href="https://www.github.com/ironmangary/publine" target="_blank">Publine</a>"#;

#[derive(Debug, Default)]
pub struct HtmlReport {
    pub written: Vec<PathBuf>,
    /// Chapters left out because their content file is missing.
    pub skipped_chapters: Vec<i64>,
}

pub fn build(
    project_root: &Path,
    prefs: &Preferences,
    chapters: &[Chapter],
    socials: &Socials,
) -> anyhow::Result<HtmlReport> {
    let paths = ProjectPaths::new(project_root);
    let features = layout::resolve(LayoutFormat::Html, prefs);
    let mut report = HtmlReport::default();

    let public_dir = paths.public_dir();
    let chapter_dir = paths.public_chapter_dir();
    std::fs::create_dir_all(&chapter_dir)
        .with_context(|| format!("create html output dir: {}", chapter_dir.display()))?;

    report.written.push(copy_stylesheet(&paths)?);
    if let Some(cover) = copy_cover_image(&paths, prefs)? {
        report.written.push(cover);
    }

    let links = match store::load_links(&paths.links_json()) {
        Ok(links) => links,
        Err(err) => {
            tracing::warn!(error = %format!("{err:#}"), "unreadable links.json; omitting social links");
            Links::default()
        }
    };

    let ordered = reading_order(chapters);
    let page = PageContext {
        paths: &paths,
        prefs,
        features: &features,
        links: &links,
        socials,
        ordered: &ordered,
    };

    for chapter in &ordered {
        let Some(body) = store::read_chapter_body(&paths, chapter)? else {
            report.skipped_chapters.push(chapter.number);
            continue;
        };
        let html = page.render_chapter_page(chapter, &body);
        let out_path = chapter_dir.join(format!("{}.html", chapter.number));
        std::fs::write(&out_path, html)
            .with_context(|| format!("write chapter page: {}", out_path.display()))?;
        tracing::info!(chapter = chapter.number, path = %out_path.display(), "chapter page written");
        report.written.push(out_path);
    }

    let index = page.render_index_page()?;
    let index_path = public_dir.join("index.html");
    std::fs::write(&index_path, index)
        .with_context(|| format!("write index page: {}", index_path.display()))?;
    tracing::info!(path = %index_path.display(), "table of contents written");
    report.written.push(index_path);

    Ok(report)
}

/// Copies `includes/styles.css` into `public/`, creating it from the
/// built-in stylesheet first when the project has none.
fn copy_stylesheet(paths: &ProjectPaths) -> anyhow::Result<PathBuf> {
    let src = paths.stylesheet();
    if !src.is_file() {
        tracing::warn!(path = %src.display(), "styles.css not found; writing default stylesheet");
        std::fs::create_dir_all(paths.includes_dir())
            .with_context(|| format!("create includes dir: {}", paths.includes_dir().display()))?;
        std::fs::write(&src, DEFAULT_CSS)
            .with_context(|| format!("write default stylesheet: {}", src.display()))?;
    }
    let dst = paths.public_dir().join("styles.css");
    std::fs::copy(&src, &dst)
        .with_context(|| format!("copy stylesheet: {} -> {}", src.display(), dst.display()))?;
    Ok(dst)
}

fn copy_cover_image(paths: &ProjectPaths, prefs: &Preferences) -> anyhow::Result<Option<PathBuf>> {
    let Some(file_name) = cover_file_name(prefs) else {
        return Ok(None);
    };
    let src = paths.includes_dir().join(file_name);
    if !src.is_file() {
        tracing::warn!(path = %src.display(), "cover image not found");
        return Ok(None);
    }
    let dst = paths.public_dir().join(file_name);
    std::fs::copy(&src, &dst)
        .with_context(|| format!("copy cover image: {} -> {}", src.display(), dst.display()))?;
    Ok(Some(dst))
}

/// Bare file name of the configured cover image, if any.
pub(crate) fn cover_file_name(prefs: &Preferences) -> Option<&str> {
    let raw = prefs.cover_image.trim();
    if raw.is_empty() {
        return None;
    }
    Path::new(raw).file_name().and_then(|n| n.to_str())
}

struct PageContext<'a> {
    paths: &'a ProjectPaths,
    prefs: &'a Preferences,
    features: &'a FeatureMap,
    links: &'a Links,
    socials: &'a Socials,
    ordered: &'a [&'a Chapter],
}

impl PageContext<'_> {
    fn use_titles(&self) -> bool {
        self.features.flag("use_chapter_titles")
    }

    fn render_chapter_page(&self, chapter: &Chapter, body: &str) -> String {
        let heading = chapter.heading(self.use_titles());
        let header = self.render_header(Some(chapter), "../");
        let footer = self.render_footer(Some(chapter), "../");
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <title>{title}</title>
  <link rel="stylesheet" href="../styles.css" />
</head>
<body>
{header}
<br>
{body}
<br>
{footer}
</body>
</html>
"#,
            title = escape(&heading),
        )
    }

    fn render_index_page(&self) -> anyhow::Result<String> {
        let mut toc = String::new();
        for chapter in self.ordered {
            toc.push_str(&format!(
                "  <li><a href=\"chapter/{}.html\">{}</a></li>\n",
                chapter.number,
                escape(&chapter.heading(self.use_titles()))
            ));
        }

        let blurb = self.render_blurb()?;
        let header = self.render_header(None, "");
        let footer = self.render_footer(None, "");
        Ok(format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8" />
  <title>{title} - Table of Contents</title>
  <link rel="stylesheet" href="styles.css" />
</head>
<body>
{header}
<br>
<main>
{blurb}<h3 class="toc-heading">Table of Contents</h3>
<ul class="toc">
{toc}</ul>
</main>
<br>
{footer}
</body>
</html>
"#,
            title = escape(&self.prefs.story_title),
        ))
    }

    fn render_blurb(&self) -> anyhow::Result<String> {
        if !self.features.flag("html_include_blurb") {
            return Ok(String::new());
        }
        let path = self.paths.blurb();
        let md = match std::fs::read_to_string(&path) {
            Ok(md) => md,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                tracing::warn!(path = %path.display(), "html_include_blurb is enabled but blurb file not found");
                return Ok(String::new());
            }
            Err(err) => {
                return Err(err).with_context(|| format!("read blurb: {}", path.display()));
            }
        };
        Ok(format!(
            "<div class=\"index-blurb\">{}</div><br>\n",
            markdown_to_html_fragment(&md)
        ))
    }

    fn render_header(&self, chapter: Option<&Chapter>, to_root: &str) -> String {
        let mut html = vec![r#"<header class="chapter-header">"#.to_owned()];

        if self.features.flag("cover_image")
            && let Some(cover) = cover_file_name(self.prefs)
        {
            html.push(format!(
                r#"<img src="{to_root}{}" alt="Cover" class="cover" />"#,
                escape(cover)
            ));
        }

        html.push(format!("<h1>{}</h1>", escape(&self.prefs.story_title)));
        html.push(format!("<h3>{}</h3>", escape(&self.prefs.story_author)));

        if let Some(chapter) = chapter {
            if self.use_titles() {
                html.push(format!("<h2>{}</h2>", escape(&chapter.heading(true))));
            }
            if self.features.flag("chapter_nav_top") {
                html.push(self.render_nav(chapter, to_root));
            }

            let downloads = self.render_download_links(chapter, to_root);
            if !downloads.is_empty() {
                html.push(format!(
                    r#"<div class="download-links">{}</div>"#,
                    downloads.join(" | ")
                ));
            }
        }

        html.push("</header>".to_owned());
        html.join("\n")
    }

    /// Links to per-chapter downloads that already exist under `download/`.
    fn render_download_links(&self, chapter: &Chapter, to_root: &str) -> Vec<String> {
        let slug = self.prefs.title_slug();
        let mut links = Vec::new();
        for (toggle, ext, label) in [("epub_link", "epub", "EPUB"), ("pdf_link", "pdf", "PDF")] {
            if !self.features.flag(toggle) {
                continue;
            }
            let name = format!("{slug}_chapter_{}.{ext}", chapter.number);
            if self.paths.legacy_download_dir().join(&name).is_file() {
                links.push(format!(
                    r#"<a href="{to_root}download/{}">{label}</a>"#,
                    escape(&name)
                ));
            }
        }
        links
    }

    /// Previous / TOC / next links. Neighbours come from the position in the
    /// number-sorted list, never from `number ± 1`.
    fn render_nav(&self, current: &Chapter, to_root: &str) -> String {
        let use_titles = self.use_titles();
        let index = self.ordered.iter().position(|c| c.number == current.number);
        let prev = index
            .and_then(|i| i.checked_sub(1))
            .and_then(|i| self.ordered.get(i));
        let next = index.and_then(|i| self.ordered.get(i + 1));

        let mut parts = Vec::with_capacity(3);
        match prev {
            Some(prev) => parts.push(format!(
                r#"<a href="{}.html" rel="prev">&larr; Previous ({})</a>"#,
                prev.number,
                escape(&prev.heading(use_titles))
            )),
            None => parts.push(r#"<span class="disabled">&larr; Previous</span>"#.to_owned()),
        }
        parts.push(format!(
            r#"<a href="{to_root}index.html">Table of Contents</a>"#
        ));
        match next {
            Some(next) => parts.push(format!(
                r#"<a href="{}.html" rel="next">Next ({}) &rarr;</a>"#,
                next.number,
                escape(&next.heading(use_titles))
            )),
            None => parts.push(r#"<span class="disabled">Next &rarr;</span>"#.to_owned()),
        }

        format!(
            "<nav class=\"chapter-nav\">\n  {}\n</nav>",
            parts.join(" | ")
        )
    }

    fn render_footer(&self, chapter: Option<&Chapter>, to_root: &str) -> String {
        let mut html = vec![r#"<footer class="footer">"#.to_owned()];

        if let Some(chapter) = chapter {
            if self.features.flag("chapter_nav_bottom") {
                html.push(self.render_nav(chapter, to_root));
            }

            if self.features.flag("share_links") {
                let page_url = self.page_url(chapter);
                let title = format!(
                    "{} - {}",
                    self.prefs.story_title,
                    chapter.heading(self.use_titles())
                );
                let shares = social::share_links(self.links, self.socials, &title, &page_url);
                if !shares.is_empty() {
                    html.push(r#"<div class="share-links"><p>Share this chapter:</p>"#.to_owned());
                    for link in shares {
                        html.push(format!(
                            r#"<a href="{}" target="_blank">{}</a>"#,
                            escape(&link.href),
                            escape(&link.label)
                        ));
                    }
                    html.push("</div>".to_owned());
                }
            }

            if self.features.flag("discuss_link")
                && let Some(discussion) = chapter.discussion.as_deref()
            {
                html.push(format!(
                    r#"<div class="discussion-link"><a href="{}" target="_blank">Discuss this Chapter</a></div>"#,
                    escape(discussion)
                ));
            }
        }

        if self.features.flag("social_links") {
            let follows = social::follow_links(self.links, self.socials);
            if !follows.is_empty() {
                html.push(r#"<div class="follow-links"><p>Follow me:</p>"#.to_owned());
                for link in follows {
                    html.push(format!(
                        r#"<a href="{}" target="_blank">{}</a>"#,
                        escape(&link.href),
                        escape(&link.label)
                    ));
                }
                html.push("</div>".to_owned());
            }
        }

        if self.features.flag("copyright") {
            html.push(format!(
                "<p>&copy; {} {}</p>",
                escape(&self.prefs.copyright),
                escape(&self.prefs.story_author)
            ));
        }

        if self.features.flag("license")
            && let Some(license) = &self.prefs.license
        {
            let title_attr = if license.long_name.is_empty() {
                String::new()
            } else {
                format!(r#" title="{}""#, escape(&license.long_name))
            };
            html.push(format!(
                r#"<p class="license">Licensed under <a href="{}" target="_blank"{title_attr}>{}</a></p>"#,
                escape(license.href()),
                escape(license.display_name())
            ));
        }

        html.push(format!("<p class=\"attribution\">{ATTRIBUTION}</p>"));
        html.push("</footer>".to_owned());
        html.join("\n")
    }

    fn page_url(&self, chapter: &Chapter) -> String {
        let rel = format!("chapter/{}.html", chapter.number);
        match self.prefs.site_url.as_deref().map(str::trim) {
            Some(base) if !base.is_empty() => format!("{}/{rel}", base.trim_end_matches('/')),
            _ => rel,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::{FeatureValue, License};

    fn context_parts() -> (ProjectPaths, Preferences, FeatureMap, Links, Socials) {
        let prefs = Preferences {
            story_title: "Night & Day".into(),
            story_author: "A. Writer".into(),
            copyright: "2024".into(),
            license: Some(License::from_short_name("CC-BY-NC-SA-4.0").complete_from(&[])),
            ..Preferences::default()
        };
        let features = layout::resolve(LayoutFormat::Html, &prefs);
        (
            ProjectPaths::new("/nonexistent"),
            prefs,
            features,
            Links::default(),
            Socials::new(),
        )
    }

    #[test]
    fn nav_uses_sorted_neighbours_not_arithmetic() {
        let (paths, prefs, features, links, socials) = context_parts();
        let chapters = vec![Chapter::new(10, "Ten"), Chapter::new(2, "Two"), Chapter::new(5, "Five")];
        let ordered = reading_order(&chapters);
        let page = PageContext {
            paths: &paths,
            prefs: &prefs,
            features: &features,
            links: &links,
            socials: &socials,
            ordered: &ordered,
        };

        let nav = page.render_nav(&chapters[2], "../");
        assert!(nav.contains(r#"<a href="2.html" rel="prev">"#));
        assert!(nav.contains(r#"<a href="10.html" rel="next">"#));

        let first = page.render_nav(&chapters[1], "../");
        assert!(first.contains(r#"<span class="disabled">&larr; Previous</span>"#));
        let last = page.render_nav(&chapters[0], "../");
        assert!(last.contains(r#"<span class="disabled">Next &rarr;</span>"#));
    }

    #[test]
    fn footer_renders_copyright_license_and_attribution() {
        let (paths, prefs, features, links, socials) = context_parts();
        let ordered = Vec::new();
        let page = PageContext {
            paths: &paths,
            prefs: &prefs,
            features: &features,
            links: &links,
            socials: &socials,
            ordered: &ordered,
        };
        let footer = page.render_footer(None, "");
        assert!(footer.contains("<p>&copy; 2024 A. Writer</p>"));
        assert!(footer.contains("https://creativecommons.org/licenses/by-nc-sa/4.0/"));
        assert!(footer.contains("Powered by"));
    }

    #[test]
    fn header_escapes_title_and_hides_disabled_cover() {
        let (paths, mut prefs, _, links, socials) = context_parts();
        prefs.cover_image = "cover.png".into();
        prefs
            .display_features
            .insert("cover_image".into(), FeatureValue::Flag(false));
        let features = layout::resolve(LayoutFormat::Html, &prefs);
        let ordered = Vec::new();
        let page = PageContext {
            paths: &paths,
            prefs: &prefs,
            features: &features,
            links: &links,
            socials: &socials,
            ordered: &ordered,
        };
        let header = page.render_header(None, "");
        assert!(header.contains("<h1>Night &amp; Day</h1>"));
        assert!(!header.contains("cover.png"));
    }

    #[test]
    fn page_url_joins_site_url() {
        let (paths, mut prefs, features, links, socials) = context_parts();
        prefs.site_url = Some("https://example.com/book/".into());
        let ordered = Vec::new();
        let page = PageContext {
            paths: &paths,
            prefs: &prefs,
            features: &features,
            links: &links,
            socials: &socials,
            ordered: &ordered,
        };
        assert_eq!(
            page.page_url(&Chapter::new(4, "D")),
            "https://example.com/book/chapter/4.html"
        );
    }
}
