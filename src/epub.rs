use std::io::Write as _;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use chrono::Utc;
use zip::write::SimpleFileOptions;

use crate::formats::{Chapter, Preferences, reading_order};
use crate::html::cover_file_name;
use crate::layout::{self, LayoutFormat};
use crate::markup::{escape, to_xhtml_fragment};
use crate::store::{self, ProjectPaths};

/// Packages the project as an EPUB 2.0 archive at
/// `public/downloads/<title_slug>.epub`.
///
/// The archive is assembled in a temporary file next to the destination and
/// renamed into place only once complete; on failure the temporary file is
/// removed and any previous archive is left as it was.
pub fn build(project_root: &Path, prefs: &Preferences, chapters: &[Chapter]) -> anyhow::Result<PathBuf> {
    let paths = ProjectPaths::new(project_root);
    let features = layout::resolve(LayoutFormat::Epub, prefs);

    let mut specs = Vec::new();
    for chapter in reading_order(chapters) {
        if chapter.exclude_from_epub {
            tracing::debug!(chapter = chapter.number, "excluded from epub");
            continue;
        }
        let Some(body) = store::read_chapter_body(&paths, chapter)? else {
            continue;
        };
        let index = specs.len() + 1;
        specs.push(ChapterSpec {
            id: format!("chap{index}"),
            file_name: format!("chapter{index}.html"),
            title: chapter.display_title(),
            body,
        });
    }
    if specs.is_empty() {
        anyhow::bail!("no chapters to package into the epub");
    }

    let cover = if features.flag("cover_image") {
        load_cover(&paths, prefs)?
    } else {
        None
    };

    let stylesheet = match std::fs::read_to_string(paths.stylesheet()) {
        Ok(css) => Some(css),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
        Err(err) => {
            return Err(err)
                .with_context(|| format!("read stylesheet: {}", paths.stylesheet().display()));
        }
    };

    let book = BookSpec {
        title: non_empty_or(&prefs.story_title, "Untitled"),
        author: non_empty_or(&prefs.story_author, "Anonymous"),
        uuid: uuid::Uuid::new_v4(),
        date: Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        rights: if features.flag("license_info") {
            render_rights(prefs)
        } else {
            None
        },
        generate_toc: features.flag("generate_toc"),
        has_stylesheet: stylesheet.is_some(),
    };

    let out_dir = paths.downloads_dir();
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create downloads dir: {}", out_dir.display()))?;
    let out_path = out_dir.join(format!("{}.epub", prefs.title_slug()));

    let mut tmp = tempfile::Builder::new()
        .prefix(".publine-")
        .suffix(".epub.tmp")
        .tempfile_in(&out_dir)
        .with_context(|| format!("create temporary epub in: {}", out_dir.display()))?;
    write_archive(tmp.as_file_mut(), &book, &specs, cover.as_ref(), stylesheet.as_deref())?;
    tmp.persist(&out_path)
        .map_err(|err| err.error)
        .with_context(|| format!("move epub into place: {}", out_path.display()))?;

    tracing::info!(path = %out_path.display(), chapters = specs.len(), "epub written");
    Ok(out_path)
}

#[derive(Debug)]
struct BookSpec {
    title: String,
    author: String,
    uuid: uuid::Uuid,
    date: String,
    rights: Option<String>,
    generate_toc: bool,
    has_stylesheet: bool,
}

#[derive(Debug)]
struct ChapterSpec {
    id: String,
    file_name: String,
    title: String,
    body: String,
}

#[derive(Debug)]
struct CoverSpec {
    file_name: String,
    media_type: &'static str,
    bytes: Vec<u8>,
}

fn write_archive(
    out: &mut std::fs::File,
    book: &BookSpec,
    chapters: &[ChapterSpec],
    cover: Option<&CoverSpec>,
    stylesheet: Option<&str>,
) -> anyhow::Result<()> {
    let mut zip = zip::ZipWriter::new(out);

    // `mimetype` must be the first entry and must be stored uncompressed.
    let mimetype_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Stored)
        .unix_permissions(0o644);
    zip.start_file("mimetype", mimetype_options)
        .context("epub start_file mimetype")?;
    zip.write_all(b"application/epub+zip")
        .context("epub write mimetype")?;

    let deflated_options = SimpleFileOptions::default()
        .compression_method(zip::CompressionMethod::Deflated)
        .unix_permissions(0o644);

    zip.start_file("META-INF/container.xml", deflated_options)
        .context("epub start_file container.xml")?;
    zip.write_all(render_container_xml().as_bytes())
        .context("epub write container.xml")?;

    for chapter in chapters {
        let xhtml = wrap_xhtml_document(&chapter.title, &chapter.body, book.has_stylesheet);
        zip.start_file(format!("OEBPS/{}", chapter.file_name), deflated_options)
            .with_context(|| format!("epub start_file chapter: {}", chapter.file_name))?;
        zip.write_all(xhtml.as_bytes())
            .with_context(|| format!("epub write chapter: {}", chapter.file_name))?;
    }

    if let Some(css) = stylesheet {
        zip.start_file("OEBPS/styles.css", deflated_options)
            .context("epub start_file styles.css")?;
        zip.write_all(css.as_bytes())
            .context("epub write styles.css")?;
    }

    if let Some(cover) = cover {
        zip.start_file(format!("OEBPS/images/{}", cover.file_name), deflated_options)
            .context("epub start_file cover")?;
        zip.write_all(&cover.bytes).context("epub write cover")?;
    }

    zip.start_file("OEBPS/content.opf", deflated_options)
        .context("epub start_file content.opf")?;
    zip.write_all(render_content_opf(book, chapters, cover).as_bytes())
        .context("epub write content.opf")?;

    if book.generate_toc {
        zip.start_file("OEBPS/toc.ncx", deflated_options)
            .context("epub start_file toc.ncx")?;
        zip.write_all(render_toc_ncx(book, chapters).as_bytes())
            .context("epub write toc.ncx")?;
    }

    zip.finish().context("epub finish zip")?;
    Ok(())
}

fn load_cover(paths: &ProjectPaths, prefs: &Preferences) -> anyhow::Result<Option<CoverSpec>> {
    let Some(file_name) = cover_file_name(prefs) else {
        return Ok(None);
    };
    let path = paths.includes_dir().join(file_name);
    let Some((ext, media_type)) = media_type_for_image(&path) else {
        tracing::warn!(path = %path.display(), "unsupported cover image type; skipping");
        return Ok(None);
    };
    match std::fs::read(&path) {
        Ok(bytes) => Ok(Some(CoverSpec {
            file_name: format!("cover.{ext}"),
            media_type,
            bytes,
        })),
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "cover image unreadable; skipping");
            Ok(None)
        }
    }
}

fn media_type_for_image(path: &Path) -> Option<(&'static str, &'static str)> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "png" => Some(("png", "image/png")),
        "jpg" | "jpeg" => Some(("jpeg", "image/jpeg")),
        "gif" => Some(("gif", "image/gif")),
        "svg" => Some(("svg", "image/svg+xml")),
        "webp" => Some(("webp", "image/webp")),
        _ => None,
    }
}

fn render_rights(prefs: &Preferences) -> Option<String> {
    let mut parts = Vec::new();
    if !prefs.copyright.trim().is_empty() {
        parts.push(
            format!("Copyright © {} {}", prefs.copyright.trim(), prefs.story_author.trim())
                .trim_end()
                .to_owned(),
        );
    }
    if let Some(license) = &prefs.license {
        let name = if license.long_name.is_empty() {
            license.display_name()
        } else {
            &license.long_name
        };
        parts.push(format!("Licensed under {name}"));
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(". "))
    }
}

fn non_empty_or(value: &str, fallback: &str) -> String {
    if value.trim().is_empty() {
        fallback.to_owned()
    } else {
        value.to_owned()
    }
}

fn render_container_xml() -> String {
    r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>
"#
    .to_string()
}

fn render_content_opf(book: &BookSpec, chapters: &[ChapterSpec], cover: Option<&CoverSpec>) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" unique-identifier=\"BookId\" version=\"2.0\">\n",
    );
    out.push_str(
        "  <metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\" xmlns:opf=\"http://www.idpf.org/2007/opf\">\n",
    );
    out.push_str(&format!("    <dc:title>{}</dc:title>\n", escape(&book.title)));
    out.push_str(&format!(
        "    <dc:creator opf:role=\"aut\">{}</dc:creator>\n",
        escape(&book.author)
    ));
    out.push_str("    <dc:language>en</dc:language>\n");
    out.push_str(&format!(
        "    <dc:identifier id=\"BookId\" opf:scheme=\"UUID\">urn:uuid:{}</dc:identifier>\n",
        book.uuid
    ));
    out.push_str(&format!("    <dc:date>{}</dc:date>\n", escape(&book.date)));
    if let Some(rights) = &book.rights {
        out.push_str(&format!("    <dc:rights>{}</dc:rights>\n", escape(rights)));
    }
    if cover.is_some() {
        out.push_str("    <meta name=\"cover\" content=\"cover-image\"/>\n");
    }
    out.push_str("  </metadata>\n");

    out.push_str("  <manifest>\n");
    for ch in chapters {
        out.push_str(&format!(
            "    <item id=\"{}\" href=\"{}\" media-type=\"application/xhtml+xml\"/>\n",
            escape(&ch.id),
            escape(&ch.file_name)
        ));
    }
    if let Some(cover) = cover {
        out.push_str(&format!(
            "    <item id=\"cover-image\" href=\"images/{}\" media-type=\"{}\"/>\n",
            escape(&cover.file_name),
            cover.media_type
        ));
    }
    if book.has_stylesheet {
        out.push_str("    <item id=\"css\" href=\"styles.css\" media-type=\"text/css\"/>\n");
    }
    if book.generate_toc {
        out.push_str(
            "    <item id=\"ncx\" href=\"toc.ncx\" media-type=\"application/x-dtbncx+xml\"/>\n",
        );
    }
    out.push_str("  </manifest>\n");

    if book.generate_toc {
        out.push_str("  <spine toc=\"ncx\">\n");
    } else {
        out.push_str("  <spine>\n");
    }
    for ch in chapters {
        out.push_str(&format!("    <itemref idref=\"{}\"/>\n", escape(&ch.id)));
    }
    out.push_str("  </spine>\n");
    out.push_str("</package>\n");
    out
}

fn render_toc_ncx(book: &BookSpec, chapters: &[ChapterSpec]) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n",
    );
    out.push_str("<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" version=\"2005-1\">\n");
    out.push_str("  <head>\n");
    out.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"urn:uuid:{}\"/>\n",
        book.uuid
    ));
    out.push_str("    <meta name=\"dtb:depth\" content=\"1\"/>\n");
    out.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\"/>\n");
    out.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\"/>\n");
    out.push_str("  </head>\n");
    out.push_str(&format!(
        "  <docTitle><text>{}</text></docTitle>\n",
        escape(&book.title)
    ));
    out.push_str("  <navMap>\n");
    for (idx, ch) in chapters.iter().enumerate() {
        let play = idx + 1;
        out.push_str(&format!(
            "    <navPoint id=\"navPoint-{play}\" playOrder=\"{play}\">\n"
        ));
        out.push_str(&format!(
            "      <navLabel><text>{}</text></navLabel>\n",
            escape(&ch.title)
        ));
        out.push_str(&format!(
            "      <content src=\"{}\"/>\n",
            escape(&ch.file_name)
        ));
        out.push_str("    </navPoint>\n");
    }
    out.push_str("  </navMap>\n");
    out.push_str("</ncx>\n");
    out
}

fn wrap_xhtml_document(title: &str, body_html: &str, with_stylesheet: bool) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    out.push_str(
        "<!DOCTYPE html PUBLIC \"-//W3C//DTD XHTML 1.1//EN\" \"http://www.w3.org/TR/xhtml11/DTD/xhtml11.dtd\">\n",
    );
    out.push_str("<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en\">\n");
    out.push_str("<head>\n");
    out.push_str(&format!("  <title>{}</title>\n", escape(title)));
    if with_stylesheet {
        out.push_str("  <link rel=\"stylesheet\" type=\"text/css\" href=\"styles.css\" />\n");
    }
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(&format!("  <h1>{}</h1>\n", escape(title)));
    out.push_str("  <div>\n");
    let body = to_xhtml_fragment(body_html);
    out.push_str(&body);
    if !body.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("  </div>\n");
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book(generate_toc: bool) -> BookSpec {
        BookSpec {
            title: "A & B".into(),
            author: "Someone".into(),
            uuid: uuid::Uuid::nil(),
            date: "2024-01-01T00:00:00Z".into(),
            rights: None,
            generate_toc,
            has_stylesheet: false,
        }
    }

    fn chapters() -> Vec<ChapterSpec> {
        (1..=3)
            .map(|i| ChapterSpec {
                id: format!("chap{i}"),
                file_name: format!("chapter{i}.html"),
                title: format!("Title {i}"),
                body: "<p>x</p>".into(),
            })
            .collect()
    }

    #[test]
    fn opf_lists_chapters_in_manifest_and_spine_order() {
        let opf = render_content_opf(&book(true), &chapters(), None);
        assert_eq!(opf.matches("media-type=\"application/xhtml+xml\"").count(), 3);
        let spine = &opf[opf.find("<spine").unwrap()..];
        let first = spine.find("chap1").unwrap();
        let third = spine.find("chap3").unwrap();
        assert!(first < third);
        assert!(opf.contains("<dc:title>A &amp; B</dc:title>"));
        assert!(opf.contains("<dc:language>en</dc:language>"));
        assert!(opf.contains("<spine toc=\"ncx\">"));
    }

    #[test]
    fn opf_omits_ncx_when_toc_disabled() {
        let opf = render_content_opf(&book(false), &chapters(), None);
        assert!(!opf.contains("toc.ncx"));
        assert!(opf.contains("<spine>"));
    }

    #[test]
    fn opf_declares_cover() {
        let cover = CoverSpec {
            file_name: "cover.png".into(),
            media_type: "image/png",
            bytes: Vec::new(),
        };
        let opf = render_content_opf(&book(true), &chapters(), Some(&cover));
        assert!(opf.contains("<meta name=\"cover\" content=\"cover-image\"/>"));
        assert!(opf.contains("href=\"images/cover.png\" media-type=\"image/png\""));
    }

    #[test]
    fn ncx_has_one_nav_point_per_chapter() {
        let ncx = render_toc_ncx(&book(true), &chapters());
        assert_eq!(ncx.matches("<navPoint ").count(), 3);
        assert!(ncx.contains("playOrder=\"3\""));
    }

    #[test]
    fn cover_media_type_comes_from_extension() {
        assert_eq!(
            media_type_for_image(Path::new("x/Cover.JPG")),
            Some(("jpeg", "image/jpeg"))
        );
        assert_eq!(media_type_for_image(Path::new("cover.bmp")), None);
    }

    #[test]
    fn chapter_document_is_xhtml() {
        let doc = wrap_xhtml_document("One", "<p>a<br>b</p>", true);
        assert!(doc.contains("<p>a<br />b</p>"));
        assert!(doc.contains("<h1>One</h1>"));
        assert!(doc.contains("href=\"styles.css\""));
    }

    #[test]
    fn chapter_body_is_closed_by_exactly_one_newline() {
        let doc = wrap_xhtml_document("One", "<p>x</p>\n", false);
        assert!(doc.contains("<p>x</p>\n  </div>"));
        assert!(!doc.contains("\n\n  </div>"));

        let doc = wrap_xhtml_document("One", "<p>a&nbsp;b<br></p>", false);
        assert!(doc.contains("<p>a&#160;b<br /></p>\n  </div>"));
    }

    #[test]
    fn rights_combine_copyright_and_license() {
        let prefs = Preferences {
            story_author: "Ann".into(),
            copyright: "2023".into(),
            license: Some(crate::formats::License::from_short_name("MIT")),
            ..Preferences::default()
        };
        assert_eq!(
            render_rights(&prefs).as_deref(),
            Some("Copyright © 2023 Ann. Licensed under MIT")
        );
        assert_eq!(render_rights(&Preferences::default()), None);
    }
}
