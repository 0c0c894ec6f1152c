use std::io::Read as _;
use std::path::Path;

use anyhow::Context as _;
use quick_xml::Reader as XmlReader;
use quick_xml::events::{BytesStart, Event};

use crate::formats::ImportFormat;
use crate::markup::escape;

/// Converts a source document into the HTML body stored under `includes/`.
pub fn import_content(path: &Path, format: ImportFormat) -> anyhow::Result<String> {
    match format {
        ImportFormat::Html => std::fs::read_to_string(path)
            .with_context(|| format!("read html source: {}", path.display())),
        ImportFormat::Txt => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("read text source: {}", path.display()))?;
            Ok(text_to_html(&text))
        }
        ImportFormat::Docx => {
            let file = std::fs::File::open(path)
                .with_context(|| format!("open docx source: {}", path.display()))?;
            let mut archive = zip::ZipArchive::new(file)
                .with_context(|| format!("open docx archive: {}", path.display()))?;
            let mut xml = String::new();
            archive
                .by_name("word/document.xml")
                .context("docx has no word/document.xml")?
                .read_to_string(&mut xml)
                .context("read word/document.xml")?;
            docx_xml_to_html(&xml)
        }
    }
}

/// Blank-line separated paragraphs become `<p>` elements.
pub fn text_to_html(text: &str) -> String {
    let normalized = text.replace("\r\n", "\n");
    normalized
        .split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(|p| format!("<p>{}</p>", escape(p)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[derive(Debug, Default)]
struct Paragraph {
    style: Option<String>,
    html: String,
    plain_len: usize,
}

#[derive(Debug, Default)]
struct Run {
    bold: bool,
    italic: bool,
    text: String,
}

/// Paragraph-level conversion of a WordprocessingML body: `Heading N`
/// styles map to `<hN>`, everything else to `<p>`; bold and italic runs are
/// kept. Empty paragraphs are dropped.
pub fn docx_xml_to_html(xml: &str) -> anyhow::Result<String> {
    let mut reader = XmlReader::from_str(xml);
    let mut out = String::new();
    let mut paragraph: Option<Paragraph> = None;
    let mut run: Option<Run> = None;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event()
            .with_context(|| format!("parse docx xml at byte {}", reader.buffer_position()))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_empty = matches!(event, Event::Empty(_));
                match e.local_name().as_ref() {
                    b"p" if !is_empty => paragraph = Some(Paragraph::default()),
                    b"pStyle" => {
                        if let Some(p) = paragraph.as_mut() {
                            p.style = attr_value(e, b"val");
                        }
                    }
                    b"r" if !is_empty => run = Some(Run::default()),
                    b"b" => {
                        if let Some(r) = run.as_mut() {
                            r.bold = toggle_on(e);
                        }
                    }
                    b"i" => {
                        if let Some(r) = run.as_mut() {
                            r.italic = toggle_on(e);
                        }
                    }
                    b"t" if !is_empty => in_text = true,
                    b"tab" | b"br" => {
                        if let Some(r) = run.as_mut() {
                            r.text.push(' ');
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref t) if in_text => {
                let text = t.unescape().context("unescape docx text")?;
                if let Some(r) = run.as_mut() {
                    r.text.push_str(&text);
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"r" => {
                    if let (Some(r), Some(p)) = (run.take(), paragraph.as_mut()) {
                        p.plain_len += r.text.trim().len();
                        p.html.push_str(&render_run(&r));
                    }
                }
                b"p" => {
                    if let Some(p) = paragraph.take()
                        && p.plain_len > 0
                    {
                        let tag = heading_level(p.style.as_deref())
                            .map(|level| format!("h{level}"))
                            .unwrap_or_else(|| "p".to_owned());
                        out.push_str(&format!("<{tag}>{}</{tag}>\n", p.html));
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(out)
}

fn render_run(run: &Run) -> String {
    let mut text = escape(&run.text);
    if run.bold {
        text = format!("<strong>{text}</strong>");
    }
    if run.italic {
        text = format!("<em>{text}</em>");
    }
    text
}

fn attr_value(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok().map(|v| v.into_owned()))
}

/// `<w:b/>` is on; `<w:b w:val="0"/>` / `"false"` is off.
fn toggle_on(e: &BytesStart<'_>) -> bool {
    !matches!(attr_value(e, b"val").as_deref(), Some("0" | "false" | "none"))
}

/// `Heading1` / `Heading 2` / `heading3` → 1..=6.
fn heading_level(style: Option<&str>) -> Option<u8> {
    let style = style?.trim().to_lowercase();
    let level = style.strip_prefix("heading")?.trim().parse::<u8>().ok()?;
    (1..=6).contains(&level).then_some(level)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_paragraphs_are_escaped_and_wrapped() {
        let html = text_to_html("First line\r\ncontinues.\r\n\r\n\r\n  Fish & chips  \n\n");
        assert_eq!(html, "<p>First line\ncontinues.</p>\n<p>Fish &amp; chips</p>");
    }

    #[test]
    fn docx_headings_and_runs_convert() -> anyhow::Result<()> {
        let xml = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:pPr><w:pStyle w:val="Heading2"/></w:pPr><w:r><w:t>Arrival</w:t></w:r></w:p>
    <w:p>
      <w:r><w:t xml:space="preserve">It was </w:t></w:r>
      <w:r><w:rPr><w:b/></w:rPr><w:t>very</w:t></w:r>
      <w:r><w:rPr><w:i/><w:b w:val="0"/></w:rPr><w:t xml:space="preserve"> cold &amp; dark</w:t></w:r>
    </w:p>
    <w:p><w:r><w:t>   </w:t></w:r></w:p>
    <w:p><w:pPr><w:pStyle w:val="Heading9"/></w:pPr><w:r><w:t>Odd</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        let html = docx_xml_to_html(xml)?;
        assert_eq!(
            html,
            "<h2>Arrival</h2>\n<p>It was <strong>very</strong><em> cold &amp; dark</em></p>\n<p>Odd</p>\n"
        );
        Ok(())
    }

    #[test]
    fn heading_level_parses_style_names() {
        assert_eq!(heading_level(Some("Heading1")), Some(1));
        assert_eq!(heading_level(Some("heading 6")), Some(6));
        assert_eq!(heading_level(Some("Heading7")), None);
        assert_eq!(heading_level(Some("Title")), None);
        assert_eq!(heading_level(None), None);
        assert_eq!(heading_level(Some("Заголовок1")), None);
    }

    #[test]
    fn docx_with_localized_style_names_converts() -> anyhow::Result<()> {
        let xml = r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main">
  <w:body>
    <w:p><w:pPr><w:pStyle w:val="Заголовок1"/></w:pPr><w:r><w:t>Привет</w:t></w:r></w:p>
  </w:body>
</w:document>"#;
        assert_eq!(docx_xml_to_html(xml)?, "<p>Привет</p>\n");
        Ok(())
    }
}
