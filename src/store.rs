use std::path::{Component, Path, PathBuf};

use anyhow::Context as _;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::config::Config;
use crate::formats::{Chapter, License, Links, Preferences, SocialPlatform, Socials};

/// Per-project filesystem layout.
#[derive(Debug, Clone)]
pub struct ProjectPaths {
    root: PathBuf,
}

impl ProjectPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join("data")
    }

    pub fn prefs_json(&self) -> PathBuf {
        self.data_dir().join("prefs.json")
    }

    pub fn chapters_json(&self) -> PathBuf {
        self.data_dir().join("chapters.json")
    }

    pub fn links_json(&self) -> PathBuf {
        self.data_dir().join("links.json")
    }

    pub fn includes_dir(&self) -> PathBuf {
        self.root.join("includes")
    }

    pub fn stylesheet(&self) -> PathBuf {
        self.includes_dir().join("styles.css")
    }

    pub fn blurb(&self) -> PathBuf {
        self.includes_dir().join("blurb.md")
    }

    pub fn public_dir(&self) -> PathBuf {
        self.root.join("public")
    }

    pub fn public_chapter_dir(&self) -> PathBuf {
        self.public_dir().join("chapter")
    }

    pub fn downloads_dir(&self) -> PathBuf {
        self.public_dir().join("downloads")
    }

    /// Per-chapter download location checked by the HTML header links.
    pub fn legacy_download_dir(&self) -> PathBuf {
        self.root.join("download")
    }

    pub fn default_chapter_content(&self, number: i64) -> PathBuf {
        self.includes_dir().join(format!("chapter_{number}.html"))
    }

    /// Backing HTML body of a chapter: its `import_source` when that is a
    /// plain relative path, otherwise `includes/chapter_<n>.html`.
    pub fn chapter_content(&self, chapter: &Chapter) -> PathBuf {
        let source = chapter.import_source.trim();
        if source.is_empty() {
            return self.default_chapter_content(chapter.number);
        }
        let rel = Path::new(source);
        let contained = rel
            .components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir));
        if !contained {
            tracing::warn!(
                chapter = chapter.number,
                import_source = source,
                "import_source escapes the project; using default content path"
            );
            return self.default_chapter_content(chapter.number);
        }
        self.root.join(rel)
    }
}

/// A project loaded from disk, ready to hand to the builders.
#[derive(Debug, Clone)]
pub struct Project {
    pub slug: String,
    pub paths: ProjectPaths,
    pub prefs: Preferences,
    pub chapters: Vec<Chapter>,
}

impl Project {
    pub fn open(config: &Config, slug: &str) -> anyhow::Result<Self> {
        validate_slug(slug)?;
        let paths = ProjectPaths::new(config.project_dir(slug));
        if !paths.root().is_dir() {
            anyhow::bail!("project not found: {}", paths.root().display());
        }

        let definitions = load_license_definitions(&config.licenses_json())
            .context("load license definitions")?;
        let mut prefs = load_preferences(&paths.prefs_json())?;
        prefs.license = prefs
            .license
            .take()
            .map(|license| license.complete_from(&definitions));
        let chapters = load_chapters(&paths.chapters_json())?;

        Ok(Self {
            slug: slug.to_owned(),
            paths,
            prefs,
            chapters,
        })
    }

    pub fn save_preferences(&self) -> anyhow::Result<()> {
        save_preferences(&self.paths.prefs_json(), &self.prefs)
    }

    pub fn save_chapters(&self) -> anyhow::Result<()> {
        save_chapters(&self.paths.chapters_json(), &self.chapters)
    }
}

pub fn validate_slug(slug: &str) -> anyhow::Result<()> {
    let ok = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_alphanumeric() || c == '-' || c == '_');
    if !ok {
        anyhow::bail!("invalid project slug: {slug:?}");
    }
    Ok(())
}

pub fn load_preferences(path: &Path) -> anyhow::Result<Preferences> {
    read_json(path)?.ok_or_else(|| anyhow::anyhow!("preferences not found: {}", path.display()))
}

pub fn save_preferences(path: &Path, prefs: &Preferences) -> anyhow::Result<()> {
    write_json_atomic(path, prefs).context("write prefs.json")
}

pub fn load_chapters(path: &Path) -> anyhow::Result<Vec<Chapter>> {
    Ok(read_json(path)?.unwrap_or_default())
}

pub fn save_chapters(path: &Path, chapters: &[Chapter]) -> anyhow::Result<()> {
    write_json_atomic(path, &chapters).context("write chapters.json")
}

pub fn load_links(path: &Path) -> anyhow::Result<Links> {
    Ok(read_json(path)?.unwrap_or_default())
}

pub fn save_links(path: &Path, links: &Links) -> anyhow::Result<()> {
    write_json_atomic(path, links).context("write links.json")
}

/// Global platform table. Entries that are not objects are ignored.
pub fn load_socials(path: &Path) -> anyhow::Result<Socials> {
    let Some(raw) = read_json::<serde_json::Map<String, serde_json::Value>>(path)? else {
        return Ok(Socials::new());
    };
    let mut socials = Socials::new();
    for (key, value) in raw {
        if !value.is_object() {
            tracing::warn!(platform = %key, "ignoring malformed socials entry");
            continue;
        }
        match serde_json::from_value::<SocialPlatform>(value) {
            Ok(platform) => {
                socials.insert(key, platform);
            }
            Err(err) => {
                tracing::warn!(platform = %key, error = %err, "ignoring malformed socials entry");
            }
        }
    }
    Ok(socials)
}

pub fn load_license_definitions(path: &Path) -> anyhow::Result<Vec<License>> {
    Ok(read_json(path)?.unwrap_or_default())
}

/// Chapter body, or `None` (with a warning) when the backing file is missing.
pub fn read_chapter_body(paths: &ProjectPaths, chapter: &Chapter) -> anyhow::Result<Option<String>> {
    let path = paths.chapter_content(chapter);
    match std::fs::read_to_string(&path) {
        Ok(body) => Ok(Some(body)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(
                chapter = chapter.number,
                path = %path.display(),
                "chapter content not found; skipping"
            );
            Ok(None)
        }
        Err(err) => {
            Err(err).with_context(|| format!("read chapter content: {}", path.display()))
        }
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<Option<T>> {
    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => return Err(err).with_context(|| format!("read: {}", path.display())),
    };
    let value = serde_json::from_slice(&bytes)
        .with_context(|| format!("parse json: {}", path.display()))?;
    Ok(Some(value))
}

pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    std::fs::create_dir_all(parent)
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let mut data = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut data, formatter);
    value.serialize(&mut ser).context("serialize json")?;
    data.push(b'\n');

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    std::fs::write(&tmp_path, &data)
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::formats::FeatureValue;

    #[test]
    fn preferences_round_trip_keeps_toggle_types() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("data").join("prefs.json");

        let mut prefs = Preferences {
            story_title: "Round Trip".into(),
            pdf_enabled: true,
            ..Preferences::default()
        };
        prefs
            .display_features
            .insert("cover_image".into(), FeatureValue::Flag(false));
        prefs
            .display_features
            .insert("html_include_blurb".into(), FeatureValue::Flag(true));
        prefs
            .pdf_display_features
            .insert("page_size".into(), FeatureValue::Text("Letter".into()));

        save_preferences(&path, &prefs)?;
        let loaded = load_preferences(&path)?;
        assert_eq!(loaded, prefs);

        let raw = std::fs::read_to_string(&path)?;
        assert!(raw.contains("\"cover_image\": false"));
        Ok(())
    }

    #[test]
    fn missing_chapters_and_links_read_as_empty() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let paths = ProjectPaths::new(temp.path());
        assert!(load_chapters(&paths.chapters_json())?.is_empty());
        assert_eq!(load_links(&paths.links_json())?, Links::default());
        Ok(())
    }

    #[test]
    fn malformed_chapters_json_is_an_error() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let paths = ProjectPaths::new(temp.path());
        std::fs::create_dir_all(paths.data_dir())?;
        std::fs::write(paths.chapters_json(), "[{\"number\": ")?;
        let err = load_chapters(&paths.chapters_json()).unwrap_err();
        assert!(format!("{err:#}").contains("parse json"));
        Ok(())
    }

    #[test]
    fn chapter_content_rejects_parent_traversal() {
        let paths = ProjectPaths::new("/tmp/project");
        let mut chapter = Chapter::new(7, "G");
        chapter.import_source = "../elsewhere/secret.html".into();
        assert_eq!(
            paths.chapter_content(&chapter),
            PathBuf::from("/tmp/project/includes/chapter_7.html")
        );

        chapter.import_source = "includes/custom.html".into();
        assert_eq!(
            paths.chapter_content(&chapter),
            PathBuf::from("/tmp/project/includes/custom.html")
        );
    }

    #[test]
    fn socials_skip_malformed_entries() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let path = temp.path().join("socials.json");
        std::fs::write(
            &path,
            r#"{"github":{"label":"GitHub","follow_url":"https://github.com/{handle}"},"bad":3}"#,
        )?;
        let socials = load_socials(&path)?;
        assert_eq!(socials.len(), 1);
        assert_eq!(socials["github"].label.as_deref(), Some("GitHub"));
        Ok(())
    }

    #[test]
    fn slug_validation_rejects_paths() {
        assert!(validate_slug("my-book").is_ok());
        assert!(validate_slug("../other").is_err());
        assert!(validate_slug("").is_err());
    }
}
