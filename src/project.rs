use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::Path;

use anyhow::Context as _;

use crate::cli::{InitArgs, ProjectCommand};
use crate::config::Config;
use crate::formats::{License, Links, Preferences};
use crate::html::DEFAULT_CSS;
use crate::store::{self, Project, ProjectPaths};

const COVER_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "svg"];

/// Directory name for a story title: `"The Night Train!"` → `the-night-train`.
pub fn slugify(title: &str) -> String {
    let kept = title
        .to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || *c == '-' || c.is_whitespace())
        .collect::<String>();

    let mut slug = String::with_capacity(kept.len());
    let mut pending_dash = false;
    for c in kept.chars() {
        if c.is_whitespace() || c == '_' {
            pending_dash = true;
            continue;
        }
        if pending_dash {
            slug.push('-');
            pending_dash = false;
        }
        slug.push(c);
    }
    slug.trim_matches('-').to_owned()
}

/// Scaffolds `projects/<slug>/` and returns the slug.
pub fn init(config: &Config, title: &str, author: &str, copyright: &str) -> anyhow::Result<String> {
    let slug = slugify(title);
    if slug.is_empty() {
        anyhow::bail!("title {title:?} does not produce a usable project name");
    }
    let paths = ProjectPaths::new(config.project_dir(&slug));
    if paths.root().exists() {
        anyhow::bail!("project already exists: {}", paths.root().display());
    }

    for dir in [paths.data_dir(), paths.includes_dir(), paths.public_dir()] {
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create project dir: {}", dir.display()))?;
    }

    let prefs = Preferences {
        story_title: title.to_owned(),
        story_author: author.to_owned(),
        copyright: copyright.to_owned(),
        ..Preferences::default()
    };
    store::save_preferences(&paths.prefs_json(), &prefs)?;
    store::save_chapters(&paths.chapters_json(), &[])?;
    store::save_links(&paths.links_json(), &Links::default())?;

    let readme = paths.root().join("README.md");
    let mut file = OpenOptions::new()
        .create_new(true)
        .write(true)
        .open(&readme)
        .with_context(|| format!("create README.md: {}", readme.display()))?;
    writeln!(file, "# {title}\n")?;
    writeln!(file, "By {author}\n")?;
    writeln!(file, "Chapter sources live in `includes/`; published output goes to `public/`.")?;

    let stylesheet = paths.stylesheet();
    std::fs::write(&stylesheet, DEFAULT_CSS)
        .with_context(|| format!("write stylesheet: {}", stylesheet.display()))?;

    tracing::info!(project = %slug, path = %paths.root().display(), "project created");
    Ok(slug)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectSummary {
    pub slug: String,
    pub title: String,
    pub author: String,
}

/// Projects under `projects/`, sorted by slug. Directories without a
/// readable `prefs.json` are skipped.
pub fn list(config: &Config) -> anyhow::Result<Vec<ProjectSummary>> {
    let dir = config.projects_dir();
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => {
            return Err(err).with_context(|| format!("read projects dir: {}", dir.display()));
        }
    };

    let mut projects = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("read projects dir: {}", dir.display()))?;
        if !entry.path().is_dir() {
            continue;
        }
        let Some(slug) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        let paths = ProjectPaths::new(entry.path());
        if !paths.prefs_json().is_file() {
            continue;
        }
        match store::load_preferences(&paths.prefs_json()) {
            Ok(prefs) => projects.push(ProjectSummary {
                slug,
                title: prefs.story_title,
                author: prefs.story_author,
            }),
            Err(err) => {
                tracing::warn!(project = %slug, error = %format!("{err:#}"), "skipping project with unreadable prefs");
            }
        }
    }
    projects.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(projects)
}

/// Project details to change; `None` leaves a field alone.
#[derive(Debug, Clone, Default)]
pub struct ProjectUpdate<'a> {
    pub title: Option<String>,
    pub author: Option<String>,
    pub copyright: Option<String>,
    pub pdf_enabled: Option<bool>,
    pub cover_image: Option<&'a Path>,
    pub stylesheet: Option<&'a Path>,
    /// `Some("")` clears the license.
    pub license: Option<String>,
    /// `Some("")` clears the site URL.
    pub site_url: Option<String>,
}

/// Applies `update` to the project's preferences and assets and saves them.
pub fn update(config: &Config, project: &mut Project, update: ProjectUpdate<'_>) -> anyhow::Result<()> {
    if let Some(source) = update.cover_image {
        let ext = source
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !COVER_EXTENSIONS.contains(&ext.as_str()) {
            anyhow::bail!(
                "unsupported cover image type: {} (allowed: {})",
                source.display(),
                COVER_EXTENSIONS.join(", ")
            );
        }
        let file_name = source
            .file_name()
            .and_then(|n| n.to_str())
            .with_context(|| format!("cover image has no file name: {}", source.display()))?;
        let dst = project.paths.includes_dir().join(file_name);
        std::fs::copy(source, &dst)
            .with_context(|| format!("copy cover image: {} -> {}", source.display(), dst.display()))?;
        project.prefs.cover_image = file_name.to_owned();
    }

    if let Some(source) = update.stylesheet {
        let is_css = source
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("css"));
        if !is_css {
            anyhow::bail!("stylesheet must be a .css file: {}", source.display());
        }
        let dst = project.paths.stylesheet();
        std::fs::copy(source, &dst)
            .with_context(|| format!("copy stylesheet: {} -> {}", source.display(), dst.display()))?;
    }

    let prefs = &mut project.prefs;
    if let Some(title) = update.title {
        prefs.story_title = title;
    }
    if let Some(author) = update.author {
        prefs.story_author = author;
    }
    if let Some(copyright) = update.copyright {
        prefs.copyright = copyright;
    }
    if let Some(enabled) = update.pdf_enabled {
        prefs.pdf_enabled = enabled;
    }
    if let Some(code) = update.license {
        let code = code.trim();
        prefs.license = if code.is_empty() {
            None
        } else {
            let definitions = store::load_license_definitions(&config.licenses_json())
                .context("load license definitions")?;
            if !definitions.is_empty()
                && !definitions
                    .iter()
                    .any(|def| def.short_name.eq_ignore_ascii_case(code))
            {
                tracing::warn!(license = %code, "license not listed in licenses.json");
            }
            Some(License::from_short_name(code).complete_from(&definitions))
        };
    }
    if let Some(site_url) = update.site_url {
        let site_url = site_url.trim();
        prefs.site_url = (!site_url.is_empty()).then(|| site_url.to_owned());
    }

    project.save_preferences()?;
    tracing::info!(project = %project.slug, "project updated");
    Ok(())
}

/// Removes `projects/<slug>/` entirely.
pub fn delete(config: &Config, slug: &str) -> anyhow::Result<()> {
    store::validate_slug(slug)?;
    let root = config.project_dir(slug);
    if !root.is_dir() {
        anyhow::bail!("project not found: {}", root.display());
    }
    std::fs::remove_dir_all(&root)
        .with_context(|| format!("delete project: {}", root.display()))?;
    tracing::info!(project = %slug, "project deleted");
    Ok(())
}

pub fn run_init(config: &Config, args: InitArgs) -> anyhow::Result<()> {
    let slug = init(config, &args.title, &args.author, &args.copyright)?;
    println!("{slug}");
    Ok(())
}

pub fn run(config: &Config, command: ProjectCommand) -> anyhow::Result<()> {
    match command {
        ProjectCommand::List => {
            for project in list(config)? {
                println!("{}\t{}\t{}", project.slug, project.title, project.author);
            }
        }
        ProjectCommand::Show(args) => {
            let project = Project::open(config, &args.project)?;
            let prefs = &project.prefs;
            println!("title = {}", prefs.story_title);
            println!("author = {}", prefs.story_author);
            println!("copyright = {}", prefs.copyright);
            println!("cover_image = {}", prefs.cover_image);
            println!("pdf_enabled = {}", prefs.pdf_enabled);
            println!(
                "license = {}",
                prefs.license.as_ref().map(|l| l.display_name()).unwrap_or("")
            );
            println!("site_url = {}", prefs.site_url.as_deref().unwrap_or(""));
        }
        ProjectCommand::Set(args) => {
            let mut project = Project::open(config, &args.project.project)?;
            let changes = ProjectUpdate {
                title: args.title,
                author: args.author,
                copyright: args.copyright,
                pdf_enabled: args.pdf_enabled,
                cover_image: args.cover_image.as_deref().map(Path::new),
                stylesheet: args.stylesheet.as_deref().map(Path::new),
                license: args.license,
                site_url: args.site_url,
            };
            update(config, &mut project, changes)?;
        }
        ProjectCommand::Delete(args) => {
            if !args.yes {
                anyhow::bail!("refusing to delete {} without --yes", args.project.project);
            }
            delete(config, &args.project.project)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_normalizes_titles() {
        assert_eq!(slugify("The Night Train!"), "the-night-train");
        assert_eq!(slugify("  Hello __ World  "), "hello-world");
        assert_eq!(slugify("--Already-Dashed--"), "already-dashed");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn init_scaffolds_project_once() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let config = Config::from_env().with_home(temp.path().to_str());

        let slug = init(&config, "Night Train", "Ann", "2024")?;
        assert_eq!(slug, "night-train");

        let paths = ProjectPaths::new(config.project_dir(&slug));
        assert!(paths.public_dir().is_dir());
        assert!(paths.root().join("README.md").is_file());
        assert_eq!(std::fs::read_to_string(paths.stylesheet())?, DEFAULT_CSS);

        let prefs = store::load_preferences(&paths.prefs_json())?;
        assert_eq!(prefs.story_title, "Night Train");
        assert_eq!(prefs.copyright, "2024");
        assert!(prefs.cover_image.is_empty());
        assert!(store::load_chapters(&paths.chapters_json())?.is_empty());

        let err = init(&config, "Night Train", "Ann", "2024").unwrap_err();
        assert!(err.to_string().contains("already exists"));
        assert!(init(&config, "???", "Ann", "2024").is_err());
        Ok(())
    }

    #[test]
    fn update_copies_assets_and_sets_preferences() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let config = Config::from_env().with_home(temp.path().to_str());
        std::fs::create_dir_all(temp.path().join("data"))?;
        std::fs::write(
            config.licenses_json(),
            r#"[{"short_name":"CC-BY-4.0","long_name":"Attribution 4.0","link":"https://creativecommons.org/licenses/by/4.0/"}]"#,
        )?;
        let slug = init(&config, "Night Train", "Ann", "2024")?;
        let mut project = Project::open(&config, &slug)?;

        let cover = temp.path().join("front.PNG");
        std::fs::write(&cover, b"png")?;
        let css = temp.path().join("custom.css");
        std::fs::write(&css, "body { color: red; }")?;

        update(
            &config,
            &mut project,
            ProjectUpdate {
                pdf_enabled: Some(true),
                cover_image: Some(&cover),
                stylesheet: Some(&css),
                license: Some("cc-by-4.0".into()),
                site_url: Some(" https://example.com/book ".into()),
                ..ProjectUpdate::default()
            },
        )?;

        let prefs = store::load_preferences(&project.paths.prefs_json())?;
        assert!(prefs.pdf_enabled);
        assert_eq!(prefs.cover_image, "front.PNG");
        assert_eq!(prefs.site_url.as_deref(), Some("https://example.com/book"));
        let license = prefs.license.expect("license stored");
        assert_eq!(license.long_name, "Attribution 4.0");
        assert!(project.paths.includes_dir().join("front.PNG").is_file());
        assert_eq!(
            std::fs::read_to_string(project.paths.stylesheet())?,
            "body { color: red; }"
        );
        assert_eq!(prefs.story_title, "Night Train");

        let bmp = temp.path().join("front.bmp");
        std::fs::write(&bmp, b"bmp")?;
        let err = update(
            &config,
            &mut project,
            ProjectUpdate {
                cover_image: Some(&bmp),
                ..ProjectUpdate::default()
            },
        )
        .unwrap_err();
        assert!(err.to_string().contains("unsupported cover image type"));

        update(
            &config,
            &mut project,
            ProjectUpdate {
                license: Some(String::new()),
                site_url: Some(String::new()),
                ..ProjectUpdate::default()
            },
        )?;
        let prefs = store::load_preferences(&project.paths.prefs_json())?;
        assert_eq!(prefs.license, None);
        assert_eq!(prefs.site_url, None);
        Ok(())
    }

    #[test]
    fn list_and_delete_projects() -> anyhow::Result<()> {
        let temp = tempfile::TempDir::new()?;
        let config = Config::from_env().with_home(temp.path().to_str());
        assert!(list(&config)?.is_empty());

        init(&config, "Zebra Tales", "Zed", "2023")?;
        init(&config, "Apple Orchard", "Ann", "2024")?;
        std::fs::create_dir_all(config.project_dir("stray"))?;

        let projects = list(&config)?;
        assert_eq!(
            projects,
            vec![
                ProjectSummary {
                    slug: "apple-orchard".into(),
                    title: "Apple Orchard".into(),
                    author: "Ann".into(),
                },
                ProjectSummary {
                    slug: "zebra-tales".into(),
                    title: "Zebra Tales".into(),
                    author: "Zed".into(),
                },
            ]
        );

        delete(&config, "zebra-tales")?;
        assert!(!config.project_dir("zebra-tales").exists());
        assert!(delete(&config, "zebra-tales").is_err());
        assert!(delete(&config, "../escape").is_err());
        Ok(())
    }
}
