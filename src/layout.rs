use std::collections::BTreeMap;

use crate::cli::LayoutCommand;
use crate::config::Config;
use crate::formats::{FeatureValue, Preferences, StoredFeatures};
use crate::store::Project;

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LayoutFormat {
    Html,
    Epub,
    Pdf,
}

impl LayoutFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            LayoutFormat::Html => "html",
            LayoutFormat::Epub => "epub",
            LayoutFormat::Pdf => "pdf",
        }
    }

    fn defaults(self) -> &'static [(&'static str, DefaultValue)] {
        match self {
            LayoutFormat::Html => HTML_DEFAULTS,
            LayoutFormat::Epub => EPUB_DEFAULTS,
            LayoutFormat::Pdf => PDF_DEFAULTS,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum DefaultValue {
    Flag(bool),
    Text(&'static str),
}

impl DefaultValue {
    fn to_value(self) -> FeatureValue {
        match self {
            DefaultValue::Flag(flag) => FeatureValue::Flag(flag),
            DefaultValue::Text(text) => FeatureValue::Text(text.to_owned()),
        }
    }
}

const HTML_DEFAULTS: &[(&str, DefaultValue)] = &[
    ("use_chapter_titles", DefaultValue::Flag(true)),
    ("cover_image", DefaultValue::Flag(true)),
    ("chapter_nav_top", DefaultValue::Flag(true)),
    ("epub_link", DefaultValue::Flag(false)),
    ("pdf_link", DefaultValue::Flag(false)),
    ("share_links", DefaultValue::Flag(true)),
    ("discuss_link", DefaultValue::Flag(true)),
    ("chapter_nav_bottom", DefaultValue::Flag(true)),
    ("social_links", DefaultValue::Flag(true)),
    ("copyright", DefaultValue::Flag(true)),
    ("license", DefaultValue::Flag(true)),
    ("html_include_blurb", DefaultValue::Flag(false)),
];

const EPUB_DEFAULTS: &[(&str, DefaultValue)] = &[
    ("cover_image", DefaultValue::Flag(true)),
    ("embed_fonts", DefaultValue::Flag(true)),
    ("generate_toc", DefaultValue::Flag(true)),
    ("nav_links", DefaultValue::Flag(true)),
    ("license_info", DefaultValue::Flag(true)),
];

const PDF_DEFAULTS: &[(&str, DefaultValue)] = &[
    ("include_title", DefaultValue::Flag(true)),
    ("include_author", DefaultValue::Flag(true)),
    ("include_cover_image", DefaultValue::Flag(true)),
    ("add_page_numbers", DefaultValue::Flag(true)),
    ("include_license_block", DefaultValue::Flag(true)),
    ("include_copyright", DefaultValue::Flag(true)),
    ("embed_fonts", DefaultValue::Flag(true)),
    ("page_size", DefaultValue::Text("A4")),
];

/// Effective toggles for one output format.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeatureMap(BTreeMap<String, FeatureValue>);

impl FeatureMap {
    /// `false` for unknown keys and for text-valued keys.
    pub fn flag(&self, key: &str) -> bool {
        matches!(self.0.get(key), Some(FeatureValue::Flag(true)))
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.0.get(key) {
            Some(FeatureValue::Text(text)) => Some(text),
            _ => None,
        }
    }

    #[cfg(test)]
    fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FeatureValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

pub fn stored_features(prefs: &Preferences, format: LayoutFormat) -> &StoredFeatures {
    match format {
        LayoutFormat::Html => &prefs.display_features,
        LayoutFormat::Epub => &prefs.epub_display_features,
        LayoutFormat::Pdf => &prefs.pdf_display_features,
    }
}

fn stored_features_mut(prefs: &mut Preferences, format: LayoutFormat) -> &mut StoredFeatures {
    match format {
        LayoutFormat::Html => &mut prefs.display_features,
        LayoutFormat::Epub => &mut prefs.epub_display_features,
        LayoutFormat::Pdf => &mut prefs.pdf_display_features,
    }
}

/// Overlays the stored toggles for `format` on its defaults.
///
/// A stored value only replaces a default of the same kind; stored keys
/// without a default are carried through as-is.
pub fn resolve(format: LayoutFormat, prefs: &Preferences) -> FeatureMap {
    let mut map = format
        .defaults()
        .iter()
        .map(|(key, default)| ((*key).to_owned(), default.to_value()))
        .collect::<BTreeMap<_, _>>();

    for (key, value) in stored_features(prefs, format) {
        match map.get(key) {
            Some(default) if !default.same_kind(value) => {
                tracing::debug!(format = format.as_str(), key = %key, "ignoring mistyped layout toggle");
            }
            _ => {
                map.insert(key.clone(), value.clone());
            }
        }
    }

    FeatureMap(map)
}

/// Stores one toggle. Returns whether the stored value changed.
pub fn set_feature(
    prefs: &mut Preferences,
    format: LayoutFormat,
    key: &str,
    raw_value: &str,
) -> anyhow::Result<bool> {
    let Some((_, default)) = format.defaults().iter().find(|(k, _)| *k == key) else {
        let known = format
            .defaults()
            .iter()
            .map(|(k, _)| *k)
            .collect::<Vec<_>>()
            .join(", ");
        anyhow::bail!(
            "unknown {} layout feature: {key} (known: {known})",
            format.as_str()
        );
    };

    let value = match default {
        DefaultValue::Flag(_) => FeatureValue::Flag(parse_flag(raw_value)?),
        DefaultValue::Text(_) => {
            let text = raw_value.trim();
            if text.is_empty() {
                anyhow::bail!("layout feature {key} must not be empty");
            }
            FeatureValue::Text(text.to_owned())
        }
    };

    let stored = stored_features_mut(prefs, format);
    if stored.get(key) == Some(&value) {
        return Ok(false);
    }
    stored.insert(key.to_owned(), value);
    Ok(true)
}

pub fn run(config: &Config, command: LayoutCommand) -> anyhow::Result<()> {
    match command {
        LayoutCommand::Show(args) => {
            let project = Project::open(config, &args.project.project)?;
            for (key, value) in resolve(args.format, &project.prefs).iter() {
                println!("{key} = {value}");
            }
        }
        LayoutCommand::Set(args) => {
            let mut project = Project::open(config, &args.project.project)?;
            let mut changed = false;
            for feature in &args.features {
                let Some((key, value)) = feature.split_once('=') else {
                    anyhow::bail!("expected KEY=VALUE, got {feature:?}");
                };
                changed |= set_feature(&mut project.prefs, args.format, key.trim(), value)?;
            }
            if changed {
                project.save_preferences()?;
                tracing::info!(project = %project.slug, format = args.format.as_str(), "layout updated");
            } else {
                tracing::info!(project = %project.slug, format = args.format.as_str(), "layout unchanged");
            }
        }
    }
    Ok(())
}

fn parse_flag(raw: &str) -> anyhow::Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        other => anyhow::bail!("expected a boolean (true/false/on/off), got {other:?}"),
    }
}
