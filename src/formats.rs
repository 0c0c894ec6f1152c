use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Value of a single layout toggle. Everything is a flag except `page_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Flag(bool),
    Text(String),
}

impl FeatureValue {
    pub fn same_kind(&self, other: &FeatureValue) -> bool {
        matches!(
            (self, other),
            (FeatureValue::Flag(_), FeatureValue::Flag(_))
                | (FeatureValue::Text(_), FeatureValue::Text(_))
        )
    }
}

impl fmt::Display for FeatureValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureValue::Flag(value) => write!(f, "{value}"),
            FeatureValue::Text(value) => f.write_str(value),
        }
    }
}

pub type StoredFeatures = BTreeMap<String, FeatureValue>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub story_title: String,
    #[serde(default)]
    pub story_author: String,
    #[serde(default, deserialize_with = "string_or_number")]
    pub copyright: String,
    #[serde(default)]
    pub cover_image: String,
    #[serde(default)]
    pub pdf_enabled: bool,
    /// Public base URL of the HTML site; used for absolute share links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_license",
        skip_serializing_if = "Option::is_none"
    )]
    pub license: Option<License>,
    #[serde(
        default,
        deserialize_with = "lenient_features",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub display_features: StoredFeatures,
    #[serde(
        default,
        alias = "epub_layout",
        deserialize_with = "lenient_features",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub epub_display_features: StoredFeatures,
    #[serde(
        default,
        alias = "pdf_layout",
        deserialize_with = "lenient_features",
        skip_serializing_if = "BTreeMap::is_empty"
    )]
    pub pdf_display_features: StoredFeatures,
    /// Keys written by other tooling; carried through untouched.
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl Preferences {
    /// File-name stem shared by the EPUB/PDF downloads. Whitespace becomes
    /// `_`; anything other than letters, digits, `-` and `_` is dropped, so
    /// the stem never contains a path separator.
    pub fn title_slug(&self) -> String {
        let mut slug = String::new();
        for word in self.story_title.to_lowercase().split_whitespace() {
            let word = word
                .chars()
                .filter(|c| c.is_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>();
            if word.is_empty() {
                continue;
            }
            if !slug.is_empty() {
                slug.push('_');
            }
            slug.push_str(&word);
        }
        if slug.is_empty() {
            "untitled".to_owned()
        } else {
            slug
        }
    }
}

/// Canonical license record. Every stored shape is normalized into this on read.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    #[serde(default, alias = "id")]
    pub short_name: String,
    #[serde(default)]
    pub long_name: String,
    #[serde(default, alias = "url")]
    pub link: String,
    #[serde(default)]
    pub description: String,
}

const WELL_KNOWN_LICENSE_LINKS: &[(&str, &str)] = &[(
    "CC-BY-NC-SA-4.0",
    "https://creativecommons.org/licenses/by-nc-sa/4.0/",
)];

impl License {
    pub fn from_short_name(short_name: &str) -> Self {
        Self {
            short_name: short_name.trim().to_owned(),
            ..Self::default()
        }
    }

    /// Fills blank fields from the matching global definition.
    pub fn complete_from(mut self, definitions: &[License]) -> Self {
        if let Some(def) = definitions
            .iter()
            .find(|def| def.short_name.eq_ignore_ascii_case(&self.short_name))
        {
            if self.long_name.is_empty() {
                self.long_name = def.long_name.clone();
            }
            if self.link.is_empty() {
                self.link = def.link.clone();
            }
            if self.description.is_empty() {
                self.description = def.description.clone();
            }
        }
        if self.link.is_empty()
            && let Some((_, link)) = WELL_KNOWN_LICENSE_LINKS
                .iter()
                .find(|(code, _)| code.eq_ignore_ascii_case(&self.short_name))
        {
            self.link = (*link).to_owned();
        }
        self
    }

    pub fn display_name(&self) -> &str {
        if self.short_name.is_empty() {
            &self.long_name
        } else {
            &self.short_name
        }
    }

    pub fn href(&self) -> &str {
        if self.link.is_empty() { "#" } else { &self.link }
    }

    fn is_blank(&self) -> bool {
        self.short_name.trim().is_empty() && self.long_name.trim().is_empty()
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StoredLicense {
    Code(String),
    Record(License),
}

fn deserialize_license<'de, D>(deserializer: D) -> Result<Option<License>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(value) = value else {
        return Ok(None);
    };
    let license = match serde_json::from_value::<StoredLicense>(value) {
        Ok(StoredLicense::Code(code)) => License::from_short_name(&code),
        Ok(StoredLicense::Record(record)) => record,
        Err(_) => return Ok(None),
    };
    if license.is_blank() {
        return Ok(None);
    }
    Ok(Some(license))
}

fn lenient_features<'de, D>(deserializer: D) -> Result<StoredFeatures, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let Some(serde_json::Value::Object(map)) = value else {
        return Ok(StoredFeatures::new());
    };
    Ok(map
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Bool(flag) => Some((key, FeatureValue::Flag(flag))),
            serde_json::Value::String(text) => Some((key, FeatureValue::Text(text))),
            _ => None,
        })
        .collect())
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(text)) => text,
        Some(serde_json::Value::Number(number)) => number.to_string(),
        _ => String::new(),
    })
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ImportFormat {
    #[default]
    Html,
    Txt,
    Docx,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub number: i64,
    #[serde(default)]
    pub title: String,
    #[serde(
        default,
        deserialize_with = "empty_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub discussion: Option<String>,
    #[serde(default)]
    pub import_source: String,
    #[serde(default)]
    pub import_format: ImportFormat,
    #[serde(default)]
    pub exclude_from_epub: bool,
    #[serde(default)]
    pub exclude_from_pdf: bool,
    #[serde(default)]
    pub draft: bool,
}

impl Chapter {
    pub fn new(number: i64, title: impl Into<String>) -> Self {
        Self {
            number,
            title: title.into(),
            discussion: None,
            import_source: format!("includes/chapter_{number}.html"),
            import_format: ImportFormat::Html,
            exclude_from_epub: false,
            exclude_from_pdf: false,
            draft: false,
        }
    }

    /// `Chapter {n}` or `Chapter {n}: {title}`.
    pub fn heading(&self, use_titles: bool) -> String {
        if use_titles && !self.title.trim().is_empty() {
            format!("Chapter {}: {}", self.number, self.title)
        } else {
            format!("Chapter {}", self.number)
        }
    }

    /// Title used inside packaged formats, falling back to the numbered heading.
    pub fn display_title(&self) -> String {
        if self.title.trim().is_empty() {
            self.heading(false)
        } else {
            self.title.clone()
        }
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Chapters that take part in rendering, ordered by `number`. Drafts are left out.
pub fn reading_order(chapters: &[Chapter]) -> Vec<&Chapter> {
    let mut ordered = chapters.iter().filter(|c| !c.draft).collect::<Vec<_>>();
    ordered.sort_by_key(|c| c.number);
    ordered
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Links {
    #[serde(default)]
    pub share: Vec<String>,
    #[serde(default)]
    pub follow: BTreeMap<String, String>,
    #[serde(default)]
    pub handles: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocialPlatform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub follow_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub share_url: Option<String>,
}

pub type Socials = BTreeMap<String, SocialPlatform>;
