use crate::formats::{Links, Socials};

/// A rendered share or follow link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocialLink {
    pub key: String,
    pub label: String,
    pub href: String,
}

/// Share URLs for every enabled platform, in the order stored in `links.json`.
pub fn share_links(links: &Links, socials: &Socials, title: &str, page_url: &str) -> Vec<SocialLink> {
    let encoded_title = encode(title);
    let encoded_url = encode(page_url);

    let mut out = Vec::new();
    for key in &links.share {
        let template = socials
            .get(key)
            .and_then(|p| p.share_url.as_deref())
            .or_else(|| builtin_share_template(key));
        let Some(template) = template else {
            tracing::warn!(platform = %key, "no share url for platform; skipping");
            continue;
        };
        let href = template
            .replace("{title}", &encoded_title)
            .replace("{url}", &encoded_url);
        out.push(SocialLink {
            key: key.clone(),
            label: label_for(key, socials),
            href,
        });
    }
    out
}

/// Follow URLs for every followed platform that has a handle.
pub fn follow_links(links: &Links, socials: &Socials) -> Vec<SocialLink> {
    let mut out = Vec::new();
    for (key, inline_handle) in &links.follow {
        // Older projects kept the handle directly in `follow`.
        let handle = links
            .handles
            .get(key)
            .filter(|h| !h.trim().is_empty())
            .or(Some(inline_handle).filter(|h| !h.trim().is_empty()));
        let Some(handle) = handle.map(|h| h.trim().trim_start_matches('@')) else {
            tracing::debug!(platform = %key, "follow link without handle; skipping");
            continue;
        };

        let href = match socials.get(key).and_then(|p| p.follow_url.as_deref()) {
            Some(template) => template.replace("{handle}", handle),
            None => builtin_follow_url(key, handle),
        };
        out.push(SocialLink {
            key: key.clone(),
            label: label_for(key, socials),
            href,
        });
    }
    out
}

fn builtin_share_template(key: &str) -> Option<&'static str> {
    match key {
        "email" => Some("mailto:?subject={title}&body={url}"),
        "x" | "twitter" => Some("https://x.com/intent/tweet?text={title}&url={url}"),
        "bluesky" => Some("https://bsky.app/intent/compose?text={title}+{url}"),
        "mastodon" => Some("https://mastodonshare.com/?text={title}&url={url}"),
        "facebook" => Some("https://www.facebook.com/sharer/sharer.php?u={url}"),
        _ => None,
    }
}

fn builtin_follow_url(key: &str, handle: &str) -> String {
    match key {
        "github" => format!("https://github.com/{handle}"),
        "x" | "twitter" => format!("https://x.com/{handle}"),
        "bluesky" => format!("https://bsky.app/profile/{handle}.bsky.social"),
        // Mastodon handles are stored as full profile URLs.
        "mastodon" => handle.to_owned(),
        _ => format!("https://www.instagram.com/{handle}"),
    }
}

fn label_for(key: &str, socials: &Socials) -> String {
    if let Some(label) = socials.get(key).and_then(|p| p.label.as_deref())
        && !label.trim().is_empty()
    {
        return label.to_owned();
    }
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}
