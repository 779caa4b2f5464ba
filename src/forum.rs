//! Input rules for forum topics and messages.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::ApiError;

pub const DEFAULT_TOPIC_ICON: &str = "fas fa-comments";
pub const MAX_MESSAGE_LENGTH: usize = 5000;
pub const TOPIC_TITLE_LENGTH: std::ops::RangeInclusive<usize> = 5..=120;
pub const TOPIC_DESCRIPTION_LENGTH: std::ops::RangeInclusive<usize> = 10..=1000;
pub const MAX_IMAGE_URLS: usize = 5;
pub const MAX_QUOTE_PREVIEW: usize = 180;

const AVATAR_COLORS: [&str; 8] = [
    "#00b4db", "#0083b0", "#6bcf7f", "#ff6b6b", "#ffd93d", "#9c27b0", "#ff9800", "#3f51b5",
];

static ICON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^fa[srb]?\sfa-[a-z0-9-]+$").expect("valid regex"));
static REMOTE_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"^https?://[^\s"'<>]+$"#).expect("valid regex"));
static LOCAL_IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^/uploads/[a-zA-Z0-9._\-/]+$").expect("valid regex"));
static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

fn char_len(s: &str) -> usize {
    s.chars().count()
}

pub fn topic_title(title: Option<&str>) -> Result<String, ApiError> {
    let title = title
        .ok_or_else(|| ApiError::bad_request("Topic title is required"))?
        .trim();
    if !TOPIC_TITLE_LENGTH.contains(&char_len(title)) {
        return Err(ApiError::bad_request(
            "Topic title must contain 5..120 characters",
        ));
    }
    Ok(title.to_string())
}

pub fn topic_description(description: Option<&str>) -> Result<String, ApiError> {
    let description = description
        .ok_or_else(|| ApiError::bad_request("Topic description is required"))?
        .trim();
    if !TOPIC_DESCRIPTION_LENGTH.contains(&char_len(description)) {
        return Err(ApiError::bad_request(
            "Topic description must contain 10..1000 characters",
        ));
    }
    Ok(description.to_string())
}

/// Unknown or malformed icons fall back to [`DEFAULT_TOPIC_ICON`].
#[must_use]
pub fn topic_icon(icon: Option<&str>) -> String {
    match icon.map(str::trim) {
        Some(icon) if ICON.is_match(icon) => icon.to_string(),
        _ => DEFAULT_TOPIC_ICON.to_string(),
    }
}

pub fn message_content(content: Option<&str>) -> Result<String, ApiError> {
    let content = content.unwrap_or_default().trim();
    if char_len(content) > MAX_MESSAGE_LENGTH {
        return Err(ApiError::bad_request("Message is too long"));
    }
    Ok(content.to_string())
}

/// Trim, drop blanks, check each URL and de-duplicate keeping first-seen order.
pub fn image_urls(urls: Option<&[String]>) -> Result<Vec<String>, ApiError> {
    let mut cleaned: Vec<String> = Vec::new();
    for url in urls.unwrap_or_default() {
        let url = url.trim();
        if url.is_empty() {
            continue;
        }
        if !REMOTE_IMAGE.is_match(url) && !LOCAL_IMAGE.is_match(url) {
            return Err(ApiError::bad_request(
                "Image URL must be http(s) or /uploads/...",
            ));
        }
        if !cleaned.iter().any(|seen| seen == url) {
            cleaned.push(url.to_string());
        }
    }

    if cleaned.len() > MAX_IMAGE_URLS {
        return Err(ApiError::bad_request("Maximum 5 images per message"));
    }
    Ok(cleaned)
}

/// Content and images of a new or edited message; at least one is required.
pub fn message_body(
    content: Option<&str>,
    urls: Option<&[String]>,
) -> Result<(String, Vec<String>), ApiError> {
    let content = message_content(content)?;
    let images = image_urls(urls)?;
    if content.is_empty() && images.is_empty() {
        return Err(ApiError::bad_request(
            "Message must contain text or at least one image",
        ));
    }
    Ok((content, images))
}

/// Base-31 polynomial hash over UTF-16 code units, wrapping at 32 bits.
fn legacy_string_hash(s: &str) -> i32 {
    s.encode_utf16()
        .fold(0i32, |h, unit| h.wrapping_mul(31).wrapping_add(i32::from(unit)))
}

#[must_use]
pub fn avatar_color(author: &str) -> &'static str {
    let index = legacy_string_hash(author).rem_euclid(AVATAR_COLORS.len() as i32);
    AVATAR_COLORS[index as usize]
}

/// Plain-text excerpt of a quoted message: tags replaced by spaces,
/// whitespace collapsed, cut to [`MAX_QUOTE_PREVIEW`] characters.
#[must_use]
pub fn quote_preview(content: &str) -> String {
    let stripped = HTML_TAG.replace_all(content, " ");
    let collapsed = WHITESPACE.replace_all(&stripped, " ");
    abbreviate(collapsed.trim(), MAX_QUOTE_PREVIEW)
}

fn abbreviate(value: &str, max_chars: usize) -> String {
    if char_len(value) <= max_chars {
        return value.to_string();
    }
    if max_chars <= 3 {
        return value.chars().take(max_chars).collect();
    }
    let mut cut: String = value.chars().take(max_chars - 3).collect();
    cut.push_str("...");
    cut
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topic_title_bounds() {
        assert_eq!(topic_title(Some("  Hello  ")).unwrap(), "Hello");
        assert!(topic_title(Some("Hey")).is_err());
        assert!(topic_title(Some("x".repeat(121).as_str())).is_err());
        assert!(topic_title(None).is_err());
    }

    #[test]
    fn test_topic_description_bounds() {
        assert!(topic_description(Some("too short")).is_err());
        assert_eq!(
            topic_description(Some(" long enough text ")).unwrap(),
            "long enough text"
        );
    }

    #[test]
    fn test_topic_icon_defaults() {
        assert_eq!(topic_icon(Some("fab fa-steam")), "fab fa-steam");
        assert_eq!(topic_icon(Some(" fa fa-gamepad ")), "fa fa-gamepad");
        assert_eq!(topic_icon(Some("fas fa-<script>")), DEFAULT_TOPIC_ICON);
        assert_eq!(topic_icon(Some("")), DEFAULT_TOPIC_ICON);
        assert_eq!(topic_icon(None), DEFAULT_TOPIC_ICON);
    }

    #[test]
    fn test_image_urls() {
        let urls = vec![
            " https://cdn.example.com/a.png ".to_string(),
            "/uploads/forum/abc.png".to_string(),
            "https://cdn.example.com/a.png".to_string(),
            String::new(),
        ];
        assert_eq!(
            image_urls(Some(urls.as_slice())).unwrap(),
            vec!["https://cdn.example.com/a.png", "/uploads/forum/abc.png"]
        );

        let bad = vec!["javascript:alert(1)".to_string()];
        assert!(image_urls(Some(bad.as_slice())).is_err());

        let too_many: Vec<String> = (0..6).map(|i| format!("/uploads/forum/{i}.png")).collect();
        assert!(image_urls(Some(too_many.as_slice())).is_err());
    }

    #[test]
    fn test_message_body_requires_text_or_image() {
        assert!(message_body(Some("   "), None).is_err());
        assert!(message_body(None, Some(Vec::new().as_slice())).is_err());
        let (content, images) =
            message_body(None, Some(vec!["/uploads/forum/x.png".to_string()].as_slice())).unwrap();
        assert!(content.is_empty());
        assert_eq!(images.len(), 1);
        assert!(message_body(Some("a".repeat(5001).as_str()), None).is_err());
    }

    #[test]
    fn test_legacy_string_hash() {
        assert_eq!(legacy_string_hash(""), 0);
        assert_eq!(legacy_string_hash("a"), 97);
        assert_eq!(legacy_string_hash("hello"), 99_162_322);
        // Overflows wrap like a 32-bit signed int.
        assert_eq!(legacy_string_hash("polygenelubricants"), i32::MIN);
    }

    #[test]
    fn test_avatar_color_is_stable() {
        assert_eq!(avatar_color(""), "#00b4db");
        // 97 mod 8 == 1
        assert_eq!(avatar_color("a"), "#0083b0");
        assert_eq!(avatar_color("alice"), avatar_color("alice"));
    }

    #[test]
    fn test_quote_preview() {
        assert_eq!(quote_preview("<b>Hi</b>\n\n there"), "Hi there");
        let long = "word ".repeat(100);
        let preview = quote_preview(&long);
        assert_eq!(preview.chars().count(), MAX_QUOTE_PREVIEW);
        assert!(preview.ends_with("..."));
    }
}
