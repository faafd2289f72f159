// src/document.rs
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Platform-tagged kind of a source message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    #[serde(alias = "REDDIT_POST")]
    RedditPost,
    #[serde(alias = "REDDIT_COMMENT")]
    RedditComment,
    #[serde(alias = "TWEET")]
    Tweet,
    #[serde(alias = "CNBC_ARTICLE")]
    CnbcArticle,
    #[serde(other)]
    Unknown,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::RedditPost => "reddit_post",
            MessageType::RedditComment => "reddit_comment",
            MessageType::Tweet => "tweet",
            MessageType::CnbcArticle => "cnbc_article",
            MessageType::Unknown => "unknown",
        }
    }
}

/// One extracted post or comment, as handed over by the warehouse extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDocument {
    pub message_id: String,
    /// `None` when the upstream value was missing or not a string.
    #[serde(default, deserialize_with = "lenient_string")]
    pub content: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    #[serde(default)]
    pub author: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub subreddit: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub score: i64,
    pub message_type: MessageType,
}

fn lenient_string<'de, D>(de: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let v = Option::<serde_json::Value>::deserialize(de)?;
    Ok(match v {
        Some(serde_json::Value::String(s)) => Some(s),
        _ => None,
    })
}

impl RawDocument {
    /// `"{title} {content}"` when a title is present, normalized.
    /// Empty when neither field carries text.
    pub fn combined_text(&self) -> String {
        let content = self.content.as_deref().unwrap_or("");
        let raw = match self.title.as_deref() {
            Some(t) if !t.trim().is_empty() => format!("{t} {content}"),
            _ => content.to_string(),
        };
        normalize_text(&raw)
    }
}

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Decode HTML entities, map typographic quotes to ASCII, collapse whitespace.
///
/// Punctuation is left alone: `$` prefixes and `!` carry signal for extraction.
pub fn normalize_text(s: &str) -> String {
    let decoded = html_escape::decode_html_entities(s);
    let quoted = decoded
        .replace(['\u{201C}', '\u{201D}', '\u{00AB}', '\u{00BB}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'");
    RE_WS.replace_all(&quoted, " ").trim().to_string()
}

/// First `max` chars of `s`, cut on a char boundary.
pub fn truncate_chars(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
