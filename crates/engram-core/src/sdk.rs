//! Extraction of assistant-SDK observation and summary blocks.
//!
//! The assistant SDK emits flat XML-tagged blocks inside otherwise free text:
//!
//! ```text
//! <observation><type>bugfix</type><title>…</title><narrative>…</narrative>
//! <facts><fact>…</fact></facts><concepts><concept>…</concept></concepts>
//! <files_read><file>…</file></files_read></observation>
//! ```
//!
//! The tag soup is flat and fixed, so extraction is regex-based. Unknown
//! `type` values coerce to `change`; unknown concepts are dropped with a
//! warning. A `<skip_summary reason="…"/>` sibling signals "no summary for
//! this turn".

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use tracing::warn;

use crate::enums::{Concept, ObservationType};
use crate::errors::CoreError;
use crate::observation::{ObservationDraft, SummaryDraft};

static OBSERVATION_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<observation>(.*?)</observation>").expect("observation pattern compiles"));
static SUMMARY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<summary>(.*?)</summary>").expect("summary pattern compiles"));
static SKIP_SUMMARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"<skip_summary\s+reason\s*=\s*"([^"]*)"\s*/?>"#).expect("skip_summary pattern compiles"));
static FACT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<fact>(.*?)</fact>").expect("fact pattern compiles"));
static CONCEPT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<concept>(.*?)</concept>").expect("concept pattern compiles"));
static FILE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<file>(.*?)</file>").expect("file pattern compiles"));
static FILES_READ: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<files_read>(.*?)</files_read>").expect("files_read pattern compiles"));
static FILES_MODIFIED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<files_modified>(.*?)</files_modified>").expect("files_modified pattern compiles"));

/// Capture the trimmed body of `<tag>…</tag>` within `text`, or `None`
/// when the tag is absent or empty.
fn tag_body(text: &str, tag: &str) -> Option<String> {
    // Tag names are fixed identifiers; building the pattern cannot fail.
    let re = Regex::new(&format!("(?s)<{tag}>(.*?)</{tag}>")).ok()?;
    let body = re.captures(text)?.get(1)?.as_str().trim().to_string();
    if body.is_empty() { None } else { Some(body) }
}

fn repeated(re: &Regex, text: &str) -> Vec<String> {
    re.captures_iter(text)
        .filter_map(|c| {
            let v = c.get(1)?.as_str().trim();
            if v.is_empty() { None } else { Some(v.to_string()) }
        })
        .collect()
}

/// Extract every `<observation>` block from `text`.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] when an `<observation>` opening tag
/// is present but no well-formed block can be matched (truncated output).
pub fn extract_observations(text: &str) -> Result<Vec<ObservationDraft>, CoreError> {
    let mut drafts = Vec::new();
    for cap in OBSERVATION_BLOCK.captures_iter(text) {
        let body = cap.get(1).map_or("", |m| m.as_str());
        drafts.push(parse_observation_body(body));
    }
    if drafts.is_empty() && text.contains("<observation>") {
        return Err(CoreError::InvalidInput(
            "unterminated <observation> block".to_string(),
        ));
    }
    Ok(drafts)
}

fn parse_observation_body(body: &str) -> ObservationDraft {
    let obs_type = tag_body(body, "type").map_or_else(ObservationType::default, |raw| {
        ObservationType::from_str(&raw).unwrap_or_else(|_| {
            warn!(raw_type = %raw, "unknown observation type, coercing to 'change'");
            ObservationType::Change
        })
    });

    let concepts = repeated(&CONCEPT, body)
        .into_iter()
        .filter_map(|raw| match Concept::from_str(&raw) {
            Ok(c) => Some(c),
            Err(_) => {
                warn!(concept = %raw, "dropping unknown concept");
                None
            }
        })
        .collect();

    let files_read = FILES_READ
        .captures(body)
        .map_or_else(Vec::new, |c| repeated(&FILE, c.get(1).map_or("", |m| m.as_str())));
    let files_modified = FILES_MODIFIED
        .captures(body)
        .map_or_else(Vec::new, |c| repeated(&FILE, c.get(1).map_or("", |m| m.as_str())));

    ObservationDraft {
        obs_type,
        title: tag_body(body, "title"),
        subtitle: tag_body(body, "subtitle"),
        narrative: tag_body(body, "narrative"),
        facts: repeated(&FACT, body),
        concepts,
        files_read,
        files_modified,
    }
}

/// Extract the `<summary>` block, if any.
///
/// Returns `Ok(None)` when there is no summary block or a
/// `<skip_summary reason="…"/>` sentinel is present instead.
///
/// # Errors
///
/// Returns [`CoreError::InvalidInput`] on an unterminated `<summary>` block.
pub fn extract_summary(text: &str) -> Result<Option<SummaryDraft>, CoreError> {
    if skip_summary_reason(text).is_some() {
        return Ok(None);
    }
    let Some(cap) = SUMMARY_BLOCK.captures(text) else {
        if text.contains("<summary>") {
            return Err(CoreError::InvalidInput(
                "unterminated <summary> block".to_string(),
            ));
        }
        return Ok(None);
    };
    let body = cap.get(1).map_or("", |m| m.as_str());
    Ok(Some(SummaryDraft {
        request: tag_body(body, "request"),
        investigated: tag_body(body, "investigated"),
        learned: tag_body(body, "learned"),
        completed: tag_body(body, "completed"),
        next_steps: tag_body(body, "next_steps"),
        notes: tag_body(body, "notes"),
    }))
}

/// The `reason` attribute of a `<skip_summary/>` sentinel, if present.
#[must_use]
pub fn skip_summary_reason(text: &str) -> Option<String> {
    SKIP_SUMMARY
        .captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())
}
