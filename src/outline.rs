//! Outline schema and the parser that extracts it from untrusted model text.
//!
//! ## Why a strict parser over best-effort defaults?
//!
//! The model service performs no server-side schema enforcement — whatever
//! comes back is free-form text that *usually* contains the requested JSON.
//! This module treats that text as untrusted input: it tolerates cosmetic
//! noise (markdown fences, leading prose, numbering inside bullets, stray
//! whitespace) but turns every structural violation into a named
//! [`OutlineParseError`]. The planner quotes that error back to the model
//! in a corrective retry; it never papers over a bad outline with
//! placeholder content.
//!
//! Validation invariants:
//! - slide count equals the request exactly (no silent truncate or pad)
//! - every heading is non-empty
//! - bullet count per slide is within [`MIN_BULLETS`]..=[`MAX_BULLETS`]

use crate::config::{MAX_BULLETS, MIN_BULLETS};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validated, structured slide plan. Read-only once produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outline {
    /// Deck title, rendered on the title slide.
    pub title: String,
    /// Content slides, in presentation order.
    pub slides: Vec<SlideSpec>,
}

/// One content slide within an [`Outline`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideSpec {
    pub heading: String,
    /// 1–6 bullet lines, already normalised by the parser.
    pub bullets: Vec<String>,
    /// Speaker notes for the notes channel; never rendered on the slide body.
    pub notes: Option<String>,
    /// Short search hint for the image resolver. May be empty, in which
    /// case the resolver derives a query from the heading.
    pub image_query: String,
}

/// Why a model response failed to yield a valid outline.
///
/// The message is written to be quoted verbatim into the corrective retry
/// prompt, so it names the offending slide and rule rather than a serde
/// internal position.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{0}")]
pub struct OutlineParseError(pub String);

// ── Wire shapes ──────────────────────────────────────────────────────────
// Lenient mirror of the requested JSON schema. Aliases absorb the common
// near-miss key names models substitute.

#[derive(Deserialize)]
struct RawOutline {
    title: String,
    slides: Vec<RawSlide>,
}

#[derive(Deserialize)]
struct RawSlide {
    #[serde(alias = "title")]
    heading: String,
    #[serde(alias = "content", default)]
    bullets: RawBullets,
    #[serde(default, alias = "speaker_notes")]
    notes: Option<String>,
    #[serde(default, alias = "image", alias = "image_hint")]
    image_query: Option<String>,
}

/// Models sometimes return bullets as one newline-joined string instead of
/// an array. Both decode; the string form is split afterwards.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawBullets {
    Many(Vec<String>),
    One(String),
}

impl Default for RawBullets {
    fn default() -> Self {
        RawBullets::Many(Vec::new())
    }
}

// ── Parsing ──────────────────────────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:json)?\s*\n(.*)\n```\s*$").unwrap());

/// Leading list markers models put inside bullet strings: "1. ", "- ", "• ".
static RE_BULLET_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\d+[.)]\s+|[-•*]\s+)").unwrap());

/// Inline markdown emphasis that has no place in rendered slide text.
static RE_MARKDOWN_NOISE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[*_`~]").unwrap());

/// Parse a raw model response into a validated [`Outline`].
///
/// `expected_slides` is the count the request demanded; a mismatch is a
/// parse error, not something to fix up locally. `max_bullet_chars` is the
/// per-bullet character budget — over-long bullets are shortened here, at
/// a word boundary, because downstream layout treats text as opaque.
pub fn parse_outline(
    raw: &str,
    expected_slides: usize,
    max_bullet_chars: usize,
) -> Result<Outline, OutlineParseError> {
    let body = strip_code_fences(raw);
    let json = extract_json_object(&body).ok_or_else(|| {
        OutlineParseError("response contains no JSON object".to_string())
    })?;

    let parsed: RawOutline = serde_json::from_str(json)
        .map_err(|e| OutlineParseError(format!("invalid JSON: {e}")))?;

    let title = parsed.title.trim().to_string();
    if title.is_empty() {
        return Err(OutlineParseError("deck title is empty".to_string()));
    }

    if parsed.slides.len() != expected_slides {
        return Err(OutlineParseError(format!(
            "expected exactly {expected_slides} slides, got {}",
            parsed.slides.len()
        )));
    }

    let mut slides = Vec::with_capacity(parsed.slides.len());
    for (i, slide) in parsed.slides.into_iter().enumerate() {
        let n = i + 1;
        let heading = clean_inline(&slide.heading);
        if heading.is_empty() {
            return Err(OutlineParseError(format!("slide {n}: heading is empty")));
        }

        let bullets = normalise_bullets(slide.bullets, max_bullet_chars);
        if bullets.len() < MIN_BULLETS || bullets.len() > MAX_BULLETS {
            return Err(OutlineParseError(format!(
                "slide {n}: {} bullets, must be {MIN_BULLETS}–{MAX_BULLETS}",
                bullets.len()
            )));
        }

        let notes = slide
            .notes
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let image_query = slide
            .image_query
            .map(|s| clean_inline(&s))
            .unwrap_or_default();

        slides.push(SlideSpec {
            heading,
            bullets,
            notes,
            image_query,
        });
    }

    Ok(Outline { title, slides })
}

/// Strip an outer ```json fence, when the whole response is wrapped in one.
fn strip_code_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

/// Slice from the first `{` to the last `}` — drops any prose the model
/// added before or after the payload.
fn extract_json_object(input: &str) -> Option<&str> {
    let start = input.find('{')?;
    let end = input.rfind('}')?;
    (end > start).then(|| &input[start..=end])
}

fn clean_inline(s: &str) -> String {
    RE_MARKDOWN_NOISE.replace_all(s, "").trim().to_string()
}

fn normalise_bullets(raw: RawBullets, max_chars: usize) -> Vec<String> {
    let items: Vec<String> = match raw {
        RawBullets::Many(v) => v,
        RawBullets::One(s) => s.split(['\n', '•']).map(str::to_string).collect(),
    };

    items
        .iter()
        .map(|b| clean_inline(&RE_BULLET_MARKER.replace(b, "")))
        .filter(|b| !b.is_empty())
        .map(|b| shorten(&b, max_chars))
        .collect()
}

/// Cut at a word boundary and append an ellipsis when over budget.
fn shorten(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(1)).collect();
    let cut = match cut.rsplit_once(' ') {
        Some((head, _)) if !head.is_empty() => head,
        _ => cut.as_str(),
    };
    format!("{}…", cut.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn slide_json(n: usize) -> String {
        (1..=n)
            .map(|i| {
                format!(
                    r#"{{"heading": "Slide {i}", "bullets": ["Point one", "Point two", "Point three"], "notes": "Say hi", "image_query": "sunrise field"}}"#
                )
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    fn outline_json(n: usize) -> String {
        format!(r#"{{"title": "A Deck", "slides": [{}]}}"#, slide_json(n))
    }

    #[test]
    fn parses_clean_response() {
        let outline = parse_outline(&outline_json(3), 3, 80).expect("parse");
        assert_eq!(outline.title, "A Deck");
        assert_eq!(outline.slides.len(), 3);
        assert_eq!(outline.slides[0].bullets.len(), 3);
        assert_eq!(outline.slides[0].notes.as_deref(), Some("Say hi"));
        assert_eq!(outline.slides[0].image_query, "sunrise field");
    }

    #[test]
    fn parses_fenced_response() {
        let raw = format!("```json\n{}\n```", outline_json(3));
        assert!(parse_outline(&raw, 3, 80).is_ok());
    }

    #[test]
    fn parses_response_with_leading_prose() {
        let raw = format!("Here is your outline:\n\n{}\n\nEnjoy!", outline_json(4));
        assert!(parse_outline(&raw, 4, 80).is_ok());
    }

    #[test]
    fn slide_count_mismatch_is_an_error() {
        let err = parse_outline(&outline_json(4), 5, 80).unwrap_err();
        assert!(err.0.contains("expected exactly 5 slides, got 4"), "{err}");
    }

    #[test]
    fn empty_heading_names_the_slide() {
        let raw = r#"{"title": "T", "slides": [
            {"heading": "Ok", "bullets": ["a"]},
            {"heading": "  ", "bullets": ["b"]}
        ]}"#;
        let err = parse_outline(raw, 2, 80).unwrap_err();
        assert!(err.0.contains("slide 2"), "{err}");
    }

    #[test]
    fn bullet_count_out_of_bounds_is_an_error() {
        let bullets: Vec<String> = (0..7).map(|i| format!("\"b{i}\"")).collect();
        let raw = format!(
            r#"{{"title": "T", "slides": [{{"heading": "H", "bullets": [{}]}}]}}"#,
            bullets.join(",")
        );
        let err = parse_outline(&raw, 1, 80).unwrap_err();
        assert!(err.0.contains("7 bullets"), "{err}");
    }

    #[test]
    fn accepts_legacy_title_content_keys() {
        let raw = r#"{"title": "T", "slides": [
            {"title": "Heading", "content": ["one", "two"]}
        ]}"#;
        let outline = parse_outline(raw, 1, 80).expect("parse");
        assert_eq!(outline.slides[0].heading, "Heading");
        assert_eq!(outline.slides[0].bullets, vec!["one", "two"]);
    }

    #[test]
    fn splits_single_string_bullets() {
        let raw = r#"{"title": "T", "slides": [
            {"heading": "H", "bullets": "- first point\n- second point"}
        ]}"#;
        let outline = parse_outline(raw, 1, 80).expect("parse");
        assert_eq!(outline.slides[0].bullets, vec!["first point", "second point"]);
    }

    #[test]
    fn strips_numbering_and_markdown_noise() {
        let raw = r#"{"title": "T", "slides": [
            {"heading": "**Bold** heading", "bullets": ["1. First", "2) *Second*"]}
        ]}"#;
        let outline = parse_outline(raw, 1, 80).expect("parse");
        assert_eq!(outline.slides[0].heading, "Bold heading");
        assert_eq!(outline.slides[0].bullets, vec!["First", "Second"]);
    }

    #[test]
    fn shortens_over_budget_bullets_at_word_boundary() {
        let long = "This bullet keeps going well past any sensible budget for a slide line";
        let raw = format!(
            r#"{{"title": "T", "slides": [{{"heading": "H", "bullets": ["{long}"]}}]}}"#
        );
        let outline = parse_outline(&raw, 1, 40).expect("parse");
        let bullet = &outline.slides[0].bullets[0];
        assert!(bullet.chars().count() <= 40, "got {} chars", bullet.chars().count());
        assert!(bullet.ends_with('…'));
        assert!(!bullet.trim_end_matches('…').ends_with(' '));
    }

    #[test]
    fn no_json_at_all_is_an_error() {
        let err = parse_outline("Sorry, I cannot help with that.", 3, 80).unwrap_err();
        assert!(err.0.contains("no JSON object"), "{err}");
    }

    #[test]
    fn empty_title_is_an_error() {
        let raw = r#"{"title": " ", "slides": [{"heading": "H", "bullets": ["a"]}]}"#;
        assert!(parse_outline(raw, 1, 80).is_err());
    }
}
