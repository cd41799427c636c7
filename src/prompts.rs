//! Prompts sent to the text model.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — tightening the outline schema or the
//!    tone guidance means editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect the rendered prompt without
//!    a live model call, so a regression in the requested schema is caught
//!    before it produces unparseable responses in production.

use crate::config::TopicRequest;

/// Render the outline request prompt for one topic.
///
/// The schema block is the contract the parser in [`crate::outline`]
/// enforces; keep the two in sync.
pub fn outline_prompt(request: &TopicRequest) -> String {
    format!(
        r#"Generate a professional presentation outline on the topic: "{topic}".

Requirements:
- Create exactly {count} slides.
- Write all text in {language}.
- Each slide needs a clear, descriptive heading and 3 to 5 concise bullet points.
- Use formal, business-appropriate language; bullets must be informative, specific, and free of jargon.
- Organise the outline logically: introduction, main ideas, challenges, opportunities, conclusion.
- For each slide include short speaker notes (1-2 sentences) and a 2-4 word stock-photo search hint.

Return ONLY a JSON object in exactly this shape, with no commentary and no markdown fences:
{{
  "title": "Deck title",
  "slides": [
    {{
      "heading": "Slide heading",
      "bullets": ["First bullet", "Second bullet", "Third bullet"],
      "notes": "What the presenter should say.",
      "image_query": "search hint"
    }}
  ]
}}"#,
        topic = request.topic,
        count = request.slide_count,
        language = request.language,
    )
}

/// Render the corrective follow-up sent after a malformed response.
///
/// Quoting the parse error verbatim gives the model a concrete repair
/// target; restating the slide count closes the most common failure
/// (wrong number of slides).
pub fn corrective_prompt(request: &TopicRequest, parse_error: &str) -> String {
    format!(
        r#"Your previous response could not be used: {parse_error}.

Produce the outline again for the topic "{topic}".
Remember: exactly {count} slides, each with a non-empty heading and 3 to 5 bullets.
Return ONLY the JSON object described before — no explanation, no markdown fences."#,
        topic = request.topic,
        count = request.slide_count,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outline_prompt_encodes_topic_count_and_language() {
        let request = TopicRequest::new("Climate Change", 5)
            .unwrap()
            .language("German");
        let prompt = outline_prompt(&request);
        assert!(prompt.contains("\"Climate Change\""));
        assert!(prompt.contains("exactly 5 slides"));
        assert!(prompt.contains("German"));
        assert!(prompt.contains("image_query"));
    }

    #[test]
    fn corrective_prompt_quotes_the_parse_error() {
        let request = TopicRequest::new("Climate Change", 5).unwrap();
        let prompt = corrective_prompt(&request, "expected exactly 5 slides, got 4");
        assert!(prompt.contains("expected exactly 5 slides, got 4"));
        assert!(prompt.contains("exactly 5 slides"));
    }
}
