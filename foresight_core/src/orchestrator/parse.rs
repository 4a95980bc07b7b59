//! Strict decoding of model output into new events.

use event_graph::NewEvent;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A validated event from a model reply.
///
/// Only `text` and `score` enter the graph; the optional fields explain an
/// acting stakeholder's option and are returned to the caller as-is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedEvent {
    pub text: String,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implications: Option<String>,
}

impl GeneratedEvent {
    pub fn new(text: impl Into<String>, score: f64) -> Self {
        Self {
            text: text.into(),
            score,
            description: None,
            reasoning: None,
            implications: None,
        }
    }

    pub fn with_reasoning(mut self, reasoning: impl Into<String>) -> Self {
        self.reasoning = Some(reasoning.into());
        self
    }

    pub fn with_implications(mut self, implications: impl Into<String>) -> Self {
        self.implications = Some(implications.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

impl From<GeneratedEvent> for NewEvent {
    fn from(event: GeneratedEvent) -> Self {
        NewEvent::new(event.text, event.score)
    }
}

/// One generated event as the model may spell it.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawEvent {
    Object(EventObject),
    Pair(String, f64),
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct EventObject {
    #[serde(alias = "event", alias = "eventText", alias = "name")]
    text: String,
    #[serde(alias = "evaluationScore", alias = "satisfaction")]
    score: f64,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    reasoning: Option<String>,
    #[serde(default)]
    implications: Option<String>,
}

/// Trimmed text, or `None` when nothing is left.
fn non_empty(text: Option<String>) -> Option<String> {
    text.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())
}

/// Accepts exactly `expected` events with non-empty text and a finite score in range.
///
/// The reply must be a JSON array whose elements are `{"text": .., "score": ..}`
/// objects or `["text", score]` pairs. Objects may add `description`,
/// `reasoning` and `implications` strings; any other key is rejected. A surrounding Markdown code fence is
/// tolerated; anything else, including text after the array, is rejected.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResponseParser {
    expected: usize,
    score_min: f64,
    score_max: f64,
}

impl ResponseParser {
    pub fn new(expected: usize) -> Self {
        Self {
            expected,
            score_min: -1.0,
            score_max: 1.0,
        }
    }

    pub fn with_score_range(mut self, min: f64, max: f64) -> Self {
        self.score_min = min;
        self.score_max = max;
        self
    }

    /// On failure returns the reason, for the caller to wrap with the raw text.
    pub fn parse(&self, raw: &str) -> Result<Vec<GeneratedEvent>, String> {
        let body = strip_code_fence(raw);
        let elements: Vec<Value> =
            serde_json::from_str(body).map_err(|e| format!("not a JSON array: {e}"))?;

        if elements.len() != self.expected {
            return Err(format!(
                "expected {} events, got {}",
                self.expected,
                elements.len()
            ));
        }

        elements
            .into_iter()
            .enumerate()
            .map(|(i, element)| self.decode(i, element))
            .collect()
    }

    fn decode(&self, index: usize, element: Value) -> Result<GeneratedEvent, String> {
        let raw: RawEvent = serde_json::from_value(element).map_err(|_| {
            format!("event {index}: expected {{\"text\", \"score\"}} object or [text, score] pair")
        })?;
        let mut event = match raw {
            RawEvent::Object(object) => GeneratedEvent {
                text: object.text,
                score: object.score,
                description: non_empty(object.description),
                reasoning: non_empty(object.reasoning),
                implications: non_empty(object.implications),
            },
            RawEvent::Pair(text, score) => GeneratedEvent::new(text, score),
        };

        event.text = event.text.trim().to_string();
        if event.text.is_empty() {
            return Err(format!("event {index}: empty text"));
        }
        let score = event.score;
        if !score.is_finite() || score < self.score_min || score > self.score_max {
            return Err(format!(
                "event {index}: score {score} outside [{}, {}]",
                self.score_min, self.score_max
            ));
        }
        Ok(event)
    }
}

/// Body of a ```` ``` ```` fenced block, or the trimmed input when there is none.
pub(crate) fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(fenced) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = fenced.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string, e.g. `json`.
    match body.find('\n') {
        Some(newline) => body[newline + 1..].trim(),
        None => body.trim(),
    }
}
