//! Prompt templates and slot substitution.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;

use crate::config::GenerationConfig;
use crate::error::{ForesightError, ForesightResult};

/// Template used when none is configured.
pub const DEFAULT_TEMPLATE: &str = "\
You are forecasting how a geopolitical scenario unfolds.

Stakeholders: {stakeholders}

What is known about each stakeholder:
{metadata}

Events so far, from the first to the most recent:
{events}

Evaluation score of each of those events, in the same order: {evs}

Background material:
{context}

{focus}

Score each event from -1 (very bad outcome) to 1 (very good outcome). \
Produce exactly {count} events.

Respond with only a JSON array of objects of the form \
{\"text\": \"<event>\", \"score\": <number>} and nothing else. Objects may also carry \
\"description\", \"reasoning\" and \"implications\" strings.";

/// Source of the raw template text.
#[async_trait]
pub trait PromptTemplate: Send + Sync {
    /// Template text with `{slot}` placeholders. Fails with `TemplateMissing`.
    async fn load(&self) -> ForesightResult<String>;

    /// For error messages and logs.
    fn source_name(&self) -> String;
}

#[async_trait]
impl<T: PromptTemplate + ?Sized> PromptTemplate for Arc<T> {
    async fn load(&self) -> ForesightResult<String> {
        (**self).load().await
    }

    fn source_name(&self) -> String {
        (**self).source_name()
    }
}

/// Template read from disk on every load, so edits apply to the next expansion.
#[derive(Debug, Clone)]
pub struct FilePromptTemplate {
    path: PathBuf,
}

impl FilePromptTemplate {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl PromptTemplate for FilePromptTemplate {
    async fn load(&self) -> ForesightResult<String> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| ForesightError::TemplateMissing {
                source_name: self.source_name(),
                reason: e.to_string(),
            })?;
        if text.trim().is_empty() {
            return Err(ForesightError::TemplateMissing {
                source_name: self.source_name(),
                reason: "file is empty".to_string(),
            });
        }
        Ok(text)
    }

    fn source_name(&self) -> String {
        self.path.display().to_string()
    }
}

/// Template held in memory.
#[derive(Debug, Clone)]
pub struct StaticPromptTemplate {
    text: String,
}

impl Default for StaticPromptTemplate {
    fn default() -> Self {
        Self::new(DEFAULT_TEMPLATE)
    }
}

impl StaticPromptTemplate {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

#[async_trait]
impl PromptTemplate for StaticPromptTemplate {
    async fn load(&self) -> ForesightResult<String> {
        if self.text.trim().is_empty() {
            return Err(ForesightError::TemplateMissing {
                source_name: self.source_name(),
                reason: "template is empty".to_string(),
            });
        }
        Ok(self.text.clone())
    }

    fn source_name(&self) -> String {
        "<static>".to_string()
    }
}

/// The configured template file, or the built-in template when none is set.
pub fn template_for(config: &GenerationConfig) -> Arc<dyn PromptTemplate> {
    match &config.template_path {
        Some(path) => Arc::new(FilePromptTemplate::new(path.clone())),
        None => Arc::new(StaticPromptTemplate::default()),
    }
}

/// Replace every `{name}` whose name is a known slot.
///
/// One pass over the template: substituted values are never scanned again, so a
/// value containing `{events}` stays literal. Unknown placeholders and stray
/// braces are copied through.
pub fn render_template(template: &str, slots: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let substitution = after.find('}').and_then(|close| {
            let name = &after[..close];
            slots
                .iter()
                .find(|(slot, _)| *slot == name)
                .map(|(_, value)| (close, *value))
        });
        match substitution {
            Some((close, value)) => {
                out.push_str(value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}
