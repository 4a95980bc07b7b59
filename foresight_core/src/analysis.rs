//! Scenario analysis - turns a free-text scenario into the starting graph.
//!
//! The analyst asks the language model for a structured overview of the
//! scenario (title, summary, stakeholder profiles) and then for the relations
//! between those stakeholders. Relations feed ingestion, the overview seeds
//! the [`EventGraph`].

use std::sync::Arc;

use event_graph::{EventGraph, GraphResult, Relation, Stakeholder};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::ForesightConfig;
use crate::error::{ForesightError, ForesightResult};
use crate::llm::LanguageModel;
use crate::orchestrator::strip_code_fence;
use crate::retry::RetryPolicy;

const OVERVIEW_PREFILL: &str = "{";
const RELATIONS_PREFILL: &str = "[";

/// A stakeholder as described by the model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StakeholderProfile {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl StakeholderProfile {
    /// A graph stakeholder with a fresh ID.
    pub fn to_stakeholder(&self) -> Stakeholder {
        Stakeholder::new(self.name.clone())
            .with_role(self.role.clone())
            .with_interests(self.interests.iter().cloned())
    }
}

/// Structured reading of a scenario prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScenarioOverview {
    pub title: String,
    pub overview: String,
    pub stakeholders: Vec<StakeholderProfile>,
}

impl ScenarioOverview {
    /// Stakeholders with fresh IDs, in profile order.
    pub fn stakeholders(&self) -> Vec<Stakeholder> {
        self.stakeholders.iter().map(StakeholderProfile::to_stakeholder).collect()
    }

    /// A graph rooted at `root_event` (score 0) holding every profiled stakeholder.
    ///
    /// Each stakeholder's metadata lists its role followed by its interests.
    pub fn into_graph(&self, root_event: impl Into<String>) -> GraphResult<EventGraph> {
        EventGraph::new(root_event, 0.0).with_stakeholder_profiles(&self.stakeholders())
    }

    fn check(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("empty title".to_string());
        }
        if self.stakeholders.is_empty() {
            return Err("no stakeholders".to_string());
        }
        for (i, profile) in self.stakeholders.iter().enumerate() {
            if profile.name.trim().is_empty() {
                return Err(format!("stakeholder {i}: empty name"));
            }
            if self.stakeholders[..i].iter().any(|p| p.name == profile.name) {
                return Err(format!("stakeholder {i}: duplicate name {:?}", profile.name));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RelationDraft {
    #[serde(rename = "stakeholder1Id")]
    stakeholder_1: String,
    #[serde(rename = "stakeholder2Id")]
    stakeholder_2: String,
    description: String,
}

/// Asks the model to describe a scenario and its stakeholder relations.
pub struct ScenarioAnalyst {
    model: Arc<dyn LanguageModel>,
    retry: RetryPolicy,
}

impl ScenarioAnalyst {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self::from_config(&ForesightConfig::default(), model)
    }

    pub fn from_config(config: &ForesightConfig, model: Arc<dyn LanguageModel>) -> Self {
        Self {
            model,
            retry: config.retry.policy(),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub async fn analyze_scenario(&self, prompt: &str) -> ForesightResult<ScenarioOverview> {
        let raw = self.ask(&overview_prompt(prompt), OVERVIEW_PREFILL).await?;
        let overview: ScenarioOverview = serde_json::from_str(strip_code_fence(&raw))
            .map_err(|e| e.to_string())
            .and_then(|overview: ScenarioOverview| overview.check().map(|_| overview))
            .map_err(|reason| parse_error(reason, &raw))?;

        info!(
            title = %overview.title,
            stakeholders = overview.stakeholders.len(),
            "scenario analyzed"
        );
        Ok(overview)
    }

    /// Relations between `stakeholders`, whose IDs the model must refer back to.
    ///
    /// A reference may be a stakeholder's ID or, ignoring case, its name.
    pub async fn analyze_relationships(
        &self,
        overview: &ScenarioOverview,
        stakeholders: &[Stakeholder],
    ) -> ForesightResult<Vec<Relation>> {
        let raw = self
            .ask(&relationships_prompt(overview, stakeholders), RELATIONS_PREFILL)
            .await?;
        let drafts: Vec<RelationDraft> = serde_json::from_str(strip_code_fence(&raw))
            .map_err(|e| parse_error(format!("not a relation array: {e}"), &raw))?;

        let relations = drafts
            .into_iter()
            .enumerate()
            .map(|(i, draft)| to_relation(i, draft, stakeholders))
            .collect::<Result<Vec<_>, String>>()
            .map_err(|reason| parse_error(reason, &raw))?;

        info!(relations = relations.len(), "relationships analyzed");
        Ok(relations)
    }

    async fn ask(&self, prompt: &str, prefill: &str) -> ForesightResult<String> {
        debug!(model = self.model.name(), prompt_len = prompt.len(), "analysis request");
        self.retry
            .run("model", || self.model.complete_prefilled(prompt, prefill))
            .await
            .map_err(|e| ForesightError::from_exhausted("model", e))
    }
}

fn to_relation(index: usize, draft: RelationDraft, stakeholders: &[Stakeholder]) -> Result<Relation, String> {
    let description = draft.description.trim();
    if description.is_empty() {
        return Err(format!("relation {index}: empty description"));
    }
    let a = resolve(&draft.stakeholder_1, stakeholders)
        .ok_or_else(|| format!("relation {index}: unknown stakeholder {:?}", draft.stakeholder_1))?;
    let b = resolve(&draft.stakeholder_2, stakeholders)
        .ok_or_else(|| format!("relation {index}: unknown stakeholder {:?}", draft.stakeholder_2))?;
    if a.id == b.id {
        return Err(format!("relation {index}: {} relates to itself", a.name));
    }
    Ok(Relation::new(description, a.id, b.id))
}

fn resolve<'a>(reference: &str, stakeholders: &'a [Stakeholder]) -> Option<&'a Stakeholder> {
    let reference = reference.trim();
    stakeholders
        .iter()
        .find(|s| s.id.to_string() == reference)
        .or_else(|| stakeholders.iter().find(|s| s.name.eq_ignore_ascii_case(reference)))
}

fn parse_error(reason: impl Into<String>, raw: &str) -> ForesightError {
    ForesightError::GenerationParse {
        target: None,
        reason: reason.into(),
        raw_response: raw.to_string(),
    }
}

fn overview_prompt(scenario: &str) -> String {
    format!(
        "Analyze the following scenario and identify the stakeholders whose decisions shape it.\n\n\
         Scenario:\n{scenario}\n\n\
         Respond with only a JSON object of the form \
         {{\"title\": string, \"overview\": string, \"stakeholders\": \
         [{{\"name\": string, \"role\": string, \"interests\": [string]}}]}}."
    )
}

fn relationships_prompt(overview: &ScenarioOverview, stakeholders: &[Stakeholder]) -> String {
    let listing: Vec<String> = stakeholders
        .iter()
        .map(|s| match &s.role {
            Some(role) => format!("- {} (id {}): {role}", s.name, s.id),
            None => format!("- {} (id {})", s.name, s.id),
        })
        .collect();
    format!(
        "Scenario: {}\n{}\n\nStakeholders:\n{}\n\n\
         Describe the relationships between these stakeholders that shape their decisions.\n\
         Respond with only a JSON array of the form \
         [{{\"stakeholder1Id\": id, \"stakeholder2Id\": id, \"description\": string}}].",
        overview.title,
        overview.overview,
        listing.join("\n")
    )
}
