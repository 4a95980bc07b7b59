//! Context Assembler - Builds the generation request for one expansion.
//!
//! The assembly works as follows:
//! 1. **Path**: Walk from the root to the target event
//! 2. **Stakeholders**: Copy the stakeholder list and their facts from the graph
//! 3. **Focus**: Optionally narrow the request to one acting stakeholder and its relations
//! 4. **Context**: Attach the chunks retrieved for the expansion
//! 5. **Rendering**: Substitute everything into a prompt template

mod template;

pub use template::*;

use event_graph::{EventGraph, EventId, GraphResult, Relation, ScoreAggregation, Stakeholder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::config::{EventCount, GenerationConfig};
use crate::knowledge_base::RetrievedChunk;

/// The stakeholder whose options an expansion generates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActingStakeholder {
    pub profile: Stakeholder,
    /// Relations involving `profile`, in the order given.
    pub relations: Vec<Relation>,
}

impl ActingStakeholder {
    /// Keeps only the relations that involve `profile`.
    pub fn new(profile: Stakeholder, relations: impl IntoIterator<Item = Relation>) -> Self {
        let relations = relations
            .into_iter()
            .filter(|relation| relation.involves(profile.id))
            .collect();
        Self { profile, relations }
    }

    pub fn name(&self) -> &str {
        &self.profile.name
    }
}

/// Everything the model is told about one expansion. Built fresh per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Event being expanded.
    pub target: EventId,

    /// Event texts from the root to the target, inclusive.
    pub ancestor_event_path: Vec<String>,

    /// Evaluation scores along the same path.
    pub ancestor_evaluation_path: Vec<f64>,

    pub stakeholders: Vec<String>,

    pub stakeholder_metadata: BTreeMap<String, Vec<String>>,

    pub retrieved_context: Vec<RetrievedChunk>,

    /// Aggregate of the evaluation path.
    pub path_score: f64,

    /// Number of events the model must return.
    pub expected_events: usize,

    /// Set when the expansion generates options for a single stakeholder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acting_stakeholder: Option<ActingStakeholder>,
}

impl GenerationRequest {
    /// Stakeholder names joined with commas.
    pub fn stakeholders_slot(&self) -> String {
        self.stakeholders.join(", ")
    }

    /// Facts grouped under each stakeholder, in stakeholder order.
    ///
    /// Metadata for names missing from the stakeholder list follows, sorted by name.
    pub fn metadata_slot(&self) -> String {
        let listed = self.stakeholders.iter().map(String::as_str);
        let unlisted = self
            .stakeholder_metadata
            .keys()
            .map(String::as_str)
            .filter(|name| !self.stakeholders.iter().any(|s| s == name));

        let mut sections = Vec::new();
        for name in listed.chain(unlisted) {
            let Some(facts) = self.stakeholder_metadata.get(name) else {
                continue;
            };
            if facts.is_empty() {
                continue;
            }
            let mut section = format!("{name}:");
            for fact in facts {
                section.push_str("\n- ");
                section.push_str(fact);
            }
            sections.push(section);
        }
        sections.join("\n")
    }

    /// One bulleted line per ancestor event.
    pub fn events_slot(&self) -> String {
        self.ancestor_event_path
            .iter()
            .map(|event| format!("- {event}"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Evaluation scores joined with commas.
    pub fn evs_slot(&self) -> String {
        self.ancestor_evaluation_path
            .iter()
            .map(|score| format_score(*score))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Retrieved chunk texts separated by blank lines.
    pub fn context_slot(&self) -> String {
        self.retrieved_context
            .iter()
            .map(|chunk| chunk.text.trim())
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// What the model is asked to produce.
    ///
    /// Without an acting stakeholder this asks for one event per stakeholder.
    /// Otherwise it describes the actor, its role, interests and relations, and
    /// asks for distinct options open to it.
    pub fn focus_slot(&self) -> String {
        let Some(actor) = &self.acting_stakeholder else {
            return "For each stakeholder, predict the single most likely next event \
                    that follows the most recent one."
                .to_string();
        };

        let name = actor.name();
        let mut lines = vec![format!("Acting stakeholder: {name}")];
        if let Some(role) = &actor.profile.role {
            lines.push(format!("Role: {role}"));
        }
        if !actor.profile.interests.is_empty() {
            lines.push(format!("Interests: {}", actor.profile.interests.join(", ")));
        }
        if !actor.relations.is_empty() {
            lines.push(format!("Relationships involving {name}:"));
            lines.extend(actor.relations.iter().map(|r| format!("- {}", r.text.trim())));
        }
        lines.push(format!(
            "Generate {} significantly different strategic options for {name}. Each must be \
             a realistic next action that responds to the events so far and serves {name}'s interests.",
            self.expected_events
        ));
        lines.join("\n")
    }

    /// Render `template` with this request's slots.
    pub fn to_prompt_string(&self, template: &str) -> String {
        let stakeholders = self.stakeholders_slot();
        let metadata = self.metadata_slot();
        let events = self.events_slot();
        let evs = self.evs_slot();
        let context = self.context_slot();
        let path_score = format_score(self.path_score);
        let count = self.expected_events.to_string();
        let focus = self.focus_slot();
        let actor = self
            .acting_stakeholder
            .as_ref()
            .map(|a| a.name().to_string())
            .unwrap_or_default();

        render_template(
            template,
            &[
                ("stakeholders", &stakeholders),
                ("metadata", &metadata),
                ("events", &events),
                ("evs", &evs),
                ("context", &context),
                ("path_score", &path_score),
                ("count", &count),
                ("focus", &focus),
                ("actor", &actor),
            ],
        )
    }
}

/// Scores print with at least one decimal so `1` reads as a score, not a count.
fn format_score(score: f64) -> String {
    if score.fract() == 0.0 && score.is_finite() {
        format!("{score:.1}")
    } else {
        score.to_string()
    }
}

/// Builds [`GenerationRequest`]s from a graph snapshot.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    scoring: ScoreAggregation,
    event_count: EventCount,
    options_per_stakeholder: usize,
}

impl Default for ContextAssembler {
    fn default() -> Self {
        Self::from_config(&GenerationConfig::default())
    }
}

impl ContextAssembler {
    pub fn new(scoring: ScoreAggregation, event_count: EventCount) -> Self {
        Self {
            scoring,
            event_count,
            options_per_stakeholder: GenerationConfig::default().options_per_stakeholder,
        }
    }

    pub fn from_config(config: &GenerationConfig) -> Self {
        Self::new(config.path_scoring, config.events_per_expansion)
            .with_options_per_stakeholder(config.options_per_stakeholder)
    }

    /// Options requested when expanding for one acting stakeholder. Never below 1.
    pub fn with_options_per_stakeholder(mut self, options: usize) -> Self {
        self.options_per_stakeholder = options.max(1);
        self
    }

    /// Number of events an expansion of `graph` must produce.
    pub fn expected_events(&self, graph: &EventGraph) -> usize {
        self.event_count.resolve(graph.stakeholders().len())
    }

    /// Fails with `NotFound` when `target` is not in the graph.
    pub fn assemble(
        &self,
        graph: &EventGraph,
        target: EventId,
        retrieved_context: Vec<RetrievedChunk>,
    ) -> GraphResult<GenerationRequest> {
        self.assemble_for(graph, target, retrieved_context, None)
    }

    /// Like [`assemble`](Self::assemble), optionally focused on one stakeholder.
    ///
    /// With an actor the request asks for `options_per_stakeholder` events
    /// instead of the configured event count.
    pub fn assemble_for(
        &self,
        graph: &EventGraph,
        target: EventId,
        retrieved_context: Vec<RetrievedChunk>,
        acting_stakeholder: Option<ActingStakeholder>,
    ) -> GraphResult<GenerationRequest> {
        let path = graph.find_path(target)?;
        let path_score = self.scoring.aggregate(&path.evaluations);
        let expected_events = match acting_stakeholder {
            Some(_) => self.options_per_stakeholder,
            None => self.expected_events(graph),
        };

        Ok(GenerationRequest {
            target,
            ancestor_event_path: path.events,
            ancestor_evaluation_path: path.evaluations,
            stakeholders: graph.stakeholders().to_vec(),
            stakeholder_metadata: graph.stakeholder_metadata().clone(),
            retrieved_context,
            path_score,
            expected_events,
            acting_stakeholder,
        })
    }
}
