//! Generation Orchestrator - expands one event of the graph.
//!
//! An expansion resolves the path to the target, retrieves background context,
//! renders the prompt, asks the model for the next events and, when the reply
//! parses, commits them as children of the target. See [`ExpansionStage`].

mod parse;
mod stage;

pub use parse::*;
pub use stage::*;

use std::sync::Arc;

use event_graph::{EventGraph, EventId};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::ForesightConfig;
use crate::context_assembler::{ActingStakeholder, ContextAssembler, GenerationRequest, PromptTemplate};
use crate::error::{ForesightError, ForesightResult};
use crate::graph_handle::SharedEventGraph;
use crate::llm::LanguageModel;
use crate::retrieval::RetrievalService;
use crate::retry::RetryPolicy;

/// What to expand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpansionRequest {
    pub target: EventId,
    /// Retrieval query. Defaults to the target event's text.
    #[serde(default)]
    pub topic: Option<String>,
    /// Generate options for this stakeholder instead of one event per stakeholder.
    #[serde(default)]
    pub acting: Option<ActingStakeholder>,
}

impl ExpansionRequest {
    pub fn new(target: EventId) -> Self {
        Self {
            target,
            topic: None,
            acting: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    pub fn with_acting_stakeholder(mut self, acting: ActingStakeholder) -> Self {
        self.acting = Some(acting);
        self
    }
}

impl From<EventId> for ExpansionRequest {
    fn from(target: EventId) -> Self {
        Self::new(target)
    }
}

/// A committed expansion.
#[derive(Debug, Clone)]
pub struct ExpansionOutcome {
    /// IDs of the new children, in the order the model listed them.
    pub new_ids: Vec<EventId>,
    /// The graph with the children attached.
    pub graph: Arc<EventGraph>,
    /// The parsed events behind `new_ids`, with any explanation the model gave.
    pub generated: Vec<GeneratedEvent>,
}

/// Drives expansions through the stages in [`ExpansionStage`].
pub struct Orchestrator {
    model: Arc<dyn LanguageModel>,
    retrieval: Arc<RetrievalService>,
    template: Arc<dyn PromptTemplate>,
    assembler: ContextAssembler,
    retry: RetryPolicy,
    score_range: (f64, f64),
}

impl Orchestrator {
    pub fn new(
        model: Arc<dyn LanguageModel>,
        retrieval: Arc<RetrievalService>,
        template: Arc<dyn PromptTemplate>,
    ) -> Self {
        Self::from_config(&ForesightConfig::default(), model, retrieval, template)
    }

    pub fn from_config(
        config: &ForesightConfig,
        model: Arc<dyn LanguageModel>,
        retrieval: Arc<RetrievalService>,
        template: Arc<dyn PromptTemplate>,
    ) -> Self {
        Self {
            model,
            retrieval,
            template,
            assembler: ContextAssembler::from_config(&config.generation),
            retry: config.retry.policy(),
            score_range: (config.generation.score_min, config.generation.score_max),
        }
    }

    pub fn with_assembler(mut self, assembler: ContextAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    /// Policy for the model call. Nothing else is retried.
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_score_range(mut self, min: f64, max: f64) -> Self {
        self.score_range = (min, max);
        self
    }

    /// Expand `request.target` in `graph`, returning the updated graph.
    ///
    /// `graph` itself is left untouched.
    pub async fn expand_event(
        &self,
        graph: &EventGraph,
        request: impl Into<ExpansionRequest>,
    ) -> ForesightResult<ExpansionOutcome> {
        let request = request.into();
        let result = async {
            let generated = self.generate(graph, &request).await?;
            let before = graph.total_events();
            let updated = graph.add_children(request.target, generated.iter().cloned())?;
            let new_ids = (before + 1..=updated.total_events()).map(EventId).collect();
            Ok::<_, ForesightError>(ExpansionOutcome {
                new_ids,
                graph: Arc::new(updated),
                generated,
            })
        }
        .await;
        self.finish(&request, result)
    }

    /// Expand against a shared graph.
    ///
    /// Generation works on a snapshot, so other expansions proceed meanwhile;
    /// only the final insertion takes the write lock.
    pub async fn expand_shared(
        &self,
        graph: &SharedEventGraph,
        request: impl Into<ExpansionRequest>,
    ) -> ForesightResult<ExpansionOutcome> {
        let request = request.into();
        let result = async {
            let snapshot = graph.snapshot().await;
            let generated = self.generate(&snapshot, &request).await?;
            let (new_ids, graph) = graph.add_children(request.target, generated.iter().cloned()).await?;
            Ok::<_, ForesightError>(ExpansionOutcome {
                new_ids,
                graph,
                generated,
            })
        }
        .await;
        self.finish(&request, result)
    }

    /// Build the generation request without calling the model.
    pub async fn prepare(&self, graph: &EventGraph, request: &ExpansionRequest) -> ForesightResult<GenerationRequest> {
        let target = request.target;
        let path = graph.find_path(target)?;
        log_stage(target, ExpansionStage::PathResolved);

        let query = request
            .topic
            .as_deref()
            .or_else(|| path.leaf_text())
            .unwrap_or_default();
        let context = match self.retrieval.query(query).await {
            Ok(chunks) => chunks,
            Err(e) => {
                warn!(event_id = %target, error = %e, "retrieval failed, expanding without context");
                Vec::new()
            }
        };
        log_stage(target, ExpansionStage::ContextRetrieved);

        Ok(self
            .assembler
            .assemble_for(graph, target, context, request.acting.clone())?)
    }

    /// Events for `request`, parsed but not yet attached.
    async fn generate(&self, graph: &EventGraph, request: &ExpansionRequest) -> ForesightResult<Vec<GeneratedEvent>> {
        let target = request.target;
        log_stage(target, ExpansionStage::Start);

        let generation = self.prepare(graph, request).await?;
        let template = self.template.load().await?;
        let prompt = generation.to_prompt_string(&template);
        log_stage(target, ExpansionStage::PromptBuilt);

        let raw = self
            .retry
            .run("model", || self.model.complete(&prompt))
            .await
            .map_err(|e| ForesightError::from_exhausted("model", e))?;
        log_stage(target, ExpansionStage::ModelInvoked);

        let (min, max) = self.score_range;
        ResponseParser::new(generation.expected_events)
            .with_score_range(min, max)
            .parse(&raw)
            .map_err(|reason| ForesightError::GenerationParse {
                target: Some(target),
                reason,
                raw_response: raw.clone(),
            })
    }

    fn finish(
        &self,
        request: &ExpansionRequest,
        result: ForesightResult<ExpansionOutcome>,
    ) -> ForesightResult<ExpansionOutcome> {
        match &result {
            Ok(outcome) => {
                log_stage(request.target, ExpansionStage::Committed);
                info!(
                    event_id = %request.target,
                    model = self.model.name(),
                    added = outcome.new_ids.len(),
                    total = outcome.graph.total_events(),
                    "expansion committed"
                );
            }
            Err(e) => {
                warn!(event_id = %request.target, stage = %ExpansionStage::Failed, error = %e, "expansion failed");
            }
        }
        result
    }
}

fn log_stage(target: EventId, stage: ExpansionStage) {
    debug!(event_id = %target, stage = %stage, "expansion stage");
}
