use serde::{Deserialize, Serialize};

/// Progress of a single expansion.
///
/// `Start → PathResolved → ContextRetrieved → PromptBuilt → ModelInvoked`, ending
/// in `Committed` or, from any earlier stage, `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpansionStage {
    Start,
    PathResolved,
    ContextRetrieved,
    PromptBuilt,
    ModelInvoked,
    Committed,
    Failed,
}

impl ExpansionStage {
    pub fn is_terminal(self) -> bool {
        matches!(self, ExpansionStage::Committed | ExpansionStage::Failed)
    }

    /// The stage reached on success, `None` once terminal.
    pub fn next(self) -> Option<ExpansionStage> {
        match self {
            ExpansionStage::Start => Some(ExpansionStage::PathResolved),
            ExpansionStage::PathResolved => Some(ExpansionStage::ContextRetrieved),
            ExpansionStage::ContextRetrieved => Some(ExpansionStage::PromptBuilt),
            ExpansionStage::PromptBuilt => Some(ExpansionStage::ModelInvoked),
            ExpansionStage::ModelInvoked => Some(ExpansionStage::Committed),
            ExpansionStage::Committed | ExpansionStage::Failed => None,
        }
    }
}

impl std::fmt::Display for ExpansionStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ExpansionStage::Start => "START",
            ExpansionStage::PathResolved => "PATH_RESOLVED",
            ExpansionStage::ContextRetrieved => "CONTEXT_RETRIEVED",
            ExpansionStage::PromptBuilt => "PROMPT_BUILT",
            ExpansionStage::ModelInvoked => "MODEL_INVOKED",
            ExpansionStage::Committed => "COMMITTED",
            ExpansionStage::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_order() {
        let mut stage = ExpansionStage::Start;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            stage = next;
            seen.push(stage);
        }
        assert_eq!(
            seen.iter().map(ToString::to_string).collect::<Vec<_>>(),
            vec!["START", "PATH_RESOLVED", "CONTEXT_RETRIEVED", "PROMPT_BUILT", "MODEL_INVOKED", "COMMITTED"]
        );
        assert!(stage.is_terminal());
        assert!(ExpansionStage::Failed.is_terminal());
        assert!(!ExpansionStage::PromptBuilt.is_terminal());
    }

    #[test]
    fn test_serde_names_match_display() {
        let json = serde_json::to_string(&ExpansionStage::ContextRetrieved).unwrap();
        assert_eq!(json, "\"CONTEXT_RETRIEVED\"");
    }
}
