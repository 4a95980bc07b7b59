//! Stakeholders and the relations between them.

mod relation;

pub use relation::*;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for stakeholders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StakeholderId(pub Uuid);

impl StakeholderId {
    /// Create a new random stakeholder ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl Default for StakeholderId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for StakeholderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An actor whose decisions shape the scenario.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stakeholder {
    pub id: StakeholderId,
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub interests: Vec<String>,
}

impl Stakeholder {
    /// Create a stakeholder with the given name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: StakeholderId::new(),
            name: name.into(),
            role: None,
            interests: Vec::new(),
        }
    }

    pub fn with_id(mut self, id: StakeholderId) -> Self {
        self.id = id;
        self
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    pub fn with_interest(mut self, interest: impl Into<String>) -> Self {
        self.interests.push(interest.into());
        self
    }

    pub fn with_interests(mut self, interests: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.interests.extend(interests.into_iter().map(Into::into));
        self
    }

    /// Metadata facts describing this stakeholder, role first.
    pub fn facts(&self) -> Vec<String> {
        let mut facts = Vec::with_capacity(self.interests.len() + 1);
        if let Some(role) = &self.role {
            facts.push(format!("Role: {role}"));
        }
        facts.extend(self.interests.iter().map(|i| format!("Interest: {i}")));
        facts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facts_order() {
        let stakeholder = Stakeholder::new("Germany")
            .with_role("EU energy importer")
            .with_interests(["Energy security", "Industrial output"]);

        assert_eq!(
            stakeholder.facts(),
            vec![
                "Role: EU energy importer",
                "Interest: Energy security",
                "Interest: Industrial output",
            ]
        );
    }

    #[test]
    fn test_facts_without_role() {
        assert!(Stakeholder::new("Nobody").facts().is_empty());
    }
}
