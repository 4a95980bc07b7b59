//! Relations - directed descriptions of how two stakeholders interact.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::StakeholderId;

/// Unique identifier for relations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RelationId(pub Uuid);

impl RelationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A relation between two stakeholders, e.g. "both are NATO members".
///
/// The text doubles as the topic used to discover background sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relation {
    pub id: RelationId,
    pub text: String,
    #[serde(rename = "stakeholderAId", alias = "stakeholder1Id")]
    pub stakeholder_a: StakeholderId,
    #[serde(rename = "stakeholderBId", alias = "stakeholder2Id")]
    pub stakeholder_b: StakeholderId,
}

impl Relation {
    pub fn new(text: impl Into<String>, stakeholder_a: StakeholderId, stakeholder_b: StakeholderId) -> Self {
        Self {
            id: RelationId::new(),
            text: text.into(),
            stakeholder_a,
            stakeholder_b,
        }
    }

    /// Whether this relation involves the given stakeholder on either side.
    pub fn involves(&self, stakeholder: StakeholderId) -> bool {
        self.stakeholder_a == stakeholder || self.stakeholder_b == stakeholder
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_involves() {
        let uk = StakeholderId::new();
        let france = StakeholderId::new();
        let relation = Relation::new("both in NATO", uk, france);

        assert!(relation.involves(uk));
        assert!(relation.involves(france));
        assert!(!relation.involves(StakeholderId::new()));
    }

    #[test]
    fn test_accepts_numbered_field_names() {
        let a = StakeholderId::new();
        let b = StakeholderId::new();
        let json = serde_json::json!({
            "id": RelationId::new(),
            "text": "trade partners",
            "stakeholder1Id": a,
            "stakeholder2Id": b,
        });

        let relation: Relation = serde_json::from_value(json).unwrap();
        assert_eq!(relation.stakeholder_a, a);
        assert_eq!(relation.stakeholder_b, b);
    }
}
