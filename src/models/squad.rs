use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

pub type RelationshipId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationshipStatus {
    Pending,
    Accepted,
    Rejected,
}

/// Directed friend-request edge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SquadRelationship {
    pub id: RelationshipId,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub status: RelationshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SquadRelationship {
    pub fn involves(&self, user: Uuid) -> bool {
        self.requester_id == user || self.recipient_id == user
    }

    /// The party that is not `user`, if `user` is on this edge.
    pub fn other_party(&self, user: Uuid) -> Option<Uuid> {
        if self.requester_id == user {
            Some(self.recipient_id)
        } else if self.recipient_id == user {
            Some(self.requester_id)
        } else {
            None
        }
    }
}

/// `squad_relationships` row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SquadRelationshipRow {
    pub id: RelationshipId,
    pub requester_id: Uuid,
    pub recipient_id: Uuid,
    pub status: RelationshipStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SquadRelationshipRow> for SquadRelationship {
    fn from(row: SquadRelationshipRow) -> Self {
        SquadRelationship {
            id: row.id,
            requester_id: row.requester_id,
            recipient_id: row.recipient_id,
            status: row.status,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Everyone `me` shares an accepted edge with, in either direction.
pub fn accepted_members(me: Uuid, relationships: &[SquadRelationship]) -> BTreeSet<Uuid> {
    relationships
        .iter()
        .filter(|rel| rel.status == RelationshipStatus::Accepted)
        .filter_map(|rel| rel.other_party(me))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(from: Uuid, to: Uuid, status: RelationshipStatus) -> SquadRelationship {
        let now = Utc::now();
        SquadRelationship {
            id: Uuid::new_v4(),
            requester_id: from,
            recipient_id: to,
            status,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn accepted_edges_count_both_ways() {
        let (a, b, c, d) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let rels = vec![
            edge(a, b, RelationshipStatus::Accepted),
            edge(c, a, RelationshipStatus::Accepted),
            edge(a, d, RelationshipStatus::Pending),
            edge(d, a, RelationshipStatus::Rejected),
        ];

        let members = accepted_members(a, &rels);
        assert_eq!(members, BTreeSet::from([b, c]));
        assert_eq!(accepted_members(b, &rels), BTreeSet::from([a]));
    }

    #[test]
    fn status_is_lowercase_on_the_wire() {
        let value = serde_json::to_value(RelationshipStatus::Accepted).unwrap();
        assert_eq!(value, "accepted");
    }
}
