//! Wire shapes for the bus.
//!
//! Every inbound message is a [`ChallengeEvent`] envelope whose payload varies by topic. The
//! envelope is validated in two stages: serde enforces field presence and types (uuid references,
//! numeric ids, the metadata array), and the payload methods enforce the range checks serde cannot
//! express.
use chrono::Utc;
use resource_engine::{
    db_types::{Challenge, ChallengeId, ChallengeMetadata, ResourceRoleId, UserId},
    events::UserUnregisteredEvent,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const USER_UNREGISTRATION: &str = "USER_UNREGISTRATION";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChallengeEvent {
    pub topic: String,
    #[serde(default)]
    pub originator: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "mimeType", default)]
    pub mime_type: String,
    pub payload: Value,
}

impl ChallengeEvent {
    /// A fresh envelope stamped with this process as the originator, used for requeues.
    pub fn new(topic: &str, originator: &str, mime_type: &str, payload: Value) -> Self {
        Self {
            topic: topic.to_string(),
            originator: originator.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            mime_type: mime_type.to_string(),
            payload,
        }
    }
}

/// The payload carried by creation and deletion messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourcePayload {
    #[serde(rename = "challengeId")]
    pub challenge_id: ChallengeId,
    #[serde(rename = "roleId")]
    pub role_id: ResourceRoleId,
    #[serde(rename = "memberId")]
    pub member_id: i64,
    #[serde(rename = "memberHandle", default, skip_serializing_if = "Option::is_none")]
    pub member_handle: Option<String>,
}

impl ResourcePayload {
    /// Member ids must be positive; zero and negative values are producer bugs, not users.
    pub fn member(&self) -> Result<UserId, String> {
        if self.member_id <= 0 {
            return Err(format!("memberId must be a positive integer, got {}", self.member_id));
        }
        Ok(UserId(self.member_id))
    }
}

/// The payload carried by payment-update messages: the legacy challenge id plus the challenge's
/// metadata entries, from which the reviewer amount is extracted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentUpdatePayload {
    #[serde(rename = "legacyId")]
    pub legacy_id: i64,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "updatedBy", default)]
    pub updated_by: Option<Value>,
    pub metadata: Vec<ChallengeMetadata>,
}

impl PaymentUpdatePayload {
    pub fn as_challenge(&self) -> Challenge {
        Challenge { legacy_id: Some(self.legacy_id), metadata: self.metadata.clone(), ..Challenge::default() }
    }

    /// The operator recorded on reconciled payment rows. `updatedBy` arrives as either a numeric
    /// id or a handle; handles fall back to the system operator (0).
    pub fn operator(&self) -> UserId {
        let id = match &self.updated_by {
            Some(Value::Number(n)) => n.as_i64().unwrap_or(0),
            Some(Value::String(s)) => s.parse::<i64>().unwrap_or(0),
            _ => 0,
        };
        UserId(id)
    }
}

/// The outbound notification published when a submitter unregisters, consumed downstream (e.g. by
/// the search index refresher).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisteredNotice {
    #[serde(rename = "type")]
    pub notice_type: String,
    pub detail: UnregisteredDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnregisteredDetail {
    #[serde(rename = "challengeId")]
    pub challenge_id: ChallengeId,
    #[serde(rename = "userId")]
    pub user_id: UserId,
}

impl From<UserUnregisteredEvent> for UnregisteredNotice {
    fn from(event: UserUnregisteredEvent) -> Self {
        Self {
            notice_type: USER_UNREGISTRATION.to_string(),
            detail: UnregisteredDetail { challenge_id: event.challenge_id, user_id: event.user_id },
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use super::*;

    #[test]
    fn resource_payloads_reject_non_positive_member_ids() {
        let payload = ResourcePayload {
            challenge_id: ChallengeId(uuid::Uuid::new_v4()),
            role_id: ResourceRoleId(uuid::Uuid::new_v4()),
            member_id: -5,
            member_handle: None,
        };
        assert!(payload.member().is_err());
    }

    #[test]
    fn malformed_challenge_references_fail_deserialization() {
        let raw = json!({
            "challengeId": "not-a-uuid",
            "roleId": "732339e7-8e30-49d7-9198-cccf9451e221",
            "memberId": 42,
        });
        assert!(serde_json::from_value::<ResourcePayload>(raw).is_err());
    }

    #[test]
    fn payment_updates_require_a_metadata_array() {
        let raw = json!({ "legacyId": 3001, "updatedBy": "handle" });
        assert!(serde_json::from_value::<PaymentUpdatePayload>(raw).is_err());
        let raw = json!({
            "legacyId": 3001,
            "updatedBy": 88,
            "metadata": [{ "name": "reviewerPayment", "value": 100 }],
        });
        let payload = serde_json::from_value::<PaymentUpdatePayload>(raw).unwrap();
        assert_eq!(payload.operator(), UserId(88));
        assert_eq!(payload.as_challenge().legacy_id, Some(3001));
    }
}
