//! Tag assignment, swap and availability events.

use serde::{Deserialize, Serialize};

/// One user/tag pair inside a batch assignment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagAssignmentInfo {
    pub user_id: String,
    pub tag_number: u32,
}

/// `tag.assign.requested` (chat) and `tag.assignment.requested` (backend)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagAssignmentRequestedPayload {
    pub guild_id: String,
    pub user_id: String,
    pub tag_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requesting_user_id: Option<String>,
    /// Caller-chosen identity for this update, opaque to the bot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// `tag.assigned`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagAssignedPayload {
    pub guild_id: String,
    pub user_id: String,
    pub tag_number: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assignment_id: Option<String>,
}

/// `tag.assignment.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagAssignmentFailedPayload {
    pub guild_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_number: Option<u32>,
    pub reason: String,
}

/// `batch.tag.assignment.requested`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchTagAssignmentRequestedPayload {
    pub guild_id: String,
    /// UUID
    pub batch_id: String,
    pub requesting_user_id: String,
    pub assignments: Vec<TagAssignmentInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// `batch.tag.assigned`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BatchTagAssignedPayload {
    pub guild_id: String,
    /// UUID
    pub batch_id: String,
    pub requesting_user_id: String,
    pub assignments: Vec<TagAssignmentInfo>,
}

/// `tag.swap.requested` (both namespaces)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagSwapRequestedPayload {
    pub guild_id: String,
    pub requestor_id: String,
    pub target_id: String,
}

/// `tag.swap.processed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagSwapProcessedPayload {
    pub guild_id: String,
    pub requestor_id: String,
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requestor_tag: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_tag: Option<u32>,
}

/// `tag.swap.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagSwapFailedPayload {
    pub guild_id: String,
    pub requestor_id: String,
    pub target_id: String,
    pub reason: String,
}

/// `tag.availability.requested` (chat) and `tag.availability.check.requested` (backend)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagAvailabilityRequestedPayload {
    pub guild_id: String,
    pub user_id: String,
    pub tag_number: u32,
}

/// `tag.availability.check.result`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagAvailabilityResultPayload {
    pub guild_id: String,
    pub user_id: String,
    pub tag_number: u32,
    pub is_available: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// `tag.availability.check.failed`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagAvailabilityFailedPayload {
    pub guild_id: String,
    pub user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag_number: Option<u32>,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_fields_are_ignored() {
        let json = r#"{"guild_id":"G1","user_id":"U1","tag_number":7,"extra":{"x":1}}"#;
        let p: TagAssignedPayload = serde_json::from_str(json).unwrap();
        assert_eq!(p.tag_number, 7);
        assert_eq!(p.assignment_id, None);
    }

    #[test]
    fn missing_required_field_fails() {
        let json = r#"{"guild_id":"G1","tag_number":7}"#;
        assert!(serde_json::from_str::<TagAssignedPayload>(json).is_err());
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let p = TagAssignmentRequestedPayload {
            guild_id: "G1".into(),
            user_id: "U1".into(),
            tag_number: 3,
            requesting_user_id: None,
            update_id: None,
            source: None,
        };
        let json = serde_json::to_value(&p).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"guild_id": "G1", "user_id": "U1", "tag_number": 3})
        );
    }
}
