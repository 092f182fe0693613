use serde::{Deserialize, Serialize};

/// State key holding the remote UMS conversation id.
pub const UMS_CONVERSATION_ID: &str = "ums_conversation_id";
/// State key holding the accumulated GPA message fragments.
pub const GPA_MESSAGES: &str = "gpa_messages";

/// Backend state carried across turns on the conversation transcript.
///
/// Both keys are independent: either may be present without the other. The
/// engine never interprets the fragments; they belong to the GPA gateway.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnState {
    /// Remote conversation id for the UMS agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ums_conversation_id: Option<String>,
    /// Backend-native message fragments for the GPA agent, oldest first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpa_messages: Option<Vec<serde_json::Value>>,
}

impl TurnState {
    /// Read whichever keys are present and well-typed in a state payload.
    ///
    /// A key with the wrong shape is treated as absent rather than failing the
    /// whole payload, so one malformed key never hides the other.
    pub fn from_value(value: &serde_json::Value) -> Self {
        let ums_conversation_id = value
            .get(UMS_CONVERSATION_ID)
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let gpa_messages = value
            .get(GPA_MESSAGES)
            .and_then(|v| v.as_array())
            .cloned();
        Self {
            ums_conversation_id,
            gpa_messages,
        }
    }

    /// The JSON payload written onto the outgoing assistant message.
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// True when neither key is present.
    pub fn is_empty(&self) -> bool {
        self.ums_conversation_id.is_none() && self.gpa_messages.is_none()
    }

    /// The GPA fragments, or an empty slice.
    pub fn fragments(&self) -> &[serde_json::Value] {
        self.gpa_messages.as_deref().unwrap_or_default()
    }

    /// Append fragments, creating the list on first write.
    pub fn append_fragments(&mut self, fragments: Vec<serde_json::Value>) {
        self.gpa_messages
            .get_or_insert_with(Vec::new)
            .extend(fragments);
    }
}
