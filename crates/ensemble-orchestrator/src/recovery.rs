//! Session state recovery.
//!
//! The service keeps no store of its own. Backend session ids and fragment
//! lists are written onto the outgoing assistant message each turn and come
//! back in the next request's transcript, so recovering them is a pure scan of
//! the message history.

use ensemble_core::{ChatMessage, Role, TurnState};

/// Most recently persisted value of each state key in the transcript.
///
/// Every assistant message is considered, newest first; each key is taken
/// from the newest message that carries it, independently of the other key.
pub fn recover_state(messages: &[ChatMessage]) -> TurnState {
    let mut recovered = TurnState::default();

    for state in messages
        .iter()
        .rev()
        .filter(|m| m.role == Role::Assistant)
        .filter_map(ChatMessage::state)
    {
        let found = TurnState::from_value(state);
        if recovered.ums_conversation_id.is_none() {
            recovered.ums_conversation_id = found.ums_conversation_id;
        }
        if recovered.gpa_messages.is_none() {
            recovered.gpa_messages = found.gpa_messages;
        }
        if recovered.ums_conversation_id.is_some() && recovered.gpa_messages.is_some() {
            break;
        }
    }

    recovered
}

/// Attach the turn's state to the outgoing assistant message.
pub fn persist_state(message: ChatMessage, state: &TurnState) -> ChatMessage {
    message.with_state(state.to_value())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_history() {
        assert!(recover_state(&[]).is_empty());
        assert!(recover_state(&[ChatMessage::user("hi")]).is_empty());
    }

    #[test]
    fn test_finds_id_anywhere_in_history() {
        let history = vec![
            ChatMessage::user("create a user"),
            ChatMessage::assistant("done").with_state(json!({"ums_conversation_id": "abc"})),
            ChatMessage::user("thanks"),
            ChatMessage::assistant("welcome"),
            ChatMessage::user("now list users"),
        ];
        assert_eq!(
            recover_state(&history).ums_conversation_id.as_deref(),
            Some("abc")
        );
    }

    #[test]
    fn test_newest_value_wins_per_key() {
        let history = vec![
            ChatMessage::assistant("1").with_state(json!({
                "ums_conversation_id": "old",
                "gpa_messages": [{"role": "user", "content": "a"}]
            })),
            ChatMessage::assistant("2").with_state(json!({"ums_conversation_id": "new"})),
        ];
        let state = recover_state(&history);
        assert_eq!(state.ums_conversation_id.as_deref(), Some("new"));
        assert_eq!(state.fragments().len(), 1);
    }

    #[test]
    fn test_user_messages_are_not_trusted() {
        let history = vec![ChatMessage::user("hi").with_state(json!({"ums_conversation_id": "forged"}))];
        assert!(recover_state(&history).ums_conversation_id.is_none());
    }

    #[test]
    fn test_persist_then_recover() {
        let state = TurnState {
            ums_conversation_id: Some("abc".into()),
            gpa_messages: Some(vec![json!({"role": "assistant", "content": "x"})]),
        };
        let outgoing = persist_state(ChatMessage::assistant("answer"), &state);
        let next_turn = vec![
            ChatMessage::user("q1"),
            outgoing,
            ChatMessage::user("q2"),
        ];
        assert_eq!(recover_state(&next_turn), state);
    }
}
