//! Session identity - the (application, user, conversation) lookup key.

use crate::types::ids::ConversationId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Immutable lookup and lock key for one conversation.
///
/// All session state, pending tool calls, locks and run bookkeeping are
/// scoped by this triple.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionIdentity {
    /// Application name the conversation belongs to
    pub app_name: String,
    /// User owning the conversation
    pub user_id: String,
    /// Conversation identifier
    pub conversation_id: ConversationId,
}

impl SessionIdentity {
    pub fn new(
        app_name: impl Into<String>,
        user_id: impl Into<String>,
        conversation_id: impl Into<ConversationId>,
    ) -> Self {
        Self {
            app_name: app_name.into(),
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
        }
    }

    /// Stable string form, usable as a map key in external stores.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.app_name, self.user_id, self.conversation_id)
    }
}

impl fmt::Display for SessionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}",
            self.app_name, self.user_id, self.conversation_id
        )
    }
}
