//! Per-Runner conversation log.

use handoff_core::Message;

/// Ordered, append-only message log with a system prompt that is inserted
/// at position 0 on the first turn and never again.
#[derive(Debug, Default)]
pub struct ConversationState {
    system_prompt: Option<String>,
    messages: Vec<Message>,
}

impl ConversationState {
    pub fn new(system_prompt: Option<String>) -> Self {
        Self {
            system_prompt,
            messages: Vec::new(),
        }
    }

    /// Open a turn: consume the system prompt if still pending, then
    /// append the user's message.
    pub fn begin_turn(&mut self, text: impl Into<String>) {
        if let Some(prompt) = self.system_prompt.take() {
            self.messages.insert(0, Message::system(prompt));
        }
        self.messages.push(Message::user(text));
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    #[cfg(test)]
    fn last(&self) -> Option<&Message> {
        self.messages.last()
    }

    /// Whether the system prompt has not been inserted yet.
    #[cfg(test)]
    fn has_pending_system_prompt(&self) -> bool {
        self.system_prompt.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use handoff_core::Role;

    #[test]
    fn system_prompt_inserted_once() {
        let mut conversation = ConversationState::new(Some("rules".into()));
        assert!(conversation.has_pending_system_prompt());

        conversation.begin_turn("first");
        conversation.push(Message::assistant("ok"));
        conversation.begin_turn("second");

        let roles: Vec<Role> = conversation.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant, Role::User]);
        assert_eq!(conversation.messages()[0].content, "rules");
        assert!(!conversation.has_pending_system_prompt());
    }

    #[test]
    fn no_system_prompt() {
        let mut conversation = ConversationState::new(None);
        conversation.begin_turn("hi");
        assert_eq!(conversation.messages().len(), 1);
        assert_eq!(conversation.last().unwrap().role, Role::User);
    }
}
