use std::collections::BTreeMap;
use std::fmt::Write as _;

use serde::{Deserialize, Serialize};

pub const CONTEXT_WINDOW_TURNS: usize = 5;
pub const CONTEXT_TURN_MAX_CHARS: usize = 512;

const CONTEXT_SLOT_ALLOW_LIST: [&str; 2] = ["vendor_id", "article_id"];

/// Who produced a conversation turn. Transport payloads carry free-form role
/// strings; they are resolved into this tagged set exactly once at ingestion
/// so nothing downstream re-probes message shapes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    User,
    Bot,
    Other,
}

impl TurnRole {
    pub fn resolve(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "user" => Self::User,
            "bot" | "assistant" => Self::Bot,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
            Self::Other => "other",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: TurnRole,
    pub text: String,
}

/// Bounded, allow-listed view of the conversation handed in with a request.
///
/// Per-request only; nothing here survives the call.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ConversationContext {
    pub recent_turns: Vec<ConversationTurn>,
    pub slots: BTreeMap<String, String>,
}

impl ConversationContext {
    /// Build the context window from raw transport parts: the last
    /// [`CONTEXT_WINDOW_TURNS`] turns with text truncated to
    /// [`CONTEXT_TURN_MAX_CHARS`] chars, and slots restricted to the
    /// `vendor_id`/`article_id` allow-list.
    pub fn from_parts(
        turns: impl IntoIterator<Item = (String, String)>,
        slots: impl IntoIterator<Item = (String, String)>,
    ) -> Self {
        let turns: Vec<(String, String)> = turns.into_iter().collect();
        let start = turns.len().saturating_sub(CONTEXT_WINDOW_TURNS);

        let recent_turns = turns[start..]
            .iter()
            .map(|(role, text)| ConversationTurn {
                role: TurnRole::resolve(role),
                text: truncate_chars(text, CONTEXT_TURN_MAX_CHARS),
            })
            .collect();

        let slots = slots
            .into_iter()
            .filter(|(key, _)| CONTEXT_SLOT_ALLOW_LIST.contains(&key.as_str()))
            .collect();

        Self { recent_turns, slots }
    }

    pub fn is_empty(&self) -> bool {
        self.recent_turns.is_empty() && self.slots.is_empty()
    }

    /// Plain-text rendering for prompt construction.
    pub fn render(&self) -> String {
        if self.is_empty() {
            return "(none)".to_owned();
        }

        let mut rendered = String::new();
        for turn in &self.recent_turns {
            let _ = writeln!(rendered, "{}: {}", turn.role.as_str(), turn.text);
        }
        for (key, value) in &self.slots {
            let _ = writeln!(rendered, "slot {key}: {value}");
        }
        rendered.trim_end().to_owned()
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::{ConversationContext, TurnRole, CONTEXT_TURN_MAX_CHARS};

    fn turn(role: &str, text: &str) -> (String, String) {
        (role.to_owned(), text.to_owned())
    }

    #[test]
    fn roles_resolve_to_tagged_variants() {
        assert_eq!(TurnRole::resolve("user"), TurnRole::User);
        assert_eq!(TurnRole::resolve("Bot"), TurnRole::Bot);
        assert_eq!(TurnRole::resolve("assistant"), TurnRole::Bot);
        assert_eq!(TurnRole::resolve("system"), TurnRole::Other);
        assert_eq!(TurnRole::resolve(""), TurnRole::Other);
    }

    #[test]
    fn window_keeps_only_most_recent_turns() {
        let turns = (0..8).map(|index| turn("user", &format!("message {index}")));
        let context = ConversationContext::from_parts(turns, Vec::new());

        assert_eq!(context.recent_turns.len(), 5);
        assert_eq!(context.recent_turns[0].text, "message 3");
        assert_eq!(context.recent_turns[4].text, "message 7");
    }

    #[test]
    fn long_turn_text_is_truncated() {
        let long_text = "x".repeat(CONTEXT_TURN_MAX_CHARS + 100);
        let context = ConversationContext::from_parts(vec![turn("user", &long_text)], Vec::new());

        assert_eq!(context.recent_turns[0].text.chars().count(), CONTEXT_TURN_MAX_CHARS);
    }

    #[test]
    fn slots_outside_allow_list_are_dropped() {
        let slots = vec![
            ("vendor_id".to_owned(), "V-1".to_owned()),
            ("article_id".to_owned(), "21may25-1".to_owned()),
            ("session_token".to_owned(), "secret".to_owned()),
        ];
        let context = ConversationContext::from_parts(Vec::new(), slots);

        assert_eq!(context.slots.len(), 2);
        assert!(!context.slots.contains_key("session_token"));
    }

    #[test]
    fn empty_context_renders_placeholder() {
        assert_eq!(ConversationContext::default().render(), "(none)");
    }

    #[test]
    fn render_includes_turns_and_slots() {
        let context = ConversationContext::from_parts(
            vec![turn("user", "hi"), turn("bot", "hello")],
            vec![("article_id".to_owned(), "21may25-1".to_owned())],
        );

        let rendered = context.render();
        assert!(rendered.contains("user: hi"));
        assert!(rendered.contains("bot: hello"));
        assert!(rendered.contains("slot article_id: 21may25-1"));
    }
}
