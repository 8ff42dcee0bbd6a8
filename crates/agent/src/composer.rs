use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::warn;

use vendi_core::{BotReply, NextAction, REPLY_SLOT_ALLOW_LIST};

const FALLBACK_RESPONSE: &str = "I couldn't process your request.";
const ACTION_ACK_RESPONSE: &str = "Got it, let me handle that for you.";

/// Raw, untrusted outcome of a tool handler. Values in here may originate
/// from the generative stages, so nothing is assumed valid until
/// [`normalize`] has run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandlerReply {
    pub text: Option<String>,
    pub next_action: Option<String>,
    pub slots: Option<Map<String, Value>>,
}

impl HandlerReply {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: Some(text.into()), next_action: None, slots: None }
    }

    pub fn with_action(text: impl Into<String>, action: NextAction) -> Self {
        Self {
            text: Some(text.into()),
            next_action: Some(action.as_str().to_owned()),
            slots: None,
        }
    }
}

/// Second validation pass at the consumer boundary. The producer side
/// already filters, but the generative stages are untrusted, so every value
/// is checked again before it crosses into the action layer. Anomalies are
/// dropped and logged, never surfaced.
pub fn normalize(reply: HandlerReply) -> BotReply {
    let next_action = reply.next_action.as_deref().and_then(|raw| {
        let parsed = NextAction::parse(raw);
        if parsed.is_none() {
            warn!(
                event_name = "composer.next_action_dropped",
                next_action = raw,
                "ignoring next_action outside the allow-list"
            );
        }
        parsed
    });

    let slots = reply.slots.and_then(|raw_slots| {
        let kept: BTreeMap<String, String> = raw_slots
            .into_iter()
            .filter_map(|(key, value)| {
                if !REPLY_SLOT_ALLOW_LIST.contains(&key.as_str()) {
                    warn!(
                        event_name = "composer.slot_dropped",
                        slot = %key,
                        "ignoring slot outside the allow-list"
                    );
                    return None;
                }
                match value {
                    Value::String(text) => Some((key, text)),
                    other => {
                        warn!(
                            event_name = "composer.slot_dropped",
                            slot = %key,
                            value = %other,
                            "ignoring non-string slot value"
                        );
                        None
                    }
                }
            })
            .collect();
        if kept.is_empty() {
            None
        } else {
            Some(kept)
        }
    });

    let text = reply.text.filter(|candidate| !candidate.trim().is_empty());
    let response = match text {
        Some(text) => text,
        None if next_action.is_some() => ACTION_ACK_RESPONSE.to_owned(),
        None => FALLBACK_RESPONSE.to_owned(),
    };

    BotReply { response, next_action, slots }
}
