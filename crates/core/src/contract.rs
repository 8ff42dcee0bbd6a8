use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Slot keys a reply may hand back to the conversational framework.
pub const REPLY_SLOT_ALLOW_LIST: [&str; 1] = ["article_id"];

/// Follow-up actions the conversational framework is allowed to run after a
/// reply. Closed set; anything else is dropped at the boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NextAction {
    #[serde(rename = "action_show_product_by_id")]
    ShowProductById,
    #[serde(rename = "profile_form")]
    ProfileForm,
}

impl NextAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ShowProductById => "action_show_product_by_id",
            Self::ProfileForm => "profile_form",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "action_show_product_by_id" => Some(Self::ShowProductById),
            "profile_form" => Some(Self::ProfileForm),
            _ => None,
        }
    }
}

/// The only shape ever returned to the caller. `response` is always
/// non-empty; failures upstream are rewritten into user-facing text before
/// they reach this struct.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotReply {
    pub response: String,
    pub next_action: Option<NextAction>,
    pub slots: Option<BTreeMap<String, String>>,
}

impl BotReply {
    pub fn text(response: impl Into<String>) -> Self {
        Self { response: response.into(), next_action: None, slots: None }
    }
}
