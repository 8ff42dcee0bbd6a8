use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use vendi_agent::composer::{self, HandlerReply};
use vendi_agent::orchestrator::Orchestrator;
use vendi_core::domain::conversation::ConversationContext;
use vendi_core::domain::inventory::VendorId;
use vendi_core::BotReply;

const ASK_VENDOR_ID: &str = "Sorry, I need a vendor ID to proceed.";

#[derive(Clone)]
pub struct ChatState {
    pub orchestrator: Arc<Orchestrator>,
}

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    #[serde(default)]
    pub user_query: String,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub context: RawContext,
}

/// Context exactly as the conversational framework sends it; resolved into
/// a [`ConversationContext`] once at ingestion.
#[derive(Debug, Default, Deserialize)]
pub struct RawContext {
    #[serde(default)]
    pub recent_messages: Vec<RawTurn>,
    #[serde(default)]
    pub slots: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize)]
pub struct RawTurn {
    #[serde(default)]
    pub role: String,
    #[serde(default)]
    pub text: String,
}

pub fn router(state: ChatState) -> Router {
    Router::new().route("/chatbot/query", post(chatbot_query)).with_state(state)
}

pub async fn chatbot_query(
    State(state): State<ChatState>,
    Json(request): Json<QueryRequest>,
) -> Json<BotReply> {
    let correlation_id = Uuid::new_v4().to_string();

    // A missing vendor scope is recovered with a clarifying question, never
    // surfaced as a transport error.
    let Some(vendor_raw) =
        request.vendor_id.as_deref().map(str::trim).filter(|value| !value.is_empty())
    else {
        return Json(composer::normalize(HandlerReply::text(ASK_VENDOR_ID)));
    };
    let vendor_id = VendorId(vendor_raw.to_owned());

    let context = ConversationContext::from_parts(
        request.context.recent_messages.into_iter().map(|turn| (turn.role, turn.text)),
        request.context.slots,
    );

    info!(
        event_name = "chat.query_received",
        correlation_id = %correlation_id,
        vendor_id = %vendor_id.0,
        turns = context.recent_turns.len(),
        "handling chatbot query"
    );

    let reply = state.orchestrator.handle(&request.user_query, &vendor_id, &context).await;
    Json(composer::normalize(reply))
}
