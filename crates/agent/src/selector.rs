use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::warn;

use vendi_core::domain::article::ArticleId;
use vendi_core::domain::conversation::ConversationContext;

use crate::llm::GenerativeClient;

/// Closed set of capabilities the selector can route to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Tool {
    RegisterUser,
    Payment,
    CheckInventory,
    MakeCatalog,
    LockProduct,
    ShowProductById,
    GeneralQuestion,
}

impl Tool {
    pub const ALL: [Tool; 7] = [
        Tool::RegisterUser,
        Tool::Payment,
        Tool::CheckInventory,
        Tool::MakeCatalog,
        Tool::LockProduct,
        Tool::ShowProductById,
        Tool::GeneralQuestion,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RegisterUser => "register_user",
            Self::Payment => "payment",
            Self::CheckInventory => "check_inventory",
            Self::MakeCatalog => "make_catalog",
            Self::LockProduct => "lock_product",
            Self::ShowProductById => "show_product_by_id",
            Self::GeneralQuestion => "general_question",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|tool| tool.as_str() == raw)
    }
}

/// One routed tool with its raw argument object. Arguments may come from the
/// generative stage, so consumers re-validate anything they take out.
#[derive(Clone, Debug, PartialEq)]
pub struct ToolDecision {
    pub tool: Tool,
    pub args: Map<String, Value>,
}

impl ToolDecision {
    fn bare(tool: Tool) -> Self {
        Self { tool, args: Map::new() }
    }

    fn with_article(tool: Tool, article_id: &ArticleId) -> Self {
        let mut args = Map::new();
        args.insert("article_id".to_owned(), Value::String(article_id.as_str().to_owned()));
        Self { tool, args }
    }

    pub fn article_id(&self) -> Option<&str> {
        self.args.get("article_id").and_then(Value::as_str)
    }
}

const REGISTER_KEYWORDS: &[&str] =
    &["register", "sign up", "signup", "create profile", "create my profile", "create account"];
const PAYMENT_KEYWORDS: &[&str] = &["pay", "payment", "checkout"];
const INVENTORY_KEYWORDS: &[&str] = &["inventory", "in stock", "available"];
const CATALOG_KEYWORDS: &[&str] = &["catalog", "show products", "product list", "list products"];
const LOCK_KEYWORDS: &[&str] = &["lock", "reserve", "hold"];

/// Maps `(query, context)` to exactly one tool. Total: every failure mode
/// degrades to `general_question`, never to an error.
pub struct ToolSelector {
    client: Arc<dyn GenerativeClient>,
}

impl ToolSelector {
    pub fn new(client: Arc<dyn GenerativeClient>) -> Self {
        Self { client }
    }

    /// Stage order, first match wins, no backtracking:
    /// explicit article id, then keyword heuristics, then one constrained
    /// generative call, then `general_question`.
    pub async fn select(&self, user_query: &str, context: &ConversationContext) -> ToolDecision {
        // An explicit identifier always beats intent words in the same
        // utterance.
        if let Some(article_id) = ArticleId::extract(user_query) {
            return ToolDecision::with_article(Tool::ShowProductById, &article_id);
        }

        if let Some(decision) = heuristic_decision(user_query) {
            return decision;
        }

        if let Some(decision) = self.generative_decision(user_query, context).await {
            return decision;
        }

        ToolDecision::bare(Tool::GeneralQuestion)
    }

    async fn generative_decision(
        &self,
        user_query: &str,
        context: &ConversationContext,
    ) -> Option<ToolDecision> {
        let prompt = routing_prompt(user_query, context);
        let raw = match self.client.complete(&prompt).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "selector.generative_failed",
                    error = %error,
                    "routing call failed, treating as no decision"
                );
                return None;
            }
        };
        parse_tool_choice(&raw)
    }
}

/// Fixed-priority keyword routing; the first matching category wins.
fn heuristic_decision(user_query: &str) -> Option<ToolDecision> {
    let text = user_query.to_lowercase();
    let matches_any = |keywords: &[&str]| keywords.iter().any(|keyword| text.contains(keyword));

    if matches_any(REGISTER_KEYWORDS) {
        return Some(ToolDecision::bare(Tool::RegisterUser));
    }
    if matches_any(PAYMENT_KEYWORDS) {
        return Some(ToolDecision::bare(Tool::Payment));
    }
    if matches_any(INVENTORY_KEYWORDS) {
        return Some(ToolDecision::bare(Tool::CheckInventory));
    }
    if matches_any(CATALOG_KEYWORDS) {
        return Some(ToolDecision::bare(Tool::MakeCatalog));
    }
    if matches_any(LOCK_KEYWORDS) {
        // Without an inline id the decision still stands; the handler asks
        // for the missing id.
        return Some(match ArticleId::extract(user_query) {
            Some(article_id) => ToolDecision::with_article(Tool::LockProduct, &article_id),
            None => ToolDecision::bare(Tool::LockProduct),
        });
    }

    None
}

fn routing_prompt(user_query: &str, context: &ConversationContext) -> String {
    format!(
        "You are the routing layer for a commerce chat assistant. \
         Choose the single best tool for the user query and answer with strict JSON only.\n\n\
         Tools:\n\
         - register_user: start the profile registration flow\n\
         - payment: the user wants to pay or check out\n\
         - check_inventory: the user asks what is available or in stock\n\
         - make_catalog: the user wants the product list\n\
         - lock_product: reserve or hold a product; requires article_id\n\
         - show_product_by_id: show details for one product; requires article_id\n\
         - general_question: everything else\n\n\
         Answer with JSON of the shape {{\"tool\": <tool_name>, \"arguments\": {{ ... }}}}.\n\n\
         User query: {user_query}\n\
         Context (may be empty):\n{rendered_context}",
        rendered_context = context.render(),
    )
}

/// Strict-then-lenient parse of the routing model's reply. Anything that is
/// not an allow-listed tool name with an object-shaped `arguments` is
/// discarded so it can never reach a handler.
fn parse_tool_choice(raw: &str) -> Option<ToolDecision> {
    let parsed = parse_json_object(raw)?;

    let Some(tool_raw) = parsed.get("tool").and_then(Value::as_str) else {
        warn!(event_name = "selector.decision_discarded", "routing reply carried no tool name");
        return None;
    };
    let Some(tool) = Tool::parse(tool_raw) else {
        warn!(
            event_name = "selector.decision_discarded",
            tool = tool_raw,
            "routing reply named a tool outside the allow-list"
        );
        return None;
    };
    let Some(args) = parsed.get("arguments").and_then(Value::as_object) else {
        warn!(
            event_name = "selector.decision_discarded",
            tool = tool_raw,
            "routing reply arguments were not an object"
        );
        return None;
    };

    Some(ToolDecision { tool, args: args.clone() })
}

fn parse_json_object(raw: &str) -> Option<Map<String, Value>> {
    if raw.trim().is_empty() {
        return None;
    }

    if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(raw) {
        return Some(object);
    }

    let block = fenced_json_block(raw)?;
    match serde_json::from_str::<Value>(block) {
        Ok(Value::Object(object)) => Some(object),
        _ => None,
    }
}

/// Body of the first ```json fenced block, if any.
fn fenced_json_block(raw: &str) -> Option<&str> {
    let start = raw.find("```json")? + "```json".len();
    let rest = &raw[start..];
    let end = rest.find("```")?;
    Some(rest[..end].trim())
}
