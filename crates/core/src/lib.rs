pub mod config;
pub mod contract;
pub mod domain;
pub mod errors;

pub use contract::{BotReply, NextAction, REPLY_SLOT_ALLOW_LIST};
pub use domain::article::{ArticleId, ArticleIdError};
pub use domain::conversation::{ConversationContext, ConversationTurn, TurnRole};
pub use domain::inventory::{InventoryItem, InventoryStore, LockOutcome, VendorId};
pub use errors::StoreError;
