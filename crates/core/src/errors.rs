use thiserror::Error;

/// Failure reaching or decoding the external inventory/lock store.
///
/// Handlers never surface this to callers directly; at the tool boundary it
/// is converted into a canned apology so the response contract always holds.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("store row could not be decoded: {0}")]
    Decode(String),
}
