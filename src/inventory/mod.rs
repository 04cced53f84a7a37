//! Requirement list: what to buy and how much is already owned.

pub mod fetch;
pub mod matcher;
pub mod store;

pub use matcher::FuzzyMatcher;
pub use store::{ImportMode, Inventory, InventoryStore, Requirement};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum InventoryError {
    #[error("line {line}: expected `<name>: <needed>\\<existing>`, got {content:?}")]
    Malformed { line: usize, content: String },

    #[error("line {line}: duplicate entry {name}")]
    Duplicate { line: usize, name: String },

    #[error("unknown item: {0}")]
    UnknownItem(String),

    #[error("清单是空的")]
    Empty,

    #[error("cookie无效，请重新设置")]
    InvalidCookie,

    #[error("cookie已失效：{0}")]
    CookieExpired(String),

    #[error("失败：{0}")]
    Api(String),

    #[error("无网络连接: {0}")]
    Network(#[from] reqwest::Error),

    #[error("响应结果解析失败: {0}")]
    ResponseParse(#[from] serde_json::Error),

    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),

    #[error("failed to replace inventory file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Checks hand-edited text before it is saved: every non-blank line must be a
/// well-formed entry, and there must be at least one.
pub fn validate_text(text: &str) -> Result<Inventory, InventoryError> {
    let inventory = Inventory::parse(text)?;
    if inventory.is_empty() {
        return Err(InventoryError::Empty);
    }
    Ok(inventory)
}
