//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config, token, ledger client, account args)
//! - `dedup` - Duplicate report and deletion
//! - `import` - Statement import
//! - `accounts` - Account listing
//!
//! Commands are generic over the ledger traits so tests can run them against
//! the in-memory ledger.

pub mod accounts;
pub mod core;
pub mod dedup;
pub mod import;

// Re-export command functions for main.rs
pub use accounts::*;
pub use core::*;
pub use dedup::*;
pub use import::*;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
