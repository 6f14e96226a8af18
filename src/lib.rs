//! zcash-monkey: Zcash wallet companion client
//!
//! Talks to a wallet-enabled zcashd over JSON-RPC and mirrors what it learns
//! (chain info, balances, addresses, contribution addresses derived from an
//! xpub, in-flight send operations) into an observable in-memory store.
//!
//! # Architecture
//!
//! - **Entity Store**: snapshot state with keyed entity maps, paginated views
//!   and throttled change notification
//! - **Actions**: sequential async workflows against the node
//! - **Operation Watcher**: polls a send operation until it completes
//! - **Node Gateway**: the RPC surface, behind a trait so it can be replaced
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use zcash_monkey::{Actions, ClientConfig, RpcConnector};
//!
//! let config = ClientConfig::from_env();
//! let connector = Arc::new(RpcConnector::new(config.rpc_timeout));
//! let actions = Actions::new(config, connector);
//!
//! let mut changes = actions.store().subscribe();
//! actions.init_settings().await;
//! actions.get_contributions(0, 20).await;
//!
//! for c in &actions.store().read().contribution_page.items {
//!     println!("{} {} {}", c.path, c.address, c.balance);
//! }
//! ```

// Public modules
pub mod actions;
pub mod config;
pub mod derive;
pub mod error;
pub mod memo;
pub mod node;
pub mod settings;
pub mod store;
pub mod watcher;

// Re-exports for convenience
pub use actions::Actions;
pub use config::ClientConfig;
pub use derive::{derive_contribution, derive_transparent_address, Network, MAX_INDEX};
pub use error::{ext_err, ClientError, DeriveError, NodeError, Result, SettingsError};
pub use memo::{
    contribution_id_from_memo, decode_hex_memo, encode_hex_memo, make_contribution_memo,
    to_base_unit, MemoError,
};
pub use node::{NodeConnector, NodeGateway, RpcConnector, RpcNode};
pub use settings::{Settings, SettingsStore};
pub use store::{
    Address, AppState, Contribution, Emit, EntityStore, Nav, Operation, StateChange, StateField,
};
pub use watcher::OperationWatcher;
