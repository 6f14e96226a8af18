// Node gateway module
// JSON-RPC access to a wallet-enabled zcashd, behind the NodeGateway trait

pub mod client;
pub mod gateway;
pub mod types;

pub use client::{RpcConnector, RpcNode};
pub use gateway::{NodeConnector, NodeGateway};
pub use types::*;
