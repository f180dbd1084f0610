//! Wallet implementations that need a node connection.

pub mod node;

pub use node::NodeWallet;
