//! Common types module for the ETO platform transaction core.
//!
//! This module defines the data types shared by the node adapter, the wallet
//! layer, the transaction flow engine and the authentication cycle. It provides
//! a centralized location for wire formats and events so every crate in the
//! workspace agrees on them.

/// Event types published on the application event bus.
pub mod events;
/// User-facing error message categories.
pub mod messages;
/// Registry trait for pluggable implementations.
pub mod registry;
/// Redacted string wrapper for keys and tokens.
pub mod secret_string;
/// Storage keys used by the session layer.
pub mod storage;
/// Transaction drafts and JSON-RPC transaction payloads.
pub mod tx;
/// Authenticated user identity.
pub mod user;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

pub use events::*;
pub use messages::ErrorMessage;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::StorageKey;
pub use tx::*;
pub use user::{User, UserType};
pub use validation::*;

pub use alloy::primitives::{Address, Bytes, B256, U256, U64};
