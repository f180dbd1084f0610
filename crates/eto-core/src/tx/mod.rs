//! Transaction flows.
//!
//! A flow builds a draft, checks the user can afford it, asks for
//! confirmation, has the personal wallet sign it, submits it and waits until
//! it is mined. Progress is published on the event bus as
//! [`eto_types::TxSenderEvent`]s; once the flow ends its cleanup events are
//! published whatever the outcome.

pub mod errors;
pub mod flow;
pub mod flows;
pub mod sender;

pub use errors::FlowError;
pub use flow::{FlowContext, TxFlow};
pub use sender::{AutoConfirm, FlowOutcome, SignaturePrompt, TxSender};
