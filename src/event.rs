//! Webhook event model and classification into a runtime context.

pub mod classifier;
pub mod payload;
pub mod runtime;

pub use classifier::{EventKind, GitParser, ParserConfig, PullRequestAction, RefKind};
pub use payload::{EventPayload, GitEvent};
pub use runtime::{RuntimeContext, RuntimeVersion};
