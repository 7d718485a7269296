//! Release orchestration: version fixing, upgrading, pipeline side effects and the build decision.

pub mod context;
pub mod decision;
pub mod ops;
pub mod project;

pub use context::{CiContext, CiEvent, CommitStatus, Decision, ProjectContext, Versions};
pub use decision::make_decision;
pub use ops::{FixedResult, ReleaseVersionOps, UpgradeResult};
pub use project::ProjectOps;
