//! Release builder: step catalog, policy hooks and the state machine
//! sequencing them.

pub mod context;
pub mod machine;
pub mod policy;
pub mod runner;
pub mod step;

pub use context::{BuildContext, ReleaseInfo};
pub use machine::{BuilderRunState, CiBuilder, PRE_RELEASE_BRANCH, RELEASE_BRANCH};
pub use policy::ReleasePolicy;
pub use runner::run_builder;
pub use step::{BuildStep, StepKind};
