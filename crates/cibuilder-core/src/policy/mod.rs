//! Concrete release policies.

pub mod npm;

pub use npm::{NpmPolicy, NpmPolicyConfig, PublishInfo};
