//! TeamCity variable mapping.
//!
//! TeamCity does not export these on its own; build configurations forward
//! them from `%teamcity.build.*%` parameters in a setup script.

use super::{BuildInfo, VarSource};

pub const TEAMCITY: &str = "TEAMCITY";

pub(crate) fn build_info(vars: &dyn VarSource) -> BuildInfo {
    let get = |key: &str| vars.var(key).unwrap_or_default();
    BuildInfo {
        project_name: get("TEAMCITY_PROJECT_NAME"),
        config_name: get("TEAMCITY_BUILDCONF_NAME"),
        build_id: get("TEAMCITY_BUILD_ID"),
        build_number: get("TEAMCITY_BUILD_NUMBER"),
        pull_request_branch: get("TEAMCITY_PULL_REQUEST_BRANCH"),
        pull_request_number: get("TEAMCITY_PULL_REQUEST_NUMBER"),
        target_branch: get("TEAMCITY_TARGET_BRANCH"),
        commit_message: get("TEAMCITY_COMMIT_MESSAGE"),
        commit: get("TEAMCITY_COMMIT"),
    }
}
