//! Travis CI variable mapping.
//!
//! See <https://docs.travis-ci.com/user/environment-variables/>.

use super::{BuildInfo, VarSource};

pub const TRAVIS: &str = "TRAVIS";

pub(crate) fn build_info(vars: &dyn VarSource) -> BuildInfo {
    let get = |key: &str| vars.var(key).unwrap_or_default();
    BuildInfo {
        project_name: get("PROJECT_NAME"),
        config_name: get("CONFIG_NAME"),
        build_id: get("TRAVIS_BUILD_ID"),
        build_number: get("TRAVIS_BUILD_NUMBER"),
        pull_request_branch: get("TRAVIS_PULL_REQUEST_BRANCH"),
        pull_request_number: get("TRAVIS_PULL_REQUEST"),
        target_branch: get("TRAVIS_BRANCH"),
        commit_message: get("TRAVIS_COMMIT_MESSAGE"),
        commit: get("TRAVIS_COMMIT"),
    }
}
