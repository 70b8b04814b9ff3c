use super::TitleProvider;
use crate::environment::Environment;

/// Titles linking to the Travis build page.
#[derive(Debug, Clone, Copy, Default)]
pub struct TravisTitle;

impl TitleProvider for TravisTitle {
    fn title(&self, env: &Environment, build_type: &str) -> String {
        format!(
            "{} [Travis {build_type} Build #{}]",
            env.package.repo, env.build.build_number
        )
    }

    fn title_link(&self, env: &Environment) -> String {
        format!(
            "https://travis-ci.com/{}/{}/builds/{}",
            env.package.owner, env.package.repo, env.build.build_id
        )
    }
}
