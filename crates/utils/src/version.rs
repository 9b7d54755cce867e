use std::sync::LazyLock;

use crate::build_info::BUILD_INFO;

/// Defines the application version.
pub static VERSION: LazyLock<String> = LazyLock::new(|| {
    format_version(
        env!("IMAGE_VERSION"),
        BUILD_INFO.commit_sha1,
        BUILD_INFO.git_dirty,
    )
});

fn format_version(base: &str, commit: Option<&str>, dirty: bool) -> String {
    format!(
        "{}-{}{}",
        base,
        commit.unwrap_or("unknown"),
        if dirty { "-dirty" } else { "" }
    )
}
