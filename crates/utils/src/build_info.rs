/// Git metadata captured by the build script, when the source tree had any.
pub(crate) struct BuildInfo {
    pub commit_sha1: Option<&'static str>,
    pub git_dirty: bool,
}

pub(crate) const BUILD_INFO: BuildInfo = BuildInfo {
    commit_sha1: option_env!("VERGEN_GIT_SHA"),
    git_dirty: matches!(option_env!("VERGEN_GIT_DIRTY"), Some(v) if matches!(v.as_bytes(), b"true")),
};
