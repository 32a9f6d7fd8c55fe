//! Read-only version metadata consumed by library users, backed by the
//! build-time values `build.rs` emits via `vergen-gitcl`.

/// Semantic version string, e.g. `"1.0.0"`.
pub fn semantic_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

/// Build identifier — the UTC timestamp `build.rs` baked in at compile time.
pub fn build_number() -> &'static str {
    env!("VERGEN_BUILD_TIMESTAMP")
}

/// Short git SHA of the commit the crate was built from.
pub fn git_sha() -> &'static str {
    env!("VERGEN_GIT_SHA")
}

/// Composite `"<version> [Build <build>] (<sha>)"` string.
pub fn version_full() -> String {
    format!(
        "{} [Build {}] ({})",
        semantic_version(),
        build_number(),
        git_sha()
    )
}
