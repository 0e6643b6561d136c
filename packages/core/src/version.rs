//! fleetrun build identity
//!
//! Every run report carries the version, so a saved JSON report names the
//! build that produced it.

/// Package version of this build
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Version plus the commit and date baked in at build time
///
/// `FLEETRUN_GIT_HASH` and `FLEETRUN_BUILD_DATE` are read when compiling;
/// either shows as "unknown" when it was not set.
pub fn get_version_long() -> String {
    format!(
        "{} (git: {}, built: {})",
        get_version(),
        option_env!("FLEETRUN_GIT_HASH").unwrap_or("unknown"),
        option_env!("FLEETRUN_BUILD_DATE").unwrap_or("unknown")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_package() {
        assert_eq!(get_version(), env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn long_version_names_build() {
        let long = get_version_long();
        assert!(long.starts_with(&get_version()));
        assert!(long.contains("git: "));
        assert!(long.contains("built: "));
    }
}
