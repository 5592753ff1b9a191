pub mod generate;
pub mod parse;
pub mod types;

use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub use parse::{load_config, parse_config, ConfigError};
pub use types::{Clock, Config, CredentialsConfig, RetryConfig};

const USER_CONFIG: &str = ".config/logship/config.yml";
const SYSTEM_CONFIG: &str = "/etc/logship/config.yml";

pub(crate) fn env_var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\$env\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap())
}

/// Replaces `$env{NAME}` with the value of `NAME`.
/// Unset variables are left in place so validation can name them.
pub fn expand_env_vars(text: &str) -> String {
    env_var_pattern()
        .replace_all(text, |caps: &regex::Captures| {
            std::env::var(&caps[1]).unwrap_or_else(|_| caps[0].to_string())
        })
        .to_string()
}

/// Expands a leading `~` to the home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(home_dir) = dirs::home_dir() else {
        return path.to_path_buf();
    };

    match path.strip_prefix("~") {
        Ok(rest) => home_dir.join(rest),
        Err(_) => path.to_path_buf(),
    }
}

/// Locations searched when no `--config` is given, in order.
pub fn default_config_locations() -> Vec<PathBuf> {
    let mut locations = Vec::new();
    if let Some(home_dir) = dirs::home_dir() {
        locations.push(home_dir.join(USER_CONFIG));
    }
    locations.push(PathBuf::from(SYSTEM_CONFIG));
    locations
}

/// Resolves the config file: the explicit path if given, otherwise the first
/// existing default location.
pub fn resolve_config_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(expand_tilde(path));
    }

    default_config_locations().into_iter().find(|p| p.exists())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_env_vars() {
        std::env::set_var("LOGSHIP_TEST_REGION", "eu-central-1");
        std::env::set_var("LOGSHIP_TEST_PREFIX", "web");
        let result = expand_env_vars("region: $env{LOGSHIP_TEST_REGION}\nprefix: $env{LOGSHIP_TEST_PREFIX}");
        assert_eq!(result, "region: eu-central-1\nprefix: web");
        std::env::remove_var("LOGSHIP_TEST_REGION");
        std::env::remove_var("LOGSHIP_TEST_PREFIX");
    }

    #[test]
    fn test_expand_env_vars_unset_left_alone() {
        let result = expand_env_vars("input_path: $env{LOGSHIP_TEST_NOT_SET}/logs");
        assert_eq!(result, "input_path: $env{LOGSHIP_TEST_NOT_SET}/logs");
    }

    #[test]
    fn test_shell_style_vars_untouched() {
        assert_eq!(expand_env_vars("${HOME}/$HOME"), "${HOME}/$HOME");
    }

    #[test]
    fn test_expand_tilde() {
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_tilde(Path::new("~/logs")), home.join("logs"));
            assert_eq!(expand_tilde(Path::new("~")), home);
        }
        assert_eq!(expand_tilde(Path::new("/var/log")), Path::new("/var/log"));
        assert_eq!(expand_tilde(Path::new("logs/~")), Path::new("logs/~"));
    }

    #[test]
    fn test_explicit_config_path_wins() {
        let resolved = resolve_config_path(Some(Path::new("/opt/logship.yml")));
        assert_eq!(resolved, Some(PathBuf::from("/opt/logship.yml")));
    }

    #[test]
    fn test_default_locations_end_with_system_config() {
        let locations = default_config_locations();
        assert_eq!(locations.last(), Some(&PathBuf::from(SYSTEM_CONFIG)));
    }
}
