//! Resolution of the triple store password.
//!
//! The password may be given in three ways, checked in this order:
//!
//! 1. **Direct value** in the config (`password: "dba"`), handy for a local Virtuoso
//! 2. **File reference** (`password_file: /run/secrets/virtuoso`), the Docker secrets pattern
//! 3. **Env var reference** (`password_env_var: VIRTUOSO_PASSWORD`)

use secrecy::SecretString;
use std::fs;

/// Error type for secret resolution failures.
#[derive(Debug, thiserror::Error)]
pub enum SecretError {
    #[error("No secret source provided (need one of: direct value, file path, or env var name)")]
    NoSourceProvided,

    #[error("Failed to read secret from file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Environment variable '{name}' not set")]
    EnvVarNotSet { name: String },

    #[error("Environment variable '{name}' contains invalid UTF-8")]
    EnvVarNotUnicode { name: String },
}

pub type Result<T> = std::result::Result<T, SecretError>;

/// Resolves a secret from the first non-empty source.
///
/// Empty strings count as "not provided" so that a config template with
/// `"password": ""` falls through to the file or env var.
pub fn resolve_secret(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<SecretString> {
    if let Some(value) = direct.filter(|v| !v.is_empty()) {
        return Ok(SecretString::from(value.to_string()));
    }

    if let Some(path) = file_path.filter(|p| !p.is_empty()) {
        let expanded = expand_home(path);
        return fs::read_to_string(&expanded)
            .map(|content| SecretString::from(content.trim().to_string()))
            .map_err(|source| SecretError::FileReadError {
                path: expanded,
                source,
            });
    }

    if let Some(name) = env_var.filter(|n| !n.is_empty()) {
        return match std::env::var(name) {
            Ok(value) => Ok(SecretString::from(value.trim().to_string())),
            Err(std::env::VarError::NotPresent) => Err(SecretError::EnvVarNotSet {
                name: name.to_string(),
            }),
            Err(std::env::VarError::NotUnicode(_)) => Err(SecretError::EnvVarNotUnicode {
                name: name.to_string(),
            }),
        };
    }

    Err(SecretError::NoSourceProvided)
}

/// Like [`resolve_secret`], but a missing source yields `None`.
pub fn resolve_secret_optional(
    direct: Option<&str>,
    file_path: Option<&str>,
    env_var: Option<&str>,
) -> Result<Option<SecretString>> {
    match resolve_secret(direct, file_path, env_var) {
        Ok(secret) => Ok(Some(secret)),
        Err(SecretError::NoSourceProvided) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Expands a leading `~` to the user's home directory (`~user` is not supported).
fn expand_home(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE")) {
            return path.replacen('~', &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    #[serial]
    fn test_direct_value_wins_over_env() {
        std::env::set_var("GRAPHLOAD_TEST_PW_1", "from-env");
        let secret = resolve_secret(Some("dba"), None, Some("GRAPHLOAD_TEST_PW_1")).unwrap();
        assert_eq!(secret.expose_secret(), "dba");
        std::env::remove_var("GRAPHLOAD_TEST_PW_1");
    }

    #[test]
    #[serial]
    fn test_file_wins_over_env() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "from-file").unwrap();

        std::env::set_var("GRAPHLOAD_TEST_PW_2", "from-env");
        let secret = resolve_secret(
            None,
            Some(file.path().to_str().unwrap()),
            Some("GRAPHLOAD_TEST_PW_2"),
        )
        .unwrap();
        assert_eq!(secret.expose_secret(), "from-file");
        std::env::remove_var("GRAPHLOAD_TEST_PW_2");
    }

    #[test]
    #[serial]
    fn test_empty_values_fall_through() {
        std::env::set_var("GRAPHLOAD_TEST_PW_3", "  from-env\n");
        let secret = resolve_secret(Some(""), Some(""), Some("GRAPHLOAD_TEST_PW_3")).unwrap();
        assert_eq!(secret.expose_secret(), "from-env");
        std::env::remove_var("GRAPHLOAD_TEST_PW_3");
    }

    #[test]
    fn test_missing_sources() {
        assert!(matches!(
            resolve_secret(None, None, None),
            Err(SecretError::NoSourceProvided)
        ));
        assert!(resolve_secret_optional(None, None, None).unwrap().is_none());
    }

    #[test]
    fn test_unreadable_file_is_an_error() {
        let result = resolve_secret(None, Some("/nonexistent/virtuoso/password"), None);
        assert!(matches!(result, Err(SecretError::FileReadError { .. })));
    }

    #[test]
    fn test_unset_env_var_is_an_error() {
        let result = resolve_secret_optional(None, None, Some("GRAPHLOAD_SURELY_UNSET_VAR"));
        assert!(matches!(result, Err(SecretError::EnvVarNotSet { .. })));
    }

    #[test]
    #[serial]
    fn test_expand_home() {
        assert_eq!(expand_home("/run/secrets/pw"), "/run/secrets/pw");
        if let Ok(home) = std::env::var("HOME") {
            assert_eq!(expand_home("~/pw"), format!("{}/pw", home));
            assert_eq!(expand_home("~"), home);
        }
    }
}
