use std::str::FromStr;

use thiserror::Error;

/// Failure reading a configuration value from the process environment.
#[derive(Debug, Error)]
pub enum EnvVarError {
    /// The variable is not set (or is not valid unicode).
    #[error("Missing environment variable: {0}")]
    Missing(String),

    /// The variable is set but could not be parsed into the requested type.
    #[error("Invalid value for environment variable {name}: {value:?}")]
    Invalid { name: String, value: String },
}

/// Reads an environment variable, returning a structured error if it's missing.
///
/// This is a thin wrapper around `std::env::var` that provides a more
/// ergonomic and specific error type for missing variables.
///
/// # Arguments
/// * `name` - The name of the environment variable to read.
pub fn get_env_var(name: &str) -> Result<String, EnvVarError> {
    std::env::var(name).map_err(|_| EnvVarError::Missing(name.to_string()))
}

/// Reads an optional environment variable. Unset and empty values are both `None`.
pub fn get_optional_env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

/// Reads and parses an environment variable, falling back to `default` when unset.
///
/// A value that is present but unparsable is an error rather than a silent fallback.
pub fn parse_env_var_or<T: FromStr>(name: &str, default: T) -> Result<T, EnvVarError> {
    match get_optional_env_var(name) {
        None => Ok(default),
        Some(value) => value.trim().parse::<T>().map_err(|_| EnvVarError::Invalid {
            name: name.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn missing_var_names_the_variable() {
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_MISSING") };
        let err = get_env_var("SHARED_UTILS_TEST_MISSING").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing environment variable: SHARED_UTILS_TEST_MISSING"
        );
    }

    #[test]
    #[serial]
    fn parse_with_default_and_override() {
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_NUM") };
        assert_eq!(parse_env_var_or("SHARED_UTILS_TEST_NUM", 7u32).unwrap(), 7);

        unsafe { std::env::set_var("SHARED_UTILS_TEST_NUM", " 42 ") };
        assert_eq!(parse_env_var_or("SHARED_UTILS_TEST_NUM", 7u32).unwrap(), 42);

        unsafe { std::env::set_var("SHARED_UTILS_TEST_NUM", "forty-two") };
        let err = parse_env_var_or("SHARED_UTILS_TEST_NUM", 7u32).unwrap_err();
        assert!(matches!(err, EnvVarError::Invalid { .. }));

        unsafe { std::env::remove_var("SHARED_UTILS_TEST_NUM") };
    }

    #[test]
    #[serial]
    fn empty_optional_is_none() {
        unsafe { std::env::set_var("SHARED_UTILS_TEST_EMPTY", "  ") };
        assert_eq!(get_optional_env_var("SHARED_UTILS_TEST_EMPTY"), None);
        unsafe { std::env::remove_var("SHARED_UTILS_TEST_EMPTY") };
    }
}
