use std::env;
use std::time::Duration;

use exam_core::model::StudentId;
use url::Url;

use crate::error::ConfigError;

pub const DEFAULT_API_URL: &str = "http://localhost:5000/api";
pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Where the exam backend lives and who is taking tests.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackendConfig {
    pub base_url: Url,
    /// Upper bound for every backend request.
    pub timeout: Duration,
    pub student_id: Option<StudentId>,
}

impl BackendConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            student_id: None,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_student(mut self, student_id: StudentId) -> Self {
        self.student_id = Some(student_id);
        self
    }

    /// Read `EXAM_API_URL`, `EXAM_API_TIMEOUT_SECS` and `EXAM_STUDENT_ID`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`BackendConfig::from_env`] with an arbitrary variable source.
    ///
    /// Blank values count as unset.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a variable is set to an unusable value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let base_url = match var("EXAM_API_URL") {
            Some(raw) => parse_base_url(&raw)?,
            None => parse_base_url(DEFAULT_API_URL)?,
        };

        let timeout = match var("EXAM_API_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw
                    .trim()
                    .parse::<u64>()
                    .ok()
                    .filter(|secs| *secs > 0)
                    .ok_or(ConfigError::Invalid {
                        key: "EXAM_API_TIMEOUT_SECS",
                        value: raw.clone(),
                    })?;
                Duration::from_secs(secs)
            }
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let student_id = var("EXAM_STUDENT_ID").map(|raw| StudentId::new(raw.trim()));

        Ok(Self {
            base_url,
            timeout,
            student_id,
        })
    }
}

/// Parse a base URL, forcing a trailing slash so joins keep the path prefix.
///
/// # Errors
///
/// Returns `ConfigError::Url` for malformed input.
pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let trimmed = raw.trim();
    let with_slash = if trimmed.ends_with('/') {
        trimmed.to_owned()
    } else {
        format!("{trimmed}/")
    };
    Ok(Url::parse(&with_slash)?)
}
