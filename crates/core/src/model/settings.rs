use thiserror::Error;
use url::Url;

/// Seconds-remaining marks that raise a warning by default (5 minutes, 1 minute).
pub const DEFAULT_WARNING_THRESHOLDS: [u32; 2] = [300, 60];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("invalid base URL")]
    InvalidBaseUrl,
    #[error("warning threshold must be greater than zero")]
    ZeroThreshold,
}

/// Validated application settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AppSettings {
    api_base_url: Option<String>,
    api_token: Option<String>,
    warning_thresholds: Vec<u32>,
}

/// Unvalidated settings as collected from the environment or CLI flags.
#[derive(Clone, Debug, Default)]
pub struct AppSettingsDraft {
    pub api_base_url: Option<String>,
    pub api_token: Option<String>,
    /// `None` keeps the defaults; `Some(vec![])` disables warnings.
    pub warning_thresholds: Option<Vec<u32>>,
}

impl AppSettingsDraft {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and normalize the draft.
    ///
    /// Thresholds are de-duplicated and sorted from largest to smallest.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::InvalidBaseUrl` if the base URL is present but invalid and
    /// `SettingsError::ZeroThreshold` if a warning threshold is zero.
    pub fn validate(self) -> Result<AppSettings, SettingsError> {
        let api_base_url = normalize_optional(self.api_base_url);
        let api_token = normalize_optional(self.api_token);

        if let Some(url) = api_base_url.as_ref() {
            if Url::parse(url).is_err() {
                return Err(SettingsError::InvalidBaseUrl);
            }
        }

        let mut warning_thresholds = self
            .warning_thresholds
            .unwrap_or_else(|| DEFAULT_WARNING_THRESHOLDS.to_vec());
        if warning_thresholds.contains(&0) {
            return Err(SettingsError::ZeroThreshold);
        }
        warning_thresholds.sort_unstable_by(|a, b| b.cmp(a));
        warning_thresholds.dedup();

        Ok(AppSettings {
            api_base_url: api_base_url.map(|url| url.trim_end_matches('/').to_string()),
            api_token,
            warning_thresholds,
        })
    }
}

impl AppSettings {
    #[must_use]
    pub fn api_base_url(&self) -> Option<&str> {
        self.api_base_url.as_deref()
    }

    #[must_use]
    pub fn api_token(&self) -> Option<&str> {
        self.api_token.as_deref()
    }

    /// Warning marks in seconds, largest first.
    #[must_use]
    pub fn warning_thresholds(&self) -> &[u32] {
        &self.warning_thresholds
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            api_base_url: None,
            api_token: None,
            warning_thresholds: DEFAULT_WARNING_THRESHOLDS.to_vec(),
        }
    }
}

fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|val| val.trim().to_string())
        .filter(|val| !val.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_use_five_and_one_minute_warnings() {
        let settings = AppSettingsDraft::new().validate().unwrap();
        assert_eq!(settings.warning_thresholds(), [300, 60]);
        assert_eq!(settings, AppSettings::default());
    }

    #[test]
    fn thresholds_are_sorted_and_deduplicated() {
        let settings = AppSettingsDraft {
            warning_thresholds: Some(vec![10, 120, 10, 30]),
            ..AppSettingsDraft::default()
        }
        .validate()
        .unwrap();
        assert_eq!(settings.warning_thresholds(), [120, 30, 10]);
    }

    #[test]
    fn zero_threshold_is_rejected() {
        let err = AppSettingsDraft {
            warning_thresholds: Some(vec![0]),
            ..AppSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, SettingsError::ZeroThreshold);
    }

    #[test]
    fn blank_values_become_none_and_url_is_checked() {
        let settings = AppSettingsDraft {
            api_base_url: Some("https://jobs.example.com/api/".into()),
            api_token: Some("   ".into()),
            warning_thresholds: None,
        }
        .validate()
        .unwrap();
        assert_eq!(settings.api_base_url(), Some("https://jobs.example.com/api"));
        assert_eq!(settings.api_token(), None);

        let err = AppSettingsDraft {
            api_base_url: Some("not a url".into()),
            ..AppSettingsDraft::default()
        }
        .validate()
        .unwrap_err();
        assert_eq!(err, SettingsError::InvalidBaseUrl);
    }
}
