use std::env;

use assess_core::model::AppSettingsDraft;

pub const ENV_API_BASE_URL: &str = "ASSESS_API_BASE_URL";
pub const ENV_API_TOKEN: &str = "ASSESS_API_TOKEN";
pub const ENV_WARNING_THRESHOLDS: &str = "ASSESS_WARNING_THRESHOLDS";

/// Collect settings from the process environment.
///
/// Unparseable threshold entries are skipped; an empty variable disables warnings.
#[must_use]
pub fn settings_from_env() -> AppSettingsDraft {
    draft_from_lookup(|key| env::var(key).ok())
}

pub(crate) fn draft_from_lookup(lookup: impl Fn(&str) -> Option<String>) -> AppSettingsDraft {
    AppSettingsDraft {
        api_base_url: lookup(ENV_API_BASE_URL),
        api_token: lookup(ENV_API_TOKEN),
        warning_thresholds: lookup(ENV_WARNING_THRESHOLDS).map(|raw| parse_thresholds(&raw)),
    }
}

/// Parse a comma separated list of seconds, e.g. `"300,60"`.
#[must_use]
pub fn parse_thresholds(raw: &str) -> Vec<u32> {
    raw.split(',')
        .filter_map(|part| part.trim().parse::<u32>().ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn thresholds_skip_garbage() {
        assert_eq!(parse_thresholds("300, 60,abc,,10"), vec![300, 60, 10]);
        assert!(parse_thresholds("").is_empty());
    }

    #[test]
    fn draft_reads_all_variables() {
        let draft = draft_from_lookup(|key| match key {
            ENV_API_BASE_URL => Some("https://jobs.example.com/api".into()),
            ENV_API_TOKEN => Some("secret".into()),
            ENV_WARNING_THRESHOLDS => Some("120".into()),
            _ => None,
        });
        assert_eq!(draft.api_base_url.as_deref(), Some("https://jobs.example.com/api"));
        assert_eq!(draft.api_token.as_deref(), Some("secret"));
        assert_eq!(draft.warning_thresholds, Some(vec![120]));
    }

    #[test]
    fn missing_thresholds_keep_defaults() {
        let draft = draft_from_lookup(|_| None);
        assert!(draft.warning_thresholds.is_none());
        let settings = draft.validate().unwrap();
        assert_eq!(settings.warning_thresholds(), [300, 60]);
    }
}
