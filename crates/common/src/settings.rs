use config::{Config, Environment, File, FileFormat};
use error_stack::{Report, ResultExt};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::HtbError;
use crate::integrations::justpremium::JustPremiumConfig;

/// Prefix for environment overrides, e.g. `JUSTPREMIUM_HTB__JUSTPREMIUM__ENDPOINT`.
pub const ENVIRONMENT_PREFIX: &str = "JUSTPREMIUM_HTB";

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Logging {
    #[serde(default = "default_log_level")]
    #[validate(length(min = 1))]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub justpremium: JustPremiumConfig,
    #[serde(default)]
    #[validate(nested)]
    pub logging: Logging,
}

impl Settings {
    /// Load the settings embedded at build time, with environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the embedded TOML or an override is invalid.
    pub fn new() -> Result<Self, Report<HtbError>> {
        let toml_str = include_str!("../../../justpremium-htb.toml");

        Self::from_toml(toml_str)
    }

    /// Parse settings from TOML, layering `JUSTPREMIUM_HTB__*` environment
    /// variables on top, then validate.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The TOML is malformed or a required section is missing
    /// - A value has the wrong type
    /// - Validation fails
    pub fn from_toml(toml_str: &str) -> Result<Self, Report<HtbError>> {
        let environment = Environment::default()
            .prefix(ENVIRONMENT_PREFIX)
            .separator("__");

        let toml = File::from_str(toml_str, FileFormat::Toml);
        let config = Config::builder()
            .add_source(toml)
            .add_source(environment)
            .build()
            .change_context(HtbError::Configuration {
                message: "Failed to build configuration".to_string(),
            })?;

        let settings: Self = config
            .try_deserialize()
            .change_context(HtbError::Configuration {
                message: "Failed to deserialize configuration".to_string(),
            })?;

        settings.validate().change_context(HtbError::Configuration {
            message: "Configuration validation failed".to_string(),
        })?;

        log::debug!(
            "Loaded settings for partner {} v{}",
            settings.justpremium.partner_id,
            settings.justpremium.version
        );

        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::bid_transformer::RoundingType;
    use crate::integrations::justpremium::{Architecture, LineItemType};
    use crate::test_support::tests::crate_test_settings_str;

    #[test]
    fn test_settings_new() {
        // Test that Settings::new() loads successfully
        let settings = Settings::new();
        assert!(settings.is_ok(), "Settings should load from embedded TOML");

        let settings = settings.expect("should load settings");
        assert_eq!(settings.justpremium.partner_id, "JustPremiumHtb");
        assert_eq!(settings.justpremium.stats_id, "JUSTP");
        assert_eq!(settings.justpremium.targeting_keys.id, "ix_justp_id");
        assert_eq!(settings.justpremium.line_item_type, LineItemType::IdAndSize);
        assert!(settings.justpremium.features.gpt_line_items);
    }

    #[test]
    fn test_settings_from_valid_toml() {
        let settings =
            Settings::from_toml(&crate_test_settings_str()).expect("should parse test settings");

        assert_eq!(
            settings.justpremium.loader_url,
            "//cdn-cf.justpremium.com/js/"
        );
        assert_eq!(settings.justpremium.architecture, Architecture::Fsra);
        assert_eq!(
            settings.justpremium.transformers.targeting.buckets.len(),
            2
        );
        assert_eq!(
            settings.justpremium.transformers.price.rounding_type,
            RoundingType::None
        );
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn test_settings_defaults_fill_minimal_section() {
        let settings = Settings::from_toml("[justpremium]\n").expect("should apply defaults");

        assert!(settings.justpremium.enabled);
        assert_eq!(settings.justpremium.targeting_keys.om, "ix_justp_cpm");
        assert_eq!(settings.justpremium.loader_cookie, "jpxhbjs");
        assert!(settings.justpremium.bid_transformer.is_none());
        assert_eq!(settings.logging.level, "info");
    }

    #[test]
    fn test_settings_empty_toml() {
        temp_env::with_var_unset("JUSTPREMIUM_HTB__JUSTPREMIUM__ENDPOINT", || {
            let settings = Settings::from_toml("");
            assert!(settings.is_err(), "Should fail with empty TOML");
        });
    }

    #[test]
    fn test_settings_invalid_toml_syntax() {
        let toml_str = r#"
            [justpremium
            endpoint = "//pre.ads.justpremium.com"
            "#;

        let settings = Settings::from_toml(toml_str);
        assert!(settings.is_err(), "Should fail with invalid TOML syntax");
    }

    #[test]
    fn test_settings_validation_failure() {
        let toml_str = r#"
            [justpremium.targeting_keys]
            id = ""
            "#;

        let settings = Settings::from_toml(toml_str);
        assert!(settings.is_err(), "Empty targeting key should fail validation");
        let err = settings.expect_err("should fail");
        assert!(format!("{err}").contains("Configuration error"));
    }

    #[test]
    fn test_settings_rejects_bad_transformer() {
        let toml_str = r#"
            [justpremium.transformers.targeting]
            output_cents_divisor = 0
            "#;

        assert!(Settings::from_toml(toml_str).is_err());
    }

    #[test]
    fn test_override_env() {
        temp_env::with_var(
            "JUSTPREMIUM_HTB__JUSTPREMIUM__ENDPOINT",
            Some("//bid.example.com/ixhr"),
            || {
                let settings = Settings::from_toml(&crate_test_settings_str());

                assert!(settings.is_ok(), "Settings should load with env override");
                assert_eq!(
                    settings.expect("should load").justpremium.endpoint,
                    "//bid.example.com/ixhr"
                );
            },
        );
    }
}
