use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{assets::AssetCatalog, rules::Week, Result};

/// Timing preset controlling stimulus density. Deserializes from any string,
/// falling back to the nearest profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AudienceProfile {
    Junior,
    #[default]
    Standard,
    Advanced,
}

impl AudienceProfile {
    pub const ALL: [AudienceProfile; 3] = [
        AudienceProfile::Junior,
        AudienceProfile::Standard,
        AudienceProfile::Advanced,
    ];

    /// How long a stimulus stays on screen.
    pub fn cue_ms(self) -> u32 {
        match self {
            AudienceProfile::Junior => 1_000,
            AudienceProfile::Standard => 700,
            AudienceProfile::Advanced => 500,
        }
    }

    /// Stage C pause between stimuli.
    pub fn blank_ms(self) -> u32 {
        match self {
            AudienceProfile::Junior => 800,
            AudienceProfile::Standard => 600,
            AudienceProfile::Advanced => 500,
        }
    }

    pub fn tag(self) -> &'static str {
        match self {
            AudienceProfile::Junior => "1000ms",
            AudienceProfile::Standard => "700ms",
            AudienceProfile::Advanced => "500ms",
        }
    }

    /// Parses a tag (`"700ms"`), a name (`"junior"`) or any `"<n>ms"` value,
    /// which snaps to the profile with the closest cue length.
    pub fn parse_lenient(raw: &str) -> Self {
        let raw = raw.trim().to_ascii_lowercase();
        match raw.as_str() {
            "junior" => return AudienceProfile::Junior,
            "standard" => return AudienceProfile::Standard,
            "advanced" => return AudienceProfile::Advanced,
            _ => {}
        }
        let digits = raw.strip_suffix("ms").unwrap_or(&raw).trim();
        match digits.parse::<i64>() {
            Ok(ms) => Self::ALL
                .into_iter()
                .min_by_key(|profile| (i64::from(profile.cue_ms()) - ms).abs())
                .unwrap_or_default(),
            Err(_) => {
                tracing::debug!(raw = %raw, "unknown audience profile, using standard");
                AudienceProfile::default()
            }
        }
    }
}

impl From<String> for AudienceProfile {
    fn from(value: String) -> Self {
        Self::parse_lenient(&value)
    }
}

impl From<AudienceProfile> for String {
    fn from(value: AudienceProfile) -> Self {
        value.tag().to_string()
    }
}

impl std::fmt::Display for AudienceProfile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Immutable input to the timeline compiler.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ThinkConfig {
    #[serde(default)]
    pub audience: AudienceProfile,
    #[serde(default)]
    pub week: Week,
    #[serde(default)]
    pub seed: u32,
    #[serde(default)]
    pub month: Option<u8>,
    #[serde(default)]
    pub assets: AssetCatalog,
}

impl ThinkConfig {
    pub fn new(week: Week, audience: AudienceProfile, seed: u32) -> Self {
        Self {
            audience,
            week,
            seed,
            ..Self::default()
        }
    }

    pub fn with_month(mut self, month: u8) -> Self {
        self.month = Some(month);
        self
    }

    pub fn with_assets(mut self, assets: AssetCatalog) -> Self {
        self.assets = assets;
        self
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profiles_snap_to_nearest_cue_length() {
        assert_eq!(AudienceProfile::parse_lenient("700ms"), AudienceProfile::Standard);
        assert_eq!(AudienceProfile::parse_lenient("1000ms"), AudienceProfile::Junior);
        assert_eq!(AudienceProfile::parse_lenient("450ms"), AudienceProfile::Advanced);
        assert_eq!(AudienceProfile::parse_lenient("5000"), AudienceProfile::Junior);
        assert_eq!(AudienceProfile::parse_lenient(" Junior "), AudienceProfile::Junior);
        assert_eq!(AudienceProfile::parse_lenient("toddlers"), AudienceProfile::Standard);
    }

    #[test]
    fn config_parses_with_defaults_and_lenient_values() {
        let json = r#"{ "audience": "650ms", "week": 9, "seed": 7 }"#;
        let config = ThinkConfig::from_json(json).unwrap();
        assert_eq!(config.audience, AudienceProfile::Standard);
        assert_eq!(config.week, Week::Four);
        assert_eq!(config.seed, 7);
        assert_eq!(config.month, None);
        assert!(config.assets.pack.is_none());

        let empty = ThinkConfig::from_json("{}").unwrap();
        assert_eq!(empty, ThinkConfig::default());
    }

    #[test]
    fn config_round_trips_through_json() {
        let config = ThinkConfig::new(Week::Two, AudienceProfile::Advanced, 99).with_month(4);
        let json = serde_json::to_string(&config).unwrap();
        assert!(json.contains("\"audience\":\"500ms\""));
        assert_eq!(ThinkConfig::from_json(&json).unwrap(), config);
    }

    #[test]
    fn load_reports_missing_files() {
        let err = ThinkConfig::load("/definitely/not/here.json").unwrap_err();
        assert!(matches!(err, crate::ThinkError::Io(_)));
    }
}
