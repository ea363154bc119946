//! TOML settings for detector and prevention tuning.
//!
//! Every field is optional; unset fields fall back to the built-in
//! defaults. This is configuration loading only — nothing is written back.
//!
//! ```toml
//! [detector]
//! detection_threshold_db = -6.0
//! noise_floor_db = -60.0
//! stability_epsilon_db = 0.1
//! sustained_trigger_count = 3
//!
//! [prevention]
//! headroom_db = 6.0
//! max_gain_reduction_db = 24.0
//! mute_after_events = 4
//! route_from = "main"
//! route_to = "spare"
//! route_after_events = 8
//! ```

use anyhow::Context;
use larsen_monitor::{DetectorConfig, PreventionPolicy, RoutePair};
use serde::Deserialize;
use std::path::Path;

/// Root of the settings file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Settings {
    /// Detection tunables.
    #[serde(default)]
    pub detector: DetectorSettings,
    /// Prevention tunables.
    #[serde(default)]
    pub prevention: PreventionSettings,
}

/// `[detector]` section; mirrors [`DetectorConfig`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DetectorSettings {
    /// Channels louder than this are feedback candidates (dBFS).
    pub detection_threshold_db: Option<f32>,
    /// Channels at or below this level are never considered (dBFS).
    pub noise_floor_db: Option<f32>,
    /// Maximum window-to-window drift for a stable channel (dB).
    pub stability_epsilon_db: Option<f32>,
    /// Consecutive suspect windows required to trigger.
    pub sustained_trigger_count: Option<u32>,
}

/// `[prevention]` section; mirrors [`PreventionPolicy`].
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PreventionSettings {
    /// Margin added on top of event magnitude (dB).
    pub headroom_db: Option<f32>,
    /// Upper bound on any single gain reduction (dB).
    pub max_gain_reduction_db: Option<f32>,
    /// Consecutive same-channel events before escalating to a mute.
    pub mute_after_events: Option<u32>,
    /// Route to move away from when the reroute step fires.
    pub route_from: Option<String>,
    /// Route to move to when the reroute step fires.
    pub route_to: Option<String>,
    /// Consecutive same-channel events before escalating to a reroute.
    pub route_after_events: Option<u32>,
}

impl Settings {
    /// Load and parse a settings file.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("cannot read settings file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("invalid settings file {}", path.display()))
    }

    /// Detector configuration with unset fields defaulted.
    pub fn detector_config(&self) -> DetectorConfig {
        let defaults = DetectorConfig::default();
        DetectorConfig {
            detection_threshold_db: self
                .detector
                .detection_threshold_db
                .unwrap_or(defaults.detection_threshold_db),
            noise_floor_db: self.detector.noise_floor_db.unwrap_or(defaults.noise_floor_db),
            stability_epsilon_db: self
                .detector
                .stability_epsilon_db
                .unwrap_or(defaults.stability_epsilon_db),
            sustained_trigger_count: self
                .detector
                .sustained_trigger_count
                .unwrap_or(defaults.sustained_trigger_count),
        }
    }

    /// Prevention policy with unset fields defaulted.
    pub fn prevention_policy(&self) -> PreventionPolicy {
        let defaults = PreventionPolicy::default();
        let route_change = match (&self.prevention.route_from, &self.prevention.route_to) {
            (Some(from), Some(to)) => Some(RoutePair {
                from: from.clone(),
                to: to.clone(),
            }),
            _ => None,
        };
        PreventionPolicy {
            headroom_db: self.prevention.headroom_db.unwrap_or(defaults.headroom_db),
            max_gain_reduction_db: self
                .prevention
                .max_gain_reduction_db
                .unwrap_or(defaults.max_gain_reduction_db),
            mute_after_events: self.prevention.mute_after_events,
            route_change,
            route_after_events: self.prevention.route_after_events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_settings_give_defaults() {
        let settings: Settings = toml::from_str("").unwrap();
        assert_eq!(settings.detector_config(), DetectorConfig::default());
        assert_eq!(settings.prevention_policy(), PreventionPolicy::default());
    }

    #[test]
    fn partial_detector_section_merges_with_defaults() {
        let settings: Settings = toml::from_str(
            "[detector]\ndetection_threshold_db = -12.0\nsustained_trigger_count = 5\n",
        )
        .unwrap();
        let config = settings.detector_config();
        assert_eq!(config.detection_threshold_db, -12.0);
        assert_eq!(config.sustained_trigger_count, 5);
        assert_eq!(config.noise_floor_db, DetectorConfig::default().noise_floor_db);
    }

    #[test]
    fn route_pair_requires_both_ends() {
        let settings: Settings =
            toml::from_str("[prevention]\nroute_from = \"main\"\n").unwrap();
        assert_eq!(settings.prevention_policy().route_change, None);
    }

    #[test]
    fn full_prevention_section_round_trips() {
        let settings: Settings = toml::from_str(
            "[prevention]\nmute_after_events = 4\nroute_from = \"main\"\nroute_to = \"spare\"\nroute_after_events = 8\n",
        )
        .unwrap();
        let policy = settings.prevention_policy();
        assert_eq!(policy.mute_after_events, Some(4));
        assert_eq!(policy.route_after_events, Some(8));
        assert_eq!(
            policy.route_change,
            Some(RoutePair {
                from: "main".into(),
                to: "spare".into(),
            })
        );
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn unknown_fields_are_rejected() {
        assert!(toml::from_str::<Settings>("[detector]\nthreshold = -6.0\n").is_err());
    }
}
