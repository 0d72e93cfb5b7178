use serde_derive::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::Error;

pub const CONFIG_ENV: &str = "QFOLLOW_CONFIG";

const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.01;
const DEFAULT_GOOD_CONFIDENCE: f32 = 0.5;
const DEFAULT_EXISTENCE_CONFIDENCE: f32 = 0.3;
const DEFAULT_DISAGREEMENT_IOU: f32 = 0.7;
const DEFAULT_PERSON_LABEL: i32 = 15;

const DEFAULT_STOP_AREA_FRACTION: f32 = 0.6;
const DEFAULT_TRACKING_GAIN: f32 = 2.0;
const DEFAULT_DEGRADED_GAIN: f32 = 6.0;

const DEFAULT_POLL_INTERVAL_MS: u64 = 50;
const DEFAULT_POLL_MAX_BACKOFF_MS: u64 = 1000;
const DEFAULT_POLL_IDLE_TIMEOUT_MS: u64 = 10_000;

#[derive(Debug, Deserialize, Default)]
struct FollowConfigFile {
    arbitration: Option<ArbitrationConfigFile>,
    steering: Option<SteeringConfigFile>,
    polling: Option<PollingConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct ArbitrationConfigFile {
    confidence_threshold: Option<f32>,
    good_confidence: Option<f32>,
    existence_confidence: Option<f32>,
    disagreement_iou: Option<f32>,
    person_label: Option<i32>,
}

#[derive(Debug, Deserialize, Default)]
struct SteeringConfigFile {
    stop_area_fraction: Option<f32>,
    tracking_gain: Option<f32>,
    degraded_gain: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct PollingConfigFile {
    interval_ms: Option<u64>,
    max_backoff_ms: Option<u64>,
    idle_timeout_ms: Option<u64>,
}

/// Thresholds of the detection/tracking arbiter
#[derive(Debug, Clone, PartialEq)]
pub struct ArbitrationConfig {
    /// Detections scoring below this are ignored entirely.
    pub confidence_threshold: f32,
    /// A person must score strictly above this to become the target.
    pub good_confidence: f32,
    /// Best person score needed to keep tracking without a target.
    pub existence_confidence: f32,
    /// Tracker/detector IOU below this re-initializes the tracker.
    pub disagreement_iou: f32,
    pub person_label: i32,
}

impl Default for ArbitrationConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            good_confidence: DEFAULT_GOOD_CONFIDENCE,
            existence_confidence: DEFAULT_EXISTENCE_CONFIDENCE,
            disagreement_iou: DEFAULT_DISAGREEMENT_IOU,
            person_label: DEFAULT_PERSON_LABEL,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SteeringConfig {
    pub stop_area_fraction: f32,
    pub tracking_gain: f32,
    pub degraded_gain: f32,
}

impl Default for SteeringConfig {
    fn default() -> Self {
        Self {
            stop_area_fraction: DEFAULT_STOP_AREA_FRACTION,
            tracking_gain: DEFAULT_TRACKING_GAIN,
            degraded_gain: DEFAULT_DEGRADED_GAIN,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PollingConfig {
    pub interval: Duration,
    pub max_backoff: Duration,
    pub idle_timeout: Duration,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_backoff: Duration::from_millis(DEFAULT_POLL_MAX_BACKOFF_MS),
            idle_timeout: Duration::from_millis(DEFAULT_POLL_IDLE_TIMEOUT_MS),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FollowConfig {
    pub arbitration: ArbitrationConfig,
    pub steering: SteeringConfig,
    pub polling: PollingConfig,
}

impl FollowConfig {
    /// Loads `path`, or the file named by `QFOLLOW_CONFIG`, or defaults, then
    /// applies environment overrides and validates.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var(CONFIG_ENV).ok().map(PathBuf::from));

        let file_cfg = match path {
            Some(path) => {
                log::info!("loading config from {}", path.display());
                read_config_file(&path)?
            }
            None => FollowConfigFile::default(),
        };

        let mut cfg = Self::from_file(file_cfg);
        cfg.apply_env()?;
        cfg.validate()?;

        Ok(cfg)
    }

    pub fn from_toml(text: &str) -> Result<Self, Error> {
        let cfg = Self::from_file(toml::from_str(text)?);
        cfg.validate()?;

        Ok(cfg)
    }

    fn from_file(file: FollowConfigFile) -> Self {
        let arb = file.arbitration.unwrap_or_default();
        let steer = file.steering.unwrap_or_default();
        let poll = file.polling.unwrap_or_default();

        Self {
            arbitration: ArbitrationConfig {
                confidence_threshold: arb
                    .confidence_threshold
                    .unwrap_or(DEFAULT_CONFIDENCE_THRESHOLD),
                good_confidence: arb.good_confidence.unwrap_or(DEFAULT_GOOD_CONFIDENCE),
                existence_confidence: arb
                    .existence_confidence
                    .unwrap_or(DEFAULT_EXISTENCE_CONFIDENCE),
                disagreement_iou: arb.disagreement_iou.unwrap_or(DEFAULT_DISAGREEMENT_IOU),
                person_label: arb.person_label.unwrap_or(DEFAULT_PERSON_LABEL),
            },
            steering: SteeringConfig {
                stop_area_fraction: steer
                    .stop_area_fraction
                    .unwrap_or(DEFAULT_STOP_AREA_FRACTION),
                tracking_gain: steer.tracking_gain.unwrap_or(DEFAULT_TRACKING_GAIN),
                degraded_gain: steer.degraded_gain.unwrap_or(DEFAULT_DEGRADED_GAIN),
            },
            polling: PollingConfig {
                interval: Duration::from_millis(
                    poll.interval_ms.unwrap_or(DEFAULT_POLL_INTERVAL_MS),
                ),
                max_backoff: Duration::from_millis(
                    poll.max_backoff_ms.unwrap_or(DEFAULT_POLL_MAX_BACKOFF_MS),
                ),
                idle_timeout: Duration::from_millis(
                    poll.idle_timeout_ms.unwrap_or(DEFAULT_POLL_IDLE_TIMEOUT_MS),
                ),
            },
        }
    }

    fn apply_env(&mut self) -> Result<(), Error> {
        if let Ok(value) = std::env::var("QFOLLOW_CONFIDENCE_THRESHOLD") {
            self.arbitration.confidence_threshold = value.trim().parse().map_err(|_| {
                Error::InvalidConfig(format!("QFOLLOW_CONFIDENCE_THRESHOLD={}", value))
            })?;
        }
        if let Ok(value) = std::env::var("QFOLLOW_PERSON_LABEL") {
            self.arbitration.person_label = value
                .trim()
                .parse()
                .map_err(|_| Error::InvalidConfig(format!("QFOLLOW_PERSON_LABEL={}", value)))?;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), Error> {
        let arb = &self.arbitration;
        for (name, value) in [
            ("confidence_threshold", arb.confidence_threshold),
            ("good_confidence", arb.good_confidence),
            ("existence_confidence", arb.existence_confidence),
            ("disagreement_iou", arb.disagreement_iou),
            ("stop_area_fraction", self.steering.stop_area_fraction),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidConfig(format!(
                    "{} must be within [0, 1], got {}",
                    name, value
                )));
            }
        }

        for (name, value) in [
            ("tracking_gain", self.steering.tracking_gain),
            ("degraded_gain", self.steering.degraded_gain),
        ] {
            if !value.is_finite() || value <= 0.0 {
                return Err(Error::InvalidConfig(format!(
                    "{} must be positive, got {}",
                    name, value
                )));
            }
        }

        let poll = &self.polling;
        if poll.interval.is_zero() || poll.interval > poll.max_backoff {
            return Err(Error::InvalidConfig(format!(
                "polling interval {:?} must be non-zero and at most max_backoff {:?}",
                poll.interval, poll.max_backoff
            )));
        }

        Ok(())
    }
}

fn read_config_file(path: &Path) -> Result<FollowConfigFile, Error> {
    let text = std::fs::read_to_string(path)?;

    Ok(toml::from_str(&text)?)
}
