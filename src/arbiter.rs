//! Per-frame arbitration between detector output and the single-object tracker.
//!
//! The tracker is the only state carried from frame to frame. Each frame the arbiter
//! picks the closest confident person, then either starts the tracker on it, lets
//! the tracker run and re-initializes it when the two disagree, keeps the tracker
//! running on weak evidence, or gives up for this frame.

use serde_derive::{Deserialize, Serialize};

use crate::bbox::BBox;
use crate::config::{ArbitrationConfig, SteeringConfig};
use crate::detection::Detection;
use crate::error::Error;
use crate::frame::Frame;
use crate::steering::{self, Command};
use crate::tracker::Tracker;

/// Per-frame classification of how much the target position can be trusted
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    /// Tracker was just started from a detection.
    Initializing,
    /// Confident detection and tracker both available.
    Tracking,
    /// Only a weak person signal, tracker estimate is used as is.
    Degraded,
    /// No usable target this frame.
    Idle,
}

/// Session state between frames
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArbiterState {
    Uninitialized,
    Tracking,
    Degraded,
    Idle,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Detection,
    TrackerEstimate,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Decision {
    pub regime: Regime,
    /// Box to steer by; always the tracker's own estimate once tracking.
    pub primary: Option<BBox>,
    /// Display boxes, clipped to the frame.
    pub boxes: Vec<(BBox, Role)>,
    /// Tracker was restarted from the detection; takes effect next frame.
    pub reinitialized: bool,
}

impl Decision {
    fn idle() -> Self {
        Self {
            regime: Regime::Idle,
            primary: None,
            boxes: vec![],
            reinitialized: false,
        }
    }
}

/// Result of scanning one frame's detections
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Selection<'a> {
    /// Largest confident person.
    pub closest: Option<&'a Detection>,
    /// Highest person score above the base threshold, regardless of size.
    pub best_person_score: Option<f32>,
}

pub fn select<'a>(dets: &'a [Detection], cfg: &ArbitrationConfig) -> Selection<'a> {
    let mut closest: Option<&Detection> = None;
    let mut max_area = -1.0;
    let mut best_person_score: Option<f32> = None;

    for det in dets {
        if det.confidence.is_nan()
            || det.confidence < cfg.confidence_threshold
            || det.class != cfg.person_label
        {
            continue;
        }

        let area = det.area();
        if area > max_area && det.confidence > cfg.good_confidence {
            max_area = area;
            closest = Some(det);
        }

        if best_person_score.map_or(true, |best| det.confidence > best) {
            best_person_score = Some(det.confidence);
        }
    }

    Selection {
        closest,
        best_person_score,
    }
}

pub struct Arbiter<T: Tracker> {
    tracker: T,
    config: ArbitrationConfig,
    steering: SteeringConfig,
    initialized: bool,
    state: ArbiterState,
    reinit_count: u64,
}

impl<T: Tracker> Arbiter<T> {
    pub fn new(tracker: T, config: ArbitrationConfig, steering: SteeringConfig) -> Self {
        Self {
            tracker,
            config,
            steering,
            initialized: false,
            state: ArbiterState::Uninitialized,
            reinit_count: 0,
        }
    }

    /// Starts a new session: the tracker forgets its target.
    pub fn begin_session(&mut self) {
        self.tracker.reset();
        self.initialized = false;
        self.state = ArbiterState::Uninitialized;
        self.reinit_count = 0;
    }

    #[inline]
    pub fn state(&self) -> ArbiterState {
        self.state
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    #[inline]
    pub fn reinit_count(&self) -> u64 {
        self.reinit_count
    }

    #[inline]
    pub fn tracker(&self) -> &T {
        &self.tracker
    }

    /// Decides the frame and maps the decision onto an actuator command.
    pub fn arbitrate_frame(
        &mut self,
        frame: &Frame,
        dets: &[Detection],
    ) -> Result<(Decision, Command), Error> {
        let decision = self.decide(frame, dets)?;
        let command = steering::steer(&decision, frame.dims, &self.steering);

        Ok((decision, command))
    }

    pub fn decide(&mut self, frame: &Frame, dets: &[Detection]) -> Result<Decision, Error> {
        frame.ensure_not_empty()?;

        let selection = select(dets, &self.config);
        let (fw, fh) = frame.dims;

        let decision = match (self.initialized, selection.closest) {
            (false, Some(closest)) => {
                self.tracker.init(frame, closest.bbox)?;
                self.initialized = true;

                log::info!(
                    "frame {}: tracker initialized at {:?}",
                    frame.index,
                    closest.bbox.as_slice()
                );

                Decision {
                    regime: Regime::Initializing,
                    primary: Some(closest.bbox),
                    boxes: vec![(closest.bbox.clamp_to_frame(fw, fh), Role::Detection)],
                    reinitialized: false,
                }
            }

            (true, Some(closest)) => {
                let estimate = self.tracker.track(frame)?;
                let iou = estimate.iou(&closest.bbox);

                let reinitialized = iou < self.config.disagreement_iou;
                if reinitialized {
                    log::debug!(
                        "frame {}: tracker/detector iou {:.3}, re-initializing",
                        frame.index,
                        iou
                    );

                    self.tracker.init(frame, closest.bbox)?;
                    self.reinit_count += 1;
                }

                Decision {
                    regime: Regime::Tracking,
                    primary: Some(estimate),
                    boxes: vec![
                        (closest.bbox.clamp_to_frame(fw, fh), Role::Detection),
                        (estimate.clamp_to_frame(fw, fh), Role::TrackerEstimate),
                    ],
                    reinitialized,
                }
            }

            (true, None)
                if selection
                    .best_person_score
                    .map_or(false, |score| score >= self.config.existence_confidence) =>
            {
                let estimate = self.tracker.track(frame)?;

                Decision {
                    regime: Regime::Degraded,
                    primary: Some(estimate),
                    boxes: vec![(estimate.clamp_to_frame(fw, fh), Role::TrackerEstimate)],
                    reinitialized: false,
                }
            }

            _ => Decision::idle(),
        };

        let next = match decision.regime {
            Regime::Initializing | Regime::Tracking => ArbiterState::Tracking,
            Regime::Degraded => ArbiterState::Degraded,
            Regime::Idle if self.initialized => ArbiterState::Idle,
            Regime::Idle => ArbiterState::Uninitialized,
        };

        if next != self.state {
            log::info!(
                "frame {}: {:?} -> {:?}",
                frame.index,
                self.state,
                next
            );
        }
        log::debug!("frame {}: {:?}", frame.index, decision.regime);

        self.state = next;

        Ok(decision)
    }
}
