use serde_derive::{Deserialize, Serialize};

use crate::arbiter::{Decision, Regime};
use crate::config::SteeringConfig;

/// Gait command for the actuator sink, rebuilt from scratch every frame.
///
/// Fields not driven by the current decision keep their neutral value.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq)]
pub struct Command {
    pub turn: f32,
    pub speed: f32,
    pub sit: bool,
    pub stand: bool,
    pub walk: bool,
}

impl Command {
    /// Stop and stand in place.
    #[inline]
    pub fn halt() -> Self {
        Self {
            stand: true,
            ..Default::default()
        }
    }

    #[inline]
    pub fn walk_turning(turn: f32) -> Self {
        Self {
            turn,
            walk: true,
            ..Default::default()
        }
    }
}

/// Maps a decision onto a command for a frame of `dims` pixels.
pub fn steer(decision: &Decision, dims: (u32, u32), cfg: &SteeringConfig) -> Command {
    let gain = match decision.regime {
        Regime::Tracking => cfg.tracking_gain,
        Regime::Degraded => cfg.degraded_gain,
        // initialization only shows the new box, actuation matches Idle
        Regime::Initializing | Regime::Idle => return Command::halt(),
    };

    let Some(bbox) = decision.primary else {
        return Command::halt();
    };

    let (fw, fh) = (dims.0 as f32, dims.1 as f32);
    let area_fraction = bbox.area() / (fw * fh);
    if !area_fraction.is_finite() || area_fraction > cfg.stop_area_fraction {
        return Command::halt();
    }

    let turn = ((bbox.left() + bbox.right()) / fw / 2.0 - 0.5) * gain;

    Command::walk_turning(turn)
}
