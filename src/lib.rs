pub mod arbiter;
pub mod batch;
pub mod bbox;
pub mod config;
pub mod detection;
pub mod detector;
pub mod error;
pub mod frame;
pub mod session;
pub mod sink;
pub mod source;
pub mod steering;
pub mod tracker;

pub use arbiter::{Arbiter, Decision, Regime};
pub use bbox::BBox;
pub use config::FollowConfig;
pub use detection::Detection;
pub use error::Error;
pub use frame::Frame;
pub use session::Session;
pub use steering::Command;
pub use tracker::{MotionTracker, Tracker};

/// Builds an arbiter with the thresholds and gains from `config`.
pub fn new_arbiter<T: Tracker>(tracker: T, config: &FollowConfig) -> Arbiter<T> {
    Arbiter::new(
        tracker,
        config.arbitration.clone(),
        config.steering.clone(),
    )
}
