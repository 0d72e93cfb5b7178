use crate::bbox::BBox;
use crate::error::Error;
use crate::frame::Frame;
use nalgebra as na;

/// Single-object visual tracker collaborator.
///
/// `track` is only called after at least one `init` in the current session.
pub trait Tracker {
    /// Discards the appearance model and restarts from `bbox`.
    fn init(&mut self, frame: &Frame, bbox: BBox) -> Result<(), Error>;

    /// Estimates the target box in `frame`, in the same pixel space as `init`.
    fn track(&mut self, frame: &Frame) -> Result<BBox, Error>;

    /// Forgets all state before a new session.
    fn reset(&mut self) {}
}

/// Constant-velocity box extrapolator.
///
/// Velocity is measured between consecutive initializations and blended into the
/// running estimate, so a tracker re-initialized from detections keeps drifting
/// in the direction the target was last seen moving.
#[derive(Debug, Clone)]
pub struct MotionTracker {
    bbox: Option<BBox>,
    vel: na::Vector2<f32>,
    vel_initialized: bool,
    frames_since_init: u32,
    correction: f32,
}

impl MotionTracker {
    pub fn new(correction: f32) -> Self {
        Self {
            bbox: None,
            vel: na::Vector2::zeros(),
            vel_initialized: false,
            frames_since_init: 0,
            correction: correction.clamp(0.0, 1.0),
        }
    }

    #[inline]
    pub fn velocity(&self) -> na::Vector2<f32> {
        self.vel
    }

    #[inline]
    pub fn last_init(&self) -> Option<BBox> {
        self.bbox
    }
}

impl Default for MotionTracker {
    fn default() -> Self {
        Self::new(0.2)
    }
}

impl Tracker for MotionTracker {
    fn init(&mut self, _frame: &Frame, bbox: BBox) -> Result<(), Error> {
        if let Some(prev) = self.bbox {
            let dt = self.frames_since_init.max(1) as f32;
            let vel = (bbox.center() - prev.center()) / dt;

            if self.vel_initialized {
                self.vel += (vel - self.vel) * self.correction;
            } else {
                self.vel = vel;
                self.vel_initialized = true;
            }
        }

        self.bbox = Some(bbox);
        self.frames_since_init = 0;

        Ok(())
    }

    fn track(&mut self, _frame: &Frame) -> Result<BBox, Error> {
        let bbox = self.bbox.ok_or(Error::TrackerUninitialized)?;
        self.frames_since_init += 1;

        Ok(bbox.translate(self.vel * self.frames_since_init as f32))
    }

    fn reset(&mut self) {
        *self = Self::new(self.correction);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BBox {
        BBox::ltrb(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn holds_box_without_motion() {
        let frame = Frame::blank(0, (640, 480));
        let mut tracker = MotionTracker::default();
        let b = bbox(10.0, 10.0, 50.0, 90.0);

        tracker.init(&frame, b).unwrap();
        assert_eq!(tracker.track(&frame).unwrap(), b);
        assert_eq!(tracker.track(&frame).unwrap(), b);
    }

    #[test]
    fn extrapolates_last_motion() {
        let frame = Frame::blank(0, (640, 480));
        let mut tracker = MotionTracker::default();

        tracker.init(&frame, bbox(0.0, 0.0, 10.0, 10.0)).unwrap();
        tracker.track(&frame).unwrap();
        tracker.track(&frame).unwrap();
        // moved 20px right over two frames
        tracker.init(&frame, bbox(20.0, 0.0, 30.0, 10.0)).unwrap();
        assert_eq!(tracker.velocity(), na::Vector2::new(10.0, 0.0));

        let est = tracker.track(&frame).unwrap();
        assert_eq!(est.as_slice(), &[30.0, 0.0, 40.0, 10.0]);
    }

    #[test]
    fn track_before_init_fails() {
        let frame = Frame::blank(0, (640, 480));
        let mut tracker = MotionTracker::default();
        assert!(matches!(
            tracker.track(&frame),
            Err(Error::TrackerUninitialized)
        ));
    }

    #[test]
    fn reset_forgets_state() {
        let frame = Frame::blank(0, (640, 480));
        let mut tracker = MotionTracker::default();
        tracker.init(&frame, bbox(0.0, 0.0, 10.0, 10.0)).unwrap();
        tracker.reset();

        assert!(tracker.last_init().is_none());
        assert!(tracker.track(&frame).is_err());
    }
}
