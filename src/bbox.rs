use crate::error::Error;
use nalgebra as na;
use serde_derive::{Deserialize, Serialize};

/// Left-top-right-bottom box in image pixel coordinates
///
/// Edges are checked to be finite at construction. Ordering of the edges is the
/// caller's responsibility: detector and tracker output arrive already ordered,
/// and an inverted box simply has zero area.
#[derive(Serialize, Deserialize, Debug, Copy, Clone, PartialEq)]
pub struct BBox([f32; 4]);

impl From<BBox> for [f32; 4] {
    fn from(bbox: BBox) -> Self {
        bbox.0
    }
}

impl BBox {
    #[inline]
    pub fn ltrb(x1: f32, y1: f32, x2: f32, y2: f32) -> Result<Self, Error> {
        let edges = [x1, y1, x2, y2];
        if edges.iter().all(|v| v.is_finite()) {
            Ok(BBox(edges))
        } else {
            Err(Error::DegenerateGeometry(edges))
        }
    }

    /// Scales a box given in normalized [0, 1] image coordinates to pixel space.
    #[inline]
    pub fn from_normalized(norm: [f32; 4], dims: (u32, u32)) -> Result<Self, Error> {
        let (fw, fh) = (dims.0 as f32, dims.1 as f32);

        Self::ltrb(norm[0] * fw, norm[1] * fh, norm[2] * fw, norm[3] * fh)
    }

    #[inline]
    pub fn as_slice(&self) -> &[f32; 4] {
        &self.0
    }

    #[inline(always)]
    pub fn left(&self) -> f32 {
        self.0[0]
    }

    #[inline(always)]
    pub fn top(&self) -> f32 {
        self.0[1]
    }

    #[inline(always)]
    pub fn right(&self) -> f32 {
        self.0[2]
    }

    #[inline(always)]
    pub fn bottom(&self) -> f32 {
        self.0[3]
    }

    #[inline(always)]
    pub fn width(&self) -> f32 {
        (self.0[2] - self.0[0]).max(0.0)
    }

    #[inline(always)]
    pub fn height(&self) -> f32 {
        (self.0[3] - self.0[1]).max(0.0)
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    #[inline]
    pub fn center(&self) -> na::Point2<f32> {
        na::Point2::new(
            (self.0[0] + self.0[2]) / 2.0,
            (self.0[1] + self.0[3]) / 2.0,
        )
    }

    /// Zero-area boxes are allowed but never overlap anything.
    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.area() <= 0.0
    }

    pub fn translate(&self, offset: na::Vector2<f32>) -> Self {
        BBox([
            self.0[0] + offset.x,
            self.0[1] + offset.y,
            self.0[2] + offset.x,
            self.0[3] + offset.y,
        ])
    }

    /// Intersection over union, always in `[0, 1]`.
    ///
    /// Computed in `f64`: edges far apart in `f32` overflow the width product.
    pub fn iou(&self, other: &BBox) -> f32 {
        let b1_area = self.area_f64();
        let b2_area = other.area_f64();
        if b1_area <= 0.0 || b2_area <= 0.0 {
            return 0.0;
        }

        let i_xmin = self.left().max(other.left()) as f64;
        let i_xmax = self.right().min(other.right()) as f64;
        let i_ymin = self.top().max(other.top()) as f64;
        let i_ymax = self.bottom().min(other.bottom()) as f64;
        let i_area = (i_xmax - i_xmin).max(0.) * (i_ymax - i_ymin).max(0.);

        let union = b1_area + b2_area - i_area;
        let ratio = i_area / union;
        if !ratio.is_finite() || union <= 0.0 {
            return 0.0;
        }

        ratio.clamp(0.0, 1.0) as f32
    }

    #[inline]
    fn area_f64(&self) -> f64 {
        let w = (self.0[2] as f64 - self.0[0] as f64).max(0.0);
        let h = (self.0[3] as f64 - self.0[1] as f64).max(0.0);

        w * h
    }

    /// Clips the edges to `[0, width] x [0, height]`. Display only.
    pub fn clamp_to_frame(&self, width: u32, height: u32) -> Self {
        let (w, h) = (width as f32, height as f32);

        BBox([
            self.0[0].clamp(0.0, w),
            self.0[1].clamp(0.0, h),
            self.0[2].clamp(0.0, w),
            self.0[3].clamp(0.0, h),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x1: f32, y1: f32, x2: f32, y2: f32) -> BBox {
        BBox::ltrb(x1, y1, x2, y2).unwrap()
    }

    #[test]
    fn rejects_non_finite_edges() {
        assert!(matches!(
            BBox::ltrb(0.0, f32::NAN, 1.0, 1.0),
            Err(Error::DegenerateGeometry(_))
        ));
        assert!(BBox::ltrb(0.0, 0.0, f32::INFINITY, 1.0).is_err());
    }

    #[test]
    fn inverted_box_has_zero_area() {
        let b = bbox(10.0, 10.0, 5.0, 20.0);
        assert_eq!(b.area(), 0.0);
        assert!(b.is_degenerate());
    }

    #[test]
    fn area_and_center() {
        let b = bbox(64.0, 48.0, 192.0, 144.0);
        assert_eq!(b.area(), 128.0 * 96.0);
        assert_eq!(b.center(), na::Point2::new(128.0, 96.0));
    }

    #[test]
    fn scales_normalized_coordinates() {
        let b = BBox::from_normalized([0.1, 0.1, 0.3, 0.3], (640, 480)).unwrap();
        assert!((b.left() - 64.0).abs() < 1e-3);
        assert!((b.top() - 48.0).abs() < 1e-3);
        assert!((b.right() - 192.0).abs() < 1e-3);
        assert!((b.bottom() - 144.0).abs() < 1e-3);
    }

    #[test]
    fn iou_identity_and_symmetry() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let b = bbox(5.0, 0.0, 15.0, 10.0);

        assert_eq!(a.iou(&a), 1.0);
        assert_eq!(a.iou(&b), b.iou(&a));
        // 50 / (100 + 100 - 50)
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }

    #[test]
    fn iou_zero_cases() {
        let a = bbox(0.0, 0.0, 10.0, 10.0);
        let far = bbox(20.0, 20.0, 30.0, 30.0);
        let touching = bbox(10.0, 0.0, 20.0, 10.0);
        let flat = bbox(2.0, 2.0, 8.0, 2.0);

        assert_eq!(a.iou(&far), 0.0);
        assert_eq!(a.iou(&touching), 0.0);
        assert_eq!(a.iou(&flat), 0.0);
        assert_eq!(flat.iou(&flat), 0.0);
    }

    #[test]
    fn iou_stays_in_unit_range() {
        let boxes = [
            bbox(0.0, 0.0, 10.0, 10.0),
            bbox(2.0, 3.0, 7.0, 9.0),
            bbox(-5.0, -5.0, 50.0, 50.0),
            bbox(9.0, 9.0, 11.0, 11.0),
        ];
        for a in &boxes {
            for b in &boxes {
                let v = a.iou(b);
                assert!((0.0..=1.0).contains(&v));
                assert_eq!(v, b.iou(a));
            }
        }
    }

    #[test]
    fn iou_of_huge_boxes_is_defined() {
        let a = bbox(-3.0e38, 0.0, 3.0e38, 10.0);
        let left = bbox(-3.0e38, 0.0, 0.0, 10.0);

        assert!(a.area().is_infinite());
        assert_eq!(a.iou(&a), 1.0);
        assert!((a.iou(&left) - 0.5).abs() < 1e-6);
        assert_eq!(left.iou(&bbox(0.0, 0.0, 3.0e38, 10.0)), 0.0);
    }

    #[test]
    fn clamps_to_frame() {
        let b = bbox(-10.0, 20.0, 700.0, 500.0).clamp_to_frame(640, 480);
        assert_eq!(b.as_slice(), &[0.0, 20.0, 640.0, 480.0]);
    }
}
