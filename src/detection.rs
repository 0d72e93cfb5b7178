use serde_derive::{Deserialize, Serialize};

use crate::bbox::BBox;
use crate::error::Error;

/// Number of fields in one detector output record:
/// `[image_id, label, score, xmin, ymin, xmax, ymax]`
pub const RECORD_LEN: usize = 7;

/// Label value the detector uses for padding rows
pub const INVALID_LABEL: i32 = -1;

/// One accepted detection in pixel coordinates
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    #[serde(rename = "c")]
    pub class: i32,
    #[serde(rename = "p")]
    pub confidence: f32,
    pub bbox: BBox,
}

impl Detection {
    /// Parses one raw record. Returns `None` for padding rows.
    ///
    /// A score outside `[0, 1]` (NaN included) is as fatal as a short record.
    pub fn from_record(record: &[f32], dims: (u32, u32)) -> Result<Option<Self>, Error> {
        if record.len() != RECORD_LEN {
            return Err(Error::MalformedRecord {
                expected: RECORD_LEN,
                found: record.len(),
            });
        }

        let class = record[1] as i32;
        if class == INVALID_LABEL {
            return Ok(None);
        }

        let confidence = record[2];
        if !(0.0..=1.0).contains(&confidence) {
            return Err(Error::InvalidScore(confidence));
        }

        let bbox = BBox::from_normalized([record[3], record[4], record[5], record[6]], dims)?;

        Ok(Some(Detection {
            class,
            confidence,
            bbox,
        }))
    }

    #[inline(always)]
    pub fn area(&self) -> f32 {
        self.bbox.area()
    }
}

/// Turns a frame's raw detector output into the detection set seen by the arbiter.
///
/// Any record with the wrong field count aborts the whole set.
pub fn parse_records<R: AsRef<[f32]>>(
    records: &[R],
    dims: (u32, u32),
) -> Result<Vec<Detection>, Error> {
    let mut dets = Vec::with_capacity(records.len());

    for record in records {
        if let Some(det) = Detection::from_record(record.as_ref(), dims)? {
            dets.push(det);
        }
    }

    Ok(dets)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_and_scales_record() {
        let det = Detection::from_record(&[0.0, 15.0, 0.9, 0.1, 0.1, 0.3, 0.3], (640, 480))
            .unwrap()
            .unwrap();

        assert_eq!(det.class, 15);
        assert_eq!(det.confidence, 0.9);
        assert!((det.bbox.left() - 64.0).abs() < 1e-3);
        assert!((det.bbox.bottom() - 144.0).abs() < 1e-3);
    }

    #[test]
    fn drops_padding_rows() {
        let records: Vec<Vec<f32>> = vec![
            vec![0.0, -1.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            vec![0.0, 3.0, 0.4, 0.0, 0.0, 0.5, 0.5],
        ];
        let dets = parse_records(&records, (100, 100)).unwrap();

        assert_eq!(dets.len(), 1);
        assert_eq!(dets[0].class, 3);
    }

    #[test]
    fn malformed_record_is_fatal() {
        let records: Vec<Vec<f32>> = vec![
            vec![0.0, 15.0, 0.9, 0.1, 0.1, 0.3, 0.3],
            vec![0.0, 15.0, 0.9],
        ];

        match parse_records(&records, (640, 480)) {
            Err(Error::MalformedRecord { expected, found }) => {
                assert_eq!(expected, 7);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn out_of_range_score_is_fatal() {
        for score in [f32::NAN, f32::INFINITY, 1.5, -0.1] {
            let records: Vec<Vec<f32>> = vec![vec![0.0, 15.0, score, 0.1, 0.1, 0.3, 0.3]];
            assert!(matches!(
                parse_records(&records, (640, 480)),
                Err(Error::InvalidScore(_))
            ));
        }

        // padding rows carry no meaningful score
        let padding: Vec<Vec<f32>> = vec![vec![0.0, -1.0, f32::NAN, 0.0, 0.0, 0.0, 0.0]];
        assert!(parse_records(&padding, (640, 480)).unwrap().is_empty());
    }

    #[test]
    fn empty_output_is_empty_set() {
        let records: Vec<Vec<f32>> = vec![];
        assert!(parse_records(&records, (640, 480)).unwrap().is_empty());
    }
}
