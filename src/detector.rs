use std::collections::HashMap;
use std::io::BufRead;

use crate::error::Error;
use crate::frame::Frame;

/// Object detector collaborator.
///
/// Returns raw 7-field records `[image_id, label, score, xmin, ymin, xmax, ymax]`
/// with coordinates normalized to `[0, 1]`. Nothing found is an empty vector, not
/// an error. Validation and scaling happen in [`crate::detection::parse_records`].
pub trait Detector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Vec<f32>>, Error>;
}

impl<D: Detector + ?Sized> Detector for &mut D {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Vec<f32>>, Error> {
        (**self).detect(frame)
    }
}

/// Replays a recorded detection dump instead of running a network.
///
/// Dump format is one line per frame: `<frame index>: <json array of records>`.
#[derive(Debug, Default)]
pub struct ReplayDetector {
    frames: HashMap<u64, Vec<Vec<f32>>>,
}

impl ReplayDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, Error> {
        let mut frames = HashMap::new();

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let (idx, json) = line.split_once(':').ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("detection dump line {}: missing frame index", lineno + 1),
                )
            })?;

            let idx: u64 = idx.trim().parse().map_err(|_| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("detection dump line {}: bad frame index", lineno + 1),
                )
            })?;

            let records: Vec<Vec<f32>> = serde_json::from_str(json.trim())?;
            frames.insert(idx, records);
        }

        log::debug!("loaded detection dump with {} frames", frames.len());

        Ok(Self { frames })
    }

    pub fn open(path: &std::path::Path) -> Result<Self, Error> {
        let file = std::fs::File::open(path)?;
        Self::from_reader(std::io::BufReader::new(file))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

impl Detector for ReplayDetector {
    fn detect(&mut self, frame: &Frame) -> Result<Vec<Vec<f32>>, Error> {
        Ok(self.frames.get(&frame.index).cloned().unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DUMP: &str = "\
# frame: records
0: [[0, 15, 0.9, 0.1, 0.1, 0.3, 0.3]]
2: [[0, -1, 0, 0, 0, 0, 0], [0, 7, 0.4, 0.5, 0.5, 0.6, 0.6]]
";

    #[test]
    fn replays_recorded_frames() {
        let mut det = ReplayDetector::from_reader(DUMP.as_bytes()).unwrap();
        assert_eq!(det.len(), 2);

        let recs = det.detect(&Frame::blank(0, (640, 480))).unwrap();
        assert_eq!(recs, vec![vec![0.0, 15.0, 0.9, 0.1, 0.1, 0.3, 0.3]]);

        let recs = det.detect(&Frame::blank(2, (640, 480))).unwrap();
        assert_eq!(recs.len(), 2);
    }

    #[test]
    fn missing_frame_is_empty() {
        let mut det = ReplayDetector::from_reader(DUMP.as_bytes()).unwrap();
        assert!(det.detect(&Frame::blank(1, (640, 480))).unwrap().is_empty());
    }

    #[test]
    fn rejects_line_without_index() {
        let res = ReplayDetector::from_reader("[[0, 15, 0.9]]".as_bytes());
        assert!(matches!(res, Err(Error::Io(_))));
    }
}
