//! Single-image batch mode: detections are written out instead of followed.

use std::io::Write;

use crate::detection::{parse_records, Detection};
use crate::detector::Detector;
use crate::error::Error;
use crate::source::{FrameSource, ImageSequence};

/// Writes `file label score xmin ymin xmax ymax` for each detection scoring at
/// least `threshold`. Coordinates are truncated to whole pixels.
pub fn write_records<W: Write>(
    out: &mut W,
    file: &str,
    dets: &[Detection],
    threshold: f32,
) -> Result<usize, Error> {
    let mut written = 0;

    for det in dets.iter().filter(|d| d.confidence >= threshold) {
        let b = det.bbox;
        writeln!(
            out,
            "{} {} {} {} {} {} {}",
            file,
            det.class,
            det.confidence,
            b.left() as i32,
            b.top() as i32,
            b.right() as i32,
            b.bottom() as i32
        )?;
        written += 1;
    }

    Ok(written)
}

/// Runs the detector over every image and writes the accepted detections.
pub fn run<D: Detector, W: Write>(
    mut images: ImageSequence,
    mut detector: D,
    out: &mut W,
    threshold: f32,
) -> Result<usize, Error> {
    let mut total = 0;

    while let Some(frame) = images.next_frame()? {
        frame.ensure_not_empty()?;

        let records = detector.detect(&frame)?;
        let dets = parse_records(&records, frame.dims)?;
        let file = images
            .last_path()
            .map(|p| p.display().to_string())
            .unwrap_or_default();

        total += write_records(out, &file, &dets, threshold)?;
    }

    log::info!("{} detections written", total);

    Ok(total)
}
