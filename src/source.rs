//! Frame sources.
//!
//! Every source yields frames in order and signals end of stream with `Ok(None)`.
//! A session is written once against [`FrameSource`]; the concrete capture kind is
//! picked through the [`Source`] variant.

use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::config::PollingConfig;
use crate::error::Error;
use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp"];

pub trait FrameSource {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error>;
}

impl<S: FrameSource + ?Sized> FrameSource for &mut S {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        (**self).next_frame()
    }
}

pub enum Source {
    Images(ImageSequence),
    Polling(PollingFile),
    #[cfg(feature = "video")]
    Video(VideoSource),
}

impl FrameSource for Source {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        match self {
            Source::Images(src) => src.next_frame(),
            Source::Polling(src) => src.next_frame(),
            #[cfg(feature = "video")]
            Source::Video(src) => src.next_frame(),
        }
    }
}

/// Ordered list of image files, e.g. a recorded dataset.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    next: usize,
}

impl ImageSequence {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self { paths, next: 0 }
    }

    /// All images in `dir`, sorted by file name.
    pub fn from_dir(dir: &Path) -> Result<Self, Error> {
        let mut paths = Vec::new();

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image_path(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        log::info!("{} frames found in {}", paths.len(), dir.display());

        Ok(Self::new(paths))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Path of the frame most recently returned.
    pub fn last_path(&self) -> Option<&Path> {
        self.next
            .checked_sub(1)
            .and_then(|idx| self.paths.get(idx))
            .map(PathBuf::as_path)
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        let Some(path) = self.paths.get(self.next) else {
            return Ok(None);
        };

        let img = image::open(path)?.to_rgb8();
        let frame = Frame::from_rgb(self.next as u64, img)?;
        self.next += 1;

        Ok(Some(frame))
    }
}

fn is_image_path(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| IMAGE_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Re-reads a single image that another process keeps overwriting.
///
/// Reads are spaced at least `interval` apart. Failed or empty reads back off
/// exponentially up to `max_backoff`, and the stream ends after `idle_timeout`
/// without a good frame.
pub struct PollingFile {
    path: PathBuf,
    config: PollingConfig,
    index: u64,
    last_read: Option<Instant>,
    last_frame: Instant,
}

impl PollingFile {
    pub fn new(path: PathBuf, config: PollingConfig) -> Self {
        Self {
            path,
            config,
            index: 0,
            last_read: None,
            last_frame: Instant::now(),
        }
    }

    fn try_read(&self) -> Option<image::RgbImage> {
        match image::open(&self.path) {
            Ok(img) => {
                let img = img.to_rgb8();
                if img.width() == 0 || img.height() == 0 {
                    None
                } else {
                    Some(img)
                }
            }
            Err(err) => {
                log::debug!("{} not ready: {}", self.path.display(), err);
                None
            }
        }
    }
}

impl FrameSource for PollingFile {
    fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
        if let Some(last) = self.last_read {
            std::thread::sleep(self.config.interval.saturating_sub(last.elapsed()));
        }

        let mut backoff = self.config.interval;

        loop {
            self.last_read = Some(Instant::now());

            if let Some(img) = self.try_read() {
                let frame = Frame::from_rgb(self.index, img)?;
                self.index += 1;
                self.last_frame = Instant::now();

                return Ok(Some(frame));
            }

            if self.last_frame.elapsed() >= self.config.idle_timeout {
                log::info!(
                    "no frame from {} for {:?}, stopping",
                    self.path.display(),
                    self.config.idle_timeout
                );

                return Ok(None);
            }

            log::debug!("backing off {:?}", backoff);
            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(self.config.max_backoff);
        }
    }
}

#[cfg(feature = "video")]
pub use video::VideoSource;

#[cfg(feature = "video")]
mod video {
    use ndarray::Array3;
    use opencv::{core, imgproc, prelude::*, videoio};

    use super::FrameSource;
    use crate::error::Error;
    use crate::frame::Frame;

    /// Video file or camera capture.
    pub struct VideoSource {
        cap: videoio::VideoCapture,
        index: u64,
    }

    impl VideoSource {
        pub fn open_file(path: &str) -> Result<Self, Error> {
            let cap = videoio::VideoCapture::from_file(path, videoio::CAP_ANY)?;
            Self::opened(cap, path)
        }

        pub fn open_camera(id: i32) -> Result<Self, Error> {
            let cap = videoio::VideoCapture::new(id, videoio::CAP_ANY)?;
            Self::opened(cap, &format!("camera {}", id))
        }

        fn opened(cap: videoio::VideoCapture, name: &str) -> Result<Self, Error> {
            if !videoio::VideoCapture::is_opened(&cap)? {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("unable to open {}", name),
                )));
            }

            Ok(Self { cap, index: 0 })
        }
    }

    impl FrameSource for VideoSource {
        fn next_frame(&mut self) -> Result<Option<Frame>, Error> {
            let mut mat = core::Mat::default();
            if !self.cap.read(&mut mat)? || mat.rows() == 0 || mat.cols() == 0 {
                log::info!("end of video capture after {} frames", self.index);
                return Ok(None);
            }

            let mut rgb = core::Mat::default();
            imgproc::cvt_color(&mat, &mut rgb, imgproc::COLOR_BGR2RGB, 0)?;

            let (rows, cols) = (rgb.rows() as usize, rgb.cols() as usize);
            let image = Array3::from_shape_vec((rows, cols, 3), rgb.data_bytes()?.to_vec())
                .map_err(|_| Error::EmptyFrame { index: self.index })?;

            let frame = Frame::new(self.index, image);
            self.index += 1;

            Ok(Some(frame))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn write_png(path: &Path, w: u32, h: u32) {
        image::RgbImage::from_pixel(w, h, image::Rgb([10, 20, 30]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn image_sequence_is_sorted_and_ends() {
        let dir = tempfile::tempdir().unwrap();
        write_png(&dir.path().join("b.png"), 8, 6);
        write_png(&dir.path().join("a.png"), 8, 6);
        std::fs::write(dir.path().join("notes.txt"), "skip me").unwrap();

        let mut seq = ImageSequence::from_dir(dir.path()).unwrap();
        assert_eq!(seq.len(), 2);

        let first = seq.next_frame().unwrap().unwrap();
        assert_eq!(first.index, 0);
        assert_eq!(first.dims, (8, 6));
        assert!(seq.last_path().unwrap().ends_with("a.png"));

        let second = seq.next_frame().unwrap().unwrap();
        assert_eq!(second.index, 1);
        assert!(seq.next_frame().unwrap().is_none());
    }

    #[test]
    fn polling_reads_and_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("live.png");
        write_png(&path, 4, 4);

        let config = PollingConfig {
            interval: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
            idle_timeout: Duration::from_millis(30),
        };
        let mut src = PollingFile::new(path.clone(), config);

        assert_eq!(src.next_frame().unwrap().unwrap().index, 0);
        assert_eq!(src.next_frame().unwrap().unwrap().index, 1);

        std::fs::remove_file(&path).unwrap();
        let started = Instant::now();
        assert!(src.next_frame().unwrap().is_none());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn source_variant_dispatches() {
        let mut src = Source::Images(ImageSequence::new(vec![]));
        assert!(src.next_frame().unwrap().is_none());
    }
}
