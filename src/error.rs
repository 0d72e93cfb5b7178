use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Degenerate geometry: non-finite box edge {0:?}")]
    DegenerateGeometry([f32; 4]),

    #[error("Empty frame #{index}")]
    EmptyFrame { index: u64 },

    #[error("Frame #{index} is {found:?}, session frames are {expected:?}")]
    FrameSizeChanged {
        index: u64,
        expected: (u32, u32),
        found: (u32, u32),
    },

    #[error("Malformed detection record: expected {expected} fields, found {found}")]
    MalformedRecord { expected: usize, found: usize },

    #[error("Detection score {0} outside [0, 1]")]
    InvalidScore(f32),

    #[error("Tracker used before initialization")]
    TrackerUninitialized,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Actuator sink error: {0}")]
    Sink(String),

    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image Error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Config Error: {0}")]
    Config(#[from] toml::de::Error),

    #[cfg(feature = "video")]
    #[error("OpenCV Error: {0}")]
    OpenCv(#[from] opencv::Error),
}
