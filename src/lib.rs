pub mod config;
pub mod error;
pub mod helper;
pub mod modules;
pub mod pipeline;
pub mod triton_client;
pub mod utils;

pub use config::config::{ArtworkConfig, DetectorConfig, FaceSwapConfig, InpaintConfig, InpaintMethod};
pub use error::SwapError;
pub use helper::overlay::{ArtworkPatch, ReplacementArtwork};
pub use modules::detector::{DetectorHandle, FeatureDetector};
pub use modules::feature_detection_client::FeatureDetectionClient;
pub use pipeline::input::InputKind;
pub use pipeline::pipeline::FaceSwapper;
pub use utils::animation::{Animation, Frame};
pub use utils::coordinate::{BoundingBox, DetectionLabel, FeatureSet, RawDetection};
pub use utils::image::{ColorModel, PixelBuffer};
