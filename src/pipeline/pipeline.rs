use std::sync::Arc;
use anyhow::Error;
use tracing::{debug, info};
use crate::config::config::{validate_confidence, FaceSwapConfig, InpaintConfig};
use crate::helper::eraser::RegionEraser;
use crate::helper::feature_helper::interpret_detections;
use crate::helper::overlay::{composite, ReplacementArtwork};
use crate::modules::detector::DetectorHandle;
use crate::modules::feature_detection_client::FeatureDetectionClient;
use crate::pipeline::input::InputKind;
use crate::utils::image::{decode_still, encode_still, ColorModel, PixelBuffer};

/// Still images are returned in this format by `swap_bytes`.
const STILL_OUTPUT_EXT: &str = ".jpg";

/// Detects facial features, erases them and pastes the replacement artwork.
///
/// Holds the process-wide detector and artwork; both are only read after
/// construction, so one instance can serve every frame and request.
#[derive(Debug, Clone)]
pub struct FaceSwapper {
    detector: DetectorHandle,
    artwork: Arc<ReplacementArtwork>,
    eraser: RegionEraser,
    confidence: f32,
}

impl FaceSwapper {

    /// new builds a swapper from already initialised collaborators.
    pub fn new(detector: DetectorHandle, artwork: Arc<ReplacementArtwork>, inpaint: &InpaintConfig) -> Self {
        FaceSwapper {
            detector,
            artwork,
            eraser: RegionEraser::new(inpaint),
            confidence: FaceSwapConfig::new().confidence,
        }
    }

    /// from_config performs process start-up: validates the configuration,
    /// loads the artwork and connects the Triton-served detector. Any failure
    /// here is fatal; nothing can be served without artwork.
    ///
    /// Detection blocks the calling thread. From async code, call this and the
    /// `swap_*` methods through `tokio::task::spawn_blocking`, or from a
    /// multi-thread runtime. On a current-thread runtime they return
    /// `SwapError::BlockingInAsyncContext` instead of panicking.
    pub fn from_config(config: &FaceSwapConfig) -> Result<Self, Error> {
        config.validate()?;
        let artwork = ReplacementArtwork::load(&config.artwork)?;
        let detector = FeatureDetectionClient::connect(&config.detector)?;
        info!(confidence = config.confidence, "face swapper ready");

        Ok(FaceSwapper::new(DetectorHandle::new(detector), Arc::new(artwork), &config.inpaint)
            .with_confidence(config.confidence))
    }

    /// with_confidence overrides the default threshold returned by `confidence`.
    pub fn with_confidence(mut self, confidence: f32) -> Self {
        self.confidence = confidence;
        self
    }

    /// The configured default detection threshold.
    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// swap_frame runs detection, erasing and compositing on one BGR frame.
    ///
    /// Without a detected face the result is an unchanged copy of `frame`.
    /// Detector errors are returned as is.
    ///
    /// # Arguments
    /// * `frame` - BGR frame
    /// * `confidence` - detection threshold in (0, 1]
    ///
    /// # Returns
    /// * `PixelBuffer` - a new BGR frame of the same size
    pub fn swap_frame(&self, frame: &PixelBuffer, confidence: f32) -> Result<PixelBuffer, Error> {
        validate_confidence(confidence)?;
        frame.ensure_color_model(ColorModel::Bgr)?;

        let detections = self.detector.detect(frame, confidence)?;
        let features = interpret_detections(&detections, frame.width(), frame.height());
        if !features.has_face() {
            return frame.try_clone()
        }

        let mut swapped = self.eraser.erase(frame, &features.removal_boxes())?;
        let placements = [
            (features.left_eye, &self.artwork.left_eye),
            (features.right_eye, &self.artwork.right_eye),
            (features.mouth, &self.artwork.mouth),
        ];
        for (bbox, patch) in placements {
            if let Some(bbox) = bbox {
                composite(&mut swapped, &bbox, patch)?;
            }
        }

        debug!(?features, "swapped frame");
        Ok(swapped)
    }

    /// swap_still processes a still image in any colour model and returns the
    /// result in the same colour model.
    pub fn swap_still(&self, image: &PixelBuffer, confidence: f32) -> Result<PixelBuffer, Error> {
        let bgr = image.to_color_model(ColorModel::Bgr)?;
        let swapped = self.swap_frame(&bgr, confidence)?;
        swapped.to_color_model(image.color_model())
    }

    /// swap_bytes decodes an encoded input, routes it by `InputKind` and
    /// re-encodes the result: GIF for animations, JPEG for stills.
    pub fn swap_bytes(&self, bytes: &[u8], confidence: f32) -> Result<(InputKind, Vec<u8>), Error> {
        let kind = InputKind::sniff(bytes);
        debug!(?kind, bytes = bytes.len(), "routing input");
        let output = match kind {
            InputKind::Animation => self.swap_animation(bytes, confidence)?,
            InputKind::Still => {
                let image = decode_still(bytes)?;
                let swapped = self.swap_still(&image, confidence)?;
                encode_still(&swapped, STILL_OUTPUT_EXT)?
            }
        };
        Ok((kind, output))
    }
}
