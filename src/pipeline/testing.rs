use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use anyhow::Error;
use opencv::core::{Mat, MatTrait, Scalar, Vec3b, CV_8UC3, CV_8UC4};
use crate::config::config::InpaintConfig;
use crate::helper::overlay::{ArtworkPatch, ReplacementArtwork};
use crate::modules::detector::{DetectorHandle, FeatureDetector};
use crate::pipeline::pipeline::FaceSwapper;
use crate::utils::coordinate::{BoundingBox, DetectionLabel, RawDetection};
use crate::utils::image::{ColorModel, PixelBuffer};

pub const LEFT_EYE_BGR: [u8; 3] = [255, 0, 0];
pub const RIGHT_EYE_BGR: [u8; 3] = [0, 255, 0];
pub const MOUTH_BGR: [u8; 3] = [0, 0, 255];

pub fn det(x1: i32, y1: i32, x2: i32, y2: i32, label: DetectionLabel) -> RawDetection {
    RawDetection::new(BoundingBox::new(x1, y1, x2, y2).unwrap(), label, 0.9)
}

/// A BGR frame where every pixel differs from its neighbours.
pub fn gradient_frame(width: i32, height: i32) -> PixelBuffer {
    let mut frame = PixelBuffer::filled(width, height, [0, 0, 0], ColorModel::Bgr).unwrap();
    for y in 0..height {
        for x in 0..width {
            let pixel = frame.mat_mut().at_2d_mut::<Vec3b>(y, x).unwrap();
            pixel[0] = (x * 3 % 256) as u8;
            pixel[1] = (y * 5 % 256) as u8;
            pixel[2] = ((x + y) % 256) as u8;
        }
    }
    frame
}

fn patch(typ: i32, color: [u8; 3], alpha: f64) -> ArtworkPatch {
    let value = Scalar::new(color[0] as f64, color[1] as f64, color[2] as f64, alpha);
    ArtworkPatch::new(Mat::new_rows_cols_with_default(16, 24, typ, value).unwrap()).unwrap()
}

pub fn opaque_artwork() -> ReplacementArtwork {
    ReplacementArtwork::new(
        patch(CV_8UC3, LEFT_EYE_BGR, 0.0),
        patch(CV_8UC3, RIGHT_EYE_BGR, 0.0),
        patch(CV_8UC3, MOUTH_BGR, 0.0),
    )
}

pub fn translucent_artwork() -> ReplacementArtwork {
    ReplacementArtwork::new(
        patch(CV_8UC4, LEFT_EYE_BGR, 128.0),
        patch(CV_8UC4, RIGHT_EYE_BGR, 128.0),
        patch(CV_8UC4, MOUTH_BGR, 128.0),
    )
}

pub fn swapper<D: FeatureDetector + Send + Sync + 'static>(detector: D) -> FaceSwapper {
    swapper_with(detector, opaque_artwork(), InpaintConfig::new())
}

pub fn swapper_with<D: FeatureDetector + Send + Sync + 'static>(
    detector: D,
    artwork: ReplacementArtwork,
    inpaint: InpaintConfig,
) -> FaceSwapper {
    FaceSwapper::new(DetectorHandle::new(detector), Arc::new(artwork), &inpaint)
}

/// Returns the same detections for every frame and records the thresholds it saw.
pub struct StaticDetector {
    detections: Vec<RawDetection>,
    require_bgr: bool,
    thresholds: Arc<Mutex<Vec<f32>>>,
}

impl StaticDetector {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        StaticDetector {
            detections,
            require_bgr: false,
            thresholds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn require_bgr(mut self) -> Self {
        self.require_bgr = true;
        self
    }

    pub fn thresholds(&self) -> Arc<Mutex<Vec<f32>>> {
        Arc::clone(&self.thresholds)
    }
}

impl FeatureDetector for StaticDetector {
    fn detect(&self, image: &PixelBuffer, confidence_threshold: f32) -> Result<Vec<RawDetection>, Error> {
        if self.require_bgr {
            image.ensure_color_model(ColorModel::Bgr)?;
        }
        self.thresholds.lock().unwrap().push(confidence_threshold);
        Ok(self.detections.clone())
    }
}

/// Finds nothing for the first `succeed` calls, then fails.
pub struct FailingDetector {
    succeed: usize,
    calls: AtomicUsize,
}

impl FailingDetector {
    pub fn after(succeed: usize) -> Self {
        FailingDetector { succeed, calls: AtomicUsize::new(0) }
    }
}

impl FeatureDetector for FailingDetector {
    fn detect(&self, _image: &PixelBuffer, _confidence_threshold: f32) -> Result<Vec<RawDetection>, Error> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.succeed {
            return Ok(vec![])
        }
        Err(Error::msg("model unavailable"))
    }
}

/// A well-formed GIF header and trailer with no image blocks.
pub fn frameless_gif() -> Vec<u8> {
    let mut out: Vec<u8> = Vec::new();
    {
        let encoder = gif::Encoder::new(&mut out, 4, 4, &[]).unwrap();
        drop(encoder);
    }
    out
}
