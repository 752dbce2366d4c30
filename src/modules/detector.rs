use std::fmt;
use std::sync::Arc;
use anyhow::Error;
use crate::utils::coordinate::RawDetection;
use crate::utils::image::PixelBuffer;

/// A model that finds faces, eyes and mouths in a frame.
///
/// Implementations must only return detections whose confidence is at least
/// `confidence_threshold`. Errors are passed straight through to the caller.
pub trait FeatureDetector {
    fn detect(&self, image: &PixelBuffer, confidence_threshold: f32) -> Result<Vec<RawDetection>, Error>;
}

/// Shared, read-only handle to the process-wide detector. Cloning is cheap.
#[derive(Clone)]
pub struct DetectorHandle {
    inner: Arc<dyn FeatureDetector + Send + Sync>,
}

impl DetectorHandle {
    pub fn new<D: FeatureDetector + Send + Sync + 'static>(detector: D) -> Self {
        DetectorHandle {
            inner: Arc::new(detector),
        }
    }

    pub fn detect(&self, image: &PixelBuffer, confidence_threshold: f32) -> Result<Vec<RawDetection>, Error> {
        self.inner.detect(image, confidence_threshold)
    }
}

impl fmt::Debug for DetectorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorHandle").finish_non_exhaustive()
    }
}
