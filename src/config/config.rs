use std::path::Path;
use anyhow::Error;
use serde::{Deserialize, Serialize};
use crate::error::SwapError;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DetectorConfig {
    pub url: String,
    pub model_name: String,
    pub model_version: String,
    pub timeout: u64,
    pub imsize: (i32, i32),
    pub input_name: String,
    pub output_name: String,
    pub iou_threshold: f32,
    pub class_eyes: usize,
    pub class_face: usize,
    pub class_mouth: usize,
}

impl DetectorConfig {
    pub fn new() -> Self {
        DetectorConfig {
            url: "http://127.0.0.1:8001".to_string(),
            model_name: "face_parts_yolov8".to_string(),
            model_version: "".to_string(),
            timeout: 20,
            imsize: (640, 640),
            input_name: "images".to_string(),
            output_name: "output0".to_string(),
            iou_threshold: 0.7,
            class_eyes: 0,
            class_face: 1,
            class_mouth: 2,
        }
    }

    fn validate(&self) -> Result<(), SwapError> {
        if self.imsize.0 <= 0 || self.imsize.1 <= 0 {
            return Err(SwapError::InvalidConfig(format!("detector input size {:?} must be positive", self.imsize)))
        }
        if !(self.iou_threshold > 0.0 && self.iou_threshold <= 1.0) {
            return Err(SwapError::InvalidConfig(format!("iou threshold {} must be in (0, 1]", self.iou_threshold)))
        }
        let classes = [self.class_eyes, self.class_face, self.class_mouth];
        if classes[0] == classes[1] || classes[1] == classes[2] || classes[0] == classes[2] {
            return Err(SwapError::InvalidConfig(format!("class indices {classes:?} must be distinct")))
        }
        Ok(())
    }
}

/// Neighbourhood fill used to reconstruct erased regions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum InpaintMethod {
    /// Fast marching (Telea).
    Telea,
    /// Navier-Stokes fluid dynamics.
    Ns,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InpaintConfig {
    pub method: InpaintMethod,
    pub radius: f64,
}

impl InpaintConfig {
    pub fn new() -> Self {
        InpaintConfig {
            method: InpaintMethod::Telea,
            radius: 3.0,
        }
    }

    fn validate(&self) -> Result<(), SwapError> {
        if !(self.radius > 0.0) {
            return Err(SwapError::InvalidConfig(format!("inpaint radius {} must be positive", self.radius)))
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ArtworkConfig {
    pub left_eye_path: String,
    pub right_eye_path: String,
    pub mouth_path: String,
}

impl ArtworkConfig {
    pub fn new() -> Self {
        ArtworkConfig {
            left_eye_path: "static/left_eye.png".to_string(),
            right_eye_path: "static/right_eye.png".to_string(),
            mouth_path: "static/mouth.png".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FaceSwapConfig {
    pub detector: DetectorConfig,
    pub inpaint: InpaintConfig,
    pub artwork: ArtworkConfig,
    pub confidence: f32,
}

impl FaceSwapConfig {
    pub fn new() -> Self {
        FaceSwapConfig {
            detector: DetectorConfig::new(),
            inpaint: InpaintConfig::new(),
            artwork: ArtworkConfig::new(),
            confidence: 0.5,
        }
    }

    /// from_json parses a configuration document and validates it.
    pub fn from_json(raw: &str) -> Result<Self, Error> {
        let config: FaceSwapConfig = match serde_json::from_str(raw) {
            Ok(config) => config,
            Err(e) => return Err(Error::from(SwapError::InvalidConfig(e.to_string())))
        };
        config.validate()?;
        Ok(config)
    }

    /// from_file reads and validates a JSON configuration file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        FaceSwapConfig::from_json(&raw)
    }

    pub fn validate(&self) -> Result<(), Error> {
        validate_confidence(self.confidence)?;
        self.detector.validate()?;
        self.inpaint.validate()?;
        Ok(())
    }
}

/// validate_confidence checks a detection threshold lies in (0, 1].
pub fn validate_confidence(confidence: f32) -> Result<(), SwapError> {
    if !(confidence > 0.0 && confidence <= 1.0) {
        return Err(SwapError::InvalidConfig(format!("confidence {confidence} must be in (0, 1]")))
    }
    Ok(())
}
