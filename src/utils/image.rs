use anyhow::Error;
use opencv::core::{Mat, MatTraitConst, MatTraitConstManual, MatTraitManual, Scalar, Vector, CV_8UC3};
use opencv::imgcodecs::{imdecode, imencode, IMREAD_COLOR};
use opencv::imgproc::{cvt_color, COLOR_BGR2RGB, COLOR_RGB2BGR};
use serde::{Deserialize, Serialize};
use crate::error::SwapError;

/// Channel order of a three-channel 8-bit buffer.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ColorModel {
    Bgr,
    Rgb,
}

/// One frame of 8-bit, three-channel pixels tagged with its channel order.
#[derive(Debug)]
pub struct PixelBuffer {
    mat: Mat,
    color_model: ColorModel,
}

impl PixelBuffer {

    /// new wraps an existing matrix. The matrix must be `CV_8UC3`.
    pub fn new(mat: Mat, color_model: ColorModel) -> Result<Self, Error> {
        if mat.typ() != CV_8UC3 {
            return Err(Error::msg(format!(
                "pixel buffer requires CV_8UC3, got type {}", mat.typ()
            )))
        }
        Ok(PixelBuffer { mat, color_model })
    }

    /// filled creates a `width` x `height` buffer where every pixel is `color`.
    pub fn filled(width: i32, height: i32, color: [u8; 3], color_model: ColorModel) -> Result<Self, Error> {
        let mat = Mat::new_rows_cols_with_default(
            height,
            width,
            CV_8UC3,
            Scalar::new(color[0] as f64, color[1] as f64, color[2] as f64, 0.0),
        )?;
        Ok(PixelBuffer { mat, color_model })
    }

    /// from_packed builds a buffer from row-major, tightly packed three-channel bytes.
    pub fn from_packed(width: i32, height: i32, data: &[u8], color_model: ColorModel) -> Result<Self, Error> {
        let expected = width as usize * height as usize * 3;
        if data.len() != expected {
            return Err(Error::msg(format!(
                "expected {expected} bytes for a {width}x{height} frame, got {}", data.len()
            )))
        }
        let mut buffer = PixelBuffer::filled(width, height, [0, 0, 0], color_model)?;
        buffer.mat.data_bytes_mut()?.copy_from_slice(data);
        Ok(buffer)
    }

    /// to_packed returns the pixels as row-major, tightly packed bytes.
    pub fn to_packed(&self) -> Result<Vec<u8>, Error> {
        if self.mat.is_continuous() {
            return Ok(self.mat.data_bytes()?.to_vec())
        }
        let continuous = self.mat.try_clone()?;
        Ok(continuous.data_bytes()?.to_vec())
    }

    pub fn width(&self) -> i32 {
        self.mat.cols()
    }

    pub fn height(&self) -> i32 {
        self.mat.rows()
    }

    pub fn color_model(&self) -> ColorModel {
        self.color_model
    }

    pub fn mat(&self) -> &Mat {
        &self.mat
    }

    pub fn mat_mut(&mut self) -> &mut Mat {
        &mut self.mat
    }

    pub fn try_clone(&self) -> Result<Self, Error> {
        Ok(PixelBuffer {
            mat: self.mat.try_clone()?,
            color_model: self.color_model,
        })
    }

    /// to_color_model converts the channel order, returning a new buffer.
    ///
    /// Converting to the current model returns a plain copy.
    pub fn to_color_model(&self, target: ColorModel) -> Result<Self, Error> {
        if self.color_model == target {
            return self.try_clone()
        }
        let code = match target {
            ColorModel::Rgb => COLOR_BGR2RGB,
            ColorModel::Bgr => COLOR_RGB2BGR,
        };
        let mut converted = Mat::default();
        cvt_color(&self.mat, &mut converted, code, 0)?;
        Ok(PixelBuffer { mat: converted, color_model: target })
    }

    /// ensure_color_model fails unless the buffer is already in `expected`.
    pub fn ensure_color_model(&self, expected: ColorModel) -> Result<(), Error> {
        if self.color_model != expected {
            return Err(Error::from(SwapError::ColorModelMismatch {
                expected,
                found: self.color_model,
            }))
        }
        Ok(())
    }

    /// pixel_eq compares size, channel order and every sample.
    pub fn pixel_eq(&self, other: &PixelBuffer) -> Result<bool, Error> {
        if self.width() != other.width()
            || self.height() != other.height()
            || self.color_model != other.color_model {
            return Ok(false)
        }
        Ok(self.to_packed()? == other.to_packed()?)
    }
}

/// decode_still decodes an encoded still image (JPEG, PNG, ...) into a BGR buffer.
pub fn decode_still(im_bytes: &[u8]) -> Result<PixelBuffer, Error> {
    let img_as_mat = match Mat::from_slice(im_bytes) {
        Ok(img_as_mat) => img_as_mat,
        Err(e) => {
            return Err(Error::from(SwapError::Decode(e.to_string())))
        }
    };

    let img_bgr = match imdecode(&img_as_mat, IMREAD_COLOR) {
        Ok(img_bgr) => img_bgr,
        Err(e) => {
            return Err(Error::from(SwapError::Decode(e.to_string())))
        }
    };

    if img_bgr.empty() {
        return Err(Error::from(SwapError::Decode("unrecognised image data".to_string())))
    }

    PixelBuffer::new(img_bgr, ColorModel::Bgr)
}

/// encode_still encodes a buffer with the codec selected by `ext` (e.g. ".jpg").
pub fn encode_still(buffer: &PixelBuffer, ext: &str) -> Result<Vec<u8>, Error> {
    let bgr = buffer.to_color_model(ColorModel::Bgr)?;
    let mut encoded: Vector<u8> = Vector::new();
    let ok = match imencode(ext, bgr.mat(), &mut encoded, &Vector::new()) {
        Ok(ok) => ok,
        Err(e) => return Err(Error::from(SwapError::Encode(e.to_string())))
    };
    if !ok {
        return Err(Error::from(SwapError::Encode(format!("{ext} encoder rejected the frame"))))
    }
    Ok(encoded.to_vec())
}
