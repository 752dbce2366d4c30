use std::path::Path;
use anyhow::Error;
use opencv::core::{Mat, MatTrait, MatTraitConst, Rect, Size, Vec3b, Vec4b, CV_8U};
use opencv::imgcodecs::{imread, IMREAD_UNCHANGED};
use opencv::imgproc::{cvt_color, resize, COLOR_GRAY2BGR, INTER_AREA};
use tracing::{debug, info};
use crate::config::config::ArtworkConfig;
use crate::error::SwapError;
use crate::utils::coordinate::BoundingBox;
use crate::utils::image::{ColorModel, PixelBuffer};

/// A replacement image in BGR order, optionally with a fourth alpha channel.
#[derive(Debug)]
pub struct ArtworkPatch {
    mat: Mat,
}

impl ArtworkPatch {

    /// new accepts 8-bit greyscale, BGR or BGRA images. Greyscale is promoted to BGR.
    pub fn new(mat: Mat) -> Result<Self, Error> {
        if mat.empty() {
            return Err(Error::msg("artwork image is empty"))
        }
        if mat.depth() != CV_8U {
            return Err(Error::msg(format!("artwork must be 8-bit, got depth {}", mat.depth())))
        }
        match mat.channels() {
            1 => {
                let mut bgr = Mat::default();
                cvt_color(&mat, &mut bgr, COLOR_GRAY2BGR, 0)?;
                Ok(ArtworkPatch { mat: bgr })
            }
            3 | 4 => Ok(ArtworkPatch { mat }),
            n => Err(Error::msg(format!("artwork must have 1, 3 or 4 channels, got {n}"))),
        }
    }

    /// load reads an image file keeping its alpha channel.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let path = path.as_ref();
        let display = path.display().to_string();
        let load_error = |reason: String| Error::from(SwapError::ArtworkLoad {
            path: display.clone(),
            reason,
        });

        if !path.is_file() {
            return Err(load_error("file not found".to_string()))
        }
        let mat = match imread(&display, IMREAD_UNCHANGED) {
            Ok(mat) => mat,
            Err(e) => return Err(load_error(e.to_string()))
        };
        match ArtworkPatch::new(mat) {
            Ok(patch) => Ok(patch),
            Err(e) => Err(load_error(e.to_string())),
        }
    }

    pub fn has_alpha(&self) -> bool {
        self.mat.channels() == 4
    }

    pub fn mat(&self) -> &Mat {
        &self.mat
    }
}

/// The three fixed patches pasted over the erased features. Loaded once and
/// only ever read afterwards.
#[derive(Debug)]
pub struct ReplacementArtwork {
    pub left_eye: ArtworkPatch,
    pub right_eye: ArtworkPatch,
    pub mouth: ArtworkPatch,
}

impl ReplacementArtwork {
    pub fn new(left_eye: ArtworkPatch, right_eye: ArtworkPatch, mouth: ArtworkPatch) -> Self {
        ReplacementArtwork { left_eye, right_eye, mouth }
    }

    /// load reads all three patches. Any missing or unreadable file is an error.
    pub fn load(config: &ArtworkConfig) -> Result<Self, Error> {
        let artwork = ReplacementArtwork {
            left_eye: ArtworkPatch::load(&config.left_eye_path)?,
            right_eye: ArtworkPatch::load(&config.right_eye_path)?,
            mouth: ArtworkPatch::load(&config.mouth_path)?,
        };
        info!(
            left_eye = %config.left_eye_path,
            right_eye = %config.right_eye_path,
            mouth = %config.mouth_path,
            "loaded replacement artwork"
        );
        Ok(artwork)
    }
}

/// blend_channel mixes one 8-bit sample: `alpha * patch + (1 - alpha) * dst`,
/// alpha scaled from `0..=255` to `[0, 1]`, rounded and clipped.
pub fn blend_channel(alpha: u8, patch: u8, dst: u8) -> u8 {
    let a = alpha as f32 / 255.0;
    let mixed = a * patch as f32 + (1.0 - a) * dst as f32;
    mixed.round().clamp(0.0, 255.0) as u8
}

/// composite resizes `patch` to `bbox` and draws it onto `buffer` in place.
///
/// Patches with alpha are blended per pixel; patches without alpha overwrite
/// the region. The box is clamped to the buffer first and nothing is drawn
/// if it falls outside.
///
/// # Arguments
/// * `buffer` - BGR frame to draw on
/// * `bbox` - destination region
/// * `patch` - replacement artwork
///
/// # Returns
/// * `&mut PixelBuffer` - the same buffer, for chaining
pub fn composite<'a>(buffer: &'a mut PixelBuffer, bbox: &BoundingBox, patch: &ArtworkPatch) -> Result<&'a mut PixelBuffer, Error> {
    buffer.ensure_color_model(ColorModel::Bgr)?;
    let bbox = match bbox.clamp(buffer.width(), buffer.height()) {
        Some(bbox) => bbox,
        None => return Ok(buffer),
    };

    let mut resized = Mat::default();
    resize(
        patch.mat(),
        &mut resized,
        Size::new(bbox.width(), bbox.height()),
        0.0,
        0.0,
        INTER_AREA,
    )?;

    if patch.has_alpha() {
        let target = buffer.mat_mut();
        for y in 0..bbox.height() {
            for x in 0..bbox.width() {
                let src = *resized.at_2d::<Vec4b>(y, x)?;
                let dst = target.at_2d_mut::<Vec3b>(bbox.y1 + y, bbox.x1 + x)?;
                for c in 0..3 {
                    dst[c] = blend_channel(src[3], src[c], dst[c]);
                }
            }
        }
    } else {
        let mut roi = Mat::roi_mut(
            buffer.mat_mut(),
            Rect::new(bbox.x1, bbox.y1, bbox.width(), bbox.height()),
        )?;
        resized.copy_to(&mut roi)?;
    }

    debug!(?bbox, alpha = patch.has_alpha(), "composited artwork");
    Ok(buffer)
}

#[cfg(test)]
mod tests {
    use opencv::core::{Mat, MatTraitConst, Scalar, Vec3b, Vector, CV_8UC1, CV_8UC3, CV_8UC4};
    use opencv::imgcodecs::imwrite;
    use crate::config::config::ArtworkConfig;
    use crate::error::SwapError;
    use crate::helper::overlay::{blend_channel, composite, ArtworkPatch, ReplacementArtwork};
    use crate::utils::coordinate::BoundingBox;
    use crate::utils::image::{ColorModel, PixelBuffer};

    fn solid_patch(typ: i32, value: Scalar) -> ArtworkPatch {
        ArtworkPatch::new(Mat::new_rows_cols_with_default(7, 9, typ, value).unwrap()).unwrap()
    }

    #[test]
    fn test_blend_channel_boundaries() {
        for d in [0u8, 17, 128, 255] {
            for p in [0u8, 99, 255] {
                assert_eq!(blend_channel(0, p, d), d);
                assert_eq!(blend_channel(255, p, d), p);
            }
        }
    }

    #[test]
    fn test_blend_channel_is_linear() {
        // a = 128/255
        let expected = ((128.0 / 255.0) * 200.0 + (1.0 - 128.0 / 255.0) * 50.0_f32).round() as u8;
        assert_eq!(blend_channel(128, 200, 50), expected);
        assert_eq!(blend_channel(51, 255, 0), 51);
    }

    #[test]
    fn test_opaque_patch_overwrites_region() {
        let mut frame = PixelBuffer::filled(50, 40, [10, 10, 10], ColorModel::Bgr).unwrap();
        let patch = solid_patch(CV_8UC3, Scalar::new(0.0, 0.0, 255.0, 0.0));
        let bbox = BoundingBox::new(5, 6, 25, 16).unwrap();

        let frame = composite(&mut frame, &bbox, &patch).unwrap();

        for y in 6..16 {
            for x in 5..25 {
                assert_eq!(frame.mat().at_2d::<Vec3b>(y, x).unwrap().0, [0, 0, 255]);
            }
        }
        // right and bottom edges are exclusive
        assert_eq!(frame.mat().at_2d::<Vec3b>(16, 25).unwrap().0, [10, 10, 10]);
        assert_eq!(frame.mat().at_2d::<Vec3b>(5, 4).unwrap().0, [10, 10, 10]);
    }

    #[test]
    fn test_alpha_patch_blends_region() {
        let mut frame = PixelBuffer::filled(30, 30, [100, 100, 100], ColorModel::Bgr).unwrap();
        let patch = solid_patch(CV_8UC4, Scalar::new(200.0, 0.0, 255.0, 128.0));
        assert!(patch.has_alpha());
        let bbox = BoundingBox::new(0, 0, 12, 12).unwrap();

        composite(&mut frame, &bbox, &patch).unwrap();

        let pixel = frame.mat().at_2d::<Vec3b>(5, 5).unwrap().0;
        assert_eq!(pixel, [
            blend_channel(128, 200, 100),
            blend_channel(128, 0, 100),
            blend_channel(128, 255, 100),
        ]);
        assert_eq!(frame.mat().at_2d::<Vec3b>(20, 20).unwrap().0, [100, 100, 100]);
    }

    #[test]
    fn test_transparent_patch_leaves_region() {
        let mut frame = PixelBuffer::filled(20, 20, [1, 2, 3], ColorModel::Bgr).unwrap();
        let original = frame.try_clone().unwrap();
        let patch = solid_patch(CV_8UC4, Scalar::new(255.0, 255.0, 255.0, 0.0));
        composite(&mut frame, &BoundingBox::new(2, 2, 18, 18).unwrap(), &patch).unwrap();
        assert!(frame.pixel_eq(&original).unwrap());
    }

    #[test]
    fn test_composite_clamps_box() {
        let mut frame = PixelBuffer::filled(20, 20, [0, 0, 0], ColorModel::Bgr).unwrap();
        let patch = solid_patch(CV_8UC3, Scalar::all(255.0));
        composite(&mut frame, &BoundingBox::new(15, 15, 40, 40).unwrap(), &patch).unwrap();
        assert_eq!(frame.mat().at_2d::<Vec3b>(19, 19).unwrap().0, [255, 255, 255]);
        assert_eq!(frame.mat().at_2d::<Vec3b>(14, 14).unwrap().0, [0, 0, 0]);

        composite(&mut frame, &BoundingBox::new(30, 30, 40, 40).unwrap(), &patch).unwrap();
    }

    #[test]
    fn test_composite_requires_bgr() {
        let mut frame = PixelBuffer::filled(20, 20, [0, 0, 0], ColorModel::Rgb).unwrap();
        let patch = solid_patch(CV_8UC3, Scalar::all(255.0));
        let err = composite(&mut frame, &BoundingBox::new(0, 0, 5, 5).unwrap(), &patch).unwrap_err();
        assert!(matches!(err.downcast_ref::<SwapError>(), Some(SwapError::ColorModelMismatch { .. })));
    }

    #[test]
    fn test_greyscale_patch_promoted() {
        let patch = solid_patch(CV_8UC1, Scalar::all(77.0));
        assert_eq!(patch.mat().channels(), 3);
        assert!(!patch.has_alpha());
    }

    #[test]
    fn test_load_artwork() {
        let dir = std::env::temp_dir().join(format!("rs_face_swap_artwork_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let rgba = Mat::new_rows_cols_with_default(4, 4, CV_8UC4, Scalar::new(1.0, 2.0, 3.0, 128.0)).unwrap();
        let rgb = Mat::new_rows_cols_with_default(4, 4, CV_8UC3, Scalar::new(1.0, 2.0, 3.0, 0.0)).unwrap();
        let alpha_path = dir.join("eye.png");
        let opaque_path = dir.join("mouth.png");
        imwrite(alpha_path.to_str().unwrap(), &rgba, &Vector::new()).unwrap();
        imwrite(opaque_path.to_str().unwrap(), &rgb, &Vector::new()).unwrap();

        let config = ArtworkConfig {
            left_eye_path: alpha_path.display().to_string(),
            right_eye_path: alpha_path.display().to_string(),
            mouth_path: opaque_path.display().to_string(),
        };
        let artwork = ReplacementArtwork::load(&config).unwrap();
        assert!(artwork.left_eye.has_alpha());
        assert!(!artwork.mouth.has_alpha());

        let missing = ArtworkConfig {
            mouth_path: dir.join("missing.png").display().to_string(),
            ..config
        };
        let err = ReplacementArtwork::load(&missing).unwrap_err();
        assert!(matches!(err.downcast_ref::<SwapError>(), Some(SwapError::ArtworkLoad { .. })));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
