use anyhow::Error;
use opencv::core::{Mat, Point, Scalar, CV_8UC1};
use opencv::imgproc::{rectangle_points, FILLED, LINE_8};
use opencv::photo::{inpaint, INPAINT_NS, INPAINT_TELEA};
use tracing::debug;
use crate::config::config::{InpaintConfig, InpaintMethod};
use crate::utils::coordinate::BoundingBox;
use crate::utils::image::PixelBuffer;

/// Marker written into the inpainting mask for pixels to reconstruct.
const MASK_PAINT: f64 = 255.0;

/// Removes feature regions by filling them from the surrounding pixels.
#[derive(Debug, Clone)]
pub struct RegionEraser {
    method: InpaintMethod,
    radius: f64,
}

impl RegionEraser {
    pub fn new(config: &InpaintConfig) -> Self {
        RegionEraser {
            method: config.method,
            radius: config.radius,
        }
    }

    /// erase returns a copy of `image` with every box in `boxes` inpainted.
    ///
    /// The input buffer is never modified. An empty `boxes` yields a plain copy.
    ///
    /// # Arguments
    /// * `image` - the frame to clean
    /// * `boxes` - regions to remove, edges inclusive
    ///
    /// # Returns
    /// * `PixelBuffer`
    pub fn erase(&self, image: &PixelBuffer, boxes: &[BoundingBox]) -> Result<PixelBuffer, Error> {
        if boxes.is_empty() {
            return image.try_clone()
        }

        let mask = build_mask(image.width(), image.height(), boxes)?;
        let flags = match self.method {
            InpaintMethod::Telea => INPAINT_TELEA,
            InpaintMethod::Ns => INPAINT_NS,
        };

        let mut cleaned = Mat::default();
        inpaint(image.mat(), &mask, &mut cleaned, self.radius, flags)?;
        debug!(regions = boxes.len(), method = ?self.method, radius = self.radius, "inpainted regions");

        PixelBuffer::new(cleaned, image.color_model())
    }
}

/// build_mask creates a single-channel mask of `width` x `height`, zero
/// everywhere except the boxes, which are filled edges included.
pub fn build_mask(width: i32, height: i32, boxes: &[BoundingBox]) -> Result<Mat, Error> {
    let mut mask = Mat::new_rows_cols_with_default(height, width, CV_8UC1, Scalar::all(0.0))?;
    for bbox in boxes {
        rectangle_points(
            &mut mask,
            Point::new(bbox.x1, bbox.y1),
            Point::new(bbox.x2, bbox.y2),
            Scalar::all(MASK_PAINT),
            FILLED,
            LINE_8,
            0,
        )?;
    }
    Ok(mask)
}

#[cfg(test)]
mod tests {
    use opencv::core::{count_non_zero, MatTrait, MatTraitConst, Vec3b};
    use crate::config::config::{InpaintConfig, InpaintMethod};
    use crate::helper::eraser::{build_mask, RegionEraser};
    use crate::utils::coordinate::BoundingBox;
    use crate::utils::image::{ColorModel, PixelBuffer};

    fn speckled_frame() -> PixelBuffer {
        let mut frame = PixelBuffer::filled(40, 30, [100, 100, 100], ColorModel::Bgr).unwrap();
        for y in 10..15 {
            for x in 10..16 {
                let pixel = frame.mat_mut().at_2d_mut::<Vec3b>(y, x).unwrap();
                pixel[0] = 250;
                pixel[1] = 10;
                pixel[2] = 10;
            }
        }
        frame
    }

    #[test]
    fn test_mask_is_zero_without_boxes() {
        let mask = build_mask(20, 10, &[]).unwrap();
        assert_eq!(count_non_zero(&mask).unwrap(), 0);
        assert_eq!(mask.rows(), 10);
        assert_eq!(mask.cols(), 20);
    }

    #[test]
    fn test_mask_includes_box_edges() {
        let boxes = vec![BoundingBox::new(2, 3, 5, 6).unwrap()];
        let mask = build_mask(20, 10, &boxes).unwrap();
        // x 2..=5, y 3..=6
        assert_eq!(count_non_zero(&mask).unwrap(), 16);
        assert_eq!(*mask.at_2d::<u8>(6, 5).unwrap(), 255);
        assert_eq!(*mask.at_2d::<u8>(7, 5).unwrap(), 0);
    }

    #[test]
    fn test_erase_without_boxes_is_copy() {
        let frame = speckled_frame();
        let eraser = RegionEraser::new(&InpaintConfig::new());
        let cleaned = eraser.erase(&frame, &[]).unwrap();
        assert!(cleaned.pixel_eq(&frame).unwrap());
    }

    #[test]
    fn test_erase_fills_from_surroundings() {
        for method in [InpaintMethod::Telea, InpaintMethod::Ns] {
            let frame = speckled_frame();
            let before = frame.to_packed().unwrap();
            let eraser = RegionEraser::new(&InpaintConfig { method, radius: 3.0 });
            let boxes = vec![BoundingBox::new(9, 9, 16, 15).unwrap()];
            let cleaned = eraser.erase(&frame, &boxes).unwrap();

            let pixel = cleaned.mat().at_2d::<Vec3b>(12, 12).unwrap();
            for c in 0..3 {
                assert!((pixel[c] as i32 - 100).abs() <= 2, "{method:?} left {pixel:?}");
            }
            // untouched outside the mask, and the input stays as it was
            assert_eq!(cleaned.mat().at_2d::<Vec3b>(0, 0).unwrap().0, [100, 100, 100]);
            assert_eq!(frame.to_packed().unwrap(), before);
            assert_eq!(cleaned.color_model(), ColorModel::Bgr);
        }
    }
}
