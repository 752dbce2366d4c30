use anyhow::Error;
use tracing::{debug, info};
use crate::pipeline::pipeline::FaceSwapper;
use crate::utils::animation::{decode_animation, encode_animation, Animation, Frame};
use crate::utils::image::ColorModel;

impl FaceSwapper {

    /// swap_animation runs every frame of a GIF through `swap_frame` and
    /// re-encodes the result with the original frame order, per-frame
    /// durations and loop count.
    ///
    /// Frames are processed one after another; the first failing frame aborts
    /// the whole sequence and no partial animation is produced. A single-frame
    /// input still comes back as a one-frame animation.
    ///
    /// # Arguments
    /// * `bytes` - encoded GIF
    /// * `confidence` - detection threshold in (0, 1]
    ///
    /// # Returns
    /// * `Vec<u8>` - encoded GIF
    pub fn swap_animation(&self, bytes: &[u8], confidence: f32) -> Result<Vec<u8>, Error> {
        let animation = decode_animation(bytes)?;
        let processed = self.swap_sequence(animation, confidence)?;
        encode_animation(&processed)
    }

    /// swap_sequence processes already decoded frames, keeping their metadata.
    pub fn swap_sequence(&self, animation: Animation, confidence: f32) -> Result<Animation, Error> {
        let total = animation.frames.len();
        let mut frames: Vec<Frame> = Vec::with_capacity(total);

        for frame in animation.frames {
            let output_model = frame.buffer.color_model();
            let bgr = frame.buffer.to_color_model(ColorModel::Bgr)?;
            let swapped = self.swap_frame(&bgr, confidence)?;
            let buffer = swapped.to_color_model(output_model)?;

            debug!(index = frame.index, total, duration_ms = frame.duration_ms, "processed frame");
            frames.push(Frame {
                buffer,
                duration_ms: frame.duration_ms,
                index: frame.index,
            });
        }

        info!(frames = frames.len(), loop_count = animation.loop_count, "processed animation");
        Ok(Animation {
            frames,
            loop_count: animation.loop_count,
        })
    }
}
