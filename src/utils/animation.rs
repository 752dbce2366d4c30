use std::io::Cursor;
use anyhow::Error;
use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage};
use tracing::{debug, info};
use crate::error::SwapError;
use crate::utils::image::{ColorModel, PixelBuffer};

/// GIF encoder quantizer speed, 1 (best) to 30 (fastest). Frames with at most
/// 256 colours are stored losslessly regardless.
const GIF_QUANTIZER_SPEED: i32 = 10;

/// One decoded animation frame with the metadata that must survive processing.
#[derive(Debug)]
pub struct Frame {
    pub buffer: PixelBuffer,
    pub duration_ms: u32,
    pub index: usize,
}

/// An ordered frame sequence. `loop_count` follows the GIF convention where
/// `0` means loop forever.
#[derive(Debug)]
pub struct Animation {
    pub frames: Vec<Frame>,
    pub loop_count: u16,
}

impl Animation {
    pub fn durations(&self) -> Vec<u32> {
        self.frames.iter().map(|frame| frame.duration_ms).collect()
    }

    pub fn is_still(&self) -> bool {
        self.frames.len() == 1
    }
}

/// decode_animation decodes a GIF into full-canvas RGB frames with their delays
/// and the container loop count.
pub fn decode_animation(bytes: &[u8]) -> Result<Animation, Error> {
    let loop_count = read_loop_count(bytes)?;

    let decoder = match GifDecoder::new(Cursor::new(bytes)) {
        Ok(decoder) => decoder,
        Err(e) => return Err(Error::from(SwapError::Decode(e.to_string())))
    };
    let raw_frames = match decoder.into_frames().collect_frames() {
        Ok(raw_frames) => raw_frames,
        Err(e) => return Err(Error::from(SwapError::Decode(e.to_string())))
    };
    if raw_frames.is_empty() {
        return Err(Error::from(SwapError::EmptyAnimation))
    }

    let mut frames: Vec<Frame> = Vec::with_capacity(raw_frames.len());
    for (index, raw_frame) in raw_frames.into_iter().enumerate() {
        let (numer, denom) = raw_frame.delay().numer_denom_ms();
        let duration_ms = if denom == 0 { 0 } else { numer / denom };

        let rgb = DynamicImage::ImageRgba8(raw_frame.into_buffer()).into_rgb8();
        let (width, height) = (rgb.width() as i32, rgb.height() as i32);
        let buffer = PixelBuffer::from_packed(width, height, rgb.as_raw(), ColorModel::Rgb)?;

        debug!(index, width, height, duration_ms, "decoded animation frame");
        frames.push(Frame { buffer, duration_ms, index });
    }

    info!(frames = frames.len(), loop_count, "decoded animation");
    Ok(Animation { frames, loop_count })
}

fn read_loop_count(bytes: &[u8]) -> Result<u16, Error> {
    let mut decoder = match gif::DecodeOptions::new().read_info(Cursor::new(bytes)) {
        Ok(decoder) => decoder,
        Err(e) => return Err(Error::from(SwapError::Decode(e.to_string())))
    };
    // the NETSCAPE2.0 block precedes the first image, so one frame header is enough
    if let Err(e) = decoder.next_frame_info() {
        return Err(Error::from(SwapError::Decode(e.to_string())))
    }
    Ok(match decoder.repeat() {
        gif::Repeat::Infinite => 0,
        gif::Repeat::Finite(count) => count,
    })
}

/// encode_animation writes the frames as a GIF, first frame as the base and the
/// rest appended, each with its own delay and the animation loop count.
pub fn encode_animation(animation: &Animation) -> Result<Vec<u8>, Error> {
    let first = match animation.frames.first() {
        Some(first) => first,
        None => return Err(Error::from(SwapError::EmptyAnimation))
    };
    let (width, height) = (first.buffer.width(), first.buffer.height());
    let (gif_width, gif_height) = match (u16::try_from(width), u16::try_from(height)) {
        (Ok(w), Ok(h)) => (w, h),
        _ => return Err(Error::from(SwapError::Encode(format!(
            "{width}x{height} exceeds the GIF canvas limit"
        ))))
    };

    let mut out: Vec<u8> = Vec::new();
    {
        let mut encoder = gif::Encoder::new(&mut out, gif_width, gif_height, &[])
            .map_err(|e| SwapError::Encode(e.to_string()))?;
        let repeat = match animation.loop_count {
            0 => gif::Repeat::Infinite,
            count => gif::Repeat::Finite(count),
        };
        encoder.set_repeat(repeat).map_err(|e| SwapError::Encode(e.to_string()))?;

        for (position, frame) in animation.frames.iter().enumerate() {
            if frame.buffer.width() != width || frame.buffer.height() != height {
                return Err(Error::from(SwapError::FrameSizeMismatch {
                    index: position,
                    expected: (width, height),
                    found: (frame.buffer.width(), frame.buffer.height()),
                }))
            }
            let rgb = frame.buffer.to_color_model(ColorModel::Rgb)?.to_packed()?;
            let mut gif_frame = gif::Frame::from_rgb_speed(gif_width, gif_height, &rgb, GIF_QUANTIZER_SPEED);
            gif_frame.delay = ms_to_centiseconds(frame.duration_ms);
            gif_frame.dispose = gif::DisposalMethod::Background;
            encoder.write_frame(&gif_frame).map_err(|e| SwapError::Encode(e.to_string()))?;
        }
    }

    info!(frames = animation.frames.len(), loop_count = animation.loop_count, bytes = out.len(), "encoded animation");
    Ok(out)
}

/// GIF delays are stored in hundredths of a second.
fn ms_to_centiseconds(duration_ms: u32) -> u16 {
    (duration_ms.saturating_add(5) / 10).min(u16::MAX as u32) as u16
}
