use std::cmp::Ordering;
use std::future::Future;
use std::time::Duration;
use anyhow::Error;
use ndarray::{Array4, ArrayD, Axis, Ix2, IxDyn};
use opencv::core::{Mat, MatTraitConst, Rect, Scalar, Size, Vec3b, CV_8UC3};
use opencv::imgproc;
use opencv::imgproc::resize;
use tokio::runtime::{Builder, Handle, Runtime, RuntimeFlavor};
use tokio::task;
use tracing::{debug, info, warn};
use crate::config::config::DetectorConfig;
use crate::error::SwapError;
use crate::modules::detector::FeatureDetector;
use crate::triton_client::client::triton::model_infer_request::{InferInputTensor, InferRequestedOutputTensor};
use crate::triton_client::client::triton::{InferTensorContents, ModelInferRequest, ModelInferResponse};
use crate::triton_client::client::TritonInferenceClient;
use crate::utils::coordinate::{BoundingBox, DetectionLabel, RawDetection};
use crate::utils::image::{ColorModel, PixelBuffer};
use crate::utils::utils::{u8_to_f32_vec, u8_to_i32_vec};

/// Grey used by YOLO letterboxing for the padded area.
const LETTERBOX_FILL: f64 = 114.0;

/// How a frame was fitted into the model input: scaled by `scale` and placed at
/// the top-left corner. `width` and `height` are the original frame size.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub width: i32,
    pub height: i32,
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    class_id: usize,
    score: f32,
    corners: [f32; 4],
}

/// Turns raw YOLOv8 output tensors into labelled detections.
#[derive(Debug, Clone)]
pub struct OutputDecoder {
    iou_threshold: f32,
    class_eyes: usize,
    class_face: usize,
    class_mouth: usize,
}

impl OutputDecoder {
    pub fn new(config: &DetectorConfig) -> Self {
        OutputDecoder {
            iou_threshold: config.iou_threshold,
            class_eyes: config.class_eyes,
            class_face: config.class_face,
            class_mouth: config.class_mouth,
        }
    }

    fn label_of(&self, class_id: usize) -> Option<DetectionLabel> {
        if class_id == self.class_face {
            Some(DetectionLabel::Face)
        } else if class_id == self.class_eyes {
            Some(DetectionLabel::Eyes)
        } else if class_id == self.class_mouth {
            Some(DetectionLabel::Mouth)
        } else {
            None
        }
    }

    /// postprocess decodes a `[1, 4 + nc, N]` (or `[1, N, 4 + nc]`) output.
    ///
    /// Each anchor keeps its best class if the score reaches
    /// `confidence_threshold`; boxes are mapped back to frame coordinates,
    /// suppressed per class at the configured IoU and clamped to the frame.
    /// The result is ordered by descending confidence.
    ///
    /// # Arguments
    /// * `output` - raw model output
    /// * `letterbox` - how the frame was fitted into the model input
    /// * `confidence_threshold` - minimum class score
    ///
    /// # Returns
    /// * `Vec<RawDetection>`
    pub fn postprocess(&self, output: &ArrayD<f32>, letterbox: &Letterbox, confidence_threshold: f32) -> Result<Vec<RawDetection>, Error> {
        let shape = output.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            return Err(Error::from(SwapError::ModelOutput(format!("expected [1, C, N] output, got {shape:?}"))))
        }

        let view = output.index_axis(Axis(0), 0).into_dimensionality::<Ix2>()?;
        let preds = if view.nrows() <= view.ncols() { view } else { view.reversed_axes() };
        let (features, anchors) = preds.dim();
        if features < 5 {
            return Err(Error::from(SwapError::ModelOutput(format!("output has {features} features per anchor"))))
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for j in 0..anchors {
            let (class_id, score) = (4..features)
                .map(|k| (k - 4, preds[[k, j]]))
                .fold((0usize, f32::MIN), |best, current| if current.1 > best.1 { current } else { best });
            if score < confidence_threshold {
                continue
            }

            let (cx, cy, w, h) = (preds[[0, j]], preds[[1, j]], preds[[2, j]], preds[[3, j]]);
            candidates.push(Candidate {
                class_id,
                score,
                corners: [
                    (cx - w / 2.0) / letterbox.scale,
                    (cy - h / 2.0) / letterbox.scale,
                    (cx + w / 2.0) / letterbox.scale,
                    (cy + h / 2.0) / letterbox.scale,
                ],
            });
        }

        let kept = non_max_suppression(candidates, self.iou_threshold);

        let mut detections: Vec<RawDetection> = Vec::with_capacity(kept.len());
        for candidate in kept {
            let label = match self.label_of(candidate.class_id) {
                Some(label) => label,
                None => {
                    warn!(class_id = candidate.class_id, "ignoring unknown model class");
                    continue
                }
            };
            let [x1, y1, x2, y2] = candidate.corners;
            let bbox = BoundingBox::new(x1 as i32, y1 as i32, x2 as i32, y2 as i32)
                .and_then(|bbox| bbox.clamp(letterbox.width, letterbox.height));
            if let Some(bbox) = bbox {
                detections.push(RawDetection::new(bbox, label, candidate.score));
            }
        }
        Ok(detections)
    }
}

fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let inter_w = (a[2].min(b[2]) - a[0].max(b[0])).max(0.0);
    let inter_h = (a[3].min(b[3]) - a[1].max(b[1])).max(0.0);
    let inter = inter_w * inter_h;
    let area_a = (a[2] - a[0]) * (a[3] - a[1]);
    let area_b = (b[2] - b[0]) * (b[3] - b[1]);
    let union = area_a + area_b - inter;
    if union <= 0.0 { 0.0 } else { inter / union }
}

fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        let overlaps = kept.iter().any(|k| {
            k.class_id == candidate.class_id && iou(&k.corners, &candidate.corners) >= iou_threshold
        });
        if !overlaps {
            kept.push(candidate);
        }
    }
    kept
}

/// Single-threaded runtime that drives the gRPC client from synchronous code.
#[derive(Debug)]
struct BlockingRuntime {
    runtime: Option<Runtime>,
}

impl BlockingRuntime {
    fn new() -> Result<Self, Error> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(BlockingRuntime { runtime: Some(runtime) })
    }

    /// run drives `future` to completion on the owned runtime. Called from a
    /// multi-thread runtime worker, the worker is handed over with
    /// `block_in_place`. A current-thread runtime cannot give up its only
    /// thread, so the call is refused with `BlockingInAsyncContext`.
    fn run<F: Future>(&self, future: F) -> Result<F::Output, Error> {
        let runtime = match &self.runtime {
            Some(runtime) => runtime,
            None => return Err(Error::msg("feature_detection_client - runtime is shut down"))
        };
        match Handle::try_current() {
            Err(_) => Ok(runtime.block_on(future)),
            Ok(handle) => match handle.runtime_flavor() {
                RuntimeFlavor::MultiThread => Ok(task::block_in_place(|| runtime.block_on(future))),
                _ => Err(Error::from(SwapError::BlockingInAsyncContext)),
            },
        }
    }
}

impl Drop for BlockingRuntime {
    // dropping a Runtime from async code panics
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// YOLOv8 face-part detector served by a Triton inference server.
///
/// The gRPC calls run on an owned single-threaded runtime so that `detect`
/// stays synchronous. It may be called from plain threads, from
/// `spawn_blocking`, or from a multi-thread tokio runtime. On a
/// current-thread runtime every call fails with
/// `SwapError::BlockingInAsyncContext`.
#[derive(Debug)]
pub struct FeatureDetectionClient {
    runtime: BlockingRuntime,
    triton_infer_client: TritonInferenceClient,
    model_name: String,
    model_version: String,
    timeout: Duration,
    imsize: (i32, i32),
    input_name: String,
    output_name: String,
    decoder: OutputDecoder,
}

impl FeatureDetectionClient {

    /// connect opens the gRPC channel and checks the model is ready to serve.
    pub fn connect(config: &DetectorConfig) -> Result<Self, Error> {
        let runtime = BlockingRuntime::new()?;
        let triton_infer_client = runtime.run(TritonInferenceClient::new(&config.url))??;

        let ready = runtime.run(triton_infer_client.model_ready(&config.model_name, &config.model_version))??;
        if !ready {
            return Err(Error::msg(format!("feature_detection_client - model {} is not ready", config.model_name)))
        }
        info!(url = %config.url, model = %config.model_name, "connected feature detector");

        Ok(FeatureDetectionClient {
            runtime,
            triton_infer_client,
            model_name: config.model_name.to_owned(),
            model_version: config.model_version.to_owned(),
            timeout: Duration::from_secs(config.timeout),
            imsize: config.imsize,
            input_name: config.input_name.to_owned(),
            output_name: config.output_name.to_owned(),
            decoder: OutputDecoder::new(config),
        })
    }

    /// server_live reports whether the inference server answers health checks.
    pub fn server_live(&self) -> Result<bool, Error> {
        self.runtime.run(self.triton_infer_client.server_live())?
    }

    /// preprocess letterboxes a BGR frame into a normalised RGB NCHW tensor.
    pub fn preprocess(&self, image: &PixelBuffer) -> Result<(Array4<f32>, Letterbox), Error> {
        preprocess_letterbox(image, self.imsize)
    }

    async fn infer(&self, tensor: Array4<f32>) -> Result<ArrayD<f32>, Error> {
        let model_input = InferInputTensor {
            name: self.input_name.to_owned(),
            datatype: "FP32".to_string(),
            shape: tensor.shape().iter().map(|&x| x as i64).collect(),
            parameters: Default::default(),
            contents: Some(InferTensorContents {
                fp32_contents: tensor.iter().copied().collect(),
                ..Default::default()
            }),
        };
        let model_request = ModelInferRequest {
            model_name: self.model_name.to_owned(),
            model_version: self.model_version.to_owned(),
            id: "".to_string(),
            parameters: Default::default(),
            inputs: vec![model_input],
            outputs: vec![InferRequestedOutputTensor {
                name: self.output_name.to_owned(),
                parameters: Default::default(),
            }],
            raw_input_contents: vec![],
        };

        let response = self.triton_infer_client.model_infer(model_request, self.timeout).await?;
        output_to_array(&response, &self.output_name)
    }
}

impl FeatureDetector for FeatureDetectionClient {
    fn detect(&self, image: &PixelBuffer, confidence_threshold: f32) -> Result<Vec<RawDetection>, Error> {
        let (tensor, letterbox) = self.preprocess(image)?;
        let output = self.runtime.run(self.infer(tensor))??;
        let detections = self.decoder.postprocess(&output, &letterbox, confidence_threshold)?;
        debug!(detections = detections.len(), confidence_threshold, "detected features");
        Ok(detections)
    }
}

/// preprocess_letterbox fits `image` into `imsize` keeping its aspect ratio,
/// pads the rest with grey and returns RGB values scaled to `[0, 1]`.
pub fn preprocess_letterbox(image: &PixelBuffer, imsize: (i32, i32)) -> Result<(Array4<f32>, Letterbox), Error> {
    let rgb = image.to_color_model(ColorModel::Rgb)?;
    let (img_w, img_h) = (rgb.width(), rgb.height());
    if img_w <= 0 || img_h <= 0 {
        return Err(Error::msg("feature_detection_client - cannot detect on an empty frame"))
    }
    let (model_w, model_h) = imsize;
    let scale = f32::min(model_w as f32 / img_w as f32, model_h as f32 / img_h as f32);
    let new_width = ((img_w as f32 * scale).round() as i32).clamp(1, model_w);
    let new_height = ((img_h as f32 * scale).round() as i32).clamp(1, model_h);

    let mut img_resized = Mat::default();
    resize(
        rgb.mat(),
        &mut img_resized,
        Size::new(new_width, new_height),
        0.0,
        0.0,
        imgproc::INTER_LINEAR,
    )?;

    let mut img_scaled = Mat::new_rows_cols_with_default(
        model_h,
        model_w,
        CV_8UC3,
        Scalar::all(LETTERBOX_FILL),
    )?;
    let mut roi = Mat::roi_mut(&mut img_scaled, Rect::new(0, 0, new_width, new_height))?;
    img_resized.copy_to(&mut roi)?;

    let mut im_tensor = Array4::<f32>::zeros((1, 3, model_h as usize, model_w as usize));
    for y in 0..model_h {
        for x in 0..model_w {
            let pixel = img_scaled.at_2d::<Vec3b>(y, x)?;
            for c in 0..3 {
                im_tensor[[0, c, y as usize, x as usize]] = pixel[c] as f32 / 255.0;
            }
        }
    }

    Ok((im_tensor, Letterbox { scale, width: img_w, height: img_h }))
}

/// output_to_array extracts the named output tensor from an inference response.
fn output_to_array(response: &ModelInferResponse, output_name: &str) -> Result<ArrayD<f32>, Error> {
    let oidx = match response.outputs.iter().position(|output| output.name == output_name) {
        Some(oidx) => oidx,
        None => {
            return Err(Error::from(SwapError::ModelOutput(format!("output {output_name} missing from response"))))
        }
    };
    let output = &response.outputs[oidx];
    let dimensions: Vec<usize> = output.shape.iter().map(|&d| d as usize).collect();

    let values: Vec<f32> = match response.raw_output_contents.get(oidx) {
        Some(raw) => match output.datatype.as_str() {
            "FP32" => u8_to_f32_vec(raw),
            "INT32" => u8_to_i32_vec(raw).iter().map(|&x| x as f32).collect(),
            other => {
                return Err(Error::from(SwapError::ModelOutput(format!("unsupported output datatype {other}"))))
            }
        },
        None => match &output.contents {
            Some(contents) => contents.fp32_contents.to_owned(),
            None => {
                return Err(Error::from(SwapError::ModelOutput(format!("output {output_name} carries no data"))))
            }
        },
    };

    Ok(ArrayD::from_shape_vec(IxDyn(&dimensions), values)?)
}
