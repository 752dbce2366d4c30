use tracing::{debug, warn};
use crate::utils::coordinate::{BoundingBox, DetectionLabel, FeatureSet, RawDetection};

/// interpret_detections turns the flat detection list of one frame into a `FeatureSet`.
///
/// Boxes are clamped to the `width` x `height` frame and dropped if nothing is
/// left. The first face wins. Eyes are split into left and right by comparing
/// their horizontal midpoint with the face midpoint; when several eyes land on
/// the same side, or several mouths are reported, the last one wins.
/// Without a face the returned set is empty.
///
/// # Arguments
/// * `detections` - detections already filtered by confidence
/// * `width` - frame width in pixels
/// * `height` - frame height in pixels
///
/// # Returns
/// * `FeatureSet`
pub fn interpret_detections(detections: &[RawDetection], width: i32, height: i32) -> FeatureSet {
    let clamped: Vec<(BoundingBox, DetectionLabel)> = detections
        .iter()
        .filter_map(|detection| match detection.bbox.clamp(width, height) {
            Some(bbox) => Some((bbox, detection.label)),
            None => {
                warn!(?detection, width, height, "dropping detection outside the frame");
                None
            }
        })
        .collect();

    let face = clamped
        .iter()
        .find(|(_, label)| *label == DetectionLabel::Face)
        .map(|(bbox, _)| *bbox);

    let face = match face {
        Some(face) => face,
        None => {
            debug!(detections = detections.len(), "no face detected");
            return FeatureSet::default()
        }
    };

    let face_cx = face.center_x();
    let mut features = FeatureSet {
        face: Some(face),
        ..FeatureSet::default()
    };

    for (bbox, label) in clamped {
        match label {
            DetectionLabel::Eyes => {
                if bbox.center_x() < face_cx {
                    features.left_eye = Some(bbox);
                } else {
                    features.right_eye = Some(bbox);
                }
            }
            DetectionLabel::Mouth => features.mouth = Some(bbox),
            DetectionLabel::Face => {}
        }
    }

    debug!(?features, "interpreted detections");
    features
}
