pub mod detector;
pub mod feature_detection_client;
