pub mod eraser;
pub mod feature_helper;
pub mod overlay;
