pub mod emitter;
pub mod json;
pub mod signatures;
pub mod test_detector;
