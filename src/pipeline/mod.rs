pub mod input;
pub mod pipeline;
pub mod sequence;
#[cfg(test)]
pub(crate) mod testing;
