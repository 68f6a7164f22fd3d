pub mod error;
pub mod misc;
pub mod pipeline;
pub mod processor;
