//! Application services: request decoding, the rewrite engine and the clip pipeline.

pub mod admission;
pub mod clip;
pub mod decode;
pub mod diagnostics;
pub mod error;
pub mod rewrite;
