//! Domain layer types: parameters, presets and renderer options.

pub mod error;
pub mod params;
pub mod presets;
pub mod render_options;
