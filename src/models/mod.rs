pub mod config;

pub use config::{
    ColorSpace, DithererConfig, Overrides, Pattern, QuantizerConfig, RunConfig, SourceConfig,
    MAX_SIDE,
};
