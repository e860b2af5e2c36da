pub mod patterns;
pub mod runner;

pub use patterns::generate;
pub use runner::{ascii_preview, format_table, format_text, run, RunReport};
