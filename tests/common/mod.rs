//! Common test infrastructure for Quantkit integration tests.
//!
//! Each test file compiles its own copy of this module, so items may appear
//! unused from the perspective of a single test file.

#![allow(dead_code)]

pub mod fixtures;

use std::io::Write;
use std::path::Path;

use quantkit::models::RunConfig;

/// A run configuration written to a temporary file.
pub struct ConfigFile {
    file: tempfile::NamedTempFile,
}

impl ConfigFile {
    pub fn new(yaml: &str) -> Self {
        let mut file = tempfile::NamedTempFile::new().expect("create temp config");
        file.write_all(yaml.as_bytes()).expect("write temp config");
        Self { file }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn load(&self) -> RunConfig {
        RunConfig::load(self.path()).expect("load temp config")
    }
}
