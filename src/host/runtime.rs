// src/host/runtime.rs

//! Interpreter version gate

use crate::error::{Error, Result};
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Python\s+(\d+)\.(\d+)").expect("valid version regex"));

/// Major/minor version of the host interpreter
///
/// Ordering is lexicographic: major first, then minor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeVersion {
    pub major: u32,
    pub minor: u32,
}

impl RuntimeVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse `python --version` output such as `Python 3.11.4`
    pub fn parse(output: &str) -> Option<Self> {
        let caps = VERSION_RE.captures(output)?;
        Some(Self {
            major: caps[1].parse().ok()?,
            minor: caps[2].parse().ok()?,
        })
    }

    /// Fail unless this version is at least `required`
    pub fn ensure_at_least(self, required: RuntimeVersion) -> Result<()> {
        if self >= required {
            return Ok(());
        }
        Err(Error::UnsupportedRuntime {
            required: required.to_string(),
            installed: self.to_string(),
        })
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}
