//! Proxy mode definitions and the shared mode cell.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// How the proxy handles each request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Answer from stored pairs only
    #[default]
    Simulate,
    /// Forward and record every exchange
    Capture,
    /// Forward, then rewrite the exchange through middleware
    Modify,
    /// Build the response entirely in middleware
    Synthesize,
    /// Answer from stored pairs, capturing on a miss
    Spy,
}

impl Mode {
    pub const ALL: [Mode; 5] = [
        Mode::Simulate,
        Mode::Capture,
        Mode::Modify,
        Mode::Synthesize,
        Mode::Spy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::Simulate => "simulate",
            Mode::Capture => "capture",
            Mode::Modify => "modify",
            Mode::Synthesize => "synthesize",
            Mode::Spy => "spy",
        }
    }

    fn to_u8(self) -> u8 {
        self as u8
    }

    fn from_u8(value: u8) -> Self {
        Mode::ALL
            .get(value as usize)
            .copied()
            .unwrap_or_default()
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.to_ascii_lowercase();
        Mode::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == lower)
            .ok_or_else(|| format!("unknown mode '{s}'"))
    }
}

/// Shared, lock-free cell holding the current mode.
///
/// Clones observe the same value.
#[derive(Debug, Clone, Default)]
pub struct ModeHandle(Arc<AtomicU8>);

impl ModeHandle {
    pub fn new(mode: Mode) -> Self {
        Self(Arc::new(AtomicU8::new(mode.to_u8())))
    }

    pub fn get(&self) -> Mode {
        Mode::from_u8(self.0.load(Ordering::Acquire))
    }

    /// Set the mode, returning the previous one.
    pub fn set(&self, mode: Mode) -> Mode {
        Mode::from_u8(self.0.swap(mode.to_u8(), Ordering::AcqRel))
    }
}
