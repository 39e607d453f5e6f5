use std::fmt;
use std::net::SocketAddr;
use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Separator between the serial and the optional network address
const MID_ADDR_SEPARATOR: char = '|';

/// Category of a crawl module
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleType {
    Downloader,
    Analyzer,
    Pipeline,
}

impl ModuleType {
    pub const ALL: [ModuleType; 3] = [Self::Downloader, Self::Analyzer, Self::Pipeline];

    /// One-letter tag used in module IDs
    pub fn letter(self) -> char {
        match self {
            Self::Downloader => 'D',
            Self::Analyzer => 'A',
            Self::Pipeline => 'P',
        }
    }

    pub fn from_letter(letter: char) -> Option<Self> {
        match letter {
            'D' => Some(Self::Downloader),
            'A' => Some(Self::Analyzer),
            'P' => Some(Self::Pipeline),
            _ => None,
        }
    }
}

impl fmt::Display for ModuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Downloader => write!(f, "downloader"),
            Self::Analyzer => write!(f, "analyzer"),
            Self::Pipeline => write!(f, "pipeline"),
        }
    }
}

/// Module ID: `<letter><serial>` optionally followed by `|<ip:port>`,
/// e.g. `D1` or `A7|127.0.0.1:8080`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Mid(String);

impl Mid {
    /// Build a well-formed ID
    pub fn new(module_type: ModuleType, sn: u64, addr: Option<SocketAddr>) -> Self {
        match addr {
            Some(addr) => Self(format!(
                "{}{}{}{}",
                module_type.letter(),
                sn,
                MID_ADDR_SEPARATOR,
                addr
            )),
            None => Self(format!("{}{}", module_type.letter(), sn)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Decode the category, serial and address encoded in this ID
    pub fn split(&self) -> Result<(ModuleType, u64, Option<SocketAddr>)> {
        let raw = self.0.as_str();
        let mut chars = raw.chars();
        let letter = chars
            .next()
            .ok_or_else(|| Error::illegal_parameter("empty module ID"))?;
        let module_type = ModuleType::from_letter(letter).ok_or_else(|| {
            Error::illegal_parameter(format!("illegal module type letter: {}", letter))
        })?;

        let rest = chars.as_str();
        let (sn_part, addr_part) = match rest.split_once(MID_ADDR_SEPARATOR) {
            Some((sn, addr)) => (sn, Some(addr)),
            None => (rest, None),
        };

        let sn = sn_part.parse::<u64>().map_err(|_| {
            Error::illegal_parameter(format!("illegal module SN: {:?}", sn_part))
        })?;

        let addr = addr_part
            .map(|addr| {
                addr.parse::<SocketAddr>().map_err(|_| {
                    Error::illegal_parameter(format!("illegal module address: {:?}", addr))
                })
            })
            .transpose()?;

        Ok((module_type, sn, addr))
    }

    /// Category encoded in this ID, if it is well formed
    pub fn module_type(&self) -> Option<ModuleType> {
        self.split().ok().map(|(module_type, _, _)| module_type)
    }
}

impl From<&str> for Mid {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for Mid {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Mid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Serial number source for module IDs.
///
/// Hands out `start..=max` and then wraps back to `start`, counting cycles.
#[derive(Debug)]
pub struct SnGenerator {
    start: u64,
    max: u64,
    state: Mutex<SnState>,
}

#[derive(Debug)]
struct SnState {
    next: u64,
    cycle_count: u64,
}

impl SnGenerator {
    /// A `max` of 0 means `u64::MAX`
    pub fn new(start: u64, max: u64) -> Self {
        let max = if max == 0 { u64::MAX } else { max };
        Self {
            start,
            max,
            state: Mutex::new(SnState {
                next: start,
                cycle_count: 0,
            }),
        }
    }

    pub fn start(&self) -> u64 {
        self.start
    }

    pub fn max(&self) -> u64 {
        self.max
    }

    pub fn next(&self) -> u64 {
        self.state.lock().unwrap_or_else(PoisonError::into_inner).next
    }

    pub fn cycle_count(&self) -> u64 {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cycle_count
    }

    /// Take a serial number and advance
    pub fn get(&self) -> u64 {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let sn = state.next;
        if sn == self.max {
            state.next = self.start;
            state.cycle_count += 1;
        } else {
            state.next += 1;
        }
        sn
    }
}
