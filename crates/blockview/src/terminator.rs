//! Line terminator styles

use serde::{Deserialize, Serialize};

const CR: u8 = 13;
const LF: u8 = 10;

/// Byte sequence that ends a text line
///
/// The style is fixed when an index is built; it is never auto-detected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Terminator {
    /// Classic Mac, a lone carriage return (13)
    Cr,
    /// Unix, a lone line feed (10)
    #[default]
    Lf,
    /// Windows, carriage return followed by line feed
    CrLf,
}

/// Outcome of probing one position for a terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Whether the probed position starts a terminator
    pub is_terminator: bool,
    /// Positions the scan cursor must move past: 2 for a CRLF pair, otherwise 1
    pub consumed: u64,
}

impl Probe {
    const CONTENT: Self = Self {
        is_terminator: false,
        consumed: 1,
    };
}

impl Terminator {
    /// Number of bytes in the terminator
    pub const fn width(self) -> u64 {
        match self {
            Self::Cr | Self::Lf => 1,
            Self::CrLf => 2,
        }
    }

    /// The terminator's bytes
    pub const fn as_bytes(self) -> &'static [u8] {
        match self {
            Self::Cr => b"\r",
            Self::Lf => b"\n",
            Self::CrLf => b"\r\n",
        }
    }

    /// Probe `current`, with `next` being the following byte if one exists.
    ///
    /// A CR at the very end of the data is never a CRLF terminator since there
    /// is no following byte to confirm it.
    pub const fn probe(self, current: u8, next: Option<u8>) -> Probe {
        let is_terminator = match self {
            Self::Cr => current == CR,
            Self::Lf => current == LF,
            Self::CrLf => current == CR && matches!(next, Some(LF)),
        };
        if is_terminator {
            Probe {
                is_terminator,
                consumed: self.width(),
            }
        } else {
            Probe::CONTENT
        }
    }

    /// Whether `data` ends with this terminator
    pub fn terminates(self, data: &[u8]) -> bool {
        data.ends_with(self.as_bytes())
    }
}

impl std::fmt::Display for Terminator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Cr => "cr",
            Self::Lf => "lf",
            Self::CrLf => "crlf",
        };
        f.write_str(name)
    }
}

impl std::str::FromStr for Terminator {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cr" | "mac" => Ok(Self::Cr),
            "lf" | "unix" => Ok(Self::Lf),
            "crlf" | "windows" => Ok(Self::CrLf),
            other => Err(format!("unknown terminator style: {other}")),
        }
    }
}
