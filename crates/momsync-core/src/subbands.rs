use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CodecError;

/// One element of a compact subband list: a single subband or an
/// inclusive range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Segment {
    Single(u32),
    Range(u32, u32),
}

impl Segment {
    fn width(self) -> u64 {
        match self {
            Segment::Single(_) => 1,
            Segment::Range(low, high) => u64::from(high - low) + 1,
        }
    }
}

/// Most subbands one list may name, ranges counted inclusively.
pub const MAX_SUBBANDS: u64 = 1 << 16;

/// A compact enumerated-range subband list such as `[1..10,15,20..30]`.
///
/// Accepts the planning system's bare form (`1,2,3`, `1-4`) as well as the
/// bracketed execution form, and always renders bracketed with `..` ranges.
/// A list naming more than [`MAX_SUBBANDS`] subbands is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Subbands {
    segments: Vec<Segment>,
}

impl Subbands {
    pub fn parse(spec: &str) -> Result<Self, CodecError> {
        let invalid = || CodecError::invalid("subbands", spec);
        let trimmed = spec.trim();
        let inner = match (trimmed.strip_prefix('['), trimmed.strip_suffix(']')) {
            (Some(_), Some(_)) => &trimmed[1..trimmed.len() - 1],
            (None, None) => trimmed,
            _ => return Err(invalid()),
        };

        let mut segments = Vec::new();
        let mut total = 0u64;
        for token in inner.split(',').map(str::trim) {
            if token.is_empty() {
                if inner.trim().is_empty() {
                    break;
                }
                return Err(invalid());
            }
            let bounds = token.split_once("..").or_else(|| token.split_once('-'));
            let segment = match bounds {
                Some((low, high)) => {
                    let low: u32 = low.trim().parse().map_err(|_| invalid())?;
                    let high: u32 = high.trim().parse().map_err(|_| invalid())?;
                    if low > high {
                        return Err(invalid());
                    }
                    if low == high {
                        Segment::Single(low)
                    } else {
                        Segment::Range(low, high)
                    }
                }
                None => Segment::Single(token.parse().map_err(|_| invalid())?),
            };
            total += segment.width();
            if total > MAX_SUBBANDS {
                return Err(invalid());
            }
            segments.push(segment);
        }
        Ok(Self { segments })
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    fn body(&self) -> String {
        self.segments
            .iter()
            .map(|s| match *s {
                Segment::Single(n) => n.to_string(),
                Segment::Range(low, high) => format!("{low}..{high}"),
            })
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl fmt::Display for Subbands {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.body())
    }
}

impl TryFrom<String> for Subbands {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Subbands::parse(&value)
    }
}

impl From<Subbands> for String {
    fn from(value: Subbands) -> Self {
        value.to_string()
    }
}
