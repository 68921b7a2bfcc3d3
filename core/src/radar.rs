//! Radar content model

use serde::{Deserialize, Serialize};

/// Number of quadrants a radar always has
pub const QUADRANT_COUNT: usize = 4;

/// Upper bound on the number of rings
pub const MAX_RINGS: usize = 4;

/// A complete radar: four quadrants, up to four rings and the entries placed on them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RadarData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub quadrants: Vec<Quadrant>,
    pub rings: Vec<Ring>,
    pub entries: Vec<Entry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Quadrant {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ring {
    pub name: String,
    /// `#rrggbb`
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entry {
    pub label: String,
    pub quadrant: u8,
    pub ring: u64,
    pub moved: Moved,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
}

/// Trend of an entry since the previous radar revision.
///
/// Serialized as the integers the rendering script understands:
/// `-1` out, `0` unchanged, `1` in, `2` new.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i8", into = "i8")]
pub enum Moved {
    Out,
    Unchanged,
    In,
    New,
}

impl Moved {
    /// All accepted wire values, in ascending order
    pub const VALUES: [i8; 4] = [-1, 0, 1, 2];

    /// Human-readable status shown next to an entry
    pub fn description(self) -> &'static str {
        match self {
            Moved::Out => "Moved out",
            Moved::Unchanged => "No change",
            Moved::In => "Moved in",
            Moved::New => "New",
        }
    }
}

impl TryFrom<i8> for Moved {
    type Error = String;

    fn try_from(value: i8) -> Result<Self, Self::Error> {
        match value {
            -1 => Ok(Moved::Out),
            0 => Ok(Moved::Unchanged),
            1 => Ok(Moved::In),
            2 => Ok(Moved::New),
            other => Err(format!("invalid moved value {other}, expected one of -1, 0, 1, 2")),
        }
    }
}

impl From<Moved> for i8 {
    fn from(moved: Moved) -> Self {
        match moved {
            Moved::Out => -1,
            Moved::Unchanged => 0,
            Moved::In => 1,
            Moved::New => 2,
        }
    }
}

impl RadarData {
    /// Find an entry by its display label
    pub fn entry_by_label(&self, label: &str) -> Option<&Entry> {
        self.entries.iter().find(|e| e.label == label)
    }

    /// Name of the quadrant at `index`, if there is one
    pub fn quadrant_name(&self, index: u8) -> Option<&str> {
        self.quadrants.get(usize::from(index)).map(|q| q.name.as_str())
    }

    /// Name of the ring at `index`, if there is one
    pub fn ring_name(&self, index: u64) -> Option<&str> {
        usize::try_from(index)
            .ok()
            .and_then(|i| self.rings.get(i))
            .map(|r| r.name.as_str())
    }
}
