// 🖐️ Landmark Registry - static anatomical points per scoring scheme
//
// Every landmark carries a position in the coordinate space of the reference
// hand diagram (a left hand, palm down). The right hand is drawn by mirroring
// the same diagram, so positions are only ever defined once.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Result, ScorerError};

/// Reference diagram width, in diagram units
pub const REFERENCE_WIDTH: f64 = 266.0;

/// Reference diagram height, in diagram units
pub const REFERENCE_HEIGHT: f64 = 575.0;

// ============================================================================
// SCHEME
// ============================================================================

/// Scoring scheme: joint-space narrowing or bone erosion
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Scheme {
    #[serde(rename = "JSN")]
    Jsn,
    #[serde(rename = "BE")]
    Be,
}

impl Scheme {
    pub const ALL: [Scheme; 2] = [Scheme::Jsn, Scheme::Be];

    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Jsn => "JSN",
            Scheme::Be => "BE",
        }
    }

    /// Ordinal values a control may hold for this scheme.
    ///
    /// Not contiguous: the erosion scale has no grade 4.
    pub fn ordinal_values(&self) -> &'static [u8] {
        match self {
            Scheme::Jsn => &[0, 1, 2, 3, 4],
            Scheme::Be => &[0, 1, 2, 3, 5],
        }
    }

    /// Value written by "all negative"
    pub fn min_score(&self) -> Score {
        Score(self.ordinal_values()[0])
    }

    /// Value written by "all positive"
    pub fn max_score(&self) -> Score {
        let values = self.ordinal_values();
        Score(values[values.len() - 1])
    }

    /// Validate a raw integer against this scheme's ordinal set
    pub fn score(&self, value: u8) -> Result<Score> {
        if self.ordinal_values().contains(&value) {
            Ok(Score(value))
        } else {
            Err(ScorerError::InvalidScore {
                scheme: *self,
                value: i64::from(value),
            })
        }
    }

    pub fn accepts(&self, score: Score) -> bool {
        self.ordinal_values().contains(&score.0)
    }

    /// Landmarks of this scheme in registry order
    pub fn landmarks(&self) -> &'static [Landmark] {
        match self {
            Scheme::Jsn => JSN_LANDMARKS,
            Scheme::Be => BE_LANDMARKS,
        }
    }

    /// Find a landmark by name within this scheme
    pub fn landmark(&self, name: &str) -> Option<&'static Landmark> {
        self.landmarks().iter().find(|lm| lm.name == name)
    }

    pub fn require_landmark(&self, name: &str) -> Result<&'static Landmark> {
        self.landmark(name).ok_or_else(|| ScorerError::UnknownLandmark {
            scheme: *self,
            name: name.to_string(),
        })
    }

    pub fn toggle(&self) -> Self {
        match self {
            Scheme::Jsn => Scheme::Be,
            Scheme::Be => Scheme::Jsn,
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SIDE
// ============================================================================

/// Left or right hand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    L,
    R,
}

impl Side {
    pub const ALL: [Side; 2] = [Side::L, Side::R];

    pub fn as_str(&self) -> &'static str {
        match self {
            Side::L => "L",
            Side::R => "R",
        }
    }

    /// Slot index used by two-slot storage
    pub fn index(&self) -> usize {
        match self {
            Side::L => 0,
            Side::R => 1,
        }
    }

    pub fn other(&self) -> Self {
        match self {
            Side::L => Side::R,
            Side::R => Side::L,
        }
    }

    /// The reference diagram is a left hand; the right hand is its mirror image
    pub fn is_mirrored(&self) -> bool {
        matches!(self, Side::R)
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SCORE
// ============================================================================

/// A single ordinal score. "Unset" is modelled as `Option<Score>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(u8);

impl Score {
    pub fn value(&self) -> u8 {
        self.0
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// LANDMARK
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub scheme: Scheme,
    pub name: &'static str,
    /// (x, y) in reference diagram units
    pub position: (f64, f64),
}

impl Landmark {
    const fn new(scheme: Scheme, name: &'static str, x: f64, y: f64) -> Self {
        Landmark {
            scheme,
            name,
            position: (x, y),
        }
    }

    /// Export column name, e.g. `JSN_MCP_T`
    pub fn column_name(&self) -> String {
        column_name(self.scheme, self.name)
    }
}

pub fn column_name(scheme: Scheme, name: &str) -> String {
    format!("{}_{}", scheme.as_str(), name.replace('-', "_"))
}

const fn jsn(name: &'static str, x: f64, y: f64) -> Landmark {
    Landmark::new(Scheme::Jsn, name, x, y)
}

const fn be(name: &'static str, x: f64, y: f64) -> Landmark {
    Landmark::new(Scheme::Be, name, x, y)
}

static JSN_LANDMARKS: &[Landmark] = &[
    // Metacarpophalangeal
    jsn("MCP-T", 237.0, 344.0),
    jsn("MCP-I", 190.0, 257.0),
    jsn("MCP-M", 122.0, 251.0),
    jsn("MCP-R", 72.0, 271.0),
    jsn("MCP-S", 24.0, 297.0),
    // Proximal interphalangeal
    jsn("PIP-I", 212.0, 146.0),
    jsn("PIP-M", 132.0, 123.0),
    jsn("PIP-R", 76.0, 149.0),
    jsn("PIP-S", 19.0, 201.0),
    // Carpometacarpal and wrist
    jsn("CMC-M", 129.0, 531.0),
    jsn("CMC-R", 154.0, 484.0),
    jsn("CMC-S", 128.0, 489.0),
    jsn("S-TmTd", 62.0, 440.0),
    jsn("S-C", 87.0, 437.0),
    jsn("S-Ra", 111.0, 436.0),
];

static BE_LANDMARKS: &[Landmark] = &[
    be("MCP-T", 237.0, 344.0),
    be("MCP-I", 190.0, 257.0),
    be("MCP-M", 122.0, 251.0),
    be("MCP-R", 72.0, 271.0),
    be("MCP-S", 24.0, 297.0),
    be("IP", 252.0, 263.0),
    be("PIP-I", 212.0, 146.0),
    be("PIP-M", 132.0, 123.0),
    be("PIP-R", 76.0, 149.0),
    be("PIP-S", 19.0, 201.0),
    // Carpal bones and distal forearm
    be("CMC-T", 199.0, 450.0),
    be("Tm", 179.0, 476.0),
    be("S", 134.0, 507.0),
    be("L", 84.0, 514.0),
    be("Ul", 30.0, 529.0),
    be("Ra", 106.0, 546.0),
];

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_registry_sizes_and_order() {
        assert_eq!(Scheme::Jsn.landmarks().len(), 15);
        assert_eq!(Scheme::Be.landmarks().len(), 16);
        assert_eq!(Scheme::Jsn.landmarks()[0].name, "MCP-T");
        assert_eq!(Scheme::Be.landmarks()[5].name, "IP");
        assert_eq!(Scheme::Be.landmarks()[15].name, "Ra");
    }

    #[test]
    fn test_names_unique_within_scheme() {
        for scheme in Scheme::ALL {
            let names: HashSet<_> = scheme.landmarks().iter().map(|lm| lm.name).collect();
            assert_eq!(names.len(), scheme.landmarks().len());
            assert!(scheme.landmarks().iter().all(|lm| lm.scheme == scheme));
        }
    }

    #[test]
    fn test_shared_joints_share_positions() {
        let jsn_mcp = Scheme::Jsn.landmark("MCP-T").unwrap();
        let be_mcp = Scheme::Be.landmark("MCP-T").unwrap();
        assert_eq!(jsn_mcp.position, be_mcp.position);
    }

    #[test]
    fn test_positions_inside_reference_diagram() {
        for scheme in Scheme::ALL {
            for lm in scheme.landmarks() {
                let (x, y) = lm.position;
                assert!(x >= 0.0 && x <= REFERENCE_WIDTH, "{} x out of range", lm.name);
                assert!(y >= 0.0 && y <= REFERENCE_HEIGHT, "{} y out of range", lm.name);
            }
        }
    }

    #[test]
    fn test_be_scale_skips_four() {
        assert!(Scheme::Be.score(4).is_err());
        assert!(Scheme::Be.score(5).is_ok());
        assert!(Scheme::Jsn.score(4).is_ok());
        assert!(Scheme::Jsn.score(5).is_err());
        assert_eq!(Scheme::Be.max_score().value(), 5);
        assert_eq!(Scheme::Jsn.max_score().value(), 4);
        assert_eq!(Scheme::Jsn.min_score().value(), 0);
    }

    #[test]
    fn test_column_name() {
        let lm = Scheme::Jsn.landmark("S-TmTd").unwrap();
        assert_eq!(lm.column_name(), "JSN_S_TmTd");
        assert_eq!(column_name(Scheme::Be, "Ra"), "BE_Ra");
    }

    #[test]
    fn test_unknown_landmark_error() {
        let err = Scheme::Jsn.require_landmark("IP").unwrap_err();
        assert!(matches!(err, ScorerError::UnknownLandmark { scheme: Scheme::Jsn, .. }));
    }

    #[test]
    fn test_side_helpers() {
        assert_eq!(Side::L.other(), Side::R);
        assert!(Side::R.is_mirrored());
        assert!(!Side::L.is_mirrored());
        assert_eq!(Side::R.index(), 1);
    }
}
