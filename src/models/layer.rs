//! Boundary layer keys for the ASGS and Indigenous structures.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::region::Field;

/// Boundary layers a run can classify against.
///
/// Declaration order runs from most granular to coarsest within the
/// statistical-area hierarchy, with IARE last as an independent structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, PartialOrd, Ord)]
#[serde(rename_all = "UPPERCASE")]
pub enum LayerKey {
    /// Statistical Area Level 1
    Sa1,
    /// Statistical Area Level 2
    Sa2,
    /// Statistical Area Level 3
    Sa3,
    /// Statistical Area Level 4
    Sa4,
    /// Greater Capital City Statistical Area
    Gccsa,
    /// State / Territory
    Ste,
    /// Indigenous Area (carries its Indigenous Region)
    Iare,
}

impl LayerKey {
    /// All layer keys, SA1 first
    pub fn all() -> &'static [LayerKey] {
        &[
            LayerKey::Sa1,
            LayerKey::Sa2,
            LayerKey::Sa3,
            LayerKey::Sa4,
            LayerKey::Gccsa,
            LayerKey::Ste,
            LayerKey::Iare,
        ]
    }

    /// Layers coarser than SA1 whose fields SA1 carries denormalized
    pub fn sa1_parents() -> &'static [LayerKey] {
        &[
            LayerKey::Sa2,
            LayerKey::Sa3,
            LayerKey::Sa4,
            LayerKey::Gccsa,
            LayerKey::Ste,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LayerKey::Sa1 => "SA1",
            LayerKey::Sa2 => "SA2",
            LayerKey::Sa3 => "SA3",
            LayerKey::Sa4 => "SA4",
            LayerKey::Gccsa => "GCCSA",
            LayerKey::Ste => "STE",
            LayerKey::Iare => "IARE",
        }
    }

    /// Output fields that describe this layer in a classification record
    pub fn fields(&self) -> &'static [Field] {
        match self {
            LayerKey::Sa1 => &[Field::Sa1Code],
            LayerKey::Sa2 => &[Field::Sa2Code, Field::Sa2Name],
            LayerKey::Sa3 => &[Field::Sa3Code, Field::Sa3Name],
            LayerKey::Sa4 => &[Field::Sa4Code, Field::Sa4Name],
            LayerKey::Gccsa => &[Field::GccsaCode, Field::GccsaName],
            LayerKey::Ste => &[Field::StateCode, Field::StateName],
            LayerKey::Iare => &[
                Field::IareCode,
                Field::IareName,
                Field::IregCode,
                Field::IregName,
            ],
        }
    }

    /// Whether this layer belongs to the SA1..STE nesting
    pub fn is_statistical_area(&self) -> bool {
        !matches!(self, LayerKey::Iare)
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown layer key '{0}' (expected one of SA1, SA2, SA3, SA4, GCCSA, STE, IARE)")]
pub struct UnknownLayerKey(pub String);

impl FromStr for LayerKey {
    type Err = UnknownLayerKey;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LayerKey::all()
            .iter()
            .copied()
            .find(|key| key.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownLayerKey(s.to_string()))
    }
}
