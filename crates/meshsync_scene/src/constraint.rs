//! Constraints between scene entities

use serde::{Deserialize, Serialize};

use crate::error::SceneError;

/// Constraint kind tag, with stable wire ordinals
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ConstraintType {
    #[default]
    Unknown = 0,
    Aim = 1,
    Parent = 2,
    Position = 3,
    Rotation = 4,
    Scale = 5,
}

impl TryFrom<u8> for ConstraintType {
    type Error = SceneError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Unknown),
            1 => Ok(Self::Aim),
            2 => Ok(Self::Parent),
            3 => Ok(Self::Position),
            4 => Ok(Self::Rotation),
            5 => Ok(Self::Scale),
            other => Err(SceneError::InvalidConstraintType(other)),
        }
    }
}

/// Offset of the target relative to one parent source
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParentOffset {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
}

impl Default for ParentOffset {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ConstraintKind {
    Aim,
    /// One offset per source, aligned with `ConstraintData::sources`
    Parent { offsets: Vec<ParentOffset> },
    Position,
    Rotation,
    Scale,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConstraintData {
    /// Constrained entity
    pub path: String,
    pub sources: Vec<String>,
    pub kind: ConstraintKind,
}

impl ConstraintData {
    pub fn new(kind: ConstraintKind, path: impl Into<String>, sources: Vec<String>) -> Self {
        Self { path: path.into(), sources, kind }
    }

    pub fn constraint_type(&self) -> ConstraintType {
        match self.kind {
            ConstraintKind::Aim => ConstraintType::Aim,
            ConstraintKind::Parent { .. } => ConstraintType::Parent,
            ConstraintKind::Position => ConstraintType::Position,
            ConstraintKind::Rotation => ConstraintType::Rotation,
            ConstraintKind::Scale => ConstraintType::Scale,
        }
    }

    /// Per-source parent offsets.
    ///
    /// `None` for non-parent constraints and for offset lists that do not
    /// line up with the sources.
    pub fn parent_offsets(&self) -> Option<&[ParentOffset]> {
        match &self.kind {
            ConstraintKind::Parent { offsets } if offsets.len() == self.sources.len() => {
                Some(offsets)
            }
            ConstraintKind::Parent { offsets } => {
                log::debug!(
                    "Constraint {}: {} offsets for {} sources, ignoring offsets",
                    self.path,
                    offsets.len(),
                    self.sources.len()
                );
                None
            }
            _ => None,
        }
    }
}
