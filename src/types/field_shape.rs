//! This module defines the canonical, type-safe description of a field's layout.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The element type stored by a field.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Int32,
    Float32,
    Float64,
    Int64,
    Boolean,
    Utf8,
}

/// The layout of a scene-graph field value, as far as the codec cares.
///
/// `Sf*` shapes hold exactly one value (or one fixed-width tuple); `Mf*` shapes
/// hold a variable-length list and carry their length on the wire. The codec
/// never interprets what a shape means to the scene graph, only its element
/// type and tuple width.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldShape {
    SfInt32,
    MfInt32,
    SfFloat,
    MfFloat,
    SfDouble,
    MfDouble,
    SfTime,
    MfTime,
    SfLong,
    MfLong,
    SfBool,
    MfBool,
    SfString,
    MfString,
    SfVec2f,
    MfVec2f,
    SfVec3f,
    MfVec3f,
    SfColor,
    MfColor,
    SfColorRgba,
    MfColorRgba,
    SfRotation,
    MfRotation,
    SfVec3d,
    MfVec3d,
}

impl FieldShape {
    /// Returns the element type stored by this shape.
    pub fn scalar_kind(&self) -> ScalarKind {
        use FieldShape::*;
        match self {
            SfInt32 | MfInt32 => ScalarKind::Int32,
            SfFloat | MfFloat | SfVec2f | MfVec2f | SfVec3f | MfVec3f | SfColor | MfColor
            | SfColorRgba | MfColorRgba | SfRotation | MfRotation => ScalarKind::Float32,
            SfDouble | MfDouble | SfTime | MfTime | SfVec3d | MfVec3d => ScalarKind::Float64,
            SfLong | MfLong => ScalarKind::Int64,
            SfBool | MfBool => ScalarKind::Boolean,
            SfString | MfString => ScalarKind::Utf8,
        }
    }

    /// Number of scalar components in one element (3 for a vec3, 4 for a rotation).
    pub fn components(&self) -> usize {
        use FieldShape::*;
        match self {
            SfVec2f | MfVec2f => 2,
            SfVec3f | MfVec3f | SfColor | MfColor | SfVec3d | MfVec3d => 3,
            SfColorRgba | MfColorRgba | SfRotation | MfRotation => 4,
            _ => 1,
        }
    }

    /// Returns `true` for variable-length (`Mf*`) shapes.
    pub fn is_multi(&self) -> bool {
        use FieldShape::*;
        matches!(
            self,
            MfInt32
                | MfFloat
                | MfDouble
                | MfTime
                | MfLong
                | MfBool
                | MfString
                | MfVec2f
                | MfVec3f
                | MfColor
                | MfColorRgba
                | MfRotation
                | MfVec3d
        )
    }

    /// Returns `true` for single-valued shapes that nonetheless hold a tuple.
    pub fn is_fixed_tuple(&self) -> bool {
        !self.is_multi() && self.components() > 1
    }
}

/// Provides the canonical string representation for a `FieldShape`.
impl fmt::Display for FieldShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use FieldShape::*;
        let s = match self {
            SfInt32 => "SFInt32",
            MfInt32 => "MFInt32",
            SfFloat => "SFFloat",
            MfFloat => "MFFloat",
            SfDouble => "SFDouble",
            MfDouble => "MFDouble",
            SfTime => "SFTime",
            MfTime => "MFTime",
            SfLong => "SFLong",
            MfLong => "MFLong",
            SfBool => "SFBool",
            MfBool => "MFBool",
            SfString => "SFString",
            MfString => "MFString",
            SfVec2f => "SFVec2f",
            MfVec2f => "MFVec2f",
            SfVec3f => "SFVec3f",
            MfVec3f => "MFVec3f",
            SfColor => "SFColor",
            MfColor => "MFColor",
            SfColorRgba => "SFColorRGBA",
            MfColorRgba => "MFColorRGBA",
            SfRotation => "SFRotation",
            MfRotation => "MFRotation",
            SfVec3d => "SFVec3d",
            MfVec3d => "MFVec3d",
        };
        write!(f, "{}", s)
    }
}
