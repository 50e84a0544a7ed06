//! Small math types shared by the format records.

use serde::{Deserialize, Serialize};

/// Row-major 4x3 affine transform, the layout both containers store world
/// transforms in (three rows of four floats, translation in the last
/// column).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat3x4(pub [f32; 12]);

impl Mat3x4 {
    pub const IDENTITY: Self = Self([
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0,
    ]);

    pub fn translation(&self) -> glam::Vec3 {
        glam::Vec3::new(self.0[3], self.0[7], self.0[11])
    }
}

impl Default for Mat3x4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_translation_is_zero() {
        assert_eq!(Mat3x4::IDENTITY.translation(), glam::Vec3::ZERO);
    }
}
