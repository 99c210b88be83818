//! Colored-cube voxels and quantized vertex colors

use bytemuck::{Pod, Zeroable};

use super::voxel::{Voxel, VolumeKind};

/// Alpha below this value is treated as transparent/absent
pub const ALPHA_THRESHOLD: u8 = 127;

/// Quantize RGBA8888 to RGBA4444
pub fn rgba_to_4444(r: u8, g: u8, b: u8, a: u8) -> u16 {
    let r4 = (r as u16 >> 4) & 0xF;
    let g4 = (g as u16 >> 4) & 0xF;
    let b4 = (b as u16 >> 4) & 0xF;
    let a4 = (a as u16 >> 4) & 0xF;
    (r4 << 12) | (g4 << 8) | (b4 << 4) | a4
}

/// Expand RGBA4444 back to RGBA8888
pub fn rgba4444_to_rgba(color: u16) -> (u8, u8, u8, u8) {
    let expand = |c: u16| -> u8 {
        let c = (c & 0xF) as u8;
        (c << 4) | c
    };
    (expand(color >> 12), expand(color >> 8), expand(color >> 4), expand(color))
}

/// Reduced-precision color carried by mesh vertices
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct QuantizedColor(pub u16);

impl QuantizedColor {
    pub fn to_rgba(self) -> (u8, u8, u8, u8) {
        rgba4444_to_rgba(self.0)
    }
}

/// Colored-cube voxel - exactly 4 bytes
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Empty/air voxel
    pub const EMPTY: Color = Color { r: 0, g: 0, b: 0, a: 0 };

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Fully opaque color
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Alpha snapped to 0 or 255 until partial transparency is supported
    pub fn thresholded(self) -> Self {
        let a = if self.a > ALPHA_THRESHOLD { 255 } else { 0 };
        Self { a, ..self }
    }

    pub fn quantized(&self) -> QuantizedColor {
        QuantizedColor(rgba_to_4444(self.r, self.g, self.b, self.a))
    }
}

impl Voxel for Color {
    const KIND: VolumeKind = VolumeKind::ColoredCubes;

    fn is_empty(&self) -> bool {
        self.a < ALPHA_THRESHOLD
    }

    fn normalized(self) -> Self {
        self.thresholded()
    }
}

impl From<[u8; 4]> for Color {
    fn from([r, g, b, a]: [u8; 4]) -> Self {
        Self { r, g, b, a }
    }
}
