//! Texture payloads
//!
//! A texture either carries decoded pixels, described by a packed
//! `(element_type << 4) | channels` format tag, or an undecoded file blob
//! tagged [`TextureFormat::RawFile`].

use std::fs;
use std::io::Write;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SceneError};
use crate::id::INVALID_ID;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum TextureType {
    #[default]
    Default = 0,
    NormalMap = 1,
}

/// Per-channel element type, the high nibble of a format tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ElementType {
    F16 = 1,
    F32 = 2,
    U8 = 3,
    I16 = 4,
    I32 = 5,
}

impl ElementType {
    pub fn size(&self) -> usize {
        match self {
            ElementType::U8 => 1,
            ElementType::F16 | ElementType::I16 => 2,
            ElementType::F32 | ElementType::I32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u16)]
pub enum TextureFormat {
    #[default]
    Unknown = 0,

    Rf16 = 0x11,
    RGf16 = 0x12,
    RGBf16 = 0x13,
    RGBAf16 = 0x14,

    Rf32 = 0x21,
    RGf32 = 0x22,
    RGBf32 = 0x23,
    RGBAf32 = 0x24,

    Ru8 = 0x31,
    RGu8 = 0x32,
    RGBu8 = 0x33,
    RGBAu8 = 0x34,

    Ri16 = 0x41,
    RGi16 = 0x42,
    RGBi16 = 0x43,
    RGBAi16 = 0x44,

    Ri32 = 0x51,
    RGi32 = 0x52,
    RGBi32 = 0x53,
    RGBAi32 = 0x54,

    RawFile = 0x10 << 4,
}

impl TextureFormat {
    const ALL: [TextureFormat; 22] = [
        Self::Unknown,
        Self::Rf16, Self::RGf16, Self::RGBf16, Self::RGBAf16,
        Self::Rf32, Self::RGf32, Self::RGBf32, Self::RGBAf32,
        Self::Ru8, Self::RGu8, Self::RGBu8, Self::RGBAu8,
        Self::Ri16, Self::RGi16, Self::RGBi16, Self::RGBAi16,
        Self::Ri32, Self::RGi32, Self::RGBi32, Self::RGBAi32,
        Self::RawFile,
    ];

    /// Compose a pixel format from its parts
    pub fn from_parts(element: ElementType, channels: u8) -> Option<Self> {
        if !(1..=4).contains(&channels) {
            return None;
        }
        Self::try_from(((element as u16) << 4) | channels as u16).ok()
    }

    #[inline]
    pub fn tag(&self) -> u16 {
        *self as u16
    }

    /// Channel count, 0 for `Unknown` and `RawFile`
    pub fn channels(&self) -> usize {
        match self {
            Self::Unknown | Self::RawFile => 0,
            other => (other.tag() & 0x0f) as usize,
        }
    }

    pub fn element_type(&self) -> Option<ElementType> {
        if matches!(self, Self::Unknown | Self::RawFile) {
            return None;
        }
        match self.tag() >> 4 {
            1 => Some(ElementType::F16),
            2 => Some(ElementType::F32),
            3 => Some(ElementType::U8),
            4 => Some(ElementType::I16),
            5 => Some(ElementType::I32),
            _ => None,
        }
    }

    /// Bytes per pixel, 0 for formats without a pixel layout
    pub fn bytes_per_pixel(&self) -> usize {
        self.element_type()
            .map(|e| e.size() * self.channels())
            .unwrap_or(0)
    }
}

impl TryFrom<u16> for TextureFormat {
    type Error = SceneError;

    fn try_from(tag: u16) -> std::result::Result<Self, Self::Error> {
        Self::ALL
            .iter()
            .copied()
            .find(|f| f.tag() == tag)
            .ok_or(SceneError::InvalidTextureFormat(tag))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureData {
    pub id: i32,
    pub name: String,
    pub texture_type: TextureType,
    pub format: TextureFormat,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Default for TextureData {
    fn default() -> Self {
        Self {
            id: INVALID_ID,
            name: String::new(),
            texture_type: TextureType::Default,
            format: TextureFormat::Unknown,
            width: 0,
            height: 0,
            data: Vec::new(),
        }
    }
}

impl TextureData {
    /// Texture from typed pixels, e.g. `[f32; 4]` for `RGBAf32`
    pub fn from_pixels<P: bytemuck::Pod>(
        name: impl Into<String>,
        format: TextureFormat,
        width: u32,
        height: u32,
        pixels: &[P],
    ) -> Result<Self> {
        let data: Vec<u8> = bytemuck::cast_slice(pixels).to_vec();
        let expected = width as usize * height as usize * format.bytes_per_pixel();
        if data.len() != expected {
            return Err(SceneError::PixelSizeMismatch {
                width,
                height,
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            name: name.into(),
            format,
            width,
            height,
            data,
            ..Default::default()
        })
    }

    /// Undecoded file blob (png, exr, ...)
    pub fn raw_file(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            format: TextureFormat::RawFile,
            data,
            ..Default::default()
        }
    }

    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.data.len()
    }

    pub fn is_raw_file(&self) -> bool {
        self.format == TextureFormat::RawFile
    }

    /// Write the payload to `path`.
    ///
    /// Data goes to a sibling temporary file that is renamed into place, so
    /// the target is either complete or untouched when this returns false.
    pub fn write_to_file(&self, path: impl AsRef<Path>) -> bool {
        let path = path.as_ref();
        let tmp = path.with_extension("partial");

        let result = (|| -> std::io::Result<()> {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            let mut file = fs::File::create(&tmp)?;
            file.write_all(&self.data)?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        })();

        match result {
            Ok(()) => true,
            Err(e) => {
                log::error!("Failed to write texture {} to {}: {}", self.name, path.display(), e);
                let _ = fs::remove_file(&tmp);
                false
            }
        }
    }
}
