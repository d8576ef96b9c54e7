use std::collections::TryReserveError;

use serde::Deserialize;
use thiserror::Error;
use tracing::warn;

use crate::TextureKey;

use super::geometry::Rect;

const MAX_SOLID_TEXTURE_PIXELS: u64 = 4096 * 4096;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct Tint {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    #[serde(default = "opaque")]
    pub a: u8,
}

fn opaque() -> u8 {
    u8::MAX
}

impl Tint {
    pub const WHITE: Self = Self::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub fn to_array(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }
}

impl Default for Tint {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Destination for everything the world draws. Coordinates are viewport pixels.
pub trait RenderSink {
    fn draw_sprite(&mut self, texture: &TextureKey, dest: Rect, source: Rect, tint: Tint);
    fn draw_text(&mut self, text: &str, position: (i32, i32), tint: Tint);
    fn draw_solid(&mut self, texture: &SolidTexture, position: (i32, i32));
}

#[derive(Debug, Error)]
pub enum SolidTextureError {
    #[error("texture size {width}x{height} has no area")]
    ZeroSize { width: i32, height: i32 },
    #[error("texture size {width}x{height} exceeds the {max} pixel limit")]
    TooLarge { width: i32, height: i32, max: u64 },
    #[error("failed to allocate texture memory: {0}")]
    Allocation(#[from] TryReserveError),
}

/// Single-color RGBA image, used for the bounding-box debug overlay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SolidTexture {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl SolidTexture {
    /// Never fails: any creation error degrades to a zero-size placeholder.
    pub fn filled(width: i32, height: i32, color: Tint) -> Self {
        match Self::try_filled(width, height, color) {
            Ok(texture) => texture,
            Err(error) => {
                warn!(width, height, error = %error, "debug_texture_placeholder");
                Self::placeholder()
            }
        }
    }

    pub fn try_filled(width: i32, height: i32, color: Tint) -> Result<Self, SolidTextureError> {
        if width <= 0 || height <= 0 {
            return Err(SolidTextureError::ZeroSize { width, height });
        }
        let pixel_count = width as u64 * height as u64;
        if pixel_count > MAX_SOLID_TEXTURE_PIXELS {
            return Err(SolidTextureError::TooLarge {
                width,
                height,
                max: MAX_SOLID_TEXTURE_PIXELS,
            });
        }

        let byte_len = pixel_count as usize * 4;
        let mut rgba = Vec::new();
        rgba.try_reserve_exact(byte_len)?;
        for _ in 0..pixel_count {
            rgba.extend_from_slice(&color.to_array());
        }
        Ok(Self {
            width: width as u32,
            height: height as u32,
            rgba,
        })
    }

    pub fn placeholder() -> Self {
        Self {
            width: 0,
            height: 0,
            rgba: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn rgba(&self) -> &[u8] {
        &self.rgba
    }

    pub fn is_placeholder(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Sprite {
        texture: TextureKey,
        dest: Rect,
        source: Rect,
        tint: Tint,
    },
    Text {
        text: String,
        position: (i32, i32),
        tint: Tint,
    },
    Solid {
        width: u32,
        height: u32,
        position: (i32, i32),
    },
}

/// Records draw requests instead of rasterizing them.
#[derive(Debug, Default)]
pub struct DrawList {
    commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn commands(&self) -> &[DrawCommand] {
        &self.commands
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }

    pub fn sprites(&self) -> impl Iterator<Item = (&TextureKey, Rect, Rect)> + '_ {
        self.commands.iter().filter_map(|command| match command {
            DrawCommand::Sprite {
                texture,
                dest,
                source,
                ..
            } => Some((texture, *dest, *source)),
            _ => None,
        })
    }
}

impl RenderSink for DrawList {
    fn draw_sprite(&mut self, texture: &TextureKey, dest: Rect, source: Rect, tint: Tint) {
        self.commands.push(DrawCommand::Sprite {
            texture: texture.clone(),
            dest,
            source,
            tint,
        });
    }

    fn draw_text(&mut self, text: &str, position: (i32, i32), tint: Tint) {
        self.commands.push(DrawCommand::Text {
            text: text.to_string(),
            position,
            tint,
        });
    }

    fn draw_solid(&mut self, texture: &SolidTexture, position: (i32, i32)) {
        self.commands.push(DrawCommand::Solid {
            width: texture.width(),
            height: texture.height(),
            position,
        });
    }
}
