use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use image::ImageReader;
use pixels::{Error, Pixels, SurfaceTexture};
use tracing::{debug, warn};
use winit::window::Window;

use crate::sim::{Rect, RenderSink, SolidTexture, Tint};
use crate::TextureKey;

use super::font::text_pixels;

const CLEAR_COLOR: [u8; 4] = [0, 0, 0, 255];
const PLACEHOLDER_COLOR: [u8; 4] = [255, 0, 255, 255];

struct LoadedTexture {
    width: u32,
    height: u32,
    rgba: Vec<u8>,
}

impl LoadedTexture {
    fn pixel(&self, x: i32, y: i32) -> Option<[u8; 4]> {
        if x < 0 || y < 0 || x as u32 >= self.width || y as u32 >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = self.rgba.get(offset..offset + 4)?;
        Some([bytes[0], bytes[1], bytes[2], bytes[3]])
    }
}

/// Textures decoded on first use. A failed load is remembered so it warns only once.
pub(crate) struct TextureCache {
    textures_dir: PathBuf,
    entries: HashMap<TextureKey, Option<LoadedTexture>>,
}

impl TextureCache {
    pub(crate) fn new(textures_dir: PathBuf) -> Self {
        Self {
            textures_dir,
            entries: HashMap::new(),
        }
    }

    fn resolve(&mut self, key: &TextureKey) -> Option<&LoadedTexture> {
        if !self.entries.contains_key(key) {
            let loaded = self.load(key);
            self.entries.insert(key.clone(), loaded);
        }
        self.entries.get(key).and_then(Option::as_ref)
    }

    fn load(&self, key: &TextureKey) -> Option<LoadedTexture> {
        let path = texture_path(&self.textures_dir, key);
        match load_texture_rgba(&path) {
            Ok(texture) => {
                debug!(
                    texture = %key,
                    width = texture.width,
                    height = texture.height,
                    "texture_loaded"
                );
                Some(texture)
            }
            Err(reason) => {
                warn!(
                    texture = %key,
                    path = %path.display(),
                    reason = reason.as_str(),
                    "texture_load_failed_using_placeholder"
                );
                None
            }
        }
    }
}

fn texture_path(textures_dir: &Path, key: &TextureKey) -> PathBuf {
    textures_dir.join(format!("{key}.png"))
}

fn load_texture_rgba(path: &Path) -> Result<LoadedTexture, String> {
    let reader = ImageReader::open(path).map_err(|error| format!("file_open_failed:{error}"))?;
    let decoded = reader
        .decode()
        .map_err(|error| format!("decode_failed:{error}"))?;
    let image = decoded.to_rgba8();
    Ok(LoadedTexture {
        width: image.width(),
        height: image.height(),
        rgba: image.into_raw(),
    })
}

/// Presents a fixed-size frame buffer, scaled by `pixels` to whatever the window is.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    buffer_width: u32,
    buffer_height: u32,
    textures: TextureCache,
}

impl Renderer {
    pub fn new(
        window: Arc<Window>,
        buffer_width: u32,
        buffer_height: u32,
        textures_dir: PathBuf,
    ) -> Result<Self, Error> {
        let size = window.inner_size();
        let pixels = Self::build_pixels(
            Arc::clone(&window),
            (size.width, size.height),
            (buffer_width, buffer_height),
        )?;
        Ok(Self {
            window,
            pixels,
            buffer_width,
            buffer_height,
            textures: TextureCache::new(textures_dir),
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(
            Arc::clone(&self.window),
            (width, height),
            (self.buffer_width, self.buffer_height),
        )?;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        surface: (u32, u32),
        buffer: (u32, u32),
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(surface.0, surface.1, window);
        Pixels::new(buffer.0, buffer.1, surface)
    }

    /// Clears the buffer, lets `draw` fill it, then presents.
    pub fn render_frame(&mut self, draw: impl FnOnce(&mut dyn RenderSink)) -> Result<(), Error> {
        {
            let frame = self.pixels.frame_mut();
            for chunk in frame.chunks_exact_mut(4) {
                chunk.copy_from_slice(&CLEAR_COLOR);
            }
            let mut canvas = FrameCanvas::new(
                frame,
                self.buffer_width,
                self.buffer_height,
                &mut self.textures,
            );
            draw(&mut canvas);
        }
        self.pixels.render()
    }
}

/// Rasterizes draw requests into an RGBA frame buffer.
pub(crate) struct FrameCanvas<'a> {
    frame: &'a mut [u8],
    width: u32,
    height: u32,
    textures: &'a mut TextureCache,
}

impl<'a> FrameCanvas<'a> {
    pub(crate) fn new(
        frame: &'a mut [u8],
        width: u32,
        height: u32,
        textures: &'a mut TextureCache,
    ) -> Self {
        Self {
            frame,
            width,
            height,
            textures,
        }
    }
}

impl RenderSink for FrameCanvas<'_> {
    fn draw_sprite(&mut self, texture: &TextureKey, dest: Rect, source: Rect, tint: Tint) {
        match self.textures.resolve(texture) {
            Some(loaded) => blit_texture(
                self.frame,
                (self.width, self.height),
                loaded,
                dest,
                source,
                tint,
            ),
            None => fill_rect(self.frame, (self.width, self.height), dest, PLACEHOLDER_COLOR),
        }
    }

    fn draw_text(&mut self, text: &str, position: (i32, i32), tint: Tint) {
        let color = tint.to_array();
        for (x, y) in text_pixels(text) {
            blend_pixel_clipped(
                self.frame,
                (self.width, self.height),
                position.0 + x,
                position.1 + y,
                color,
            );
        }
    }

    fn draw_solid(&mut self, texture: &SolidTexture, position: (i32, i32)) {
        if texture.is_placeholder() {
            return;
        }
        let width = texture.width() as usize;
        for (index, pixel) in texture.rgba().chunks_exact(4).enumerate() {
            let x = position.0 + (index % width) as i32;
            let y = position.1 + (index / width) as i32;
            blend_pixel_clipped(
                self.frame,
                (self.width, self.height),
                x,
                y,
                [pixel[0], pixel[1], pixel[2], pixel[3]],
            );
        }
    }
}

/// Nearest-neighbor copy of `source` onto `dest`, modulated by `tint`.
fn blit_texture(
    frame: &mut [u8],
    frame_size: (u32, u32),
    texture: &LoadedTexture,
    dest: Rect,
    source: Rect,
    tint: Tint,
) {
    if dest.is_empty() || source.is_empty() {
        return;
    }
    let top = dest.y.max(0);
    let bottom = dest.bottom().min(frame_size.1 as i32);
    let left = dest.x.max(0);
    let right = dest.right().min(frame_size.0 as i32);

    for y in top..bottom {
        let source_y = source.y + (y - dest.y) * source.height / dest.height;
        for x in left..right {
            let source_x = source.x + (x - dest.x) * source.width / dest.width;
            let Some(texel) = texture.pixel(source_x, source_y) else {
                continue;
            };
            blend_pixel_clipped(frame, frame_size, x, y, modulate(texel, tint));
        }
    }
}

fn fill_rect(frame: &mut [u8], frame_size: (u32, u32), rect: Rect, color: [u8; 4]) {
    for y in rect.top()..rect.bottom() {
        for x in rect.left()..rect.right() {
            blend_pixel_clipped(frame, frame_size, x, y, color);
        }
    }
}

fn modulate(texel: [u8; 4], tint: Tint) -> [u8; 4] {
    let scale = |value: u8, factor: u8| ((value as u16 * factor as u16) / 255) as u8;
    [
        scale(texel[0], tint.r),
        scale(texel[1], tint.g),
        scale(texel[2], tint.b),
        scale(texel[3], tint.a),
    ]
}

fn blend_pixel_clipped(frame: &mut [u8], frame_size: (u32, u32), x: i32, y: i32, color: [u8; 4]) {
    let alpha = color[3];
    if alpha == 0 || x < 0 || y < 0 || x >= frame_size.0 as i32 || y >= frame_size.1 as i32 {
        return;
    }
    let Some(offset) = (y as usize)
        .checked_mul(frame_size.0 as usize)
        .and_then(|row| row.checked_add(x as usize))
        .and_then(|pixel| pixel.checked_mul(4))
    else {
        return;
    };
    let Some(target) = frame.get_mut(offset..offset + 4) else {
        return;
    };
    if alpha == u8::MAX {
        target.copy_from_slice(&color);
        return;
    }
    let inverse = (u8::MAX - alpha) as u16;
    for channel in 0..3 {
        let blended = (color[channel] as u16 * alpha as u16 + target[channel] as u16 * inverse) / 255;
        target[channel] = blended as u8;
    }
    target[3] = u8::MAX;
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};
    use tempfile::TempDir;

    use super::*;

    const SIZE: (u32, u32) = (8, 8);

    fn frame() -> Vec<u8> {
        vec![0; (SIZE.0 * SIZE.1 * 4) as usize]
    }

    fn pixel_at(frame: &[u8], x: usize, y: usize) -> [u8; 4] {
        let offset = (y * SIZE.0 as usize + x) * 4;
        [
            frame[offset],
            frame[offset + 1],
            frame[offset + 2],
            frame[offset + 3],
        ]
    }

    /// 4x4 texture whose texel (x, y) is (x * 10, y * 10, 0, 255); column 3 is transparent.
    fn gradient() -> LoadedTexture {
        let mut rgba = Vec::new();
        for y in 0..4u8 {
            for x in 0..4u8 {
                let alpha = if x == 3 { 0 } else { 255 };
                rgba.extend_from_slice(&[x * 10, y * 10, 0, alpha]);
            }
        }
        LoadedTexture {
            width: 4,
            height: 4,
            rgba,
        }
    }

    fn key(raw: &str) -> TextureKey {
        TextureKey::new(raw).expect("texture key")
    }

    #[test]
    fn blit_copies_the_source_region() {
        let mut frame = frame();
        blit_texture(
            &mut frame,
            SIZE,
            &gradient(),
            Rect::new(2, 3, 2, 2),
            Rect::new(1, 2, 2, 2),
            Tint::WHITE,
        );

        assert_eq!(pixel_at(&frame, 2, 3), [10, 20, 0, 255]);
        assert_eq!(pixel_at(&frame, 3, 4), [20, 30, 0, 255]);
        assert_eq!(pixel_at(&frame, 1, 3), [0, 0, 0, 0]);
    }

    #[test]
    fn transparent_texels_leave_the_frame_alone() {
        let mut frame = frame();
        blit_texture(
            &mut frame,
            SIZE,
            &gradient(),
            Rect::new(0, 0, 4, 1),
            Rect::new(0, 0, 4, 1),
            Tint::WHITE,
        );
        assert_eq!(pixel_at(&frame, 2, 0), [20, 0, 0, 255]);
        assert_eq!(pixel_at(&frame, 3, 0), [0, 0, 0, 0]);
    }

    #[test]
    fn tint_modulates_color() {
        let mut frame = frame();
        blit_texture(
            &mut frame,
            SIZE,
            &gradient(),
            Rect::new(0, 0, 1, 1),
            Rect::new(2, 2, 1, 1),
            Tint::rgba(255, 0, 255, 255),
        );
        assert_eq!(pixel_at(&frame, 0, 0), [20, 0, 0, 255]);
    }

    #[test]
    fn blit_clips_at_frame_edges() {
        let mut frame = frame();
        blit_texture(
            &mut frame,
            SIZE,
            &gradient(),
            Rect::new(-2, 6, 4, 4),
            Rect::new(0, 0, 4, 4),
            Tint::WHITE,
        );
        assert_eq!(pixel_at(&frame, 0, 6), [20, 0, 0, 255]);
        assert_eq!(pixel_at(&frame, 0, 7), [20, 10, 0, 255]);
    }

    #[test]
    fn half_alpha_blends_with_what_is_below() {
        let mut frame = frame();
        fill_rect(&mut frame, SIZE, Rect::new(0, 0, 1, 1), [200, 100, 0, 255]);
        blend_pixel_clipped(&mut frame, SIZE, 0, 0, [0, 255, 0, 128]);
        let blended = pixel_at(&frame, 0, 0);
        assert_eq!(blended[3], 255);
        assert!((99..=100).contains(&blended[0]));
        assert!((177..=178).contains(&blended[1]));
    }

    #[test]
    fn canvas_draws_placeholder_for_missing_texture_once_cached() {
        let temp = TempDir::new().expect("temp dir");
        let mut cache = TextureCache::new(temp.path().to_path_buf());
        let mut frame = frame();
        {
            let mut canvas = FrameCanvas::new(&mut frame, SIZE.0, SIZE.1, &mut cache);
            for _ in 0..3 {
                canvas.draw_sprite(
                    &key("actors/ghost"),
                    Rect::new(1, 1, 2, 2),
                    Rect::new(0, 0, 2, 2),
                    Tint::WHITE,
                );
            }
        }
        assert_eq!(pixel_at(&frame, 1, 1), PLACEHOLDER_COLOR);
        assert_eq!(cache.entries.len(), 1);
        assert!(cache.resolve(&key("actors/ghost")).is_none());
    }

    #[test]
    fn canvas_loads_png_textures_from_disk() {
        let temp = TempDir::new().expect("temp dir");
        let actors = temp.path().join("actors");
        std::fs::create_dir_all(&actors).expect("actors dir");
        let image = RgbaImage::from_pixel(2, 2, Rgba([9, 8, 7, 255]));
        image.save(actors.join("albert.png")).expect("save png");

        let mut cache = TextureCache::new(temp.path().to_path_buf());
        let mut frame = frame();
        {
            let mut canvas = FrameCanvas::new(&mut frame, SIZE.0, SIZE.1, &mut cache);
            canvas.draw_sprite(
                &key("actors/albert"),
                Rect::new(4, 4, 2, 2),
                Rect::new(0, 0, 2, 2),
                Tint::WHITE,
            );
        }
        assert_eq!(pixel_at(&frame, 5, 5), [9, 8, 7, 255]);
        assert_eq!(pixel_at(&frame, 6, 6), [0, 0, 0, 0]);
    }

    #[test]
    fn canvas_text_and_solids_stay_inside_the_frame() {
        let temp = TempDir::new().expect("temp dir");
        let mut cache = TextureCache::new(temp.path().to_path_buf());
        let mut frame = frame();
        {
            let mut canvas = FrameCanvas::new(&mut frame, SIZE.0, SIZE.1, &mut cache);
            canvas.draw_text("X: 10", (-3, 6), Tint::WHITE);
            let solid = SolidTexture::filled(20, 2, Tint::rgba(0, 0, 255, 255));
            canvas.draw_solid(&solid, (5, -1));
        }
        assert_eq!(pixel_at(&frame, 7, 0), [0, 0, 255, 255]);
        assert_eq!(pixel_at(&frame, 5, 1), [0, 0, 0, 0]);
    }
}
