use std::sync::Arc;

use pixels::{Error, Pixels, SurfaceTexture};
use winit::window::Window;

use super::atlas::{TileAtlas, TileAtlases, TileImage, MAP_TILE_SET};
use super::transform::Viewport;
use crate::app::{Entity, GameState, Vec2};
use crate::grid::{Color, GridMap, DEFAULT_BG_COLOR};

const PLACEHOLDER_COLOR: [u8; 4] = [220, 220, 240, 255];
const TILE_FALLBACK_PALETTE: [[u8; 4]; 6] = [
    [74, 112, 56, 255],
    [112, 83, 58, 255],
    [58, 92, 140, 255],
    [128, 128, 128, 255],
    [150, 138, 84, 255],
    [68, 74, 62, 255],
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RenderCounts {
    pub tiles_drawn: usize,
    pub entities_drawn: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ScreenRectPx {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
}

#[derive(Debug, Clone, Copy, Default)]
struct BlitStyle {
    hflip: bool,
    vflip: bool,
    tint: Option<Color>,
}

/// Window surface backed by a `pixels` frame buffer sized to the window.
pub struct Renderer {
    window: Arc<Window>,
    pixels: Pixels<'static>,
    width: u32,
    height: u32,
}

impl Renderer {
    pub fn new(window: Arc<Window>) -> Result<Self, Error> {
        let size = window.inner_size();
        let width = size.width.max(1);
        let height = size.height.max(1);
        let pixels = Self::build_pixels(Arc::clone(&window), width, height)?;
        Ok(Self {
            window,
            pixels,
            width,
            height,
        })
    }

    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), Error> {
        if width == 0 || height == 0 {
            return Ok(());
        }
        self.pixels = Self::build_pixels(Arc::clone(&self.window), width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    fn build_pixels(
        window: Arc<Window>,
        width: u32,
        height: u32,
    ) -> Result<Pixels<'static>, Error> {
        let surface = SurfaceTexture::new(width, height, window);
        Pixels::new(width, height, surface)
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn frame_mut(&mut self) -> &mut [u8] {
        self.pixels.frame_mut()
    }

    pub fn present(&self) -> Result<(), Error> {
        self.pixels.render()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }
}

/// Draws one frame: background, visible tiles, then visible entities layer by
/// layer.
pub fn render_frame(
    frame: &mut [u8],
    width: u32,
    height: u32,
    state: &GameState,
    atlases: &TileAtlases,
) -> RenderCounts {
    let bg = state.map().map_or(DEFAULT_BG_COLOR, GridMap::bg_color);
    clear_frame(frame, bg);

    let viewport = state.viewport();
    let tiles_drawn = state.map().map_or(0, |map| {
        draw_map(frame, width, height, map, viewport, atlases.get(MAP_TILE_SET))
    });
    let entities_drawn = draw_entities(frame, width, height, state, atlases);
    RenderCounts {
        tiles_drawn,
        entities_drawn,
    }
}

fn clear_frame(frame: &mut [u8], color: Color) {
    let rgba = [color[0], color[1], color[2], 255];
    for pixel in frame.chunks_exact_mut(4) {
        pixel.copy_from_slice(&rgba);
    }
}

fn draw_map(
    frame: &mut [u8],
    width: u32,
    height: u32,
    map: &GridMap,
    viewport: &Viewport,
    atlas: Option<&TileAtlas>,
) -> usize {
    let range = viewport.visible_cell_range().clamped_to(map.bounds());
    let phase = map.clock().phase();
    let fallback_size = atlas.map_or_else(
        || {
            let size = viewport.tile_size_px() as u32;
            (size, size)
        },
        TileAtlas::tile_size,
    );

    let mut drawn = 0;
    for point in range.points() {
        let Some(tile) = map.frame_at(point, phase) else {
            continue;
        };
        let tint = map.tint(point);
        let image = atlas.and_then(|atlas| atlas.tile(tile));
        let size = image.map_or(fallback_size, |image| (image.width(), image.height()));
        let rect = screen_rect(viewport, Vec2::from(point), size);
        let style = BlitStyle {
            tint,
            ..BlitStyle::default()
        };
        match image {
            Some(image) => blit_scaled(frame, width, height, rect, image, style),
            None => fill_rect(frame, width, height, rect, tint_color(tile_fallback_color(tile), tint)),
        }
        drawn += 1;
    }
    drawn
}

fn draw_entities(
    frame: &mut [u8],
    width: u32,
    height: u32,
    state: &GameState,
    atlases: &TileAtlases,
) -> usize {
    let viewport = state.viewport();
    let mut drawn = 0;
    for (_, entity) in state.layers().iter() {
        if !viewport.is_visible(entity.position) {
            continue;
        }
        let atlas = atlases.get(entity.sprite.tile_set);
        match atlas.and_then(|atlas| entity_image(atlas, entity)) {
            Some(image) => {
                let rect = screen_rect(viewport, entity.position, (image.width(), image.height()));
                let style = BlitStyle {
                    hflip: entity.sprite.hflip,
                    vflip: entity.sprite.vflip,
                    tint: None,
                };
                blit_scaled(frame, width, height, rect, image, style);
            }
            None => draw_placeholder(frame, width, height, viewport, entity.position),
        }
        drawn += 1;
    }
    drawn
}

fn entity_image<'a>(atlas: &'a TileAtlas, entity: &Entity) -> Option<&'a TileImage> {
    let resolved = atlas.catalog().resolve(&entity.sprite.pose).ok()?;
    atlas.tile(resolved.frame(f64::from(entity.frame)))
}

/// Destination rect for an image of `size` source pixels anchored at grid
/// position `anchor`. Edges are floored so neighboring cells share borders.
fn screen_rect(viewport: &Viewport, anchor: Vec2, size: (u32, u32)) -> ScreenRectPx {
    let top_left = viewport.transform_pos(anchor);
    let scale = viewport.scale();
    ScreenRectPx {
        left: top_left.x.floor() as i32,
        top: top_left.y.floor() as i32,
        right: (top_left.x + size.0 as f32 * scale).floor() as i32,
        bottom: (top_left.y + size.1 as f32 * scale).floor() as i32,
    }
}

fn draw_placeholder(frame: &mut [u8], width: u32, height: u32, viewport: &Viewport, anchor: Vec2) {
    let cell = viewport.cell_size_px();
    let top_left = viewport.transform_pos(anchor);
    let inset = cell / 4.0;
    let rect = ScreenRectPx {
        left: (top_left.x + inset).floor() as i32,
        top: (top_left.y + inset).floor() as i32,
        right: (top_left.x + cell - inset).floor() as i32,
        bottom: (top_left.y + cell - inset).floor() as i32,
    };
    fill_rect(frame, width, height, rect, PLACEHOLDER_COLOR);
}

fn tile_fallback_color(tile: u32) -> [u8; 4] {
    TILE_FALLBACK_PALETTE[tile as usize % TILE_FALLBACK_PALETTE.len()]
}

fn tint_color(color: [u8; 4], tint: Option<Color>) -> [u8; 4] {
    let Some(tint) = tint else {
        return color;
    };
    [
        blend_half(color[0], tint[0]),
        blend_half(color[1], tint[1]),
        blend_half(color[2], tint[2]),
        color[3],
    ]
}

fn blend_half(a: u8, b: u8) -> u8 {
    ((u16::from(a) + u16::from(b)) / 2) as u8
}

fn clip_rect(rect: ScreenRectPx, width: u32, height: u32) -> Option<ScreenRectPx> {
    let clipped = ScreenRectPx {
        left: rect.left.max(0),
        top: rect.top.max(0),
        right: rect.right.min(width as i32),
        bottom: rect.bottom.min(height as i32),
    };
    if clipped.left >= clipped.right || clipped.top >= clipped.bottom {
        return None;
    }
    Some(clipped)
}

fn fill_rect(frame: &mut [u8], width: u32, height: u32, rect: ScreenRectPx, color: [u8; 4]) {
    let Some(clipped) = clip_rect(rect, width, height) else {
        return;
    };
    for y in clipped.top..clipped.bottom {
        for x in clipped.left..clipped.right {
            write_pixel_rgba_clipped(frame, width as usize, x, y, color);
        }
    }
}

fn write_pixel_rgba_clipped(frame: &mut [u8], width: usize, x: i32, y: i32, color: [u8; 4]) {
    if x < 0 || y < 0 {
        return;
    }
    let x = x as usize;
    let y = y as usize;
    let Some(pixel_offset) = y.checked_mul(width).and_then(|row| row.checked_add(x)) else {
        return;
    };
    let Some(byte_offset) = pixel_offset.checked_mul(4) else {
        return;
    };
    let Some(end) = byte_offset.checked_add(4) else {
        return;
    };
    if end > frame.len() {
        return;
    }
    frame[byte_offset..end].copy_from_slice(&color);
}

/// Nearest-neighbor blit of `image` stretched over `rect`. Fully transparent
/// source pixels are skipped; partial alpha is blended over the frame.
fn blit_scaled(
    frame: &mut [u8],
    width: u32,
    height: u32,
    rect: ScreenRectPx,
    image: &TileImage,
    style: BlitStyle,
) {
    if image.width() == 0 || image.height() == 0 {
        return;
    }
    let Some(clipped) = clip_rect(rect, width, height) else {
        return;
    };
    let dest_w = (rect.right - rect.left) as i64;
    let dest_h = (rect.bottom - rect.top) as i64;
    let src_w = i64::from(image.width());
    let src_h = i64::from(image.height());
    let rgba = image.rgba();
    let frame_width = width as usize;

    for out_y in clipped.top..clipped.bottom {
        let mut src_y = (i64::from(out_y - rect.top) * src_h / dest_h).min(src_h - 1);
        if style.vflip {
            src_y = src_h - 1 - src_y;
        }
        let src_row = src_y as usize * src_w as usize * 4;
        let dst_row = out_y as usize * frame_width * 4;
        for out_x in clipped.left..clipped.right {
            let mut src_x = (i64::from(out_x - rect.left) * src_w / dest_w).min(src_w - 1);
            if style.hflip {
                src_x = src_w - 1 - src_x;
            }
            let src = src_row + src_x as usize * 4;
            let alpha = rgba[src + 3];
            if alpha == 0 {
                continue;
            }
            let color = tint_color([rgba[src], rgba[src + 1], rgba[src + 2], 255], style.tint);
            let dst = dst_row + out_x as usize * 4;
            let Some(pixel) = frame.get_mut(dst..dst + 4) else {
                continue;
            };
            if alpha == 255 {
                pixel.copy_from_slice(&color);
            } else {
                for channel in 0..3 {
                    let src_c = u32::from(color[channel]);
                    let dst_c = u32::from(pixel[channel]);
                    let a = u32::from(alpha);
                    pixel[channel] = ((src_c * a + dst_c * (255 - a)) / 255) as u8;
                }
                pixel[3] = 255;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::app::{SpriteDesc, LAYER_ACTORS, LAYER_CURSOR};
    use crate::grid::{GridPoint, TileCatalog, TileRef};
    use crate::tile_keys::TileKey;

    const RED: [u8; 4] = [200, 0, 0, 255];
    const BLUE: [u8; 4] = [0, 0, 200, 255];

    fn pixel(frame: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * width + x) * 4) as usize;
        [frame[offset], frame[offset + 1], frame[offset + 2], frame[offset + 3]]
    }

    fn two_tile_atlas() -> TileAtlas {
        let mut rgba = Vec::new();
        for _y in 0..4 {
            for x in 0..8 {
                rgba.extend_from_slice(if x < 4 { &RED } else { &BLUE });
            }
        }
        let sheet = TileImage::new(8, 4, rgba).expect("sheet");
        let mut groups = BTreeMap::new();
        groups.insert("pulse".to_string(), vec![0, 1]);
        TileAtlas::slice("tiles.png", &sheet, 4, 4, None, TileCatalog::new(groups).expect("catalog"))
            .expect("atlas")
    }

    fn state_with_map(width: u32, height: u32, cells: Vec<TileRef>) -> GameState {
        let mut viewport = Viewport::new(16, 16).with_tile_size_px(4.0);
        viewport.set_scale(1.0).expect("scale");
        let mut state = GameState::new(viewport);
        state.set_map(
            GridMap::new(width, height, cells, vec![vec![0, 1]])
                .expect("map")
                .with_bg_color([1, 2, 3]),
        );
        state
    }

    fn atlases() -> TileAtlases {
        let mut atlases = TileAtlases::default();
        atlases.push(two_tile_atlas());
        atlases
    }

    #[test]
    fn draws_only_cells_in_visible_range() {
        let cells = vec![TileRef::Static(0); 100];
        let state = state_with_map(10, 10, cells);
        let mut frame = vec![0u8; 16 * 16 * 4];
        let counts = render_frame(&mut frame, 16, 16, &state, &atlases());
        assert_eq!(counts.tiles_drawn, 16);
        assert_eq!(counts.entities_drawn, 0);
        assert_eq!(pixel(&frame, 16, 15, 15), RED);
    }

    #[test]
    fn background_shows_where_cells_are_absent() {
        let mut cells = vec![TileRef::Absent; 16];
        cells[0] = TileRef::Static(1);
        let state = state_with_map(4, 4, cells);
        let mut frame = vec![0u8; 16 * 16 * 4];
        let counts = render_frame(&mut frame, 16, 16, &state, &atlases());
        assert_eq!(counts.tiles_drawn, 1);
        assert_eq!(pixel(&frame, 16, 0, 0), BLUE);
        assert_eq!(pixel(&frame, 16, 8, 8), [1, 2, 3, 255]);
    }

    #[test]
    fn animated_cells_follow_the_map_clock() {
        let state = {
            let mut state = state_with_map(1, 1, vec![TileRef::Animated(0)]);
            if let Some(map) = state.map_mut() {
                for _ in 0..4 {
                    map.advance(4.0);
                }
            }
            state
        };
        let mut frame = vec![0u8; 16 * 16 * 4];
        render_frame(&mut frame, 16, 16, &state, &atlases());
        assert_eq!(pixel(&frame, 16, 1, 1), BLUE);
    }

    #[test]
    fn tint_blends_half_with_tile_color() {
        let mut state = state_with_map(2, 2, vec![TileRef::Static(0); 4]);
        if let Some(map) = state.map_mut() {
            map.set_tint(GridPoint::new(1, 0), [0, 200, 0]);
        }
        let mut frame = vec![0u8; 16 * 16 * 4];
        render_frame(&mut frame, 16, 16, &state, &atlases());
        assert_eq!(pixel(&frame, 16, 5, 1), [100, 100, 0, 255]);
        assert_eq!(pixel(&frame, 16, 1, 1), RED);
    }

    #[test]
    fn missing_atlas_draws_flat_fallback_tiles() {
        let state = state_with_map(1, 1, vec![TileRef::Static(2)]);
        let mut frame = vec![0u8; 16 * 16 * 4];
        let counts = render_frame(&mut frame, 16, 16, &state, &TileAtlases::default());
        assert_eq!(counts.tiles_drawn, 1);
        assert_eq!(pixel(&frame, 16, 0, 0), tile_fallback_color(2));
    }

    #[test]
    fn entities_are_culled_by_anchor_and_drawn_by_layer() {
        let mut state = state_with_map(10, 10, vec![TileRef::Absent; 100]);
        let atlases = atlases();
        state.layers_mut().spawn(
            LAYER_CURSOR,
            Vec2::new(1.0, 1.0),
            SpriteDesc::new(MAP_TILE_SET, TileKey::Index(1)),
        );
        state.layers_mut().spawn(
            LAYER_ACTORS,
            Vec2::new(1.0, 1.0),
            SpriteDesc::new(MAP_TILE_SET, TileKey::Index(0)),
        );
        state.layers_mut().spawn(
            LAYER_ACTORS,
            Vec2::new(6.0, 1.0),
            SpriteDesc::new(MAP_TILE_SET, TileKey::Index(0)),
        );
        let mut frame = vec![0u8; 16 * 16 * 4];
        let counts = render_frame(&mut frame, 16, 16, &state, &atlases);
        assert_eq!(counts.entities_drawn, 2);
        assert_eq!(pixel(&frame, 16, 5, 5), BLUE);
    }

    #[test]
    fn flipped_entities_mirror_source_pixels() {
        let mut rgba = Vec::new();
        rgba.extend_from_slice(&RED);
        rgba.extend_from_slice(&BLUE);
        let sheet = TileImage::new(2, 1, rgba).expect("sheet");
        let mut atlases = TileAtlases::default();
        atlases.push(TileAtlas::slice("pair.png", &sheet, 2, 1, None, TileCatalog::default()).expect("atlas"));

        let mut state = GameState::new(Viewport::new(8, 8).with_tile_size_px(2.0));
        state.viewport_mut().set_scale(1.0).expect("scale");
        state.layers_mut().spawn(
            LAYER_ACTORS,
            Vec2::new(0.0, 0.0),
            SpriteDesc {
                hflip: true,
                ..SpriteDesc::new(MAP_TILE_SET, TileKey::Index(0))
            },
        );
        let mut frame = vec![0u8; 8 * 8 * 4];
        render_frame(&mut frame, 8, 8, &state, &atlases);
        assert_eq!(pixel(&frame, 8, 0, 0), BLUE);
        assert_eq!(pixel(&frame, 8, 1, 0), RED);
    }

    #[test]
    fn unresolvable_pose_draws_placeholder() {
        let mut state = state_with_map(4, 4, vec![TileRef::Absent; 16]);
        state.layers_mut().spawn(
            LAYER_ACTORS,
            Vec2::new(0.0, 0.0),
            SpriteDesc::new(MAP_TILE_SET, TileKey::from("missing")),
        );
        let mut frame = vec![0u8; 16 * 16 * 4];
        let counts = render_frame(&mut frame, 16, 16, &state, &atlases());
        assert_eq!(counts.entities_drawn, 1);
        assert_eq!(pixel(&frame, 16, 1, 1), PLACEHOLDER_COLOR);
    }

    #[test]
    fn blit_clips_partially_offscreen_rects() {
        let image = TileImage::filled(4, 4, RED);
        let mut frame = vec![0u8; 4 * 4 * 4];
        let rect = ScreenRectPx {
            left: -2,
            top: 2,
            right: 6,
            bottom: 10,
        };
        blit_scaled(&mut frame, 4, 4, rect, &image, BlitStyle::default());
        assert_eq!(pixel(&frame, 4, 3, 3), RED);
        assert_eq!(pixel(&frame, 4, 0, 0), [0, 0, 0, 0]);
    }
}
