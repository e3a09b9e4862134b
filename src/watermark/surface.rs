//! A raster drawing surface with canvas-style paint state.
//!
//! The surface owns an RGBA buffer plus a current [`PaintState`] (global alpha,
//! transform, fill color and drop shadow). Drawing calls read that state; the
//! state itself is scoped with [`Surface::with_state`], which snapshots it
//! before a closure runs and restores it on every exit path.

use image::{GrayImage, Luma, Rgba, RgbaImage};
use imageproc::filter::gaussian_blur_f32;
use kurbo::{Affine, Point};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Shadow {
    pub color: Rgba<u8>,
    pub blur: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PaintState {
    pub global_alpha: f32,
    pub transform: Affine,
    pub fill: Rgba<u8>,
    pub shadow: Option<Shadow>,
}

impl Default for PaintState {
    fn default() -> Self {
        Self {
            global_alpha: 1.0,
            transform: Affine::IDENTITY,
            fill: Rgba([0, 0, 0, 255]),
            shadow: None,
        }
    }
}

pub struct Surface {
    canvas: RgbaImage,
    state: PaintState,
    saved: Vec<PaintState>,
}

impl Surface {
    /// Allocate a fully transparent surface
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: RgbaImage::new(width, height),
            state: PaintState::default(),
            saved: Vec::new(),
        }
    }

    pub fn width(&self) -> u32 {
        self.canvas.width()
    }

    pub fn height(&self) -> u32 {
        self.canvas.height()
    }

    pub fn image(&self) -> &RgbaImage {
        &self.canvas
    }

    pub fn into_image(self) -> RgbaImage {
        self.canvas
    }

    pub fn state(&self) -> &PaintState {
        &self.state
    }

    pub fn save(&mut self) {
        self.saved.push(self.state);
    }

    pub fn restore(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.state = state;
        }
    }

    /// Run `f` with a snapshot of the paint state that is restored afterwards,
    /// whether `f` succeeds or fails.
    pub fn with_state<T, E>(
        &mut self,
        f: impl FnOnce(&mut Surface) -> Result<T, E>,
    ) -> Result<T, E> {
        let depth = self.saved.len();
        self.save();
        let result = f(self);
        // Unbalanced saves inside `f` are discarded along with ours
        self.saved.truncate(depth + 1);
        self.restore();
        result
    }

    pub fn set_global_alpha(&mut self, alpha: f32) {
        self.state.global_alpha = if alpha.is_nan() {
            0.0
        } else {
            alpha.clamp(0.0, 1.0)
        };
    }

    pub fn set_fill(&mut self, color: Rgba<u8>) {
        self.state.fill = color;
    }

    pub fn set_shadow(&mut self, shadow: Option<Shadow>) {
        self.state.shadow = shadow;
    }

    pub fn translate(&mut self, tx: f64, ty: f64) {
        self.state.transform = self.state.transform * Affine::translate((tx, ty));
    }

    pub fn rotate(&mut self, radians: f64) {
        self.state.transform = self.state.transform * Affine::rotate(radians);
    }

    /// Copy an image onto the surface at an integer position, ignoring paint state
    pub fn blit(&mut self, image: &RgbaImage, x: i64, y: i64) {
        image::imageops::overlay(&mut self.canvas, image, x, y);
    }

    /// Fill a coverage mask with the current fill color at the local origin,
    /// stretched to `width` x `height`
    pub fn fill_mask(&mut self, mask: &GrayImage, width: f32, height: f32) {
        let fill = self.state.fill;
        let tile = RgbaImage::from_fn(mask.width(), mask.height(), |x, y| {
            let Luma([coverage]) = *mask.get_pixel(x, y);
            let alpha = (u16::from(coverage) * u16::from(fill[3]) + 127) / 255;
            Rgba([fill[0], fill[1], fill[2], alpha as u8])
        });
        self.draw_image(&tile, width, height);
    }

    /// Draw `tile` scaled to `width` x `height` at the local origin, honouring
    /// the current transform, global alpha and shadow.
    pub fn draw_image(&mut self, tile: &RgbaImage, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 || tile.width() == 0 || tile.height() == 0 {
            return;
        }
        if self.state.global_alpha <= 0.0 {
            return;
        }
        let transform = self.state.transform;
        let det = transform.determinant();
        if !det.is_finite() || det.abs() < f64::EPSILON {
            return;
        }
        let inverse = transform.inverse();

        let (width, height) = (f64::from(width), f64::from(height));
        let corners = [
            transform * Point::ORIGIN,
            transform * Point::new(width, 0.0),
            transform * Point::new(0.0, height),
            transform * Point::new(width, height),
        ];
        // Clip to the canvas, keeping enough margin for a shadow cast inwards
        let margin = match self.state.shadow {
            Some(shadow) => {
                f64::from((shadow.blur.max(0.0) * 1.5).ceil())
                    + f64::from(shadow.offset_x.abs().max(shadow.offset_y.abs()).ceil())
            }
            None => 0.0,
        };
        let canvas_width = f64::from(self.canvas.width());
        let canvas_height = f64::from(self.canvas.height());
        let min_x = corners
            .iter()
            .map(|p| p.x)
            .fold(f64::INFINITY, f64::min)
            .max(-margin);
        let max_x = corners
            .iter()
            .map(|p| p.x)
            .fold(f64::NEG_INFINITY, f64::max)
            .min(canvas_width + margin);
        let min_y = corners
            .iter()
            .map(|p| p.y)
            .fold(f64::INFINITY, f64::min)
            .max(-margin);
        let max_y = corners
            .iter()
            .map(|p| p.y)
            .fold(f64::NEG_INFINITY, f64::max)
            .min(canvas_height + margin);
        if ![min_x, max_x, min_y, max_y].iter().all(|v| v.is_finite()) {
            return;
        }

        let layer = Layer::rasterize(tile, width, height, &inverse, min_x, min_y, max_x, max_y);
        if layer.is_empty() {
            return;
        }

        if let Some(shadow) = self.state.shadow
            && shadow.color[3] > 0
        {
            self.composite_shadow(&layer, &shadow);
        }
        self.composite_layer(&layer);
    }

    fn composite_layer(&mut self, layer: &Layer) {
        let alpha = self.state.global_alpha;
        for ly in 0..layer.height {
            for lx in 0..layer.width {
                let src = layer.pixels[(ly * layer.width + lx) as usize];
                if src[3] <= 0.0 {
                    continue;
                }
                let x = layer.x + lx as i64;
                let y = layer.y + ly as i64;
                if x < 0 || y < 0 || x >= self.canvas.width() as i64 {
                    continue;
                }
                if y >= self.canvas.height() as i64 {
                    continue;
                }
                let dst = self.canvas.get_pixel_mut(x as u32, y as u32);
                blend_over(dst, src, alpha);
            }
        }
    }

    fn composite_shadow(&mut self, layer: &Layer, shadow: &Shadow) {
        let sigma = shadow.blur.max(0.0) / 2.0;
        let pad = (sigma * 3.0).ceil() as u32;
        let mut mask = GrayImage::new(layer.width + pad * 2, layer.height + pad * 2);
        for ly in 0..layer.height {
            for lx in 0..layer.width {
                let a = layer.pixels[(ly * layer.width + lx) as usize][3];
                mask.put_pixel(lx + pad, ly + pad, Luma([(a * 255.0).round() as u8]));
            }
        }
        let mask = if sigma > 0.0 {
            gaussian_blur_f32(&mask, sigma)
        } else {
            mask
        };

        let origin_x = layer.x - i64::from(pad) + shadow.offset_x.round() as i64;
        let origin_y = layer.y - i64::from(pad) + shadow.offset_y.round() as i64;
        let color = shadow.color;
        let color_alpha = f32::from(color[3]) / 255.0;
        let alpha = self.state.global_alpha;
        for (mx, my, Luma([coverage])) in mask.enumerate_pixels() {
            if *coverage == 0 {
                continue;
            }
            let x = origin_x + i64::from(mx);
            let y = origin_y + i64::from(my);
            if x < 0 || y < 0 || x >= self.canvas.width() as i64 {
                continue;
            }
            if y >= self.canvas.height() as i64 {
                continue;
            }
            let a = f32::from(*coverage) / 255.0 * color_alpha;
            let src = [
                f32::from(color[0]) / 255.0 * a,
                f32::from(color[1]) / 255.0 * a,
                f32::from(color[2]) / 255.0 * a,
                a,
            ];
            blend_over(self.canvas.get_pixel_mut(x as u32, y as u32), src, alpha);
        }
    }
}

/// Premultiplied float pixels covering the device-space bounding box of a draw
struct Layer {
    x: i64,
    y: i64,
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl Layer {
    #[allow(clippy::too_many_arguments)]
    fn rasterize(
        tile: &RgbaImage,
        width: f64,
        height: f64,
        inverse: &Affine,
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    ) -> Layer {
        let x0 = min_x.floor() as i64;
        let y0 = min_y.floor() as i64;
        let x1 = max_x.ceil() as i64;
        let y1 = max_y.ceil() as i64;
        let layer_width = (x1 - x0).max(0) as u32;
        let layer_height = (y1 - y0).max(0) as u32;

        let scale_x = f64::from(tile.width()) / width;
        let scale_y = f64::from(tile.height()) / height;
        let mut pixels = vec![[0.0f32; 4]; (layer_width as usize) * (layer_height as usize)];

        for ly in 0..layer_height {
            for lx in 0..layer_width {
                let dx = (x0 + lx as i64) as f64 + 0.5;
                let dy = (y0 + ly as i64) as f64 + 0.5;
                let local = *inverse * Point::new(dx, dy);
                let (u, v) = (local.x, local.y);
                if u < 0.0 || v < 0.0 || u >= width || v >= height {
                    continue;
                }
                pixels[(ly * layer_width + lx) as usize] =
                    sample_bilinear(tile, u * scale_x - 0.5, v * scale_y - 0.5);
            }
        }

        Layer {
            x: x0,
            y: y0,
            width: layer_width,
            height: layer_height,
            pixels,
        }
    }

    fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

fn premultiplied(pixel: &Rgba<u8>) -> [f32; 4] {
    let a = f32::from(pixel[3]) / 255.0;
    [
        f32::from(pixel[0]) / 255.0 * a,
        f32::from(pixel[1]) / 255.0 * a,
        f32::from(pixel[2]) / 255.0 * a,
        a,
    ]
}

/// Sample `image` at continuous pixel coordinates (pixel centers at integers)
fn sample_bilinear(image: &RgbaImage, x: f64, y: f64) -> [f32; 4] {
    let max_x = i64::from(image.width()) - 1;
    let max_y = i64::from(image.height()) - 1;
    let fx = x.floor();
    let fy = y.floor();
    let tx = (x - fx) as f32;
    let ty = (y - fy) as f32;
    let x0 = (fx as i64).clamp(0, max_x) as u32;
    let y0 = (fy as i64).clamp(0, max_y) as u32;
    let x1 = (fx as i64 + 1).clamp(0, max_x) as u32;
    let y1 = (fy as i64 + 1).clamp(0, max_y) as u32;

    let p00 = premultiplied(image.get_pixel(x0, y0));
    let p10 = premultiplied(image.get_pixel(x1, y0));
    let p01 = premultiplied(image.get_pixel(x0, y1));
    let p11 = premultiplied(image.get_pixel(x1, y1));

    let mut out = [0.0f32; 4];
    for i in 0..4 {
        let top = p00[i] + (p10[i] - p00[i]) * tx;
        let bottom = p01[i] + (p11[i] - p01[i]) * tx;
        out[i] = top + (bottom - top) * ty;
    }
    out
}

/// Source-over blend of a premultiplied pixel onto a straight-alpha pixel
fn blend_over(dst: &mut Rgba<u8>, src: [f32; 4], global_alpha: f32) {
    let sa = src[3] * global_alpha;
    if sa <= 0.0 {
        return;
    }
    let da = f32::from(dst[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    if out_a <= 0.0 {
        *dst = Rgba([0, 0, 0, 0]);
        return;
    }
    let mut out = [0u8; 4];
    for i in 0..3 {
        let sc = src[i] * global_alpha;
        let dc = f32::from(dst[i]) / 255.0 * da;
        let c = (sc + dc * (1.0 - sa)) / out_a;
        out[i] = (c * 255.0).round().clamp(0.0, 255.0) as u8;
    }
    out[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
    *dst = Rgba(out);
}
