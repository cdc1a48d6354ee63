use image::{Rgba, RgbaImage};
use kurbo::{Affine, Point, Rect};

use super::RenderSurfaceError;
use crate::geometry::CanvasSize;

/// Where a source tile lands on the canvas.
///
/// `transform` maps tile-local coordinates, with `(0, 0)` at the tile's
/// top-left and `size` at its bottom-right, onto the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Placement {
    pub transform: Affine,
    pub size: (f64, f64),
}

impl Placement {
    /// Unrotated tile with its top-left corner at `origin`.
    pub fn at(origin: (f64, f64), size: (f64, f64)) -> Self {
        Self {
            transform: Affine::translate(origin),
            size,
        }
    }

    /// Tile at `origin`, then turned clockwise by `degrees` about the canvas point `pivot`.
    pub fn rotated(origin: (f64, f64), size: (f64, f64), pivot: (f64, f64), degrees: f64) -> Self {
        let turn = Affine::rotate_about(degrees.to_radians(), Point::new(pivot.0, pivot.1));
        Self {
            transform: turn * Affine::translate(origin),
            size,
        }
    }

    /// Canvas pixel range covered by the transformed box, clipped to `width`×`height`.
    fn pixel_bounds(&self, width: u32, height: u32) -> Option<(u32, u32, u32, u32)> {
        let bbox = self
            .transform
            .transform_rect_bbox(Rect::new(0.0, 0.0, self.size.0, self.size.1));
        let x0 = bbox.x0.floor().max(0.0);
        let y0 = bbox.y0.floor().max(0.0);
        let x1 = bbox.x1.ceil().min(f64::from(width));
        let y1 = bbox.y1.ceil().min(f64::from(height));
        if !(x0 < x1 && y0 < y1) {
            return None;
        }
        Some((x0 as u32, y0 as u32, x1 as u32, y1 as u32))
    }
}

/// Zeroed RGBA buffer for `size`, refused when empty, over `limit` pixels or unallocatable.
pub(crate) fn allocate_surface(size: CanvasSize, limit: u64) -> Result<RgbaImage, RenderSurfaceError> {
    if size.is_empty() {
        return Err(RenderSurfaceError::EmptyCanvas);
    }
    let pixels = size
        .pixel_count()
        .filter(|count| *count <= limit)
        .ok_or(RenderSurfaceError::TooLarge {
            width: size.width,
            height: size.height,
            limit,
        })?;

    let allocation_error = RenderSurfaceError::Allocation {
        width: size.width,
        height: size.height,
    };
    let len = usize::try_from(pixels)
        .ok()
        .and_then(|pixels| pixels.checked_mul(4))
        .ok_or_else(|| allocation_error.clone())?;
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|_| allocation_error.clone())?;
    buffer.resize(len, 0);
    RgbaImage::from_raw(size.width, size.height, buffer).ok_or(allocation_error)
}

/// Converts a 0..=100 layer opacity into an 8-bit coverage factor.
pub(crate) fn opacity_to_alpha(percent: u8) -> u8 {
    let percent = u32::from(percent.min(100));
    ((percent * 255 + 50) / 100) as u8
}

/// Straight-alpha source-over.
pub(crate) fn blend_over(dst: [u8; 4], src: [u8; 4], opacity: u8) -> [u8; 4] {
    let sa = mul_div255(src[3], opacity);
    if sa == 0 {
        return dst;
    }
    if sa == 255 {
        return [src[0], src[1], src[2], 255];
    }

    let da = u32::from(mul_div255(dst[3], 255 - sa));
    let sa = u32::from(sa);
    let out_a = sa + da;

    let mut out = [0_u8; 4];
    for channel in 0..3 {
        let value = u32::from(src[channel]) * sa + u32::from(dst[channel]) * da;
        out[channel] = ((value + out_a / 2) / out_a).min(255) as u8;
    }
    out[3] = out_a.min(255) as u8;
    out
}

/// Draws `src` into `dst` under `placement`, sampling nearest-neighbour at destination pixel centers.
pub(crate) fn draw_transformed(dst: &mut RgbaImage, src: &RgbaImage, placement: &Placement, opacity: u8) {
    let (w, h) = placement.size;
    if opacity == 0 || src.width() == 0 || src.height() == 0 {
        return;
    }
    if !(w.is_finite() && h.is_finite() && w > 0.0 && h > 0.0) {
        return;
    }

    let Some((x0, y0, x1, y1)) = placement.pixel_bounds(dst.width(), dst.height()) else {
        return;
    };
    let to_local = placement.transform.inverse();

    let scale_x = f64::from(src.width()) / w;
    let scale_y = f64::from(src.height()) / h;
    let max_sx = src.width() - 1;
    let max_sy = src.height() - 1;

    for py in y0..y1 {
        for px in x0..x1 {
            let local = to_local * Point::new(f64::from(px) + 0.5, f64::from(py) + 0.5);
            if local.x < 0.0 || local.y < 0.0 || local.x >= w || local.y >= h {
                continue;
            }
            let sx = ((local.x * scale_x) as u32).min(max_sx);
            let sy = ((local.y * scale_y) as u32).min(max_sy);
            let source = src.get_pixel(sx, sy).0;
            let target = dst.get_pixel_mut(px, py);
            *target = Rgba(blend_over(target.0, source, opacity));
        }
    }
}

fn mul_div255(x: u8, y: u8) -> u8 {
    ((u32::from(x) * u32::from(y) + 127) / 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid(width: u32, height: u32, rgba: [u8; 4]) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba(rgba))
    }

    fn unrotated(x: f64, y: f64, w: f64, h: f64) -> Placement {
        Placement::at((x, y), (w, h))
    }

    #[test]
    fn opacity_percent_maps_to_full_byte_range() {
        assert_eq!(opacity_to_alpha(0), 0);
        assert_eq!(opacity_to_alpha(50), 128);
        assert_eq!(opacity_to_alpha(100), 255);
        assert_eq!(opacity_to_alpha(250), 255);
    }

    #[test]
    fn blend_over_opaque_source_replaces_destination() {
        assert_eq!(
            blend_over([1, 2, 3, 255], [9, 8, 7, 255], 255),
            [9, 8, 7, 255]
        );
    }

    #[test]
    fn blend_over_transparent_source_or_zero_opacity_is_noop() {
        assert_eq!(blend_over([1, 2, 3, 4], [9, 8, 7, 0], 255), [1, 2, 3, 4]);
        assert_eq!(blend_over([1, 2, 3, 4], [9, 8, 7, 255], 0), [1, 2, 3, 4]);
    }

    #[test]
    fn blend_over_half_opacity_mixes_with_opaque_background() {
        let out = blend_over([255, 255, 255, 255], [0, 0, 0, 255], 128);
        assert_eq!(out[3], 255);
        assert!((126..=128).contains(&out[0]), "got {out:?}");
    }

    #[test]
    fn blend_over_onto_transparent_keeps_source_color() {
        let out = blend_over([0, 0, 0, 0], [200, 100, 50, 255], 128);
        assert_eq!(&out[..3], &[200, 100, 50]);
        assert_eq!(out[3], 128);
    }

    #[test]
    fn draw_transformed_scales_with_nearest_sampling() {
        let mut src = RgbaImage::new(2, 1);
        src.put_pixel(0, 0, Rgba([255, 0, 0, 255]));
        src.put_pixel(1, 0, Rgba([0, 0, 255, 255]));
        let mut dst = RgbaImage::new(4, 2);

        draw_transformed(&mut dst, &src, &unrotated(0.0, 0.0, 4.0, 2.0), 255);

        for y in 0..2 {
            assert_eq!(dst.get_pixel(0, y).0, [255, 0, 0, 255]);
            assert_eq!(dst.get_pixel(1, y).0, [255, 0, 0, 255]);
            assert_eq!(dst.get_pixel(2, y).0, [0, 0, 255, 255]);
            assert_eq!(dst.get_pixel(3, y).0, [0, 0, 255, 255]);
        }
    }

    #[test]
    fn draw_transformed_clips_offscreen_placement() {
        let src = solid(4, 4, [10, 20, 30, 255]);
        let mut dst = RgbaImage::new(4, 4);
        draw_transformed(&mut dst, &src, &unrotated(2.0, -2.0, 4.0, 4.0), 255);

        assert_eq!(dst.get_pixel(3, 0).0, [10, 20, 30, 255]);
        assert_eq!(dst.get_pixel(2, 1).0, [10, 20, 30, 255]);
        assert_eq!(dst.get_pixel(1, 0).0, [0, 0, 0, 0]);
        assert_eq!(dst.get_pixel(3, 2).0, [0, 0, 0, 0]);

        let mut untouched = RgbaImage::new(4, 4);
        draw_transformed(&mut untouched, &src, &unrotated(10.0, 10.0, 4.0, 4.0), 255);
        assert!(untouched.pixels().all(|pixel| pixel.0 == [0, 0, 0, 0]));
    }

    #[test]
    fn draw_transformed_rotates_around_pivot() {
        // 4x2 bar rotated 90 degrees about its center (2, 1) stands upright at x 1..3, y -1..3.
        let src = solid(4, 2, [0, 255, 0, 255]);
        let mut dst = RgbaImage::new(4, 4);
        let placement = Placement::rotated((0.0, 0.0), (4.0, 2.0), (2.0, 1.0), 90.0);
        draw_transformed(&mut dst, &src, &placement, 255);

        assert_eq!(dst.get_pixel(1, 2).0, [0, 255, 0, 255]);
        assert_eq!(dst.get_pixel(2, 0).0, [0, 255, 0, 255]);
        assert_eq!(dst.get_pixel(0, 1).0, [0, 0, 0, 0]);
        assert_eq!(dst.get_pixel(3, 1).0, [0, 0, 0, 0]);
    }

    #[test]
    fn half_turn_about_a_corner_flips_the_tile_past_it() {
        let src = solid(6, 2, [9, 9, 9, 255]);
        let mut dst = RgbaImage::new(16, 12);
        // 6x2 tile at (3, 5) turned about its bottom-right corner lands at x 9..15, y 7..9.
        let placement = Placement::rotated((3.0, 5.0), (6.0, 2.0), (9.0, 7.0), 180.0);
        draw_transformed(&mut dst, &src, &placement, 255);

        let covered = dst.pixels().filter(|pixel| pixel.0[3] > 0).count();
        assert_eq!(covered, 12);
        assert_eq!(dst.get_pixel(12, 8).0, [9, 9, 9, 255]);
        assert_eq!(dst.get_pixel(5, 6).0, [0, 0, 0, 0]);
    }

    #[test]
    fn allocate_surface_enforces_the_pixel_limit() {
        let surface = allocate_surface(CanvasSize::new(3, 2), 6).expect("surface");
        assert_eq!(surface.dimensions(), (3, 2));
        assert!(surface.pixels().all(|pixel| pixel.0 == [0, 0, 0, 0]));

        assert_eq!(
            allocate_surface(CanvasSize::new(0, 5), 100),
            Err(RenderSurfaceError::EmptyCanvas)
        );
        assert_eq!(
            allocate_surface(CanvasSize::new(4, 2), 6),
            Err(RenderSurfaceError::TooLarge {
                width: 4,
                height: 2,
                limit: 6
            })
        );
    }
}
