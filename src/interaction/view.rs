use crate::geometry::Point;

pub const ZOOM_MIN: f32 = 0.5;
pub const ZOOM_MAX: f32 = 5.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanDirection {
    Left,
    Right,
    Up,
    Down,
}

/// Screen-space zoom and pan. Never part of history.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    zoom: f32,
    pan: Point,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self::new()
    }
}

fn clamp_zoom(zoom: f32) -> f32 {
    if zoom.is_finite() {
        zoom.clamp(ZOOM_MIN, ZOOM_MAX)
    } else {
        1.0
    }
}

impl ViewTransform {
    pub const fn new() -> Self {
        Self {
            zoom: 1.0,
            pan: Point::new(0.0, 0.0),
        }
    }

    pub const fn zoom(&self) -> f32 {
        self.zoom
    }

    pub const fn pan(&self) -> Point {
        self.pan
    }

    pub fn set_zoom(&mut self, zoom: f32) {
        self.zoom = clamp_zoom(zoom);
    }

    pub fn zoom_in(&mut self, step: f32) {
        self.set_zoom(self.zoom + step.abs());
    }

    pub fn zoom_out(&mut self, step: f32) {
        self.set_zoom(self.zoom - step.abs());
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Adds a screen-space delta to the pan offset.
    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        if !(dx.is_finite() && dy.is_finite()) {
            return;
        }
        self.pan.x += dx;
        self.pan.y += dy;
    }

    /// Arrow-key pan; `step / zoom` keeps the on-screen distance constant.
    pub fn pan_step(&mut self, direction: PanDirection, step: f32) {
        let amount = step / self.zoom;
        let (dx, dy) = match direction {
            PanDirection::Left => (-amount, 0.0),
            PanDirection::Right => (amount, 0.0),
            PanDirection::Up => (0.0, -amount),
            PanDirection::Down => (0.0, amount),
        };
        self.pan_by(dx, dy);
    }
}
