/// Zoom and pan state plus the time/depth to screen transform.
///
/// `x = time * zoom + pan_x`: `pan_x` is never positive and moves left as the
/// view scrolls right. Depth 0 sits on the bottom row; a positive `pan_y`
/// shifts rows down to bring deeper levels into view.
///
/// Every mutator returns whether the visible state changed, so callers only
/// schedule a redraw when something moved.
#[derive(Debug, Clone, PartialEq)]
pub struct Viewport {
    zoom: f64,
    default_zoom: f64,
    pan_x: f64,
    pan_y: f64,
    width: f64,
    height: f64,
    total_duration: u64,
    depth_count: usize,
    row_height: f64,
    min_visible_ns: u64,
}

/// Largest fraction a single wheel event may zoom or pan by
const MAX_WHEEL_FRACTION: f64 = 0.5;

impl Viewport {
    pub fn new(total_duration: u64, depth_count: usize, row_height: f64, min_visible_ns: u64) -> Self {
        Self {
            zoom: 0.0,
            default_zoom: 0.0,
            pan_x: 0.0,
            pan_y: 0.0,
            width: 0.0,
            height: 0.0,
            total_duration,
            depth_count,
            row_height: row_height.max(f64::MIN_POSITIVE),
            min_visible_ns: min_visible_ns.max(1),
        }
    }

    pub fn zoom(&self) -> f64 {
        self.zoom
    }

    pub fn default_zoom(&self) -> f64 {
        self.default_zoom
    }

    pub fn max_zoom(&self) -> f64 {
        (self.width / self.min_visible_ns as f64).max(self.default_zoom)
    }

    pub fn pan_x(&self) -> f64 {
        self.pan_x
    }

    pub fn pan_y(&self) -> f64 {
        self.pan_y
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    fn content_duration(&self) -> f64 {
        self.total_duration.max(1) as f64
    }

    fn content_height(&self) -> f64 {
        self.depth_count as f64 * self.row_height
    }

    /// Allowed `pan_x` range
    pub fn pan_x_bounds(&self) -> (f64, f64) {
        ((self.width - self.zoom * self.content_duration()).min(0.0), 0.0)
    }

    /// Allowed `pan_y` range
    pub fn pan_y_bounds(&self) -> (f64, f64) {
        (0.0, (self.content_height() - self.height).max(0.0))
    }

    pub fn resize(&mut self, width: f64, height: f64) -> bool {
        let width = width.max(0.0);
        let height = height.max(0.0);
        if width == self.width && height == self.height {
            return false;
        }

        let new_default = width / self.content_duration();
        let left_time = self.x_to_time_f(0.0);

        if self.default_zoom > 0.0 {
            // Keep the same magnification relative to "whole trace fits"
            self.zoom *= new_default / self.default_zoom;
        } else {
            self.zoom = new_default;
        }
        self.default_zoom = new_default;
        self.width = width;
        self.height = height;

        self.zoom = self.clamp_zoom(self.zoom);
        self.pan_x = -left_time * self.zoom;
        self.clamp_pan();
        log::debug!(
            "Viewport resized to {}x{} (zoom {:.6}, default {:.6})",
            width,
            height,
            self.zoom,
            self.default_zoom
        );
        true
    }

    pub fn reset(&mut self) -> bool {
        let before = (self.zoom, self.pan_x, self.pan_y);
        self.zoom = self.default_zoom;
        self.pan_x = 0.0;
        self.pan_y = 0.0;
        before != (self.zoom, self.pan_x, self.pan_y)
    }

    fn clamp_zoom(&self, zoom: f64) -> f64 {
        if zoom.is_nan() {
            return self.default_zoom;
        }
        zoom.clamp(self.default_zoom, self.max_zoom())
    }

    fn clamp_pan(&mut self) {
        let (min_x, max_x) = self.pan_x_bounds();
        self.pan_x = self.pan_x.clamp(min_x, max_x);
        let (min_y, max_y) = self.pan_y_bounds();
        self.pan_y = self.pan_y.clamp(min_y, max_y);
    }

    /// Set zoom, keeping the time under `pointer_x` fixed on screen
    pub fn zoom_at(&mut self, pointer_x: f64, zoom: f64) -> bool {
        let zoom = self.clamp_zoom(zoom);
        if zoom == self.zoom || self.zoom <= 0.0 {
            return false;
        }
        let time = self.x_to_time_f(pointer_x);
        self.zoom = zoom;
        self.pan_x = pointer_x - time * zoom;
        self.clamp_pan();
        true
    }

    pub fn pan_by(&mut self, dx: f64, dy: f64) -> bool {
        let before = (self.pan_x, self.pan_y);
        self.pan_x += dx;
        self.pan_y += dy;
        self.clamp_pan();
        before != (self.pan_x, self.pan_y)
    }

    /// Apply a wheel event: horizontal-dominant pans, vertical-dominant zooms.
    /// Scrolling up (negative `delta_y`) zooms in.
    pub fn wheel(&mut self, delta_x: f64, delta_y: f64, pointer_x: f64, step: f64) -> bool {
        if delta_x.abs() > delta_y.abs() {
            let fraction = wheel_speed(delta_x, step);
            self.pan_by(-delta_x.signum() * fraction * self.width, 0.0)
        } else if delta_y != 0.0 {
            let factor = 1.0 + wheel_speed(delta_y, step);
            let zoom = if delta_y < 0.0 {
                self.zoom * factor
            } else {
                self.zoom / factor
            };
            self.zoom_at(pointer_x, zoom)
        } else {
            false
        }
    }

    /// Recenter on a time span that is currently off screen, and scroll
    /// vertically until `depth` is visible
    pub fn reveal(&mut self, start: u64, duration: u64, depth: usize) -> bool {
        let before = (self.pan_x, self.pan_y);

        let x = self.time_to_x(start);
        let w = duration as f64 * self.zoom;
        if x > self.width || x + w < 0.0 {
            let center = start as f64 * self.zoom + w / 2.0;
            self.pan_x = self.width / 2.0 - center;
        }

        let top = self.depth_to_y(depth);
        if top < 0.0 {
            self.pan_y -= top;
        } else if top + self.row_height > self.height {
            self.pan_y -= top + self.row_height - self.height;
        }

        self.clamp_pan();
        before != (self.pan_x, self.pan_y)
    }

    pub fn time_to_x(&self, time: u64) -> f64 {
        time as f64 * self.zoom + self.pan_x
    }

    fn x_to_time_f(&self, x: f64) -> f64 {
        if self.zoom <= 0.0 {
            return 0.0;
        }
        (x - self.pan_x) / self.zoom
    }

    /// Trace time under screen column `x`, `None` before the trace start
    pub fn x_to_time(&self, x: f64) -> Option<u64> {
        let time = self.x_to_time_f(x);
        (time >= 0.0).then(|| time.floor() as u64)
    }

    /// Top edge of the row for `depth`
    pub fn depth_to_y(&self, depth: usize) -> f64 {
        self.height + self.pan_y - (depth as f64 + 1.0) * self.row_height
    }

    pub fn y_to_depth(&self, y: f64) -> Option<usize> {
        let rows = (self.height + self.pan_y - y) / self.row_height;
        (rows >= 0.0).then(|| rows.floor() as usize)
    }

    /// Visible time window widened by one pixel on either side
    pub fn visible_time_range(&self) -> (u64, u64) {
        let start = self.x_to_time_f(-1.0).max(0.0);
        let end = self.x_to_time_f(self.width + 1.0).max(0.0);
        (start.floor() as u64, end.ceil() as u64)
    }

    /// Visible depths (inclusive) widened by one row on either side
    pub fn visible_depth_range(&self) -> (usize, usize) {
        let low = (self.pan_y / self.row_height).floor() - 1.0;
        let high = ((self.pan_y + self.height) / self.row_height).ceil() + 1.0;
        (low.max(0.0) as usize, high.max(0.0) as usize)
    }
}

/// Fraction to move for a wheel delta: super-linear in magnitude, capped
fn wheel_speed(delta: f64, step: f64) -> f64 {
    (step * delta.abs().powf(1.5)).min(MAX_WHEEL_FRACTION)
}
