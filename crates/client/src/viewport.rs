//! Pan/zoom camera over the infinite canvas.
//!
//! Comments store permanent canvas coordinates; the viewport maps them to
//! screen pixels with `screen = canvas * scale + pan`.

use std::ops::{Add, Mul, Sub};

/// Relative zoom applied per wheel notch.
pub const WHEEL_ZOOM_STEP: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const ORIGIN: Point = Point { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl Add for Point {
    type Output = Point;

    fn add(self, rhs: Point) -> Point {
        Point::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Point {
    type Output = Point;

    fn sub(self, rhs: Point) -> Point {
        Point::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Point {
    type Output = Point;

    fn mul(self, rhs: f64) -> Point {
        Point::new(self.x * rhs, self.y * rhs)
    }
}

/// Viewport size in screen pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScaleBounds {
    min: f64,
    max: f64,
}

impl ScaleBounds {
    pub const DEFAULT_MIN: f64 = 0.3;
    pub const DEFAULT_MAX: f64 = 2.5;

    /// `None` unless `0 < min <= max` and both are finite.
    pub fn new(min: f64, max: f64) -> Option<Self> {
        (min.is_finite() && max.is_finite() && min > 0.0 && min <= max).then_some(Self { min, max })
    }

    pub fn min(&self) -> f64 {
        self.min
    }

    pub fn max(&self) -> f64 {
        self.max
    }

    /// NaN is treated as the smallest allowed scale.
    pub fn clamp(&self, scale: f64) -> f64 {
        if scale.is_nan() {
            return self.min;
        }
        scale.clamp(self.min, self.max)
    }
}

impl Default for ScaleBounds {
    fn default() -> Self {
        Self {
            min: Self::DEFAULT_MIN,
            max: Self::DEFAULT_MAX,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pan: Point,
    scale: f64,
    bounds: ScaleBounds,
}

impl Default for Viewport {
    fn default() -> Self {
        Self::new(ScaleBounds::default())
    }
}

impl Viewport {
    pub fn new(bounds: ScaleBounds) -> Self {
        Self {
            pan: Point::ORIGIN,
            scale: bounds.clamp(1.0),
            bounds,
        }
    }

    pub fn pan(&self) -> Point {
        self.pan
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    pub fn bounds(&self) -> ScaleBounds {
        self.bounds
    }

    pub fn to_screen(&self, canvas: Point) -> Point {
        canvas * self.scale + self.pan
    }

    pub fn to_canvas(&self, screen: Point) -> Point {
        let offset = screen - self.pan;
        Point::new(offset.x / self.scale, offset.y / self.scale)
    }

    pub fn set_scale(&mut self, scale: f64) {
        self.scale = self.bounds.clamp(scale);
    }

    pub fn set_pan(&mut self, pan: Point) {
        self.pan = pan;
    }

    /// Panning is unbounded.
    pub fn pan_by(&mut self, dx: f64, dy: f64) {
        self.pan = self.pan + Point::new(dx, dy);
    }

    /// Zooms to `scale` (clamped) keeping the canvas point under `cursor` fixed.
    /// Returns the scale actually applied.
    pub fn zoom_at(&mut self, cursor: Point, scale: f64) -> f64 {
        let anchor = self.to_canvas(cursor);
        self.scale = self.bounds.clamp(scale);
        self.pan = cursor - anchor * self.scale;
        self.scale
    }

    pub fn zoom_by(&mut self, cursor: Point, factor: f64) -> f64 {
        self.zoom_at(cursor, self.scale * factor)
    }

    /// Negative `delta_y` (wheel up) zooms in, positive zooms out.
    pub fn on_wheel(&mut self, cursor: Point, delta_y: f64) -> f64 {
        let factor = if delta_y < 0.0 {
            1.0 + WHEEL_ZOOM_STEP
        } else if delta_y > 0.0 {
            1.0 / (1.0 + WHEEL_ZOOM_STEP)
        } else {
            return self.scale;
        };
        self.zoom_by(cursor, factor)
    }

    /// `ratio` is the change in finger distance since the previous pinch event.
    pub fn on_pinch(&mut self, cursor: Point, ratio: f64) -> f64 {
        if !ratio.is_finite() || ratio <= 0.0 {
            return self.scale;
        }
        self.zoom_by(cursor, ratio)
    }

    /// Puts `canvas` at the center of a viewport of `size` at scale 1.
    pub fn center_on(&mut self, canvas: Point, size: Size) {
        self.scale = self.bounds.clamp(1.0);
        self.pan = size.center() - canvas * self.scale;
    }

    pub fn reset(&mut self) {
        self.pan = Point::ORIGIN;
        self.scale = self.bounds.clamp(1.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn assert_close(a: Point, b: Point) {
        assert!(
            (a.x - b.x).abs() < EPS * (1.0 + b.x.abs()) && (a.y - b.y).abs() < EPS * (1.0 + b.y.abs()),
            "{a:?} != {b:?}"
        );
    }

    fn viewport(pan: Point, scale: f64) -> Viewport {
        let mut vp = Viewport::default();
        vp.set_pan(pan);
        vp.set_scale(scale);
        vp
    }

    #[test]
    fn maps_canvas_to_screen() {
        let vp = viewport(Point::new(10.0, -20.0), 2.0);
        assert_eq!(vp.to_screen(Point::new(5.0, 5.0)), Point::new(20.0, -10.0));
        assert_eq!(vp.to_canvas(Point::new(20.0, -10.0)), Point::new(5.0, 5.0));
    }

    #[test]
    fn screen_canvas_round_trip() {
        let pans = [Point::ORIGIN, Point::new(123.4, -56.7), Point::new(-1e4, 3e3)];
        let scales = [0.3, 0.77, 1.0, 1.9, 2.5];
        let points = [
            Point::ORIGIN,
            Point::new(100.0, 200.0),
            Point::new(-333.3, 0.125),
            Point::new(99_999.0, -12_345.6),
        ];

        for pan in pans {
            for scale in scales {
                let vp = viewport(pan, scale);
                for p in points {
                    assert_close(vp.to_canvas(vp.to_screen(p)), p);
                }
            }
        }
    }

    #[test]
    fn scale_is_always_clamped() {
        let mut vp = Viewport::default();
        for (input, expected) in [
            (0.0, 0.3),
            (-4.0, 0.3),
            (0.3, 0.3),
            (1.2, 1.2),
            (2.5, 2.5),
            (7.0, 2.5),
            (f64::INFINITY, 2.5),
            (f64::NEG_INFINITY, 0.3),
            (f64::NAN, 0.3),
        ] {
            vp.set_scale(input);
            assert_eq!(vp.scale(), expected, "input {input}");
        }
    }

    #[test]
    fn zoom_keeps_point_under_cursor() {
        let cursors = [Point::ORIGIN, Point::new(400.0, 300.0), Point::new(-50.0, 1200.0)];
        let targets = [0.1, 0.3, 0.8, 1.0, 1.7, 2.5, 9.0];

        for cursor in cursors {
            for target in targets {
                let mut vp = viewport(Point::new(37.0, -12.0), 1.3);
                let before = vp.to_canvas(cursor);
                let applied = vp.zoom_at(cursor, target);

                assert_eq!(applied, vp.bounds().clamp(target));
                assert_close(vp.to_screen(before), cursor);
            }
        }
    }

    #[test]
    fn wheel_zooms_toward_cursor_within_bounds() {
        let mut vp = Viewport::default();
        let cursor = Point::new(250.0, 125.0);
        let anchor = vp.to_canvas(cursor);

        let zoomed_in = vp.on_wheel(cursor, -3.0);
        assert!(zoomed_in > 1.0);
        assert_close(vp.to_screen(anchor), cursor);

        vp.on_wheel(cursor, 3.0);
        vp.on_wheel(cursor, 3.0);
        assert!(vp.scale() < 1.0);

        for _ in 0..1000 {
            vp.on_wheel(cursor, 1.0);
        }
        assert_eq!(vp.scale(), ScaleBounds::DEFAULT_MIN);
        assert_close(vp.to_screen(anchor), cursor);

        let unchanged = vp.on_wheel(cursor, 0.0);
        assert_eq!(unchanged, ScaleBounds::DEFAULT_MIN);
    }

    #[test]
    fn pinch_ignores_degenerate_ratios() {
        let mut vp = Viewport::default();
        vp.on_pinch(Point::ORIGIN, 0.0);
        vp.on_pinch(Point::ORIGIN, f64::NAN);
        assert_eq!(vp.scale(), 1.0);

        vp.on_pinch(Point::new(10.0, 10.0), 2.0);
        assert_eq!(vp.scale(), 2.0);
    }

    #[test]
    fn panning_is_unbounded() {
        let mut vp = Viewport::default();
        vp.pan_by(1e9, -1e9);
        vp.pan_by(5.0, 5.0);
        assert_eq!(vp.pan(), Point::new(1e9 + 5.0, -1e9 + 5.0));
    }

    #[test]
    fn center_on_maps_point_to_viewport_center() {
        let mut vp = viewport(Point::new(3.0, 4.0), 2.0);
        vp.center_on(Point::new(500.0, 400.0), Size::new(800.0, 600.0));

        assert_eq!(vp.scale(), 1.0);
        assert_eq!(vp.to_screen(Point::new(500.0, 400.0)), Point::new(400.0, 300.0));
    }

    #[test]
    fn bounds_reject_invalid_ranges() {
        assert!(ScaleBounds::new(0.0, 1.0).is_none());
        assert!(ScaleBounds::new(2.0, 1.0).is_none());
        assert!(ScaleBounds::new(0.5, f64::INFINITY).is_none());
        assert!(ScaleBounds::new(0.5, 0.5).is_some());
    }
}
