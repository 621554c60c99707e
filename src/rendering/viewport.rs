//! Screen ↔ complex-plane mapping for the fractal canvas.
//!
//! Screen coordinates are canvas-local with `(0, 0)` at the top-left corner;
//! the imaginary axis points up, so screen `y` is negated.

use thiserror::Error;

use crate::config::viewer::ViewDefaults;

const DEFAULT_SCREEN_WIDTH: f32 = 900.0;
const DEFAULT_SCREEN_HEIGHT: f32 = 600.0;

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ViewportError {
    #[error("zoom must stay a positive normal number, got {0}")]
    InvalidZoom(f32),
    #[error("screen size must be positive, got {width}x{height}")]
    InvalidScreenSize { width: f32, height: f32 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ComplexPoint {
    pub re: f32,
    pub im: f32,
}

impl ComplexPoint {
    pub fn new(re: f32, im: f32) -> Self {
        Self { re, im }
    }
}

/// Scalar inputs of the fractal shader, one snapshot per tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FractalUniforms {
    pub window_width: f32,
    pub window_height: f32,
    pub real_axis_offset: f32,
    pub imaginary_axis_offset: f32,
    pub zoom: f32,
}

#[derive(Debug, Clone)]
pub struct ViewportState {
    screen_width: f32,
    screen_height: f32,
    offset: ComplexPoint,
    zoom: f32,
    zoom_factor: f32,
    defaults: ViewDefaults,
    dirty: bool,
}

impl Default for ViewportState {
    fn default() -> Self {
        Self::new(
            ViewDefaults::default(),
            DEFAULT_SCREEN_WIDTH,
            DEFAULT_SCREEN_HEIGHT,
        )
    }
}

impl ViewportState {
    /// Starts dirty so the first tick draws.
    pub fn new(defaults: ViewDefaults, screen_width: f32, screen_height: f32) -> Self {
        Self {
            screen_width,
            screen_height,
            offset: ComplexPoint::new(defaults.real_offset, defaults.imaginary_offset),
            zoom: defaults.zoom,
            zoom_factor: defaults.zoom_factor,
            defaults,
            dirty: true,
        }
    }

    pub fn screen_size(&self) -> (f32, f32) {
        (self.screen_width, self.screen_height)
    }

    pub fn offset(&self) -> ComplexPoint {
        self.offset
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn zoom_factor(&self) -> f32 {
        self.zoom_factor
    }

    fn aspect_ratio(&self) -> f32 {
        self.screen_width / self.screen_height
    }

    /// Complex-plane point under the screen position `(px, py)`.
    ///
    /// This is the only place the transform law lives; pan and zoom both go
    /// through it.
    pub fn screen_to_complex(&self, px: f32, py: f32) -> ComplexPoint {
        let re = self.offset.re
            + 2.0 * self.aspect_ratio() * (px / self.screen_width - 0.5) / self.zoom;
        let im = self.offset.im - 2.0 * (py / self.screen_height - 0.5) / self.zoom;
        ComplexPoint { re, im }
    }

    /// Adopt a new framebuffer size. Offset and zoom are kept as-is, only the
    /// aspect ratio changes.
    pub fn resize(&mut self, width: f32, height: f32) -> Result<(), ViewportError> {
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(ViewportError::InvalidScreenSize { width, height });
        }
        self.screen_width = width;
        self.screen_height = height;
        self.mark_dirty();
        log::debug!("viewport resized to {width}x{height}");
        Ok(())
    }

    pub fn reset(&mut self) {
        self.offset = ComplexPoint::new(self.defaults.real_offset, self.defaults.imaginary_offset);
        self.zoom = self.defaults.zoom;
        self.zoom_factor = self.defaults.zoom_factor;
        self.mark_dirty();
        log::debug!("viewport reset");
    }

    /// Shift the view by a drag delta expressed in screen fractions.
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.offset.re -= 2.0 * self.aspect_ratio() * dx / self.zoom;
        self.offset.im += 2.0 * dy / self.zoom;
        self.mark_dirty();
    }

    pub fn set_offset(&mut self, offset: ComplexPoint) {
        self.offset = offset;
        self.mark_dirty();
    }

    /// Zoom one discrete step in or out would produce. Does not mutate.
    pub fn stepped_zoom(&self, zoom_in: bool) -> Result<f32, ViewportError> {
        let next = if zoom_in {
            self.zoom * self.zoom_factor
        } else {
            self.zoom / self.zoom_factor
        };
        validate_zoom(next)
    }

    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), ViewportError> {
        self.zoom = validate_zoom(zoom)?;
        self.mark_dirty();
        Ok(())
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Read and clear the redraw flag.
    pub fn consume_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.dirty, false)
    }

    pub fn uniforms(&self) -> FractalUniforms {
        FractalUniforms {
            window_width: self.screen_width,
            window_height: self.screen_height,
            real_axis_offset: self.offset.re,
            imaginary_axis_offset: self.offset.im,
            zoom: self.zoom,
        }
    }
}

fn validate_zoom(zoom: f32) -> Result<f32, ViewportError> {
    // Subnormals are out too: dividing by them overflows the transform.
    if zoom.is_normal() && zoom > 0.0 {
        Ok(zoom)
    } else {
        Err(ViewportError::InvalidZoom(zoom))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_screen_center_maps_to_offset() {
        let mut vp = ViewportState::default();
        vp.set_offset(ComplexPoint::new(0.25, -1.75));
        vp.set_zoom(37.5).unwrap();
        vp.resize(1280.0, 720.0).unwrap();

        let (w, h) = vp.screen_size();
        let c = vp.screen_to_complex(w / 2.0, h / 2.0);
        assert_eq!(c, ComplexPoint::new(0.25, -1.75));
    }

    #[test]
    fn test_screen_corners_span_aspect_ratio() {
        let vp = ViewportState::default();
        let top_left = vp.screen_to_complex(0.0, 0.0);
        let bottom_right = vp.screen_to_complex(900.0, 600.0);

        // 900x600 at zoom 1: real axis covers 3 units, imaginary axis 2
        assert!((top_left.re - (-0.7 - 1.5)).abs() < 1e-6);
        assert!((bottom_right.re - (-0.7 + 1.5)).abs() < 1e-6);
        assert!((top_left.im - 1.0).abs() < 1e-6);
        assert!((bottom_right.im + 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_consume_dirty_twice() {
        let mut vp = ViewportState::default();
        assert!(vp.consume_dirty());
        assert!(!vp.consume_dirty());
    }

    #[test]
    fn test_every_mutation_marks_dirty() {
        let mut vp = ViewportState::default();
        vp.consume_dirty();

        vp.resize(640.0, 480.0).unwrap();
        assert!(vp.consume_dirty());
        assert!(!vp.consume_dirty());

        vp.pan(0.1, -0.1);
        assert!(vp.consume_dirty());

        let next = vp.stepped_zoom(true).unwrap();
        vp.set_zoom(next).unwrap();
        assert!(vp.consume_dirty());

        vp.reset();
        assert!(vp.consume_dirty());

        vp.mark_dirty();
        assert!(vp.consume_dirty());
    }

    #[test]
    fn test_reset_restores_defaults() {
        let mut vp = ViewportState::default();
        vp.set_offset(ComplexPoint::new(5.0, -3.0));
        vp.set_zoom(200.0).unwrap();
        vp.consume_dirty();

        vp.reset();
        assert_eq!(vp.offset(), ComplexPoint::new(-0.7, 0.0));
        assert_eq!(vp.zoom(), 1.0);
        assert_eq!(vp.zoom_factor(), 1.5);
        assert!(vp.consume_dirty());
    }

    #[test]
    fn test_resize_keeps_offset_and_zoom() {
        let mut vp = ViewportState::default();
        vp.resize(300.0, 300.0).unwrap();
        assert_eq!(vp.offset(), ComplexPoint::new(-0.7, 0.0));
        assert_eq!(vp.zoom(), 1.0);
        assert_eq!(vp.screen_size(), (300.0, 300.0));
    }

    #[test]
    fn test_resize_rejects_empty_window() {
        let mut vp = ViewportState::default();
        vp.consume_dirty();
        assert_eq!(
            vp.resize(0.0, 0.0),
            Err(ViewportError::InvalidScreenSize { width: 0.0, height: 0.0 })
        );
        assert_eq!(vp.screen_size(), (900.0, 600.0));
        assert!(!vp.is_dirty());
    }

    #[test]
    fn test_zoom_rejects_non_positive_and_non_finite() {
        let mut vp = ViewportState::default();
        assert!(vp.set_zoom(0.0).is_err());
        assert!(vp.set_zoom(-2.0).is_err());
        assert!(vp.set_zoom(f32::INFINITY).is_err());
        assert!(vp.set_zoom(f32::NAN).is_err());
        assert_eq!(vp.zoom(), 1.0);
    }

    #[test]
    fn test_stepped_zoom_overflow_is_rejected() {
        let mut vp = ViewportState::default();
        vp.set_zoom(f32::MAX / 1.2).unwrap();
        assert!(matches!(
            vp.stepped_zoom(true),
            Err(ViewportError::InvalidZoom(z)) if z.is_infinite()
        ));
    }

    #[test]
    fn test_pan_moves_against_drag() {
        let mut vp = ViewportState::default();
        // dragging right by a tenth of the screen reveals what was on the left
        vp.pan(0.1, 0.0);
        assert!((vp.offset().re - (-0.7 - 2.0 * 1.5 * 0.1)).abs() < 1e-6);
        assert_eq!(vp.offset().im, 0.0);
    }

    #[test]
    fn test_uniforms_snapshot() {
        let vp = ViewportState::default();
        assert_eq!(
            vp.uniforms(),
            FractalUniforms {
                window_width: 900.0,
                window_height: 600.0,
                real_axis_offset: -0.7,
                imaginary_axis_offset: 0.0,
                zoom: 1.0,
            }
        );
    }
}
