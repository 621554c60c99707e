//! Fixed-cadence frame gate.
//!
//! Each tick past the frame interval drains pending input, re-uploads the
//! shader uniforms and redraws only when the viewport has changed since the
//! last draw. Ticks that arrive too early are dropped without touching
//! anything, including the tick clock.

use crate::rendering::viewport::{FractalUniforms, ViewportState};

pub const DEFAULT_FRAME_INTERVAL: f64 = 1.0 / 60.0;

/// Receiver of the per-tick transform and the redraw signal.
pub trait FrameConsumer {
    /// Called on every accepted tick, even when nothing changed.
    fn upload_uniforms(&mut self, uniforms: &FractalUniforms);

    /// Clear the framebuffer, draw the fractal and present it.
    fn redraw(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Too soon after the previous tick.
    Throttled,
    /// Uniforms uploaded, the previous frame stays on screen.
    Refreshed,
    Drawn,
}

#[derive(Debug)]
pub struct RenderScheduler {
    previous_tick_time: f64,
    frame_interval: f64,
    frames_drawn: u64,
}

impl Default for RenderScheduler {
    fn default() -> Self {
        Self::new(DEFAULT_FRAME_INTERVAL)
    }
}

impl RenderScheduler {
    pub fn new(frame_interval: f64) -> Self {
        Self {
            previous_tick_time: 0.0,
            frame_interval,
            frames_drawn: 0,
        }
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    /// Seconds until a tick at `now` or later would be accepted.
    pub fn time_until_next_tick(&self, now: f64) -> f64 {
        (self.previous_tick_time + self.frame_interval - now).max(0.0)
    }

    pub fn tick<C, F>(
        &mut self,
        now: f64,
        viewport: &mut ViewportState,
        pump_input: F,
        consumer: &mut C,
    ) -> TickOutcome
    where
        C: FrameConsumer + ?Sized,
        F: FnOnce(&mut ViewportState),
    {
        let delta_time = now - self.previous_tick_time;
        if delta_time < self.frame_interval {
            return TickOutcome::Throttled;
        }
        self.previous_tick_time = now;

        pump_input(viewport);
        consumer.upload_uniforms(&viewport.uniforms());

        if viewport.consume_dirty() {
            consumer.redraw();
            self.frames_drawn += 1;
            TickOutcome::Drawn
        } else {
            TickOutcome::Refreshed
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingConsumer {
        uploads: Vec<FractalUniforms>,
        redraws: usize,
    }

    impl FrameConsumer for RecordingConsumer {
        fn upload_uniforms(&mut self, uniforms: &FractalUniforms) {
            self.uploads.push(*uniforms);
        }

        fn redraw(&mut self) {
            self.redraws += 1;
        }
    }

    fn no_input(_: &mut ViewportState) {}

    #[test]
    fn test_early_ticks_are_throttled() {
        let mut scheduler = RenderScheduler::default();
        let mut vp = ViewportState::default();
        let mut consumer = RecordingConsumer::default();

        assert_eq!(
            scheduler.tick(0.005, &mut vp, no_input, &mut consumer),
            TickOutcome::Throttled
        );
        assert_eq!(
            scheduler.tick(0.010, &mut vp, no_input, &mut consumer),
            TickOutcome::Throttled
        );
        assert_eq!(consumer.redraws, 0);
        assert!(consumer.uploads.is_empty());
        assert!(vp.is_dirty());

        // cumulative time since the last accepted tick (t = 0) passes 1/60
        assert_eq!(
            scheduler.tick(0.020, &mut vp, no_input, &mut consumer),
            TickOutcome::Drawn
        );
        assert_eq!(consumer.redraws, 1);
        assert_eq!(scheduler.frames_drawn(), 1);
        assert!(!vp.is_dirty());
    }

    #[test]
    fn test_clean_viewport_uploads_without_drawing() {
        let mut scheduler = RenderScheduler::default();
        let mut vp = ViewportState::default();
        vp.consume_dirty();
        let mut consumer = RecordingConsumer::default();

        scheduler.tick(0.005, &mut vp, no_input, &mut consumer);
        scheduler.tick(0.010, &mut vp, no_input, &mut consumer);
        let outcome = scheduler.tick(0.020, &mut vp, no_input, &mut consumer);

        assert_eq!(outcome, TickOutcome::Refreshed);
        assert_eq!(consumer.redraws, 0);
        assert_eq!(consumer.uploads, vec![vp.uniforms()]);
    }

    #[test]
    fn test_input_pumped_before_upload() {
        let mut scheduler = RenderScheduler::default();
        let mut vp = ViewportState::default();
        vp.consume_dirty();
        let mut consumer = RecordingConsumer::default();

        let outcome = scheduler.tick(
            1.0,
            &mut vp,
            |vp| vp.set_zoom(4.0).unwrap(),
            &mut consumer,
        );

        assert_eq!(outcome, TickOutcome::Drawn);
        assert_eq!(consumer.uploads[0].zoom, 4.0);
    }

    #[test]
    fn test_throttled_tick_skips_input() {
        let mut scheduler = RenderScheduler::default();
        let mut vp = ViewportState::default();
        let mut consumer = RecordingConsumer::default();
        let mut pumped = false;

        scheduler.tick(0.001, &mut vp, |_| pumped = true, &mut consumer);
        assert!(!pumped);
    }

    #[test]
    fn test_one_draw_per_change() {
        let mut scheduler = RenderScheduler::default();
        let mut vp = ViewportState::default();
        let mut consumer = RecordingConsumer::default();

        let mut now = 0.0;
        for _ in 0..10 {
            now += 0.02;
            scheduler.tick(now, &mut vp, no_input, &mut consumer);
        }
        assert_eq!(consumer.redraws, 1);
        assert_eq!(consumer.uploads.len(), 10);

        vp.pan(0.01, 0.0);
        now += 0.02;
        scheduler.tick(now, &mut vp, no_input, &mut consumer);
        assert_eq!(consumer.redraws, 2);
    }

    #[test]
    fn test_time_until_next_tick() {
        let mut scheduler = RenderScheduler::new(0.5);
        let mut vp = ViewportState::default();
        let mut consumer = RecordingConsumer::default();

        assert!((scheduler.time_until_next_tick(0.2) - 0.3).abs() < 1e-12);
        scheduler.tick(1.0, &mut vp, no_input, &mut consumer);
        assert!((scheduler.time_until_next_tick(1.1) - 0.4).abs() < 1e-12);
        assert_eq!(scheduler.time_until_next_tick(3.0), 0.0);
    }
}
