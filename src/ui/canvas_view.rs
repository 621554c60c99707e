use std::collections::VecDeque;

use egui::{Event, Key, MouseWheelUnit, PointerButton, Pos2, Rect, Vec2, pos2};

use crate::input::translator::{InputEvent, ViewerKey};

/// egui's own conversion for pixel-precise wheels.
const POINTS_PER_SCROLL_LINE: f32 = 50.0;

/// A move this close to the last warp target is the warp's own echo.
const WARP_ECHO_TOLERANCE: f32 = 1.0;

/// Windowing-side pointer state: which button is down and where the cursor
/// last was, in canvas-local points.
#[derive(Debug, Default)]
pub struct CanvasInput {
    drag_held: bool,
    last_pointer: Option<Pos2>,
}

impl CanvasInput {
    pub fn new() -> Self {
        Self::default()
    }

    /// Translate this frame's raw egui events into viewer input events.
    pub fn translate(&mut self, events: &[Event], canvas: Rect, out: &mut VecDeque<InputEvent>) {
        for event in events {
            match event {
                Event::PointerMoved(pos) => {
                    let local = *pos - canvas.min.to_vec2();
                    self.last_pointer = Some(local);
                    out.push_back(InputEvent::PointerMoved {
                        x: local.x,
                        y: local.y,
                        drag_held: self.drag_held,
                    });
                }
                Event::PointerButton {
                    pos,
                    button: PointerButton::Primary,
                    pressed,
                    ..
                } => {
                    if *pressed {
                        // Drags only start on the canvas, not on the status bar.
                        if canvas.contains(*pos) {
                            self.drag_held = true;
                        }
                    } else if self.drag_held {
                        self.drag_held = false;
                        out.push_back(InputEvent::ButtonReleased);
                    }
                }
                Event::MouseWheel { unit, delta, .. } => {
                    let Some(cursor) = self.last_pointer else {
                        continue;
                    };
                    if !canvas.contains(cursor + canvas.min.to_vec2()) {
                        continue;
                    }
                    let y_offset = match unit {
                        MouseWheelUnit::Point => delta.y / POINTS_PER_SCROLL_LINE,
                        MouseWheelUnit::Line | MouseWheelUnit::Page => delta.y,
                    };
                    // horizontal-only wheels
                    if y_offset == 0.0 {
                        continue;
                    }
                    out.push_back(InputEvent::Scroll {
                        y_offset,
                        cursor_x: cursor.x,
                        cursor_y: cursor.y,
                    });
                }
                Event::Key {
                    key,
                    pressed: true,
                    repeat: false,
                    ..
                } => {
                    let viewer_key = match key {
                        Key::Escape => ViewerKey::Escape,
                        Key::R => ViewerKey::Reset,
                        _ => continue,
                    };
                    out.push_back(InputEvent::KeyPressed(viewer_key));
                }
                Event::PointerGone => {
                    self.last_pointer = None;
                }
                _ => {}
            }
        }
    }
}

/// Bridges a requested cursor warp and the moment the OS carries it out.
///
/// Moves already captured before the warp lands are still in pre-warp
/// coordinates, so they get `shift` added. The first move that sits closer to
/// the drag position without the shift proves the warp happened. If that move
/// is the warp's own echo it is dropped, otherwise it passes through as is.
/// Where the compositor ignores warps the shift simply stays in place until
/// the button is released.
#[derive(Debug, Default)]
pub struct WarpShift {
    shift: Vec2,
    target: Pos2,
    /// Last drag position handed on while a warp is outstanding.
    reference: Option<Pos2>,
}

impl WarpShift {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn is_pending(&self) -> bool {
        self.reference.is_some()
    }

    /// Map a raw event into the coordinates the translator expects.
    /// `None` means the event must be dropped.
    pub fn reconcile(&mut self, event: InputEvent) -> Option<InputEvent> {
        let Some(reference) = self.reference else {
            return Some(event);
        };
        match event {
            InputEvent::PointerMoved {
                x,
                y,
                drag_held: true,
            } => {
                let raw = pos2(x, y);
                let shifted = raw + self.shift;
                if raw.distance_sq(reference) <= shifted.distance_sq(reference) {
                    let echo = raw.distance(self.target) < WARP_ECHO_TOLERANCE;
                    self.clear();
                    return (!echo).then_some(event);
                }
                self.reference = Some(shifted);
                Some(InputEvent::PointerMoved {
                    x: shifted.x,
                    y: shifted.y,
                    drag_held: true,
                })
            }
            InputEvent::PointerMoved { .. } | InputEvent::ButtonReleased => {
                self.clear();
                Some(event)
            }
            other => Some(other),
        }
    }

    /// Record that the raw move at `raw` made the translator ask for a warp
    /// to `target`.
    pub fn warped(&mut self, raw: Pos2, target: Pos2) {
        self.shift = target - raw;
        self.target = target;
        self.reference = Some(target);
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}
