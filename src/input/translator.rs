//! Turns pointer, wheel and key events into viewport mutations.
//!
//! Positions are canvas-local screen units, the same space
//! [`ViewportState::screen_to_complex`] works in.

use crate::rendering::viewport::{ComplexPoint, ViewportState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKey {
    Escape,
    Reset,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMoved { x: f32, y: f32, drag_held: bool },
    ButtonReleased,
    /// Only `y_offset == 1.0` zooms in; every other value zooms out.
    Scroll { y_offset: f32, cursor_x: f32, cursor_y: f32 },
    KeyPressed(ViewerKey),
}

/// Side effect the windowing layer has to carry out after an event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputResponse {
    Handled,
    /// Move the system cursor to this canvas-local position.
    WarpCursor { x: f32, y: f32 },
    Quit,
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DragState {
    pub last_cursor_x: f32,
    pub last_cursor_y: f32,
    pub drag_active: bool,
}

#[derive(Debug, Default)]
pub struct InputTranslator {
    drag: DragState,
}

impl InputTranslator {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub fn drag_state(&self) -> DragState {
        self.drag
    }

    pub fn handle(&mut self, viewport: &mut ViewportState, event: InputEvent) -> InputResponse {
        match event {
            InputEvent::PointerMoved { x, y, drag_held } => {
                self.pointer_moved(viewport, x, y, drag_held)
            }
            InputEvent::ButtonReleased => {
                self.drag.drag_active = false;
                InputResponse::Handled
            }
            InputEvent::Scroll {
                y_offset,
                cursor_x,
                cursor_y,
            } => {
                zoom_at_cursor(viewport, y_offset, cursor_x, cursor_y);
                InputResponse::Handled
            }
            InputEvent::KeyPressed(ViewerKey::Escape) => InputResponse::Quit,
            InputEvent::KeyPressed(ViewerKey::Reset) => {
                viewport.reset();
                InputResponse::Handled
            }
        }
    }

    fn pointer_moved(
        &mut self,
        viewport: &mut ViewportState,
        x: f32,
        y: f32,
        drag_held: bool,
    ) -> InputResponse {
        if !drag_held {
            self.drag.drag_active = false;
            self.remember_cursor(x, y);
            return InputResponse::Handled;
        }

        // First move of a new drag only anchors, so the view does not jump.
        if !self.drag.drag_active {
            self.drag.drag_active = true;
            self.remember_cursor(x, y);
            return InputResponse::Handled;
        }

        let (width, height) = viewport.screen_size();
        let (mut x, mut y) = (x, y);
        let mut wrapped = false;

        // Wrap at the canvas edges: shift both the position and the anchor
        // by one screen so the delta stays continuous.
        if x <= 0.0 {
            x += width;
            self.drag.last_cursor_x += width;
            wrapped = true;
        } else if x >= width - 1.0 {
            x -= width;
            self.drag.last_cursor_x -= width;
            wrapped = true;
        }
        if y <= 0.0 {
            y += height;
            self.drag.last_cursor_y += height;
            wrapped = true;
        } else if y >= height - 1.0 {
            y -= height;
            self.drag.last_cursor_y -= height;
            wrapped = true;
        }

        // Half-screen form on purpose; do not reduce to `x - last_cursor_x`.
        let dx = (x - self.drag.last_cursor_x + width / 2.0) / width - 0.5;
        let dy = (y - self.drag.last_cursor_y + height / 2.0) / height - 0.5;
        viewport.pan(dx, dy);

        self.remember_cursor(x, y);

        if wrapped {
            InputResponse::WarpCursor { x, y }
        } else {
            InputResponse::Handled
        }
    }

    fn remember_cursor(&mut self, x: f32, y: f32) {
        self.drag.last_cursor_x = x;
        self.drag.last_cursor_y = y;
    }
}

/// One zoom step that keeps the complex point under the cursor in place.
///
/// Re-anchors the view on the cursor point, changes zoom, then pushes the
/// offset back by the post-zoom displacement. Both transforms are evaluated
/// explicitly rather than folded into a closed form.
fn zoom_at_cursor(viewport: &mut ViewportState, y_offset: f32, cursor_x: f32, cursor_y: f32) {
    #[allow(clippy::float_cmp)]
    let zoom_in = y_offset == 1.0;

    let next_zoom = match viewport.stepped_zoom(zoom_in) {
        Ok(zoom) => zoom,
        Err(error) => {
            log::warn!("ignoring scroll at ({cursor_x}, {cursor_y}): {error}");
            return;
        }
    };

    let before = viewport.screen_to_complex(cursor_x, cursor_y);
    viewport.set_offset(before);

    if let Err(error) = viewport.set_zoom(next_zoom) {
        log::warn!("ignoring scroll at ({cursor_x}, {cursor_y}): {error}");
        return;
    }

    let after = viewport.screen_to_complex(cursor_x, cursor_y);
    let anchored = viewport.offset();
    viewport.set_offset(ComplexPoint::new(
        anchored.re - (after.re - anchored.re),
        anchored.im - (after.im - anchored.im),
    ));
}
