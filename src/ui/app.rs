use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use eframe::egui;
use egui::{Rect, Sense, Vec2, ViewportCommand, pos2};

use crate::config::viewer::ViewerConfig;
use crate::input::translator::{InputEvent, InputResponse, InputTranslator};
use crate::rendering::gl_fractal::{GlFractalState, RendererError, make_fractal_callback};
use crate::rendering::scheduler::{FrameConsumer, RenderScheduler, TickOutcome};
use crate::rendering::viewport::ViewportState;
use crate::ui::canvas_view::{CanvasInput, WarpShift};
use crate::ui::status_bar::show_status_bar;

/// Everything between raw canvas events and the frame consumer. Knows
/// nothing about egui's context, so a whole frame can run headless.
#[derive(Debug)]
pub struct ViewerCore {
    viewport: ViewportState,
    translator: InputTranslator,
    scheduler: RenderScheduler,
    warp: WarpShift,
    /// Events collected since the last accepted tick.
    pending: VecDeque<InputEvent>,
}

impl ViewerCore {
    pub fn new(viewport: ViewportState, scheduler: RenderScheduler) -> Self {
        Self {
            viewport,
            translator: InputTranslator::new(),
            scheduler,
            warp: WarpShift::new(),
            pending: VecDeque::new(),
        }
    }

    pub fn viewport(&self) -> &ViewportState {
        &self.viewport
    }

    pub fn frames_drawn(&self) -> u64 {
        self.scheduler.frames_drawn()
    }

    pub fn pending_mut(&mut self) -> &mut VecDeque<InputEvent> {
        &mut self.pending
    }

    pub fn sync_canvas_size(&mut self, size: Vec2) {
        if (size.x, size.y) == self.viewport.screen_size() {
            return;
        }
        if let Err(error) = self.viewport.resize(size.x, size.y) {
            log::debug!("skipping resize: {error}");
        }
    }

    /// Run one scheduler tick. Returns what the window still has to do, at
    /// most one cursor warp and only the latest.
    pub fn tick<C>(&mut self, now: f64, consumer: &mut C) -> Vec<InputResponse>
    where
        C: FrameConsumer + ?Sized,
    {
        let Self {
            viewport,
            translator,
            scheduler,
            warp,
            pending,
        } = self;
        let mut responses = Vec::new();

        let outcome = scheduler.tick(
            now,
            viewport,
            |viewport| responses = drain_input(viewport, translator, warp, pending),
            consumer,
        );
        if outcome == TickOutcome::Drawn {
            log::trace!("frame {} at t={now:.3}", scheduler.frames_drawn());
        }
        responses
    }

    /// How long egui may sleep before the next frame, `None` when nothing is
    /// owed.
    pub fn repaint_delay(&self, now: f64) -> Option<Duration> {
        if self.viewport.is_dirty() || !self.pending.is_empty() {
            let wait = self.scheduler.time_until_next_tick(now);
            Some(Duration::from_secs_f64(wait))
        } else {
            None
        }
    }
}

/// Feed queued events through the translator in arrival order.
///
/// Moves after a wrap are already in pre-warp coordinates, so they go through
/// the warp shift first. Later warps supersede earlier ones in the batch.
fn drain_input(
    viewport: &mut ViewportState,
    translator: &mut InputTranslator,
    warp: &mut WarpShift,
    pending: &mut VecDeque<InputEvent>,
) -> Vec<InputResponse> {
    let mut responses = Vec::new();
    for raw in pending.drain(..) {
        let Some(event) = warp.reconcile(raw) else {
            continue;
        };
        match translator.handle(viewport, event) {
            InputResponse::Handled => {}
            InputResponse::WarpCursor { x, y } => {
                if let InputEvent::PointerMoved {
                    x: raw_x, y: raw_y, ..
                } = raw
                {
                    warp.warped(pos2(raw_x, raw_y), pos2(x, y));
                }
                responses.retain(|r| !matches!(r, InputResponse::WarpCursor { .. }));
                responses.push(InputResponse::WarpCursor { x, y });
            }
            response => responses.push(response),
        }
    }
    responses
}

pub struct FractalApp {
    core: ViewerCore,
    canvas_input: CanvasInput,
    renderer: Arc<Mutex<GlFractalState>>,
    show_status_bar: bool,
}

impl FractalApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: &ViewerConfig,
    ) -> Result<Self, RendererError> {
        let gl = cc.gl.as_ref().ok_or(RendererError::NoGlContext)?;
        let renderer = GlFractalState::new(gl, config.clear_color)?;
        let viewport = ViewportState::new(config.view, config.window.width, config.window.height);

        Ok(Self {
            core: ViewerCore::new(viewport, RenderScheduler::new(config.frame_interval())),
            canvas_input: CanvasInput::new(),
            renderer: Arc::new(Mutex::new(renderer)),
            show_status_bar: config.show_status_bar,
        })
    }

    /// Run one tick and carry out what the input asked of the window.
    fn tick(&mut self, ctx: &egui::Context, canvas: Rect) {
        let now = ctx.input(|i| i.time);
        let responses = {
            let mut renderer = self.renderer.lock().unwrap_or_else(PoisonError::into_inner);
            self.core.tick(now, &mut *renderer)
        };

        for response in responses {
            match response {
                InputResponse::WarpCursor { x, y } => {
                    let target = canvas.min + egui::vec2(x, y);
                    ctx.send_viewport_cmd(ViewportCommand::CursorPosition(target));
                }
                InputResponse::Quit => {
                    log::info!("escape pressed, closing");
                    ctx.send_viewport_cmd(ViewportCommand::Close);
                }
                InputResponse::Handled => {}
            }
        }
    }
}

impl eframe::App for FractalApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.show_status_bar {
            egui::TopBottomPanel::bottom("status_bar")
                .resizable(false)
                .min_height(24.0)
                .show(ctx, |ui| {
                    show_status_bar(ui, self.core.viewport(), self.core.frames_drawn());
                });
        }

        egui::CentralPanel::default()
            .frame(egui::Frame::none())
            .show(ctx, |ui| {
                let (canvas, _response) =
                    ui.allocate_exact_size(ui.available_size(), Sense::click_and_drag());

                self.core.sync_canvas_size(canvas.size());
                let events = ui.input(|i| i.events.clone());
                self.canvas_input
                    .translate(&events, canvas, self.core.pending_mut());
                self.tick(ctx, canvas);

                ui.painter()
                    .add(make_fractal_callback(self.renderer.clone(), canvas));
            });

        let now = ctx.input(|i| i.time);
        if let Some(wait) = self.core.repaint_delay(now) {
            ctx.request_repaint_after(wait);
        }
    }

    fn on_exit(&mut self, gl: Option<&glow::Context>) {
        if let Some(gl) = gl {
            self.renderer
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .destroy(gl);
        }
    }
}

/// Stand-in app when GL setup failed: closes the window on the first frame
/// so `main` can report the error.
pub struct StartupFailure;

impl eframe::App for StartupFailure {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        ctx.send_viewport_cmd(ViewportCommand::Close);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::translator::ViewerKey;
    use crate::rendering::viewport::FractalUniforms;
    use egui::vec2;

    const FRAME: f64 = 1.0 / 60.0;

    #[derive(Default)]
    struct CountingConsumer {
        last: Option<FractalUniforms>,
        redraws: usize,
    }

    impl FrameConsumer for CountingConsumer {
        fn upload_uniforms(&mut self, uniforms: &FractalUniforms) {
            self.last = Some(*uniforms);
        }

        fn redraw(&mut self) {
            self.redraws += 1;
        }
    }

    fn core() -> ViewerCore {
        ViewerCore::new(ViewportState::default(), RenderScheduler::default())
    }

    fn held(x: f32, y: f32) -> InputEvent {
        InputEvent::PointerMoved {
            x,
            y,
            drag_held: true,
        }
    }

    fn queue(core: &mut ViewerCore, events: &[InputEvent]) {
        core.pending_mut().extend(events.iter().copied());
    }

    #[test]
    fn test_queued_input_waits_for_accepted_tick() {
        let mut core = core();
        let mut consumer = CountingConsumer::default();
        core.tick(FRAME, &mut consumer);
        let offset = core.viewport().offset();

        queue(&mut core, &[held(400.0, 300.0), held(490.0, 300.0)]);
        assert!(core.repaint_delay(FRAME + 0.001).is_some());
        core.tick(FRAME + 0.001, &mut consumer);
        assert_eq!(core.viewport().offset(), offset);
        assert_eq!(core.pending_mut().len(), 2);

        core.tick(2.0 * FRAME, &mut consumer);
        assert!(core.pending_mut().is_empty());
        assert_ne!(core.viewport().offset(), offset);
        assert_eq!(consumer.redraws, 2);
        assert_eq!(core.repaint_delay(2.0 * FRAME), None);
    }

    #[test]
    fn test_batched_moves_past_edge_do_not_jump() {
        let mut core = core();
        let mut consumer = CountingConsumer::default();
        let (width, height) = core.viewport().screen_size();
        let start = core.viewport().offset();

        // the second edge move was captured before the warp could land
        queue(&mut core, &[held(2.0, 300.0), held(0.0, 300.0), held(-2.0, 300.0)]);
        let responses = core.tick(FRAME, &mut consumer);
        assert_eq!(responses, vec![InputResponse::WarpCursor { x: width, y: 300.0 }]);

        // then the warp lands, echoes, and the drag carries on leftwards
        queue(&mut core, &[held(width, 300.0), held(width - 3.0, 300.0)]);
        let responses = core.tick(2.0 * FRAME, &mut consumer);
        assert!(responses.is_empty(), "{responses:?}");

        let one_pixel = 2.0 * (width / height) / width;
        let moved = core.viewport().offset().re - start.re;
        assert!(moved > 0.0);
        assert!((moved - 5.0 * one_pixel).abs() < 1e-5, "moved {moved}");
    }

    #[test]
    fn test_warp_echo_does_not_bounce() {
        let mut core = core();
        let mut consumer = CountingConsumer::default();
        let (width, _) = core.viewport().screen_size();

        queue(&mut core, &[held(1.0, 300.0), held(0.0, 300.0)]);
        let responses = core.tick(FRAME, &mut consumer);
        assert_eq!(responses, vec![InputResponse::WarpCursor { x: width, y: 300.0 }]);
        let offset = core.viewport().offset();

        // the OS reports our own warp as a move onto the target
        queue(&mut core, &[held(width, 300.0)]);
        let responses = core.tick(2.0 * FRAME, &mut consumer);
        assert!(responses.is_empty(), "{responses:?}");
        assert_eq!(core.viewport().offset(), offset);

        queue(&mut core, &[held(width - 4.0, 300.0)]);
        let responses = core.tick(3.0 * FRAME, &mut consumer);
        assert!(responses.is_empty(), "{responses:?}");
        assert!(core.viewport().offset().re > offset.re);
    }

    #[test]
    fn test_resize_marks_redraw_with_new_size() {
        let mut core = core();
        let mut consumer = CountingConsumer::default();
        core.tick(FRAME, &mut consumer);
        assert_eq!(core.repaint_delay(FRAME), None);

        core.sync_canvas_size(vec2(1280.0, 720.0));
        assert!(core.viewport().is_dirty());
        assert_eq!(core.repaint_delay(FRAME), Some(Duration::from_secs_f64(FRAME)));

        core.tick(2.0 * FRAME, &mut consumer);
        assert_eq!(consumer.redraws, 2);
        let uniforms = consumer.last.unwrap();
        assert_eq!((uniforms.window_width, uniforms.window_height), (1280.0, 720.0));
    }

    #[test]
    fn test_empty_canvas_keeps_previous_size() {
        let mut core = core();
        core.sync_canvas_size(vec2(0.0, 0.0));
        assert_eq!(core.viewport().screen_size(), (900.0, 600.0));
    }

    #[test]
    fn test_escape_is_reported_after_earlier_input() {
        let mut core = core();
        let mut consumer = CountingConsumer::default();
        queue(
            &mut core,
            &[
                InputEvent::KeyPressed(ViewerKey::Reset),
                InputEvent::KeyPressed(ViewerKey::Escape),
            ],
        );
        let responses = core.tick(FRAME, &mut consumer);
        assert_eq!(responses, vec![InputResponse::Quit]);
    }
}
