mod config;
mod input;
mod rendering;
mod storage;
mod ui;

use std::cell::RefCell;
use std::process::ExitCode;
use std::rc::Rc;

use config::viewer::load_viewer_config;
use rendering::gl_fractal::RendererError;
use ui::app::{FractalApp, StartupFailure};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = match load_viewer_config() {
        Ok(config) => config,
        Err(error) => {
            log::error!("{error}");
            return ExitCode::FAILURE;
        }
    };

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title(config.window.title.clone())
            .with_inner_size([config.window.width, config.window.height])
            .with_app_id("mandelbrot-viewer"),
        renderer: eframe::Renderer::Glow,
        ..Default::default()
    };

    let startup_error: Rc<RefCell<Option<RendererError>>> = Rc::default();
    let creator_error = Rc::clone(&startup_error);
    let title = config.window.title.clone();

    log::info!(
        "opening {}x{} window, view at {:+} {:+}i",
        config.window.width,
        config.window.height,
        config.view.real_offset,
        config.view.imaginary_offset
    );

    let result = eframe::run_native(
        &title,
        options,
        Box::new(move |cc| -> Box<dyn eframe::App> {
            match FractalApp::new(cc, &config) {
                Ok(app) => Box::new(app),
                Err(error) => {
                    *creator_error.borrow_mut() = Some(error);
                    Box::new(StartupFailure)
                }
            }
        }),
    );

    if let Some(error) = startup_error.borrow_mut().take() {
        log::error!("renderer setup failed: {error}");
        return ExitCode::FAILURE;
    }
    if let Err(error) = result {
        log::error!("window failed: {error}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
