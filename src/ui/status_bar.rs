use egui::Ui;

use crate::rendering::viewport::ViewportState;

pub fn show_status_bar(ui: &mut Ui, viewport: &ViewportState, frames_drawn: u64) {
    let center = viewport.offset();
    ui.horizontal_wrapped(|ui| {
        ui.label(format!("Center: {:+.6} {:+.6}i", center.re, center.im));
        ui.separator();
        ui.label(format!(
            "Zoom: {:.3}x (step {:.2})",
            viewport.zoom(),
            viewport.zoom_factor()
        ));
        ui.separator();
        ui.label(format!("Frames: {frames_drawn}"));
        ui.separator();
        ui.weak("Drag to pan · Scroll to zoom · R reset · Esc quit");
    });
}
