//! egui layer: verse navigation, the control panel, the equations sidebar
//! and stage overlays

use crate::controls::{ControlPanel, ControlValue, WidgetId, WidgetKind};
use crate::equations::Equation;
use crate::orchestrator::VerseRegistry;
use crate::route::VerseId;
use crate::stage::{Anchor, Stage};
use common::Camera3D;
use egui::{Align2, Color32, Context, FontFamily, FontId, Pos2, Rect, RichText};

const ACCENT: Color32 = Color32::from_rgb(100, 200, 255);
const SECTION: Color32 = Color32::from_rgb(255, 200, 100);

/// Navigation requested from the top bar
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavAction {
    Select(VerseId),
    Previous,
    Next,
    Back,
    Forward,
}

pub fn to_color32(color: [f32; 4]) -> Color32 {
    let [r, g, b, a] = color.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
    Color32::from_rgba_unmultiplied(r, g, b, a)
}

/// Top bar with verse picker, prev/next and history buttons
pub fn draw_navigation(
    ctx: &Context,
    registry: &VerseRegistry,
    current: Option<VerseId>,
    route: &str,
) -> Option<NavAction> {
    let mut action = None;
    egui::TopBottomPanel::top("navigation").show(ctx, |ui| {
        ui.horizontal(|ui| {
            if ui.button("⟲").on_hover_text("Back (Backspace)").clicked() {
                action = Some(NavAction::Back);
            }
            if ui.button("⟳").on_hover_text("Forward").clicked() {
                action = Some(NavAction::Forward);
            }
            ui.separator();

            if ui.button("◀").on_hover_text("Previous verse ([)").clicked() {
                action = Some(NavAction::Previous);
            }

            let selected = match current.and_then(|id| registry.get(id)) {
                Some(entry) => format!("{}. {}", entry.id.0, entry.title),
                None => current.map_or_else(|| "Choose a verse".to_string(), |id| id.to_string()),
            };
            egui::ComboBox::from_id_source("verse_select")
                .selected_text(selected)
                .width(300.0)
                .show_ui(ui, |ui| {
                    for entry in registry.entries() {
                        let label = format!("{}. {}", entry.id.0, entry.title);
                        if ui
                            .selectable_label(current == Some(entry.id), label)
                            .clicked()
                        {
                            action = Some(NavAction::Select(entry.id));
                        }
                    }
                });

            if ui.button("▶").on_hover_text("Next verse (])").clicked() {
                action = Some(NavAction::Next);
            }
            ui.separator();
            ui.label(RichText::new(route).monospace().color(Color32::GRAY));
        });
    });
    action
}

/// Left panel rendering the mounted verse's widgets. Edits go back through
/// [`ControlPanel::set_value`] so the verse sees them as control events.
pub fn draw_control_panel(ctx: &Context, panel: &mut ControlPanel, title: &str) {
    let mut edits: Vec<(WidgetId, ControlValue)> = Vec::new();

    egui::SidePanel::left("controls_panel")
        .min_width(220.0)
        .resizable(false)
        .show(ctx, |ui| {
            ui.heading(RichText::new(title).color(ACCENT));
            ui.add_space(6.0);

            if let Some(message) = panel.message() {
                ui.label(RichText::new(message).italics().color(Color32::LIGHT_GRAY));
                ui.add_space(6.0);
            }

            if panel.widgets().is_empty() {
                return;
            }
            ui.separator();
            ui.label(RichText::new("Controls").strong().color(SECTION));
            ui.add_space(4.0);

            for widget in panel.widgets() {
                match &widget.kind {
                    WidgetKind::Slider {
                        value,
                        min,
                        max,
                        step,
                    } => {
                        ui.label(widget.label.as_str());
                        let mut v = *value;
                        ui.horizontal(|ui| {
                            let slider = egui::Slider::new(&mut v, *min..=*max)
                                .step_by(f64::from(*step))
                                .show_value(false);
                            if ui.add(slider).changed() {
                                edits.push((widget.id, ControlValue::Number(v)));
                            }
                            ui.label(RichText::new(&widget.readout).monospace());
                        });
                    }
                    WidgetKind::Checkbox { checked } => {
                        let mut c = *checked;
                        if ui.checkbox(&mut c, widget.label.as_str()).changed() {
                            edits.push((widget.id, ControlValue::Toggle(c)));
                        }
                    }
                    WidgetKind::Button => {
                        if ui.button(widget.label.as_str()).clicked() {
                            edits.push((widget.id, ControlValue::Pressed));
                        }
                    }
                }
                ui.add_space(4.0);
            }
        });

    for (id, value) in edits {
        panel.set_value(id, value);
    }
}

/// Draw a styled equation sidebar
pub fn draw_equations_sidebar(
    ctx: &Context,
    title: &str,
    equations: &[Equation],
    variables: &[(&str, &str)],
) {
    egui::SidePanel::right("equations_panel")
        .min_width(280.0)
        .max_width(350.0)
        .resizable(true)
        .show(ctx, |ui| {
            ui.vertical_centered(|ui| {
                ui.heading(RichText::new(title).color(ACCENT));
            });

            ui.add_space(10.0);
            ui.separator();
            ui.add_space(5.0);

            ui.label(RichText::new("Equations").strong().color(SECTION));
            ui.add_space(5.0);

            for eq in equations {
                draw_equation(ui, eq);
                ui.add_space(8.0);
            }

            if variables.is_empty() {
                return;
            }
            ui.add_space(10.0);
            ui.separator();
            ui.add_space(5.0);

            ui.label(RichText::new("Variables").strong().color(SECTION));
            ui.add_space(5.0);

            for (symbol, meaning) in variables {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new(*symbol)
                            .color(Color32::from_rgb(150, 255, 150))
                            .font(FontId::new(14.0, FontFamily::Monospace)),
                    );
                    ui.label(RichText::new("=").color(Color32::GRAY));
                    ui.label(RichText::new(*meaning).color(Color32::LIGHT_GRAY));
                });
            }
        });
}

fn draw_equation(ui: &mut egui::Ui, eq: &Equation) {
    ui.group(|ui| {
        ui.label(RichText::new(eq.name).strong().color(Color32::WHITE));
        ui.label(
            RichText::new(eq.formula)
                .font(FontId::new(16.0, FontFamily::Monospace))
                .color(Color32::from_rgb(200, 220, 255)),
        );
        ui.label(RichText::new(eq.description).small().color(Color32::GRAY));
    });
}

/// Screen position of an overlay inside `viewport`; `None` when a world
/// anchor is behind the camera
pub fn overlay_position(anchor: Anchor, camera: &Camera3D, viewport: Rect) -> Option<Pos2> {
    match anchor {
        Anchor::Screen(frac) => Some(Pos2::new(
            viewport.min.x + frac.x * viewport.width(),
            viewport.min.y + frac.y * viewport.height(),
        )),
        Anchor::World(point) => camera
            .project_to_screen(point, viewport.width(), viewport.height())
            .map(|p| Pos2::new(viewport.min.x + p.x, viewport.min.y + p.y)),
    }
}

/// Paint the stage's text overlays beneath the panels
pub fn draw_overlays(ctx: &Context, stage: &Stage, camera: &Camera3D) {
    let painter = ctx.layer_painter(egui::LayerId::new(
        egui::Order::Background,
        egui::Id::new("stage_overlays"),
    ));
    let viewport = ctx.screen_rect();
    for overlay in stage.overlays() {
        let Some(pos) = overlay_position(overlay.anchor, camera, viewport) else {
            continue;
        };
        let align = match overlay.anchor {
            Anchor::Screen(frac) if (frac.x - 0.5).abs() < 1e-3 => Align2::CENTER_CENTER,
            Anchor::Screen(_) => Align2::LEFT_TOP,
            Anchor::World(_) => Align2::CENTER_BOTTOM,
        };
        painter.text(
            pos,
            align,
            &overlay.text,
            FontId::proportional(16.0),
            to_color32(overlay.color),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec2;

    #[test]
    fn screen_anchor_scales_with_viewport() {
        let camera = Camera3D::new(2.0);
        let viewport = Rect::from_min_size(Pos2::new(10.0, 20.0), egui::vec2(200.0, 100.0));
        let pos = overlay_position(Anchor::Screen(Vec2::new(0.5, 0.25)), &camera, viewport).unwrap();
        assert_eq!(pos, Pos2::new(110.0, 45.0));
    }

    #[test]
    fn world_anchor_at_target_lands_mid_viewport() {
        let camera = Camera3D::framing(2.0, 10.0, 0.3, 0.2);
        let viewport = Rect::from_min_size(Pos2::ZERO, egui::vec2(200.0, 100.0));
        let pos = overlay_position(Anchor::World(camera.target), &camera, viewport).unwrap();
        assert!((pos.x - 100.0).abs() < 1e-3 && (pos.y - 50.0).abs() < 1e-3);
    }

    #[test]
    fn colors_convert_to_bytes() {
        assert_eq!(
            to_color32([1.0, 0.0, 0.5, 1.0]),
            Color32::from_rgba_unmultiplied(255, 0, 128, 255)
        );
    }
}
