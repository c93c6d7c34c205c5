use eframe::egui::{self, Align2, Color32, Context, FontId, Painter, Rect, Sense, vec2};

use crate::data::DATE_FORMAT;
use crate::sim::lifecycle;

use super::ViewModel;

const BACKGROUND: Color32 = Color32::from_rgb(19, 23, 29);
const LABEL_COLOR: Color32 = Color32::from_rgb(225, 228, 232);
const STATUS_COLOR: Color32 = Color32::from_rgb(140, 150, 160);

impl ViewModel {
    pub(in crate::app) fn show(&mut self, ctx: &Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::NONE)
            .show(ctx, |ui| {
                let (rect, response) =
                    ui.allocate_exact_size(ui.available_size(), Sense::click());
                let painter = ui.painter_at(rect);

                // Resize is committed before anything ticks; no tick observes
                // a half-updated surface.
                if rect.size() != self.surface {
                    self.surface = rect.size();
                    lifecycle::retarget(&mut self.sim, self.surface);
                }

                if self.needs_reconcile {
                    self.needs_reconcile = false;
                    self.reconcile(ctx);
                }

                if response.clicked() {
                    self.date = self.date.succ_opt().unwrap_or(self.date);
                    self.reconcile(ctx);
                }

                let now = ctx.input(|input| input.time);
                if self.scheduler.on_frame(now) {
                    let elapsed = (now - self.batch_started) as f32;
                    self.sim.admit_ready(elapsed, &mut self.rng);
                    self.sim.tick();
                    self.scheduler.note_tick();

                    if !self
                        .scheduler
                        .is_done(self.sim.is_settled(), self.sim.pending_len())
                        && self.scheduler.request()
                    {
                        ctx.request_repaint_after(self.scheduler.frame_delay());
                    }
                } else if self.scheduler.is_scheduled() {
                    // An input event repainted ahead of the cap; re-arm the
                    // wakeup for the rest of the interval.
                    ctx.request_repaint_after(self.scheduler.remaining_delay(now));
                }

                self.draw_frame(&painter, rect);
            });
    }

    fn reconcile(&mut self, ctx: &Context) {
        lifecycle::reconcile(
            &mut self.sim,
            &self.snapshot,
            self.date,
            self.surface,
            self.lifecycle,
            &mut self.rng,
        );
        self.batch_started = ctx.input(|input| input.time);
        self.scheduler.restart();
        if self.scheduler.request() {
            ctx.request_repaint_after(self.scheduler.frame_delay());
        }
    }

    fn draw_frame(&mut self, painter: &Painter, rect: Rect) {
        painter.rect_filled(rect, 0.0, BACKGROUND);

        let palette = &mut self.palette;

        // Collection order is draw order; later nodes paint over earlier
        // ones.
        for node in self.sim.nodes() {
            if node.radius <= 0.0 {
                continue;
            }
            painter.circle_filled(
                rect.min + node.pos,
                node.radius,
                palette.color_for(&node.category),
            );
        }

        for node in self.sim.nodes() {
            if node.radius < self.label_min_radius {
                continue;
            }
            painter.text(
                rect.min + node.pos - vec2(0.0, node.radius + 4.0),
                Align2::CENTER_BOTTOM,
                &node.category,
                FontId::proportional(11.0),
                LABEL_COLOR,
            );
        }

        let status = format!(
            "{}  |  {} bubbles, {} pending  |  click to advance a day",
            self.date.format(DATE_FORMAT),
            self.sim.nodes().len(),
            self.sim.pending_len(),
        );
        painter.text(
            rect.min + vec2(12.0, 10.0),
            Align2::LEFT_TOP,
            status,
            FontId::proportional(12.0),
            STATUS_COLOR,
        );
    }
}
