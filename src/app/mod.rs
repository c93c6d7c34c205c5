use std::sync::mpsc::{self, Receiver};
use std::thread;

use chrono::NaiveDate;
use eframe::egui::{self, Context, Vec2};
use log::error;
use rand::SeedableRng;
use rand::rngs::StdRng;

use crate::data::{self, Snapshot};
use crate::sim::lifecycle::LifecycleConfig;
use crate::sim::scheduler::{FrameScheduler, ScheduleConfig};
use crate::sim::{SimConfig, Simulation};

mod colors;
mod view;

use colors::CategoryPalette;

#[derive(Clone, Debug)]
pub struct Options {
    pub data_url: String,
    pub start_date: NaiveDate,
    pub fps_cap: f32,
    pub new_node_threshold: f64,
    pub max_nodes: Option<usize>,
    pub seed: u64,
    pub label_min_radius: f32,
}

pub struct SwarmplotApp {
    options: Options,
    state: AppState,
}

enum AppState {
    Loading {
        rx: Receiver<Result<Snapshot, String>>,
    },
    Ready(Box<ViewModel>),
    Error(String),
}

struct ViewModel {
    snapshot: Snapshot,
    date: NaiveDate,
    sim: Simulation,
    scheduler: FrameScheduler,
    lifecycle: LifecycleConfig,
    palette: CategoryPalette,
    rng: StdRng,
    surface: Vec2,
    batch_started: f64,
    label_min_radius: f32,
    needs_reconcile: bool,
}

impl ViewModel {
    fn new(snapshot: Snapshot, options: &Options) -> Self {
        Self {
            snapshot,
            date: options.start_date,
            sim: Simulation::new(SimConfig::default()),
            scheduler: FrameScheduler::new(ScheduleConfig {
                fps_cap: options.fps_cap,
                ..ScheduleConfig::default()
            }),
            lifecycle: LifecycleConfig {
                new_node_threshold: options.new_node_threshold,
                max_nodes: options.max_nodes,
                ..LifecycleConfig::default()
            },
            palette: CategoryPalette::default(),
            rng: StdRng::seed_from_u64(options.seed),
            surface: Vec2::ZERO,
            batch_started: 0.0,
            label_min_radius: options.label_min_radius,
            // first reconcile waits until the surface size is known
            needs_reconcile: true,
        }
    }
}

impl SwarmplotApp {
    pub fn new(_cc: &eframe::CreationContext<'_>, options: Options) -> Self {
        let state = Self::start_load(options.data_url.clone());
        Self { options, state }
    }

    fn spawn_fetch(url: String) -> Receiver<Result<Snapshot, String>> {
        let (tx, rx) = mpsc::channel();

        thread::spawn(move || {
            let result = data::fetch_snapshot(&url).map_err(|err| {
                error!("dataset fetch failed: {err:#}");
                err.to_string()
            });
            let _ = tx.send(result);
        });

        rx
    }

    fn start_load(url: String) -> AppState {
        AppState::Loading {
            rx: Self::spawn_fetch(url),
        }
    }
}

impl eframe::App for SwarmplotApp {
    fn update(&mut self, ctx: &Context, _frame: &mut eframe::Frame) {
        let mut transition = None;

        match &mut self.state {
            AppState::Loading { rx } => {
                if let Ok(result) = rx.try_recv() {
                    transition = Some(match result {
                        Ok(snapshot) => {
                            AppState::Ready(Box::new(ViewModel::new(snapshot, &self.options)))
                        }
                        Err(message) => AppState::Error(message),
                    });
                }

                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.vertical_centered(|ui| {
                        ui.add_space(120.0);
                        ui.heading("Fetching dataset...");
                        ui.add_space(8.0);
                        ui.spinner();
                    });
                });
                ctx.request_repaint();
            }
            AppState::Error(message) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    ui.heading("Failed to fetch the dataset");
                    ui.add_space(6.0);
                    ui.label(message.as_str());
                    ui.add_space(10.0);
                    if ui.button("Retry").clicked() {
                        transition = Some(Self::start_load(self.options.data_url.clone()));
                    }
                });
            }
            AppState::Ready(model) => {
                model.show(ctx);
            }
        }

        if let Some(next_state) = transition {
            self.state = next_state;
        }
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let AppState::Ready(model) = &mut self.state {
            model.scheduler.cancel();
        }
    }
}
