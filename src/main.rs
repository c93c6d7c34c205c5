mod app;
mod data;
mod sim;
mod util;

use anyhow::Context as _;
use chrono::NaiveDate;
use clap::Parser;

const DEFAULT_DATA_URL: &str =
    "https://www.abc.net.au/dat/news/interactives/covid19-data/hybrid-country-totals.json";

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Remote JSON dataset: category -> date -> cumulative magnitude
    #[arg(long, default_value = DEFAULT_DATA_URL)]
    data_url: String,

    /// Reference date the visualization starts on (YYYY-MM-DD)
    #[arg(long, default_value = "2020-01-21")]
    start_date: String,

    /// Frame-rate cap for the animation loop
    #[arg(long, default_value_t = 60.0)]
    fps: f32,

    /// Minimum total magnitude before a category gets a bubble
    #[arg(long, default_value_t = 0.0)]
    threshold: f64,

    /// Cap on live bubbles; the largest categories win
    #[arg(long)]
    max_nodes: Option<usize>,

    /// Seed for placement jitter
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Hide labels on bubbles smaller than this radius
    #[arg(long, default_value_t = 12.0)]
    label_min_radius: f32,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let args = Args::parse();

    let start_date = NaiveDate::parse_from_str(&args.start_date, data::DATE_FORMAT)
        .with_context(|| format!("invalid --start-date {:?}", args.start_date))?;

    let options = app::Options {
        data_url: args.data_url,
        start_date,
        fps_cap: args.fps,
        new_node_threshold: args.threshold,
        max_nodes: args.max_nodes,
        seed: args.seed,
        label_min_radius: args.label_min_radius,
    };

    let viewport = eframe::egui::ViewportBuilder::default().with_inner_size([1280.0, 860.0]);
    eframe::run_native(
        "swarmplot",
        eframe::NativeOptions {
            viewport,
            ..Default::default()
        },
        Box::new(move |cc| Ok(Box::new(app::SwarmplotApp::new(cc, options)))),
    )
    .map_err(|err| anyhow::anyhow!("display shell exited with an error: {err}"))
}
