use chrono::NaiveDate;
use eframe::egui::{Vec2, vec2};
use rand::Rng;
use rand::rngs::StdRng;

use super::{Node, Simulation};
use crate::data::Snapshot;
use crate::util::radius_from_area;

/// Targets never rise above this distance from the top of the surface.
const TARGET_FLOOR: f32 = 100.0;

/// Deltas map linearly onto the surface height over this span; larger deltas
/// keep extrapolating and hit the floor.
const DELTA_SCALE_SPAN: f64 = 1000.0;

#[derive(Clone, Copy, Debug)]
pub struct LifecycleConfig {
    /// A category only gets a bubble once its total magnitude exceeds this.
    pub new_node_threshold: f64,
    /// Optional cap on live bubbles; the largest categories win.
    pub max_nodes: Option<usize>,
    /// New bubbles spawn within this box around the surface center.
    pub spawn_jitter: f32,
    /// Admission delays for a batch of new bubbles are spread across this
    /// many seconds.
    pub admission_duration: f32,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            new_node_threshold: 0.0,
            max_nodes: None,
            spawn_jitter: 200.0,
            admission_duration: 2.0,
        }
    }
}

/// Where a bubble with the given day-over-day delta wants to sit: centered
/// horizontally, lifted off the 90% line proportionally to the delta, never
/// above the floor line.
pub fn target_for(delta: f64, surface: Vec2) -> Vec2 {
    let lift = ((delta.max(0.0) / DELTA_SCALE_SPAN) as f32) * surface.y;
    let y = (surface.y * 0.9 - lift).max(TARGET_FLOOR);
    vec2(surface.x / 2.0, y)
}

/// Surface resized: recompute every live and pending target from the stored
/// deltas.
pub fn retarget(sim: &mut Simulation, surface: Vec2) {
    for node in sim.all_nodes_mut() {
        node.target = target_for(node.delta, surface);
    }
}

/// Reconciles the live bubble set against the snapshot for `date`.
///
/// A category is eligible when today's magnitude is present and positive,
/// grew since yesterday, and clears the visibility threshold. Eligible
/// categories with a live bubble are updated in place (position and velocity
/// survive); new ones are queued for staggered admission; everything else is
/// removed. Eligibility depends only on the snapshot and the date, so
/// stepping a day forward and back restores an equivalent set.
pub fn reconcile(
    sim: &mut Simulation,
    snapshot: &Snapshot,
    date: NaiveDate,
    surface: Vec2,
    config: LifecycleConfig,
    rng: &mut StdRng,
) {
    sim.drain_pending();

    let mut eligible = Vec::new();
    for category in snapshot.categories() {
        let Some(figures) = snapshot.daily_figures(category, date) else {
            continue;
        };
        if figures.total <= 0.0 || figures.delta <= 0.0 {
            continue;
        }
        if figures.total <= config.new_node_threshold {
            continue;
        }
        eligible.push((category.to_owned(), figures));
    }

    if let Some(cap) = config.max_nodes {
        eligible.sort_by(|a, b| {
            b.1.total
                .total_cmp(&a.1.total)
                .then_with(|| a.0.cmp(&b.0))
        });
        eligible.truncate(cap);
        eligible.sort_by(|a, b| a.0.cmp(&b.0));
    }

    let center = vec2(surface.x / 2.0, surface.y / 2.0);
    let mut newcomers = Vec::new();

    for (category, figures) in &eligible {
        let target = target_for(figures.delta, surface);

        if let Some(node) = sim
            .nodes_mut()
            .iter_mut()
            .find(|node| &node.category == category)
        {
            node.radius = radius_from_area(figures.delta);
            node.delta = figures.delta;
            node.growth = figures.growth;
            node.target = target;
        } else {
            let jitter = vec2(
                (rng.gen_range(0.0..1.0) - 0.5) * config.spawn_jitter,
                (rng.gen_range(0.0..1.0) - 0.5) * config.spawn_jitter,
            );
            newcomers.push(Node::new(
                category.clone(),
                center + jitter,
                target,
                figures.delta,
                figures.growth,
            ));
        }
    }

    sim.nodes_mut()
        .retain(|node| eligible.iter().any(|(category, _)| category == &node.category));

    let spacing = if newcomers.is_empty() {
        0.0
    } else {
        config.admission_duration / newcomers.len() as f32
    };
    for (index, node) in newcomers.into_iter().enumerate() {
        sim.push_pending(node, index as f32 * spacing);
    }

    sim.reheat();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::RawSeries;
    use crate::sim::SimConfig;
    use rand::SeedableRng;
    use std::collections::HashMap;

    const SURFACE: Vec2 = Vec2 { x: 1200.0, y: 800.0 };

    fn date(text: &str) -> NaiveDate {
        NaiveDate::parse_from_str(text, crate::data::DATE_FORMAT).unwrap()
    }

    fn snapshot(entries: &[(&str, &[(&str, f64)])]) -> Snapshot {
        let mut raw = HashMap::new();
        for (category, dates) in entries {
            let by_date: HashMap<String, f64> = dates
                .iter()
                .map(|(key, value)| (key.to_string(), *value))
                .collect();
            raw.insert(category.to_string(), by_date);
        }
        Snapshot::from_raw(RawSeries(raw))
    }

    fn setup() -> (Simulation, StdRng) {
        (
            Simulation::new(SimConfig::default()),
            StdRng::seed_from_u64(42),
        )
    }

    /// Drains staggered admission so assertions can see the whole set.
    fn admit_all(sim: &mut Simulation, rng: &mut StdRng) {
        sim.admit_ready(f32::INFINITY, rng);
    }

    fn live_state(sim: &Simulation) -> Vec<(String, f32, f32, f32)> {
        let mut state = sim
            .nodes()
            .iter()
            .map(|node| (node.category.clone(), node.radius, node.target.x, node.target.y))
            .collect::<Vec<_>>();
        state.sort_by(|a, b| a.0.cmp(&b.0));
        state
    }

    #[test]
    fn grown_category_over_threshold_creates_one_node() {
        let (mut sim, mut rng) = setup();
        let data = snapshot(&[("A", &[("2020-01-01", 100.0), ("2020-01-02", 700.0)])]);
        let config = LifecycleConfig {
            new_node_threshold: 500.0,
            ..LifecycleConfig::default()
        };

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        assert_eq!(sim.pending_len(), 1);
        admit_all(&mut sim, &mut rng);

        assert_eq!(sim.nodes().len(), 1);
        let node = &sim.nodes()[0];
        assert_eq!(node.category, "A");
        assert!((node.radius - 13.8197).abs() < 1e-3);
        assert_eq!(node.delta, 600.0);
        assert_eq!(node.growth, 6.0);
    }

    #[test]
    fn unchanged_magnitude_creates_no_node() {
        let (mut sim, mut rng) = setup();
        let data = snapshot(&[("A", &[("2020-01-01", 700.0), ("2020-01-02", 700.0)])]);

        reconcile(
            &mut sim,
            &data,
            date("2020-01-02"),
            SURFACE,
            LifecycleConfig::default(),
            &mut rng,
        );
        admit_all(&mut sim, &mut rng);

        assert!(sim.nodes().is_empty());
    }

    #[test]
    fn below_threshold_category_is_skipped() {
        let (mut sim, mut rng) = setup();
        let data = snapshot(&[("A", &[("2020-01-01", 10.0), ("2020-01-02", 60.0)])]);
        let config = LifecycleConfig {
            new_node_threshold: 500.0,
            ..LifecycleConfig::default()
        };

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        admit_all(&mut sim, &mut rng);

        assert!(sim.nodes().is_empty());
    }

    #[test]
    fn existing_node_is_updated_in_place() {
        let (mut sim, mut rng) = setup();
        let data = snapshot(&[(
            "A",
            &[
                ("2020-01-01", 100.0),
                ("2020-01-02", 300.0),
                ("2020-01-03", 900.0),
            ],
        )]);
        let config = LifecycleConfig::default();

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        admit_all(&mut sim, &mut rng);
        let moved = vec2(50.0, 70.0);
        sim.nodes_mut()[0].pos = moved;

        reconcile(&mut sim, &data, date("2020-01-03"), SURFACE, config, &mut rng);
        admit_all(&mut sim, &mut rng);

        assert_eq!(sim.nodes().len(), 1);
        let node = &sim.nodes()[0];
        assert_eq!(node.pos, moved);
        assert_eq!(node.delta, 600.0);
        assert!((node.radius - 13.8197).abs() < 1e-3);
    }

    #[test]
    fn stale_category_is_removed() {
        let (mut sim, mut rng) = setup();
        let data = snapshot(&[
            ("A", &[("2020-01-01", 10.0), ("2020-01-02", 50.0)]),
            (
                "B",
                &[
                    ("2020-01-01", 10.0),
                    ("2020-01-02", 50.0),
                    ("2020-01-03", 80.0),
                ],
            ),
        ]);
        let config = LifecycleConfig::default();

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        admit_all(&mut sim, &mut rng);
        assert_eq!(sim.nodes().len(), 2);

        // A has no value on the 3rd; only B survives
        reconcile(&mut sim, &data, date("2020-01-03"), SURFACE, config, &mut rng);
        admit_all(&mut sim, &mut rng);

        assert_eq!(sim.nodes().len(), 1);
        assert_eq!(sim.nodes()[0].category, "B");
    }

    #[test]
    fn date_round_trip_restores_an_equivalent_set() {
        let (mut sim, mut rng) = setup();
        let data = snapshot(&[
            (
                "A",
                &[
                    ("2020-01-01", 100.0),
                    ("2020-01-02", 400.0),
                    ("2020-01-03", 450.0),
                ],
            ),
            (
                "B",
                &[
                    ("2020-01-01", 50.0),
                    ("2020-01-02", 50.0),
                    ("2020-01-03", 300.0),
                ],
            ),
        ]);
        let config = LifecycleConfig::default();

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        admit_all(&mut sim, &mut rng);
        let first = live_state(&sim);

        reconcile(&mut sim, &data, date("2020-01-03"), SURFACE, config, &mut rng);
        admit_all(&mut sim, &mut rng);
        assert_ne!(first, live_state(&sim));

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        admit_all(&mut sim, &mut rng);

        assert_eq!(first, live_state(&sim));
    }

    #[test]
    fn target_is_lifted_by_delta_and_floored() {
        let gentle = target_for(100.0, SURFACE);
        assert_eq!(gentle.x, SURFACE.x / 2.0);
        assert!((gentle.y - (SURFACE.y * 0.9 - SURFACE.y * 0.1)).abs() < 1e-3);

        let extreme = target_for(50_000.0, SURFACE);
        assert_eq!(extreme.y, 100.0);

        let shrinking = target_for(-500.0, SURFACE);
        assert!((shrinking.y - SURFACE.y * 0.9).abs() < 1e-3);
    }

    #[test]
    fn node_cap_keeps_the_largest_categories() {
        let (mut sim, mut rng) = setup();
        let data = snapshot(&[
            ("A", &[("2020-01-01", 10.0), ("2020-01-02", 900.0)]),
            ("B", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
            ("C", &[("2020-01-01", 10.0), ("2020-01-02", 500.0)]),
        ]);
        let config = LifecycleConfig {
            max_nodes: Some(2),
            ..LifecycleConfig::default()
        };

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        admit_all(&mut sim, &mut rng);

        let mut categories = sim
            .nodes()
            .iter()
            .map(|node| node.category.as_str())
            .collect::<Vec<_>>();
        categories.sort_unstable();
        assert_eq!(categories, ["A", "C"]);
    }

    #[test]
    fn admission_delays_are_spread_across_the_batch() {
        let (mut sim, mut rng) = setup();
        let data = snapshot(&[
            ("A", &[("2020-01-01", 10.0), ("2020-01-02", 900.0)]),
            ("B", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
            ("C", &[("2020-01-01", 10.0), ("2020-01-02", 500.0)]),
            ("D", &[("2020-01-01", 10.0), ("2020-01-02", 200.0)]),
        ]);
        let config = LifecycleConfig {
            admission_duration: 2.0,
            ..LifecycleConfig::default()
        };

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        assert_eq!(sim.pending_len(), 4);

        // delays are 0, 0.5, 1.0, 1.5: halfway through, half the batch is in
        assert_eq!(sim.admit_ready(0.75, &mut rng), 2);
        assert_eq!(sim.pending_len(), 2);
    }

    #[test]
    fn staggered_batch_outlasting_the_tick_ceiling_is_fully_admitted() {
        use crate::sim::scheduler::{FrameScheduler, ScheduleConfig};

        let (mut sim, mut rng) = setup();
        let data = snapshot(&[
            ("A", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
            ("B", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
            ("C", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
            ("D", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
            ("E", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
            ("F", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
            ("G", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
            ("H", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
        ]);
        let config = LifecycleConfig::default();

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        assert_eq!(sim.pending_len(), 8);

        // delays reach 1.75 s; 100 ticks at 60 fps is only ~1.67 s
        let mut driver = FrameScheduler::new(ScheduleConfig {
            fps_cap: 60.0,
            tick_limit: 100,
        });
        let mut now = 0.0_f64;
        driver.request();
        loop {
            if driver.on_frame(now) {
                sim.admit_ready(now as f32, &mut rng);
                sim.tick();
                driver.note_tick();
                if driver.is_done(sim.is_settled(), sim.pending_len()) {
                    break;
                }
                driver.request();
            }
            now += 1.0 / 60.0;
            assert!(now < 60.0, "loop failed to converge");
        }

        assert_eq!(sim.pending_len(), 0);
        assert_eq!(sim.nodes().len(), 8);
        assert!(driver.ticks() > 100);
    }

    #[test]
    fn reconcile_reheats_the_simulation() {
        let (mut sim, mut rng) = setup();
        for _ in 0..350 {
            sim.tick();
        }
        assert!(sim.is_settled());

        let data = snapshot(&[("A", &[("2020-01-01", 10.0), ("2020-01-02", 50.0)])]);
        reconcile(
            &mut sim,
            &data,
            date("2020-01-02"),
            SURFACE,
            LifecycleConfig::default(),
            &mut rng,
        );

        assert_eq!(sim.alpha(), 1.0);
        assert!(!sim.is_settled());
    }

    #[test]
    fn resize_retargets_live_and_pending_nodes() {
        let (mut sim, mut rng) = setup();
        let data = snapshot(&[
            ("A", &[("2020-01-01", 10.0), ("2020-01-02", 900.0)]),
            ("B", &[("2020-01-01", 10.0), ("2020-01-02", 100.0)]),
        ]);
        let config = LifecycleConfig::default();

        reconcile(&mut sim, &data, date("2020-01-02"), SURFACE, config, &mut rng);
        sim.admit_ready(0.0, &mut rng);
        assert!(sim.pending_len() > 0);

        let resized = vec2(600.0, 400.0);
        retarget(&mut sim, resized);
        admit_all(&mut sim, &mut rng);

        for node in sim.nodes() {
            assert_eq!(node.target, target_for(node.delta, resized));
        }
    }
}
