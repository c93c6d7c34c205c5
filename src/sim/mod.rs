mod forces;
mod quadtree;

pub mod lifecycle;
pub mod scheduler;

use eframe::egui::Vec2;
use rand::Rng;
use rand::rngs::StdRng;

use crate::util::radius_from_area;
use forces::{CollideScratch, apply_collisions};

/// One animated bubble. `delta` is the day-over-day increase backing both the
/// radius and the target height; `growth` is delta relative to yesterday's
/// total (0 on a zero base).
#[derive(Clone, Debug)]
pub struct Node {
    pub category: String,
    pub pos: Vec2,
    pub vel: Vec2,
    pub target: Vec2,
    pub radius: f32,
    pub delta: f64,
    pub growth: f64,
}

impl Node {
    pub fn new(category: String, pos: Vec2, target: Vec2, delta: f64, growth: f64) -> Self {
        Self {
            category,
            pos,
            vel: Vec2::ZERO,
            target,
            radius: radius_from_area(delta),
            delta,
            growth,
        }
    }
}

/// Force parameters. Defaults match the tuning the visualization shipped
/// with: a soft collision force and a gentle pull toward the target.
#[derive(Clone, Copy, Debug)]
pub struct SimConfig {
    pub collision_strength: f32,
    pub collision_iterations: usize,
    pub pull_strength: f32,
    pub velocity_decay: f32,
    pub alpha_decay: f32,
    pub alpha_min: f32,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            collision_strength: 0.019,
            collision_iterations: 1,
            pull_strength: 0.02,
            velocity_decay: 0.3,
            alpha_decay: 0.0228,
            alpha_min: 0.001,
        }
    }
}

struct PendingNode {
    node: Node,
    delay: f32,
}

/// The force simulation engine. Owns the live node set, the staggered
/// admission queue, and the alpha energy scalar.
pub struct Simulation {
    config: SimConfig,
    nodes: Vec<Node>,
    pending: Vec<PendingNode>,
    alpha: f32,
    scratch: CollideScratch,
}

impl Simulation {
    pub fn new(config: SimConfig) -> Self {
        Self {
            config,
            nodes: Vec::new(),
            pending: Vec::new(),
            alpha: 1.0,
            scratch: CollideScratch::default(),
        }
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn nodes_mut(&mut self) -> &mut Vec<Node> {
        &mut self.nodes
    }

    /// Live and pending nodes together; used when a surface resize retargets
    /// everything in one pass.
    pub fn all_nodes_mut(&mut self) -> impl Iterator<Item = &mut Node> {
        self.nodes
            .iter_mut()
            .chain(self.pending.iter_mut().map(|entry| &mut entry.node))
    }

    pub fn alpha(&self) -> f32 {
        self.alpha
    }

    pub fn is_settled(&self) -> bool {
        self.alpha <= self.config.alpha_min
    }

    /// Re-energize after a reconcile so the swarm animates toward the new
    /// targets.
    pub fn reheat(&mut self) {
        self.alpha = 1.0;
    }

    pub fn push_pending(&mut self, node: Node, delay: f32) {
        self.pending.push(PendingNode { node, delay });
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Immediately admits every queued node, keeping its seeded spawn
    /// position. A new snapshot supersedes the previous batch's staggering.
    pub fn drain_pending(&mut self) {
        for entry in self.pending.drain(..) {
            self.nodes.push(entry.node);
        }
    }

    /// Admits queued nodes whose delay has elapsed. A newcomer "divides"
    /// from a live node rather than popping in from nowhere: a randomly
    /// chosen node of its own category when one exists, otherwise the live
    /// node nearest its spawn position. Into an empty swarm it keeps the
    /// seeded spawn position. Returns the number of nodes admitted.
    pub fn admit_ready(&mut self, elapsed: f32, rng: &mut StdRng) -> usize {
        let mut admitted = 0;
        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].delay <= elapsed {
                let mut entry = self.pending.swap_remove(index);
                let spawn = entry.node.pos;
                if let Some(pos) = self.division_position(&entry.node.category, spawn, rng) {
                    entry.node.pos = pos;
                }
                self.nodes.push(entry.node);
                admitted += 1;
            } else {
                index += 1;
            }
        }
        admitted
    }

    fn division_position(&self, category: &str, spawn: Vec2, rng: &mut StdRng) -> Option<Vec2> {
        let matching = self
            .nodes
            .iter()
            .filter(|node| node.category == category)
            .map(|node| node.pos)
            .collect::<Vec<_>>();
        if !matching.is_empty() {
            return Some(matching[rng.gen_range(0..matching.len())]);
        }

        self.nodes
            .iter()
            .map(|node| node.pos)
            .min_by(|a, b| (*a - spawn).length_sq().total_cmp(&(*b - spawn).length_sq()))
    }

    /// One fixed time step: decay alpha, apply the positional pull and the
    /// iterated collision force, then integrate with velocity decay. A
    /// position that comes out non-finite is reset to the node's target so
    /// it cannot poison the next frame's collision pass.
    pub fn tick(&mut self) {
        self.alpha = (self.alpha * (1.0 - self.config.alpha_decay)).max(self.config.alpha_min);

        if self.nodes.is_empty() {
            return;
        }

        let pull = self.config.pull_strength * self.alpha;
        for node in &mut self.nodes {
            node.vel += (node.target - node.pos) * pull;
        }

        for _ in 0..self.config.collision_iterations.max(1) {
            apply_collisions(
                &mut self.nodes,
                self.config.collision_strength,
                &mut self.scratch,
            );
        }

        let keep = 1.0 - self.config.velocity_decay;
        for node in &mut self.nodes {
            node.vel *= keep;
            node.pos += node.vel;

            if !node.pos.x.is_finite() || !node.pos.y.is_finite() {
                node.pos = node.target;
                node.vel = Vec2::ZERO;
            }
        }
    }
}
