use std::f32::consts::TAU;

use eframe::egui::{Vec2, vec2};

use super::Node;
use super::quadtree::QuadTree;

#[derive(Default)]
pub(super) struct CollideScratch {
    predicted: Vec<Vec2>,
    radii: Vec<f32>,
    corrections: Vec<Vec2>,
}

#[derive(Clone, Copy)]
struct CollideParams {
    strength: f32,
    max_gap_sq: f32,
}

/// One pass of pairwise collision resolution over predicted positions
/// (`pos + vel`). Overlapping circles receive equal and opposite velocity
/// corrections proportional to the overlap depth and the configured strength.
pub(super) fn apply_collisions(nodes: &mut [Node], strength: f32, scratch: &mut CollideScratch) {
    if nodes.len() < 2 {
        return;
    }

    scratch.predicted.clear();
    scratch.radii.clear();
    let mut max_radius = 0.0_f32;
    for node in nodes.iter() {
        scratch.predicted.push(node.pos + node.vel);
        scratch.radii.push(node.radius);
        max_radius = max_radius.max(node.radius);
    }

    if max_radius <= 0.0 {
        return;
    }

    scratch.corrections.clear();
    scratch.corrections.resize(nodes.len(), Vec2::ZERO);

    let Some(tree) = QuadTree::build(&scratch.predicted) else {
        return;
    };

    let max_pair_distance = max_radius * 2.0;
    let params = CollideParams {
        strength,
        max_gap_sq: max_pair_distance * max_pair_distance,
    };
    accumulate_pairs(
        &tree,
        &tree,
        true,
        &scratch.predicted,
        &scratch.radii,
        params,
        &mut scratch.corrections,
    );

    for (node, correction) in nodes.iter_mut().zip(&scratch.corrections) {
        node.vel += *correction;
    }
}

fn push_apart(
    from: usize,
    to: usize,
    positions: &[Vec2],
    radii: &[f32],
    strength: f32,
    corrections: &mut [Vec2],
) {
    let min_distance = radii[from] + radii[to];
    if min_distance <= 0.0 {
        return;
    }

    let delta = positions[from] - positions[to];
    let distance = delta.length();
    if distance >= min_distance {
        return;
    }

    let direction = if distance > 0.0001 {
        delta / distance
    } else {
        // Coincident centers: break symmetry with a deterministic angle
        // derived from the pair indices instead of dividing by zero.
        let angle = ((from as f32) * 0.618_034 + (to as f32) * 0.414_214) * TAU;
        vec2(angle.cos(), angle.sin())
    };

    let push = (min_distance - distance) * strength * 0.5;
    corrections[from] += direction * push;
    corrections[to] -= direction * push;
}

fn accumulate_pairs(
    node_a: &QuadTree,
    node_b: &QuadTree,
    same_node: bool,
    positions: &[Vec2],
    radii: &[f32],
    params: CollideParams,
    corrections: &mut [Vec2],
) {
    if node_a.bounds.gap_sq(node_b.bounds) > params.max_gap_sq {
        return;
    }

    if node_a.is_leaf() && node_b.is_leaf() {
        if same_node {
            for i in 0..node_a.indices.len() {
                for j in (i + 1)..node_a.indices.len() {
                    push_apart(
                        node_a.indices[i],
                        node_a.indices[j],
                        positions,
                        radii,
                        params.strength,
                        corrections,
                    );
                }
            }
        } else {
            for &from in &node_a.indices {
                for &to in &node_b.indices {
                    push_apart(from, to, positions, radii, params.strength, corrections);
                }
            }
        }
        return;
    }

    if same_node {
        for first in 0..4 {
            let Some(child_a) = node_a.children[first].as_ref() else {
                continue;
            };

            accumulate_pairs(child_a, child_a, true, positions, radii, params, corrections);

            for second in (first + 1)..4 {
                let Some(child_b) = node_a.children[second].as_ref() else {
                    continue;
                };
                accumulate_pairs(child_a, child_b, false, positions, radii, params, corrections);
            }
        }
        return;
    }

    let split_a = if node_a.is_leaf() {
        false
    } else if node_b.is_leaf() {
        true
    } else {
        node_a.bounds.half_extent >= node_b.bounds.half_extent
    };

    if split_a {
        for child in node_a.children.iter().flatten() {
            accumulate_pairs(child, node_b, false, positions, radii, params, corrections);
        }
    } else {
        for child in node_b.children.iter().flatten() {
            accumulate_pairs(node_a, child, false, positions, radii, params, corrections);
        }
    }
}
