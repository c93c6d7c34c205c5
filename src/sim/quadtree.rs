use eframe::egui::{Vec2, vec2};

const LEAF_CAPACITY: usize = 8;
const MAX_DEPTH: usize = 12;

#[derive(Clone, Copy)]
pub(super) struct Bounds {
    pub(super) center: Vec2,
    pub(super) half_extent: f32,
}

impl Bounds {
    fn enclosing(points: &[Vec2]) -> Option<Self> {
        let mut min = vec2(f32::INFINITY, f32::INFINITY);
        let mut max = vec2(f32::NEG_INFINITY, f32::NEG_INFINITY);

        for point in points {
            min.x = min.x.min(point.x);
            min.y = min.y.min(point.y);
            max.x = max.x.max(point.x);
            max.y = max.y.max(point.y);
        }

        if !min.x.is_finite() || !min.y.is_finite() || !max.x.is_finite() || !max.y.is_finite() {
            return None;
        }

        let span = (max.x - min.x).max(max.y - min.y).max(1.0);
        Some(Self {
            center: (min + max) * 0.5,
            half_extent: (span * 0.5) + 1.0,
        })
    }

    fn child(self, quadrant: usize) -> Self {
        let quarter = self.half_extent * 0.5;
        let offset = match quadrant {
            0 => vec2(-quarter, -quarter),
            1 => vec2(quarter, -quarter),
            2 => vec2(-quarter, quarter),
            _ => vec2(quarter, quarter),
        };

        Self {
            center: self.center + offset,
            half_extent: quarter,
        }
    }

    fn quadrant_for(self, point: Vec2) -> usize {
        let right = point.x >= self.center.x;
        let lower = point.y >= self.center.y;
        match (right, lower) {
            (false, false) => 0,
            (true, false) => 1,
            (false, true) => 2,
            (true, true) => 3,
        }
    }

    /// Squared gap between two axis-aligned squares, 0 when they touch or
    /// overlap. Used to prune subtree pairs that cannot contain colliding
    /// circles.
    pub(super) fn gap_sq(self, other: Self) -> f32 {
        let dx = (self.center.x - other.center.x).abs() - (self.half_extent + other.half_extent);
        let dy = (self.center.y - other.center.y).abs() - (self.half_extent + other.half_extent);
        let dx = dx.max(0.0);
        let dy = dy.max(0.0);
        (dx * dx) + (dy * dy)
    }
}

/// Point index over node positions so collision detection avoids scanning
/// every pair.
pub(super) struct QuadTree {
    pub(super) bounds: Bounds,
    pub(super) indices: Vec<usize>,
    pub(super) children: [Option<Box<QuadTree>>; 4],
}

impl QuadTree {
    /// Returns `None` when any position is non-finite; callers skip collision
    /// resolution for that pass rather than propagate bad geometry.
    pub(super) fn build(points: &[Vec2]) -> Option<Self> {
        let bounds = Bounds::enclosing(points)?;
        let indices = (0..points.len()).collect::<Vec<_>>();
        Some(Self::build_node(bounds, indices, points, 0))
    }

    fn build_node(bounds: Bounds, indices: Vec<usize>, points: &[Vec2], depth: usize) -> Self {
        let mut node = Self {
            bounds,
            indices,
            children: std::array::from_fn(|_| None),
        };

        if depth >= MAX_DEPTH || node.indices.len() <= LEAF_CAPACITY {
            return node;
        }

        let mut buckets = std::array::from_fn::<_, 4, _>(|_| Vec::new());
        for &index in &node.indices {
            buckets[bounds.quadrant_for(points[index])].push(index);
        }

        // Coincident points all land in one bucket; splitting would recurse
        // without progress.
        let occupied = buckets.iter().filter(|bucket| !bucket.is_empty()).count();
        if occupied <= 1 {
            return node;
        }

        for (quadrant, bucket) in buckets.into_iter().enumerate() {
            if bucket.is_empty() {
                continue;
            }
            node.children[quadrant] = Some(Box::new(Self::build_node(
                bounds.child(quadrant),
                bucket,
                points,
                depth + 1,
            )));
        }
        node.indices.clear();
        node
    }

    pub(super) fn is_leaf(&self) -> bool {
        self.children.iter().all(|child| child.is_none())
    }
}
