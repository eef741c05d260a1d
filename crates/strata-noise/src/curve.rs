//! Piecewise-linear remapping curves over `[0, 1]`.

/// A piecewise-linear function from `[0, 1]` to `[0, 1]` defined by control points.
///
/// Used to reshape the distribution of raw noise values, e.g. to flatten
/// lowlands or sharpen ridges. A curve must contain control points at
/// `x = 0` and `x = 1` before it can be queried.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Curve {
    /// Control points sorted by ascending `x`. Keys are unique.
    nodes: Vec<(f32, f32)>,
}

impl Curve {
    /// Create an empty curve.
    pub fn new() -> Self {
        Self::default()
    }

    /// The identity curve `y = x`.
    pub fn linear() -> Self {
        Self::from_nodes(&[(0.0, 0.0), (1.0, 1.0)])
    }

    /// Build a curve from a list of `(x, y)` control points in any order.
    pub fn from_nodes(nodes: &[(f32, f32)]) -> Self {
        let mut curve = Self::new();
        for &(x, y) in nodes {
            curve.add_node(x, y);
        }
        curve
    }

    /// Insert a control point. An existing point with the same `x` is replaced.
    ///
    /// # Panics
    ///
    /// Panics if `x` or `y` lies outside `[0, 1]`.
    pub fn add_node(&mut self, x: f32, y: f32) {
        assert!(
            (0.0..=1.0).contains(&x) && (0.0..=1.0).contains(&y),
            "curve control point ({x}, {y}) must lie in [0, 1]"
        );

        match self.nodes.binary_search_by(|(nx, _)| nx.total_cmp(&x)) {
            Ok(idx) => self.nodes[idx].1 = y,
            Err(idx) => self.nodes.insert(idx, (x, y)),
        }
    }

    /// The control points, sorted by `x`.
    pub fn nodes(&self) -> &[(f32, f32)] {
        &self.nodes
    }

    /// Returns `true` if the curve has control points at both `x = 0` and `x = 1`.
    pub fn is_complete(&self) -> bool {
        matches!(self.nodes.first(), Some(&(x, _)) if x == 0.0)
            && matches!(self.nodes.last(), Some(&(x, _)) if x == 1.0)
    }

    /// Evaluate the curve at `x`.
    ///
    /// Inputs outside `[0, 1]` are clamped to the end points. Between two
    /// control points the result is the linear interpolation of their `y`
    /// values, so it never overshoots the bracketing values.
    ///
    /// # Panics
    ///
    /// Panics if the curve lacks control points at `x = 0` or `x = 1`.
    pub fn value(&self, x: f32) -> f32 {
        assert!(
            self.is_complete(),
            "curve needs control points at x = 0 and x = 1 to be evaluated"
        );

        let x = if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) };

        // First node with a key strictly greater than x; the bracket is [upper - 1, upper].
        let upper = self.nodes.partition_point(|&(nx, _)| nx <= x);
        if upper == self.nodes.len() {
            return self.nodes[upper - 1].1;
        }

        let (x0, y0) = self.nodes[upper - 1];
        let (x1, y1) = self.nodes[upper];
        let t = (x - x0) / (x1 - x0);
        y0 + (y1 - y0) * t
    }
}
