use serde::Serialize;

/// `y = slope * x + intercept`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LinearTransform {
    pub slope: f64,
    pub intercept: f64,
}

impl LinearTransform {
    pub const IDENTITY: Self = Self::new(1.0, 0.0);

    pub const fn new(slope: f64, intercept: f64) -> Self {
        Self { slope, intercept }
    }

    pub const fn scale(factor: f64) -> Self {
        Self::new(factor, 0.0)
    }

    pub fn apply(self, value: f64) -> f64 {
        self.slope * value + self.intercept
    }

    /// Apply `self` first, then `next`.
    pub fn then(self, next: Self) -> Self {
        Self::new(next.slope * self.slope, next.slope * self.intercept + next.intercept)
    }

    /// The reverse transform; the caller guarantees a non-zero slope.
    pub fn inverse(self) -> Self {
        Self::new(1.0 / self.slope, -self.intercept / self.slope)
    }

    pub fn approx_eq(self, other: Self, rel: f64) -> bool {
        let close = |a: f64, b: f64| (a - b).abs() <= rel * a.abs().max(b.abs()).max(1.0);
        close(self.slope, other.slope) && close(self.intercept, other.intercept)
    }
}
