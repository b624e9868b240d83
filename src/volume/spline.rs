/// One-dimensional natural cubic spline through a set of knots.
///
/// Second derivatives vanish at both ends. With two knots the spline is the
/// straight line between them. The spline passes exactly through every knot.
#[derive(Debug, Clone)]
pub(crate) struct NaturalCubicSpline {
    knots: Vec<f64>,
    values: Vec<f64>,
    second: Vec<f64>,
}

impl NaturalCubicSpline {
    /// Fits the spline. `knots` must be strictly increasing with at least two
    /// entries and `values` must have the same length; callers validate both.
    pub fn new(knots: &[f64], values: &[f64]) -> Self {
        let n = knots.len();
        let mut second = vec![0.0; n];

        if n > 2 {
            let m = n - 2;
            let mut diag = vec![0.0; m];
            let mut upper = vec![0.0; m];
            let mut rhs = vec![0.0; m];
            for r in 0..m {
                let i = r + 1;
                let h0 = knots[i] - knots[i - 1];
                let h1 = knots[i + 1] - knots[i];
                diag[r] = 2.0 * (h0 + h1);
                upper[r] = h1;
                rhs[r] = 6.0 * ((values[i + 1] - values[i]) / h1 - (values[i] - values[i - 1]) / h0);
            }

            // Thomas algorithm on the symmetric tridiagonal system.
            for r in 1..m {
                let lower = knots[r + 1] - knots[r];
                let w = lower / diag[r - 1];
                diag[r] -= w * upper[r - 1];
                rhs[r] -= w * rhs[r - 1];
            }
            second[m] = rhs[m - 1] / diag[m - 1];
            for r in (0..m - 1).rev() {
                second[r + 1] = (rhs[r] - upper[r] * second[r + 2]) / diag[r];
            }
        }

        Self {
            knots: knots.to_vec(),
            values: values.to_vec(),
            second,
        }
    }

    /// Evaluates the spline at `x`. Points outside the knot range follow the
    /// nearest end polynomial; callers bound-check beforehand.
    pub fn evaluate(&self, x: f64) -> f64 {
        let n = self.knots.len();
        let hi = self.knots.partition_point(|&k| k < x).clamp(1, n - 1);
        let lo = hi - 1;
        let h = self.knots[hi] - self.knots[lo];
        let a = (self.knots[hi] - x) / h;
        let b = (x - self.knots[lo]) / h;
        a * self.values[lo]
            + b * self.values[hi]
            + ((a * a * a - a) * self.second[lo] + (b * b * b - b) * self.second[hi]) * h * h / 6.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx_eq(a: f64, b: f64, eps: f64) -> bool {
        (a - b).abs() <= eps
    }

    #[test]
    fn passes_through_every_knot() {
        let knots = [0.0, 1.0, 2.5, 4.0, 5.0];
        let values = [0.3, -1.0, 2.0, 0.5, 0.0];
        let spline = NaturalCubicSpline::new(&knots, &values);
        for (k, v) in knots.iter().zip(values.iter()) {
            assert!(approx_eq(spline.evaluate(*k), *v, 1e-12));
        }
    }

    #[test]
    fn reproduces_linear_data_exactly() {
        let knots = [0.0, 1.0, 3.0, 4.0];
        let values: Vec<f64> = knots.iter().map(|x| 2.0 * x - 1.0).collect();
        let spline = NaturalCubicSpline::new(&knots, &values);
        for x in [0.25, 1.5, 2.9, 3.75] {
            assert!(approx_eq(spline.evaluate(x), 2.0 * x - 1.0, 1e-12));
        }
    }

    #[test]
    fn two_knots_interpolate_linearly() {
        let spline = NaturalCubicSpline::new(&[0.0, 2.0], &[1.0, 3.0]);
        assert!(approx_eq(spline.evaluate(0.5), 1.5, 1e-12));
    }

    #[test]
    fn is_smooth_between_knots() {
        let knots = [0.0, 1.0, 2.0, 3.0];
        let values = [0.0, 1.0, 0.0, 1.0];
        let spline = NaturalCubicSpline::new(&knots, &values);
        let eps = 1e-6;
        let left = (spline.evaluate(1.0) - spline.evaluate(1.0 - eps)) / eps;
        let right = (spline.evaluate(1.0 + eps) - spline.evaluate(1.0)) / eps;
        assert!(approx_eq(left, right, 1e-4));
    }
}
