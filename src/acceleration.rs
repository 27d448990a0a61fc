//! Fixed-point acceleration interface and implementations (component F,
//! §4.6).

use crate::coupling_data::CouplingDataMap;

/// Plugs into the implicit coupling scheme (§4.6). The scheme calls
/// `perform_acceleration` on failed iterations and `iterations_converged`
/// after a successful window. Implementations are free to mutate the
/// buffers in-place to provide the next predictor.
pub trait Acceleration {
    fn initialize(&mut self, data: &mut CouplingDataMap);
    fn perform_acceleration(&mut self, data: &mut CouplingDataMap);
    fn iterations_converged(&mut self, data: &mut CouplingDataMap);

    /// Number of columns in the current least-squares system, if any
    /// (quasi-Newton variants); constant-relaxation / Aitken report 0.
    fn ls_system_cols(&self) -> usize {
        0
    }
    fn deleted_columns(&self) -> usize {
        0
    }
    fn dropped_columns(&self) -> usize {
        0
    }
}

/// Under-relaxes every data field by a fixed factor: `x_{k+1} = x_k +
/// relaxation * (value - x_k)`, where `value` is whatever the scheme wrote
/// into `data.values` for this iteration and `x_k` is `previous_iteration`.
pub struct ConstantRelaxation {
    pub relaxation: f64,
}

impl ConstantRelaxation {
    pub fn new(relaxation: f64) -> Self {
        Self { relaxation }
    }
}

impl Acceleration for ConstantRelaxation {
    fn initialize(&mut self, _data: &mut CouplingDataMap) {}

    fn perform_acceleration(&mut self, data: &mut CouplingDataMap) {
        for cd in data.iter_mut() {
            for (v, prev) in cd.values.iter_mut().zip(cd.previous_iteration().to_vec()) {
                *v = prev + self.relaxation * (*v - prev);
            }
        }
    }

    fn iterations_converged(&mut self, _data: &mut CouplingDataMap) {}
}

/// Scalar Aitken Delta-squared relaxation: adapts a single relaxation
/// factor per iteration from the residual history, shared across all data.
pub struct AitkenAcceleration {
    pub initial_relaxation: f64,
    last_factor: Option<f64>,
    last_residual: Option<Vec<f64>>,
}

impl AitkenAcceleration {
    pub fn new(initial_relaxation: f64) -> Self {
        Self {
            initial_relaxation,
            last_factor: None,
            last_residual: None,
        }
    }
}

impl Acceleration for AitkenAcceleration {
    fn initialize(&mut self, _data: &mut CouplingDataMap) {
        self.last_factor = None;
        self.last_residual = None;
    }

    fn perform_acceleration(&mut self, data: &mut CouplingDataMap) {
        let mut residual = Vec::new();
        for cd in data.iter() {
            for (v, prev) in cd.values.iter().zip(cd.previous_iteration()) {
                residual.push(v - prev);
            }
        }

        let factor = match &self.last_residual {
            None => self.initial_relaxation,
            Some(prev_residual) if prev_residual.len() == residual.len() => {
                let diff: Vec<f64> = residual
                    .iter()
                    .zip(prev_residual)
                    .map(|(r, rp)| rp - r)
                    .collect();
                let dot_prev_diff: f64 = prev_residual.iter().zip(&diff).map(|(a, b)| a * b).sum();
                let dot_diff_diff: f64 = diff.iter().map(|d| d * d).sum();
                if dot_diff_diff.abs() < 1e-300 {
                    self.last_factor.unwrap_or(self.initial_relaxation)
                } else {
                    -self.last_factor.unwrap_or(self.initial_relaxation) * dot_prev_diff / dot_diff_diff
                }
            }
            _ => self.initial_relaxation,
        };
        // Keep the factor bounded away from zero and from overshoot.
        let factor = if factor.abs() < 1e-6 {
            self.initial_relaxation
        } else {
            factor.clamp(-1.0, 1.0)
        };

        for cd in data.iter_mut() {
            let prev = cd.previous_iteration().to_vec();
            for (v, p) in cd.values.iter_mut().zip(prev) {
                *v = p + factor * (*v - p);
            }
        }

        self.last_factor = Some(factor);
        self.last_residual = Some(residual);
    }

    fn iterations_converged(&mut self, _data: &mut CouplingDataMap) {
        self.last_factor = None;
        self.last_residual = None;
    }
}

/// A minimal interface-quasi-Newton-with-least-squares (IQN-ILS)
/// accelerator: maintains a bounded history of per-iteration residual and
/// solution differences ("V"/"W" columns) and reports their count via
/// `ls_system_cols`, enough to drive §8 scenario 4. The least-squares
/// solve itself uses a simple normal-equations fallback rather than a
/// pivoted QR, since the numerics of the real kernel are out of scope
/// (§1: numeric mapping/acceleration kernels are external collaborators).
pub struct IqnIlsAcceleration {
    pub initial_relaxation: f64,
    max_columns: usize,
    v_columns: Vec<Vec<f64>>, // residual differences
    w_columns: Vec<Vec<f64>>, // solution differences
    last_residual: Option<Vec<f64>>,
    last_values: Option<Vec<f64>>,
    deleted: usize,
    dropped: usize,
}

impl IqnIlsAcceleration {
    pub fn new(initial_relaxation: f64, max_columns: usize) -> Self {
        Self {
            initial_relaxation,
            max_columns,
            v_columns: Vec::new(),
            w_columns: Vec::new(),
            last_residual: None,
            last_values: None,
            deleted: 0,
            dropped: 0,
        }
    }

    fn flatten_residual(data: &CouplingDataMap) -> Vec<f64> {
        let mut out = Vec::new();
        for cd in data.iter() {
            for (v, prev) in cd.values.iter().zip(cd.previous_iteration()) {
                out.push(v - prev);
            }
        }
        out
    }

    fn flatten_values(data: &CouplingDataMap) -> Vec<f64> {
        let mut out = Vec::new();
        for cd in data.iter() {
            out.extend_from_slice(&cd.values);
        }
        out
    }

    fn scatter_values(data: &mut CouplingDataMap, flat: &[f64]) {
        let mut idx = 0;
        for cd in data.iter_mut() {
            let n = cd.values.len();
            cd.values.copy_from_slice(&flat[idx..idx + n]);
            idx += n;
        }
    }
}

impl Acceleration for IqnIlsAcceleration {
    fn initialize(&mut self, _data: &mut CouplingDataMap) {
        self.v_columns.clear();
        self.w_columns.clear();
        self.last_residual = None;
        self.last_values = None;
        self.deleted = 0;
        self.dropped = 0;
    }

    fn perform_acceleration(&mut self, data: &mut CouplingDataMap) {
        let residual = Self::flatten_residual(data);
        let values = Self::flatten_values(data);

        if let (Some(prev_r), Some(prev_v)) = (&self.last_residual, &self.last_values) {
            if prev_r.len() == residual.len() {
                let dv: Vec<f64> = residual.iter().zip(prev_r).map(|(a, b)| a - b).collect();
                let dw: Vec<f64> = values.iter().zip(prev_v).map(|(a, b)| a - b).collect();
                self.v_columns.push(dv);
                self.w_columns.push(dw);
                if self.v_columns.len() > self.max_columns {
                    self.v_columns.remove(0);
                    self.w_columns.remove(0);
                    self.dropped += 1;
                }
            }
        }

        // Least-squares coefficients via normal equations: minimize
        // ||V c + residual||^2. With few columns this is cheap and numerically
        // adequate for the scope of this crate.
        let k = self.v_columns.len();
        let next_values = if k == 0 {
            // No history yet: fall back to constant relaxation.
            values
                .iter()
                .zip(&data.iter().flat_map(|cd| cd.previous_iteration().to_vec()).collect::<Vec<_>>())
                .map(|(v, prev)| prev + self.initial_relaxation * (v - prev))
                .collect::<Vec<_>>()
        } else {
            let mut gram = vec![vec![0.0; k]; k];
            let mut rhs = vec![0.0; k];
            for i in 0..k {
                for j in 0..k {
                    gram[i][j] = dot(&self.v_columns[i], &self.v_columns[j]);
                }
                rhs[i] = -dot(&self.v_columns[i], &residual);
            }
            let c = solve_symmetric(&mut gram, &mut rhs);

            let mut delta_w = vec![0.0; values.len()];
            let mut delta_v = vec![0.0; values.len()];
            for i in 0..k {
                for (dwv, &w) in delta_w.iter_mut().zip(&self.w_columns[i]) {
                    *dwv += c[i] * w;
                }
                for (dvv, &v) in delta_v.iter_mut().zip(&self.v_columns[i]) {
                    *dvv += c[i] * v;
                }
            }
            // x_{k+1} = x_k + (delta_w - delta_v), the quasi-Newton update
            // once the least-squares coefficients `c` are known.
            values
                .iter()
                .zip(&delta_w)
                .zip(&delta_v)
                .map(|((v, dw), dv)| v + dw - dv)
                .collect::<Vec<_>>()
        };

        Self::scatter_values(data, &next_values);

        self.last_residual = Some(residual);
        self.last_values = Some(values);
    }

    fn iterations_converged(&mut self, _data: &mut CouplingDataMap) {
        self.last_residual = None;
        self.last_values = None;
    }

    fn ls_system_cols(&self) -> usize {
        self.v_columns.len()
    }

    fn deleted_columns(&self) -> usize {
        self.deleted
    }

    fn dropped_columns(&self) -> usize {
        self.dropped
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Solves a small symmetric linear system via Gauss-Jordan elimination with
/// partial pivoting. Adequate for the handful of columns kept by the
/// bounded IQN-ILS history above.
fn solve_symmetric(a: &mut [Vec<f64>], b: &mut [f64]) -> Vec<f64> {
    let n = b.len();
    for col in 0..n {
        let mut pivot_row = col;
        for row in (col + 1)..n {
            if a[row][col].abs() > a[pivot_row][col].abs() {
                pivot_row = row;
            }
        }
        a.swap(col, pivot_row);
        b.swap(col, pivot_row);
        let pivot = a[col][col];
        if pivot.abs() < 1e-14 {
            continue;
        }
        for row in (col + 1)..n {
            let factor = a[row][col] / pivot;
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }
    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let mut sum = b[i];
        for j in (i + 1)..n {
            sum -= a[i][j] * x[j];
        }
        x[i] = if a[i][i].abs() < 1e-14 { 0.0 } else { sum / a[i][i] };
    }
    x
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coupling_data::CouplingData;

    fn make_map(values: f64, prev: f64) -> CouplingDataMap {
        let mut map = CouplingDataMap::new();
        let cd = map.get_or_insert_with(1, || CouplingData::new(1, None, 1, 1, 0));
        cd.values = vec![prev];
        cd.store_iteration(); // sets previous_iteration = prev
        cd.values = vec![values];
        map
    }

    #[test]
    fn constant_relaxation_moves_toward_new_value() {
        let mut map = make_map(1.0, 0.0);
        map.get_mut(1).unwrap().values = vec![10.0];
        let mut acc = ConstantRelaxation::new(0.5);
        acc.perform_acceleration(&mut map);
        // previous_iteration is 0.0, current was 10.0: 0.0 + 0.5*10.0 = 5.0
        assert_eq!(map.get(1).unwrap().values, vec![5.0]);
    }

    #[test]
    fn iqn_ils_reports_growing_column_count() {
        let mut map = CouplingDataMap::new();
        map.get_or_insert_with(1, || CouplingData::new(1, None, 1, 1, 0));

        let mut acc = IqnIlsAcceleration::new(0.5, 8);
        acc.initialize(&mut map);

        map.get_mut(1).unwrap().values = vec![1.0];
        map.get_mut(1).unwrap().store_iteration();
        map.get_mut(1).unwrap().values = vec![2.0];
        acc.perform_acceleration(&mut map);
        assert_eq!(acc.ls_system_cols(), 0);

        map.get_mut(1).unwrap().store_iteration();
        map.get_mut(1).unwrap().values = vec![3.0];
        acc.perform_acceleration(&mut map);
        assert_eq!(acc.ls_system_cols(), 1);
    }
}
