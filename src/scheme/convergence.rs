//! Convergence measures used by implicit coupling schemes (§4.5 step 2).

/// The verdict from one configured convergence measure.
pub struct MeasureResult {
    pub converged: bool,
    /// "Sufficient": if this measure alone converges and no strict measure
    /// is unmet, the overall window is considered converged (§4.5).
    pub suffices: bool,
    /// "Strict": if this measure fails at `_iterations == _maxIterations`,
    /// the window is fatal rather than forced-converged (§4.5).
    pub strict: bool,
    /// The residual norm this measure computed, carried through to the §6
    /// convergence log's `Res<name>` column.
    pub value: f64,
}

/// One data field's convergence test between the previous and current
/// iteration (§4.5 step 2: "each compares `previousIteration` to current
/// `values`").
pub trait ConvergenceMeasure {
    fn measure(&mut self, previous: &[f64], current: &[f64]) -> MeasureResult;
    /// A short abbreviation used in the `Res<abbrev>(dataName)` log column
    /// header (§6).
    fn abbreviation(&self) -> &'static str;
}

/// Converges when the absolute two-norm of the residual is below `limit`.
pub struct AbsoluteConvergenceMeasure {
    pub limit: f64,
    pub suffices: bool,
    pub strict: bool,
}

impl ConvergenceMeasure for AbsoluteConvergenceMeasure {
    fn measure(&mut self, previous: &[f64], current: &[f64]) -> MeasureResult {
        let norm: f64 = previous
            .iter()
            .zip(current)
            .map(|(p, c)| (c - p).powi(2))
            .sum::<f64>()
            .sqrt();
        MeasureResult {
            converged: norm <= self.limit,
            suffices: self.suffices,
            strict: self.strict,
            value: norm,
        }
    }

    fn abbreviation(&self) -> &'static str {
        "Abs"
    }
}

/// Converges when the relative two-norm of the residual (normalized by the
/// norm of `current`) is below `limit`.
pub struct RelativeConvergenceMeasure {
    pub limit: f64,
    pub suffices: bool,
    pub strict: bool,
}

impl ConvergenceMeasure for RelativeConvergenceMeasure {
    fn measure(&mut self, previous: &[f64], current: &[f64]) -> MeasureResult {
        let norm: f64 = previous
            .iter()
            .zip(current)
            .map(|(p, c)| (c - p).powi(2))
            .sum::<f64>()
            .sqrt();
        let scale: f64 = current.iter().map(|c| c * c).sum::<f64>().sqrt().max(1e-300);
        MeasureResult {
            converged: norm / scale <= self.limit,
            suffices: self.suffices,
            strict: self.strict,
            value: norm / scale,
        }
    }

    fn abbreviation(&self) -> &'static str {
        "Rel"
    }
}

/// Overall convergence per §4.5: "(all converged) OR (any sufficient AND no
/// strict measure unmet)". A strict measure failing at the iteration cap is
/// the caller's responsibility to treat as fatal (§4.5 step 2).
pub fn overall_converged(results: &[MeasureResult]) -> bool {
    if results.is_empty() {
        return true;
    }
    let all_converged = results.iter().all(|r| r.converged);
    let any_sufficient = results.iter().any(|r| r.converged && r.suffices);
    let no_strict_unmet = !results.iter().any(|r| r.strict && !r.converged);
    all_converged || (any_sufficient && no_strict_unmet)
}

/// True if a strict measure remains unmet; the caller treats this as fatal
/// when it holds at the iteration cap (§4.5 step 2).
pub fn any_strict_unmet(results: &[MeasureResult]) -> bool {
    results.iter().any(|r| r.strict && !r.converged)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absolute_measure_converges_within_limit() {
        let mut m = AbsoluteConvergenceMeasure {
            limit: 1e-6,
            suffices: false,
            strict: false,
        };
        let r = m.measure(&[1.0], &[1.0000001]);
        assert!(r.converged);
        let r = m.measure(&[1.0], &[1.1]);
        assert!(!r.converged);
    }

    #[test]
    fn overall_convergence_all_must_converge_without_sufficiency() {
        let results = vec![
            MeasureResult { converged: true, suffices: false, strict: false, value: 0.0 },
            MeasureResult { converged: false, suffices: false, strict: false, value: 1.0 },
        ];
        assert!(!overall_converged(&results));
    }

    #[test]
    fn sufficient_measure_overrides_when_no_strict_unmet() {
        let results = vec![
            MeasureResult { converged: true, suffices: true, strict: false, value: 0.0 },
            MeasureResult { converged: false, suffices: false, strict: false, value: 1.0 },
        ];
        assert!(overall_converged(&results));
    }

    #[test]
    fn strict_unmet_blocks_sufficiency() {
        let results = vec![
            MeasureResult { converged: true, suffices: true, strict: false, value: 0.0 },
            MeasureResult { converged: false, suffices: false, strict: true, value: 1.0 },
        ];
        assert!(!overall_converged(&results));
    }

    #[test]
    fn any_strict_unmet_detects_a_failing_strict_measure() {
        let results = vec![
            MeasureResult { converged: true, suffices: false, strict: false, value: 0.0 },
            MeasureResult { converged: false, suffices: false, strict: true, value: 1.0 },
        ];
        assert!(any_strict_unmet(&results));

        let results = vec![MeasureResult { converged: true, suffices: false, strict: true, value: 0.0 }];
        assert!(!any_strict_unmet(&results));
    }
}
