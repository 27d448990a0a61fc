//! Tab-separated iteration/convergence log writers (§6 "Logs and exports").
//!
//! Written by the primary rank only; callers decide whether the current
//! process holds that role (the scheme's `Role::First` for bi-participant
//! schemes, or rank 0 of the central participant for `MultiCoupling`).

use crate::error::{CoreError, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// One row of either log file. `residuals` is empty for the iterations log
/// and has one entry per logging convergence measure for the convergence
/// log.
pub struct LogRow {
    pub time_window: i64,
    pub total_iterations: i64,
    pub iterations: i64,
    pub converged: bool,
    pub qn_columns: Option<usize>,
    pub deleted_qn_columns: Option<usize>,
    pub dropped_qn_columns: Option<usize>,
    pub residuals: Vec<(String, f64)>,
}

/// Writes `precice-<participant>-iterations.log` and
/// `precice-<participant>-convergence.log` as tab-separated text.
pub struct IterationLogWriter {
    iterations: BufWriter<File>,
    convergence: BufWriter<File>,
    residual_names: Vec<String>,
}

impl IterationLogWriter {
    /// Creates both log files under `dir`, writing their header rows.
    /// `residual_names` are the abbreviated data names (`Res<abbrev>`) the
    /// convergence log will carry one column per.
    pub fn create(dir: &Path, participant_name: &str, residual_names: Vec<String>) -> Result<Self> {
        let iterations_path = dir.join(format!("precice-{}-iterations.log", participant_name));
        let convergence_path = dir.join(format!("precice-{}-convergence.log", participant_name));

        let mut iterations = BufWriter::new(
            File::create(&iterations_path)
                .map_err(|e| CoreError::transport(format!("cannot create {}: {}", iterations_path.display(), e)))?,
        );
        let mut convergence = BufWriter::new(
            File::create(&convergence_path)
                .map_err(|e| CoreError::transport(format!("cannot create {}: {}", convergence_path.display(), e)))?,
        );

        writeln!(iterations, "TimeWindow\tTotalIterations\tIterations\tConvergence\tQNColumns\tDeletedQNColumns\tDroppedQNColumns")
            .map_err(|e| CoreError::transport(e.to_string()))?;

        write!(convergence, "TimeWindow\tTotalIterations\tIterations\tConvergence").map_err(|e| CoreError::transport(e.to_string()))?;
        for name in &residual_names {
            write!(convergence, "\tRes{}", name).map_err(|e| CoreError::transport(e.to_string()))?;
        }
        writeln!(convergence).map_err(|e| CoreError::transport(e.to_string()))?;

        Ok(Self {
            iterations,
            convergence,
            residual_names,
        })
    }

    pub fn write_row(&mut self, row: &LogRow) -> Result<()> {
        writeln!(
            self.iterations,
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            row.time_window,
            row.total_iterations,
            row.iterations,
            row.converged as i32,
            row.qn_columns.unwrap_or(0),
            row.deleted_qn_columns.unwrap_or(0),
            row.dropped_qn_columns.unwrap_or(0),
        )
        .map_err(|e| CoreError::transport(e.to_string()))?;

        write!(
            self.convergence,
            "{}\t{}\t{}\t{}",
            row.time_window, row.total_iterations, row.iterations, row.converged as i32
        )
        .map_err(|e| CoreError::transport(e.to_string()))?;
        for name in &self.residual_names {
            let value = row
                .residuals
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, v)| *v)
                .unwrap_or(f64::NAN);
            write!(self.convergence, "\t{}", value).map_err(|e| CoreError::transport(e.to_string()))?;
        }
        writeln!(self.convergence).map_err(|e| CoreError::transport(e.to_string()))?;

        self.iterations.flush().map_err(|e| CoreError::transport(e.to_string()))?;
        self.convergence.flush().map_err(|e| CoreError::transport(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn writes_header_and_row_with_residual_columns() {
        let dir = std::env::temp_dir().join("coupling-core-iteration-log-test");
        fs::create_dir_all(&dir).unwrap();
        let mut writer = IterationLogWriter::create(&dir, "A", vec!["Forces".to_string()]).unwrap();
        writer
            .write_row(&LogRow {
                time_window: 1,
                total_iterations: 3,
                iterations: 3,
                converged: true,
                qn_columns: Some(2),
                deleted_qn_columns: Some(0),
                dropped_qn_columns: Some(0),
                residuals: vec![("Forces".to_string(), 1.0e-6)],
            })
            .unwrap();

        let convergence = fs::read_to_string(dir.join("precice-A-convergence.log")).unwrap();
        assert!(convergence.starts_with("TimeWindow\tTotalIterations\tIterations\tConvergence\tResForces\n"));
        assert_eq!(convergence.lines().nth(1).unwrap(), "1\t3\t3\t1\t0.000001");

        let iterations = fs::read_to_string(dir.join("precice-A-iterations.log")).unwrap();
        assert!(iterations.starts_with("TimeWindow\tTotalIterations\tIterations\tConvergence\tQNColumns\tDeletedQNColumns\tDroppedQNColumns\n"));

        let _ = fs::remove_dir_all(&dir);
    }
}
