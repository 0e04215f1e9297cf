// SPDX-License-Identifier: MIT OR Apache-2.0

#![forbid(unsafe_code)]

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use drd_core::{DrdError, Summary};

use crate::processor::ProcessedEntity;

const SERIES_FILE: &str = "series.csv";
const CHANGEPOINTS_FILE: &str = "changepoints.csv";
const SUMMARY_FILE: &str = "summary.csv";

fn io_err(context: &str, path: &Path, err: std::io::Error) -> DrdError {
    DrdError::io(format!("{context} '{}'", path.display()), err)
}

/// Writes one completed entity's artifacts under `<root>/<entity_id>/`:
/// the aligned series with its trend and deviation columns, and the
/// surviving changepoints. Only completed entities get a directory.
pub fn write_entity_artifacts(root: &Path, processed: &ProcessedEntity) -> Result<(), DrdError> {
    let aligned = &processed.aligned;
    let series = aligned.series();
    let dir = root.join(series.id().as_str());
    fs::create_dir_all(&dir).map_err(|err| io_err("failed creating entity directory", &dir, err))?;

    let series_path = dir.join(SERIES_FILE);
    let file = File::create(&series_path)
        .map_err(|err| io_err("failed creating series file", &series_path, err))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "date,observed,trend,deviation")
        .map_err(|err| io_err("failed writing series file", &series_path, err))?;
    let trend = aligned.decomposition().trend();
    for (i, date) in series.dates().iter().enumerate() {
        writeln!(
            out,
            "{date},{},{},{}",
            series.values()[i],
            trend[i],
            aligned.deviations()[i]
        )
        .map_err(|err| io_err("failed writing series file", &series_path, err))?;
    }
    out.flush()
        .map_err(|err| io_err("failed flushing series file", &series_path, err))?;

    let cps_path = dir.join(CHANGEPOINTS_FILE);
    let file = File::create(&cps_path)
        .map_err(|err| io_err("failed creating changepoints file", &cps_path, err))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "index,date,pre_value,post_value")
        .map_err(|err| io_err("failed writing changepoints file", &cps_path, err))?;
    for &cp in aligned.decomposition().changepoints() {
        // Construction guarantees both the date and the successor value.
        let date = aligned
            .date_at(cp)
            .ok_or_else(|| DrdError::invalid_input(format!("changepoint {cp} out of range")))?;
        writeln!(out, "{cp},{date},{},{}", trend[cp], trend[cp + 1])
            .map_err(|err| io_err("failed writing changepoints file", &cps_path, err))?;
    }
    out.flush()
        .map_err(|err| io_err("failed flushing changepoints file", &cps_path, err))?;

    Ok(())
}

/// Writes the population summary at `<root>/summary.csv`, one row per
/// completed entity in the summary's (id-sorted) order. Absent optional
/// values are encoded as `NA`.
pub fn write_summary_csv(root: &Path, summary: &Summary) -> Result<(), DrdError> {
    fs::create_dir_all(root).map_err(|err| io_err("failed creating output directory", root, err))?;
    let path = root.join(SUMMARY_FILE);
    let file =
        File::create(&path).map_err(|err| io_err("failed creating summary file", &path, err))?;
    let mut out = BufWriter::new(file);

    writeln!(
        out,
        "entity_id,disturbance_date,disturbance_index,drop_magnitude,t_stat,p_value,cohens_d,recovery_date,recovery_duration_days,recovery_method,recovery_slope,full_cycle,r_squared,rmse"
    )
    .map_err(|err| io_err("failed writing summary file", &path, err))?;

    for row in summary.results() {
        let cohens_d = row
            .significance
            .cohens_d
            .map_or_else(|| "NA".to_string(), |d| format!("{d:.4}"));
        let recovery_date = row
            .recovery
            .date
            .map_or_else(|| "NA".to_string(), |d| d.to_string());
        let duration = row
            .recovery
            .duration_days
            .map_or_else(|| "NA".to_string(), |d| d.to_string());
        let slope = row
            .recovery_slope
            .map_or_else(|| "NA".to_string(), |s| format!("{s:.4}"));
        writeln!(
            out,
            "{},{},{},{:.4},{:.4},{:.6},{},{},{},{},{},{},{:.4},{:.4}",
            row.id,
            row.disturbance_date,
            row.disturbance_index,
            row.drop_magnitude,
            row.significance.t_stat,
            row.significance.p_value,
            cohens_d,
            recovery_date,
            duration,
            row.recovery.method.as_str(),
            slope,
            row.full_cycle,
            row.fit.r_squared,
            row.fit.rmse
        )
        .map_err(|err| io_err("failed writing summary file", &path, err))?;
    }
    out.flush()
        .map_err(|err| io_err("failed flushing summary file", &path, err))
}
