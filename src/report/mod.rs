use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::workflow::{UpdateResult, UpdateStatus};

const FILE_PREFIX: &str = "shareholder_update";

/// Collects one result per attempted company, in processing order.
pub struct RunReporter {
    results: Vec<UpdateResult>,
    started_at: DateTime<Local>,
    echo: bool,
}

/// Paths of the exported report files.
#[derive(Debug, Clone)]
pub struct ReportFiles {
    pub csv: PathBuf,
    pub json: PathBuf,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub divergent: usize,
    pub captcha_failed: usize,
    pub errors: usize,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} companies: {} updated, {} with shareholder divergence, {} captcha failures, {} errors",
            self.total, self.succeeded, self.divergent, self.captcha_failed, self.errors
        )
    }
}

#[derive(Serialize)]
struct CsvRow<'a> {
    company: &'a str,
    tax_id: &'a str,
    status: UpdateStatus,
    changes: usize,
    notes: &'a str,
}

impl RunReporter {
    pub fn new() -> Self {
        Self {
            results: Vec::new(),
            started_at: Local::now(),
            echo: true,
        }
    }

    /// A reporter that does not print status lines.
    pub fn quiet() -> Self {
        Self {
            echo: false,
            ..Self::new()
        }
    }

    pub fn record(&mut self, result: UpdateResult) {
        tracing::info!(
            company = %result.company,
            tax_id = %result.tax_id,
            status = %result.status,
            differences = result.differences.len(),
            "Company processed"
        );
        if self.echo {
            println!("{}", status_line(&result));
        }
        self.results.push(result);
    }

    pub fn results(&self) -> &[UpdateResult] {
        &self.results
    }

    pub fn summary(&self) -> RunSummary {
        let mut summary = RunSummary {
            total: self.results.len(),
            ..RunSummary::default()
        };
        for result in &self.results {
            match result.status {
                UpdateStatus::Success => summary.succeeded += 1,
                UpdateStatus::DivergenceFound => summary.divergent += 1,
                UpdateStatus::CaptchaFailed => summary.captcha_failed += 1,
                UpdateStatus::Error => summary.errors += 1,
            }
        }
        summary
    }

    /// Write the tabular and the detailed report into `dir`.
    pub fn export(&self, dir: &Path) -> Result<ReportFiles> {
        std::fs::create_dir_all(dir).map_err(|e| {
            AppError::Report(format!("Failed to create {}: {e}", dir.display()))
        })?;

        let stamp = self.started_at.format("%Y%m%d_%H%M%S");
        let files = ReportFiles {
            csv: dir.join(format!("{FILE_PREFIX}_{stamp}.csv")),
            json: dir.join(format!("{FILE_PREFIX}_{stamp}.json")),
        };

        write_csv(&self.results, File::create(&files.csv)?)?;
        write_json(&self.results, File::create(&files.json)?)?;

        tracing::info!(
            csv = %files.csv.display(),
            json = %files.json.display(),
            companies = self.results.len(),
            "Report exported"
        );

        Ok(files)
    }
}

impl Default for RunReporter {
    fn default() -> Self {
        Self::new()
    }
}

/// One row per company: name, tax id, status, change count, notes.
pub fn write_csv<W: Write>(results: &[UpdateResult], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for result in results {
        wtr.serialize(CsvRow {
            company: &result.company,
            tax_id: &result.tax_id,
            status: result.status,
            changes: result.differences.len(),
            notes: &result.notes,
        })?;
    }
    wtr.flush()?;
    Ok(())
}

/// Full results, differences included, as a pretty JSON array.
pub fn write_json<W: Write>(results: &[UpdateResult], writer: W) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, results)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
}

/// Human-readable line printed as each company completes.
pub fn status_line(result: &UpdateResult) -> String {
    let mut line = format!("[{}] {}", result.status, result.company);
    if !result.tax_id.is_empty() {
        line.push_str(&format!(" ({})", result.tax_id));
    }
    if !result.differences.is_empty() {
        line.push_str(&format!(" - {}", result.differences.join(", ")));
    }
    if !result.notes.is_empty() {
        line.push_str(&format!(" - {}", result.notes));
    }
    line
}
