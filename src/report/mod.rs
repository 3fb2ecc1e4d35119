//! Results of a speed check run and their exports
//!
//! The console report is written while the run progresses (see [`console`]).
//! The [`ProbeReport`] collected along the way can afterwards be saved as
//! JSON or CSV, or summarised in a table.

pub mod console;

use chrono::{DateTime, Utc};
use comfy_table::{presets::UTF8_FULL, Cell, CellAlignment, ContentArrangement, Table};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use sysinfo::System;

use crate::error::ProbeResult;
use crate::stats::TrialMeasurement;

pub use console::ConsoleReport;

/// Machine the run was taken on
#[derive(Debug, Clone, Serialize)]
pub struct HostInfo {
    pub os: String,
    pub cpu: String,
    pub logical_cores: usize,
    pub total_memory_bytes: u64,
}

impl HostInfo {
    pub fn collect() -> Self {
        let mut system = System::new();
        system.refresh_cpu_all();
        system.refresh_memory();

        let cpu = system
            .cpus()
            .first()
            .map(|cpu| cpu.brand().trim().to_string())
            .filter(|brand| !brand.is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        Self {
            os: os_info::get().to_string(),
            cpu,
            logical_cores: system.cpus().len(),
            total_memory_bytes: system.total_memory(),
        }
    }
}

/// Everything measured during one run
#[derive(Debug, Clone, Serialize)]
pub struct ProbeReport {
    pub bridge: String,
    pub generated_at: DateTime<Utc>,
    pub host: HostInfo,
    pub raw_call: TrialMeasurement,
    pub transfers: Vec<TrialMeasurement>,
}

#[derive(Serialize)]
struct CsvRow {
    operation: String,
    side: Option<usize>,
    elements: usize,
    repeats: usize,
    mean_ms: f64,
    median_ms: f64,
    min_ms: f64,
    max_ms: f64,
    stdev_ms: f64,
    p95_ms: f64,
}

impl CsvRow {
    fn from_trial(trial: &TrialMeasurement) -> Self {
        let ms = |seconds: f64| seconds * 1e3;
        let stats = trial.statistics.as_ref();
        Self {
            operation: trial.operation.to_string(),
            side: trial.side,
            elements: trial.elements,
            repeats: trial.repeats,
            mean_ms: trial.average().as_nanos() as f64 / 1e6,
            median_ms: stats.map_or(0.0, |s| ms(s.median)),
            min_ms: stats.map_or(0.0, |s| ms(s.min)),
            max_ms: stats.map_or(0.0, |s| ms(s.max)),
            stdev_ms: stats.map_or(0.0, |s| ms(s.stdev)),
            p95_ms: stats.map_or(0.0, |s| ms(s.p95)),
        }
    }
}

impl ProbeReport {
    /// Raw call first, then transfers in the order they ran.
    pub fn trials(&self) -> impl Iterator<Item = &TrialMeasurement> {
        std::iter::once(&self.raw_call).chain(self.transfers.iter())
    }

    pub fn write_json<W: Write>(&self, writer: W) -> ProbeResult<()> {
        serde_json::to_writer_pretty(writer, self)?;
        Ok(())
    }

    pub fn write_csv<W: Write>(&self, writer: W) -> ProbeResult<()> {
        let mut csv_writer = csv::Writer::from_writer(writer);
        for trial in self.trials() {
            csv_writer.serialize(CsvRow::from_trial(trial))?;
        }
        csv_writer.flush()?;
        Ok(())
    }

    pub fn save_json(&self, path: &Path) -> ProbeResult<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json(&mut writer)?;
        writeln!(writer)?;
        writer.flush()?;
        Ok(())
    }

    pub fn save_csv(&self, path: &Path) -> ProbeResult<()> {
        self.write_csv(BufWriter::new(File::create(path)?))
    }

    /// Per-trial summary for the terminal
    pub fn summary_table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic)
            .set_header(vec![
                "Operation", "Size", "Repeats", "Mean (ms)", "Median (ms)", "Min (ms)", "Max (ms)", "P95 (ms)",
            ]);

        for trial in self.trials() {
            let row = CsvRow::from_trial(trial);
            let size = trial
                .side
                .map_or_else(|| "-".to_string(), |side| format!("{}x{}", side, side));
            table.add_row(vec![
                Cell::new(row.operation),
                Cell::new(size),
                Cell::new(row.repeats).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4}", row.mean_ms)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4}", row.median_ms)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4}", row.min_ms)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4}", row.max_ms)).set_alignment(CellAlignment::Right),
                Cell::new(format!("{:.4}", row.p95_ms)).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }
}
