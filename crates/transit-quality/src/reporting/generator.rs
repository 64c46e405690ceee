use crate::config::KeyColumns;
use crate::error::Result;
use crate::scoring::PredictionTable;
use crate::stops::Stop;
use crate::types::CleaningSummary;
use chrono::Local;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::info;

/// JSON report of one cleaning run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleaningReport {
    /// Timestamp when the report was generated
    pub generated_at: String,
    pub input_file: String,
    pub output_file: Option<String>,
    pub summary: CleaningSummary,
    /// Missing values filled per field
    pub filled_by_field: BTreeMap<String, usize>,
    pub total_outliers: usize,
}

/// Writes tables and JSON artifacts to an output directory.
///
/// The directory is created on first write.
#[derive(Debug, Clone)]
pub struct ReportGenerator {
    output_dir: PathBuf,
    utf8_bom: bool,
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::new(PathBuf::from("output"))
    }
}

impl ReportGenerator {
    /// CSV files get a UTF-8 byte order mark so spreadsheet tools detect
    /// the Korean headers. Use [`without_bom`](Self::without_bom) to disable.
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            utf8_bom: true,
        }
    }

    pub fn without_bom(mut self) -> Self {
        self.utf8_bom = false;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Write `df` as `<file_stem>.csv`.
    pub fn write_table(&self, df: &mut DataFrame, file_stem: &str) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(format!("{}.csv", file_stem));
        let mut file = File::create(&path)?;

        CsvWriter::new(&mut file)
            .include_bom(self.utf8_bom)
            .include_header(true)
            .with_separator(b',')
            .finish(df)?;

        info!("Table saved: {} ({} rows)", path.display(), df.height());
        Ok(path)
    }

    /// Write the flat prediction table as `pred_table_<name>.csv`.
    pub fn write_prediction_table(
        &self,
        predictions: &PredictionTable,
        columns: &KeyColumns,
        name: &str,
    ) -> Result<PathBuf> {
        let mut df = predictions.to_dataframe(columns)?;
        self.write_table(&mut df, &format!("pred_table_{}", name))
    }

    /// Write the nested lookup as compact `predictions_<name>.json`.
    pub fn write_lookup_json(
        &self,
        predictions: &PredictionTable,
        decimals: u32,
        name: &str,
    ) -> Result<PathBuf> {
        let lookup = predictions.to_lookup_json(decimals);
        let entities = lookup.as_object().map_or(0, |o| o.len());
        let path = self.write_json(&format!("predictions_{}.json", name), &lookup, false)?;
        info!("Lookup saved: {} ({} entities)", path.display(), entities);
        Ok(path)
    }

    /// Write the stop directory as pretty `stops_<name>.json`.
    pub fn write_stops(&self, stops: &[Stop], name: &str) -> Result<PathBuf> {
        let path = self.write_json(&format!("stops_{}.json", name), &stops, true)?;
        info!("Stops saved: {} ({} stops)", path.display(), stops.len());
        Ok(path)
    }

    pub fn build_cleaning_report(
        input_file: &str,
        output_file: Option<&str>,
        summary: &CleaningSummary,
    ) -> CleaningReport {
        CleaningReport {
            generated_at: Local::now().format("%Y-%m-%d %H:%M:%S").to_string(),
            input_file: input_file.to_string(),
            output_file: output_file.map(str::to_string),
            summary: summary.clone(),
            filled_by_field: summary.filled_by_field(),
            total_outliers: summary.total_outliers(),
        }
    }

    /// Write a cleaning report as `<base_name>_report.json`.
    pub fn write_report(&self, report: &CleaningReport, base_name: &str) -> Result<PathBuf> {
        let path = self.write_json(&format!("{}_report.json", base_name), report, true)?;
        info!("Report saved: {}", path.display());
        Ok(path)
    }

    fn write_json<T: Serialize + ?Sized>(&self, file_name: &str, value: &T, pretty: bool) -> Result<PathBuf> {
        fs::create_dir_all(&self.output_dir)?;
        let path = self.output_dir.join(file_name);
        let content = if pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        fs::write(&path, content)?;
        Ok(path)
    }
}
