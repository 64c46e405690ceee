//! Report generation module.
//!
//! Writes the artifacts of a batch run: corrected tables and prediction
//! tables as CSV, the nested prediction lookup and stop directory as JSON,
//! and a JSON cleaning report.
//!
//! # Example
//!
//! ```rust,ignore
//! use transit_quality::reporting::ReportGenerator;
//!
//! let generator = ReportGenerator::new("data/processed");
//! generator.write_table(&mut cleaned.data, "daily_boarding_clean")?;
//!
//! let report = ReportGenerator::build_cleaning_report("daily.csv", None, &cleaned.summary);
//! generator.write_report(&report, "daily_boarding")?;
//! ```

mod generator;

pub use generator::{CleaningReport, ReportGenerator};
