//! Human-readable and tabular reports built from a parsed bibliography and
//! its verification checkpoint.

pub mod buckets;
pub mod export;

pub use buckets::{Checked, ReportBuckets};
pub use export::{
    CSV_FILE_NAME, REPORT_FILE_NAME, ReportError, ReportPaths, export_csv, export_text,
    generated_timestamp, write_reports,
};
