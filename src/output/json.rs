//! JSON output formatting
//!
//! The report is written as one pretty-printed document:
//!
//! ```json
//! {
//!   "tool": "geomean",
//!   "version": "0.1.0",
//!   "host": "node-a",
//!   "report": { "product": 1024.0, "size": 5, ... }
//! }
//! ```
//!
//! Non-finite numbers (an overflowed product, a NaN mean) have no JSON
//! representation and are written as `null`.

use crate::run::Report;
use crate::Result;
use anyhow::Context;
use serde::Serialize;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

/// Top-level JSON document
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput {
    pub tool: String,
    pub version: String,
    /// Host name of the coordinator
    pub host: String,
    pub report: Report,
}

impl JsonOutput {
    pub fn new(report: &Report) -> Self {
        let host = hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| "unknown".to_string());

        Self {
            tool: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            host,
            report: report.clone(),
        }
    }
}

/// Write the report to `output_path`
pub fn write_json_output(output_path: &Path, report: &Report, pretty: bool) -> Result<()> {
    let file = File::create(output_path)
        .with_context(|| format!("Failed to create JSON output file: {}", output_path.display()))?;
    let writer = BufWriter::new(file);
    let doc = JsonOutput::new(report);

    if pretty {
        serde_json::to_writer_pretty(writer, &doc)?;
    } else {
        serde_json::to_writer(writer, &doc)?;
    }

    Ok(())
}
