// ESNODE | Source Available BUSL-1.1 | Copyright (c) 2025 Estimatedstocks AB
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use crate::metrics::SummaryRecord;

/// Write the per-policy summary records as a CSV file, header first.
pub fn write_csv(path: &Path, records: &[SummaryRecord]) -> std::io::Result<()> {
    let mut out = String::new();
    out.push_str(SummaryRecord::header());
    out.push('\n');
    for record in records {
        let _ = writeln!(&mut out, "{record}");
    }
    fs::write(path, out)
}
