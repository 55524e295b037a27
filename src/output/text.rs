//! Human-readable text output

use crate::run::Report;
use std::io::{self, Write};

/// Print the coordinator's result lines to stdout
///
/// ```text
/// Sum: <product>
/// Vector Size: <size>
/// Geometric mean: <mean>
/// Processing time: <seconds>
/// ```
///
/// `Sum` is the global product; the label is kept for compatibility with the
/// tool's established output. The timing line is omitted when `show_timing` is
/// false.
pub fn print_results(report: &Report, show_timing: bool) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    write_results(&mut out, report, show_timing)?;
    out.flush()
}

/// Write the result lines to any writer
pub fn write_results<W: Write>(out: &mut W, report: &Report, show_timing: bool) -> io::Result<()> {
    writeln!(out, "Sum: {:.6}", report.product)?;
    writeln!(out, "Vector Size: {}", report.size)?;
    writeln!(out, "Geometric mean: {:.6}", report.geometric_mean)?;
    if show_timing {
        writeln!(out, "Processing time: {:.6}", report.elapsed_secs)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::partition::partition_all;
    use chrono::Utc;

    fn report() -> Report {
        Report {
            product: 1024.0,
            size: 5,
            geometric_mean: 4.0,
            workers: 2,
            partitions: partition_all(5, 2),
            elapsed_secs: 0.25,
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn test_result_lines() {
        let mut buf = Vec::new();
        write_results(&mut buf, &report(), true).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert_eq!(
            text,
            "Sum: 1024.000000\nVector Size: 5\nGeometric mean: 4.000000\nProcessing time: 0.250000\n"
        );
    }

    #[test]
    fn test_timing_suppressed() {
        let mut buf = Vec::new();
        write_results(&mut buf, &report(), false).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(!text.contains("Processing time"));
        assert_eq!(text.lines().count(), 3);
    }

    #[test]
    fn test_non_finite_values_are_printed() {
        let mut r = report();
        r.product = f64::INFINITY;
        r.geometric_mean = f64::NAN;

        let mut buf = Vec::new();
        write_results(&mut buf, &r, false).unwrap();

        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("Sum: inf"));
        assert!(text.contains("Geometric mean: NaN"));
    }
}
