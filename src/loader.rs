use std::path::Path;

use thiserror::Error;

/// Number of monthly columns a data row must carry.
pub const MONTHS_PER_YEAR: usize = 12;

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One retained year: its label and the mean of its 12 monthly anomalies.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct YearlyMean {
    pub year: i32,
    pub anomaly: f64,
}

/// Ordered sequence of retained years, in input order.
pub type YearlySeries = Vec<YearlyMean>;

/// Bookkeeping about what the parse kept and dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadStats {
    pub lines_read: u64,
    pub rows_kept: u64,
    /// Lines with at least 2 tokens where the year or a monthly value
    /// failed to parse (or fewer than 12 monthly values were present).
    pub rows_dropped_parse: u64,
    /// Valid rows discarded because they sat on an odd raw line index.
    pub lines_decimated: u64,
    /// Lines with fewer than 2 tokens (blank lines, stray labels).
    pub lines_skipped_short: u64,
}

pub struct LoadOutcome {
    pub series: YearlySeries,
    pub stats: LoadStats,
}

/// Read the anomaly table at `path` and produce the yearly series.
///
/// File-level I/O errors are fatal; individual unparseable rows are
/// dropped and counted, never fatal.
pub fn load_series(path: &Path) -> Result<LoadOutcome, LoadError> {
    let contents = std::fs::read_to_string(path)?;
    let outcome = parse_table(&contents);
    log::info!(
        "Loaded {}: {} rows kept of {} lines ({} parse-dropped, {} decimated, {} short)",
        path.display(),
        outcome.stats.rows_kept,
        outcome.stats.lines_read,
        outcome.stats.rows_dropped_parse,
        outcome.stats.lines_decimated,
        outcome.stats.lines_skipped_short,
    );
    Ok(outcome)
}

/// Parse the raw table text.
///
/// Each data line is a year followed by 12 monthly values. The source
/// format interleaves an anomaly line and a coverage line per year, so
/// only rows on even raw line indices are retained (every physical line
/// consumes an index, including skipped ones).
pub fn parse_table(text: &str) -> LoadOutcome {
    let mut series = YearlySeries::new();
    let mut stats = LoadStats::default();

    for (i, line) in text.lines().enumerate() {
        stats.lines_read += 1;

        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.len() < 2 {
            stats.lines_skipped_short += 1;
            continue;
        }

        let Some((year, months)) = parse_row(&tokens) else {
            log::debug!("Dropping unparseable row at line {}", i + 1);
            stats.rows_dropped_parse += 1;
            continue;
        };

        if i % 2 != 0 {
            stats.lines_decimated += 1;
            continue;
        }

        series.push(YearlyMean {
            year,
            anomaly: yearly_mean(&months),
        });
        stats.rows_kept += 1;
    }

    LoadOutcome { series, stats }
}

/// Parse one tokenized line into (year, 12 monthly values).
/// Returns None if the year or any monthly value fails to parse, or if
/// fewer than 12 monthly values are present. Tokens beyond the 12th are
/// ignored.
fn parse_row(tokens: &[&str]) -> Option<(i32, [f64; MONTHS_PER_YEAR])> {
    let year: i32 = tokens[0].parse().ok()?;

    let values = &tokens[1..];
    if values.len() < MONTHS_PER_YEAR {
        return None;
    }

    let mut months = [0.0; MONTHS_PER_YEAR];
    for (slot, tok) in months.iter_mut().zip(values) {
        *slot = tok.parse().ok()?;
    }
    Some((year, months))
}

/// Unweighted arithmetic mean of the monthly columns.
fn yearly_mean(months: &[f64; MONTHS_PER_YEAR]) -> f64 {
    months.iter().sum::<f64>() / MONTHS_PER_YEAR as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(year: i32, value: f64) -> String {
        let months: Vec<String> = (0..12).map(|_| format!("{value}")).collect();
        format!("{year} {}", months.join(" "))
    }

    #[test]
    fn test_yearly_mean_is_arithmetic_mean() {
        let months = [
            1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0, 10.0, 11.0, 12.0,
        ];
        assert!((yearly_mean(&months) - 6.5).abs() < 1e-12);
    }

    #[test]
    fn test_even_lines_kept_odd_lines_decimated() {
        let text = [row(1850, 0.1), row(1850, 99.0), row(1851, 0.2), row(1851, 99.0)].join("\n");
        let out = parse_table(&text);
        assert_eq!(out.series.len(), 2);
        assert_eq!(out.series[0].year, 1850);
        assert!((out.series[0].anomaly - 0.1).abs() < 1e-12);
        assert_eq!(out.series[1].year, 1851);
        assert!((out.series[1].anomaly - 0.2).abs() < 1e-12);
        assert_eq!(out.stats.lines_decimated, 2);
        assert_eq!(out.stats.rows_kept, 2);
    }

    #[test]
    fn test_short_line_consumes_a_line_index() {
        // A short line at index 0 shifts the parity of everything after it.
        let text = ["noise".to_string(), row(1850, 0.1), row(1850, 99.0)].join("\n");
        let out = parse_table(&text);
        assert_eq!(out.stats.lines_skipped_short, 1);
        // 1850 anomaly row sits at index 1 (odd) — decimated away.
        assert_eq!(out.series.len(), 1);
        assert!((out.series[0].anomaly - 99.0).abs() < 1e-12);
    }

    #[test]
    fn test_bad_monthly_token_voids_row() {
        let bad = "1850 0.1 0.2 xx 0.4 0.5 0.6 0.7 0.8 0.9 1.0 1.1 1.2";
        let out = parse_table(bad);
        assert!(out.series.is_empty());
        assert_eq!(out.stats.rows_dropped_parse, 1);
    }

    #[test]
    fn test_bad_year_voids_row() {
        let bad = "Year 0.1 0.2 0.3 0.4 0.5 0.6 0.7 0.8 0.9 1.0 1.1 1.2";
        let out = parse_table(bad);
        assert!(out.series.is_empty());
        assert_eq!(out.stats.rows_dropped_parse, 1);
    }

    #[test]
    fn test_fewer_than_twelve_values_voids_row() {
        let out = parse_table("1850 0.1 0.2 0.3");
        assert!(out.series.is_empty());
        assert_eq!(out.stats.rows_dropped_parse, 1);
    }

    #[test]
    fn test_extra_trailing_tokens_ignored() {
        // 13th value (an annual summary column) does not void the row and
        // does not enter the mean.
        let line = "1850 1 1 1 1 1 1 1 1 1 1 1 1 999";
        let out = parse_table(line);
        assert_eq!(out.series.len(), 1);
        assert!((out.series[0].anomaly - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_input_yields_empty_series() {
        let out = parse_table("");
        assert!(out.series.is_empty());
        assert_eq!(out.stats.lines_read, 0);
    }

    #[test]
    fn test_negative_anomalies() {
        let out = parse_table(&row(1850, -0.75));
        assert_eq!(out.series.len(), 1);
        assert!((out.series[0].anomaly + 0.75).abs() < 1e-12);
    }
}
