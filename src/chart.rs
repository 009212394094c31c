//! Chart reference table: per-chart difficulty parameters on the latent scale.
//!
//! The table is a CSV file with one header row and the columns
//! `title, display_level, md5, sha256, beta_easy, beta_hard, alpha, has_data`
//! in that order. Every row must carry calibration data; a row without it
//! fails the whole load.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use thiserror::Error;

/// Gap between the two difficulty parameters below which a row is suspicious.
pub const MIN_BETA_GAP: f64 = 0.01;

const COLUMNS: [&str; 8] = [
    "title",
    "display_level",
    "md5",
    "sha256",
    "beta_easy",
    "beta_hard",
    "alpha",
    "has_data",
];

#[derive(Error, Debug)]
pub enum ChartError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("chart table is empty (no header row)")]
    MissingHeader,
    #[error("line {line}: expected {expected} columns, found {found}")]
    Columns {
        line: usize,
        expected: usize,
        found: usize,
    },
    #[error("line {line}: invalid {field}: {message}")]
    Field {
        line: usize,
        field: &'static str,
        message: String,
    },
    #[error("line {line}: chart \"{title}\" has no calibration data")]
    NoData { line: usize, title: String },
}

pub type Result<T> = std::result::Result<T, ChartError>;

/// One chart from the reference table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartRecord {
    pub title: String,
    pub display_level: String,
    pub md5: String,
    pub sha256: String,
    /// Difficulty of an easy clear on the latent scale.
    pub beta_easy: f64,
    /// Difficulty of a hard clear on the latent scale.
    pub beta_hard: f64,
    /// Discrimination (slope) of the clear curve.
    pub alpha: f64,
}

impl ChartRecord {
    pub fn level(&self) -> Option<DisplayLevel> {
        DisplayLevel::parse(&self.display_level)
    }
}

/// A display level split into its category prefix and number, e.g. `sl7`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayLevel {
    pub prefix: String,
    pub level: usize,
}

static LEVEL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<prefix>[^\d\s]+)\s*(?P<level>\d+)\s*$").unwrap()
});

impl DisplayLevel {
    pub fn parse(s: &str) -> Option<Self> {
        let caps = LEVEL_RE.captures(s)?;
        let level = caps["level"].parse().ok()?;
        Some(Self {
            prefix: caps["prefix"].to_string(),
            level,
        })
    }
}

/// Read and validate a chart table from disk.
pub fn load_chart_table(path: &Path) -> Result<Vec<ChartRecord>> {
    let contents = std::fs::read_to_string(path).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let charts = parse_chart_table(&contents)?;
    log::info!("Loaded {} charts from {}", charts.len(), path.display());
    Ok(charts)
}

/// Parse chart table text. The first non-empty line is the header and is skipped.
pub fn parse_chart_table(contents: &str) -> Result<Vec<ChartRecord>> {
    let contents = contents.strip_prefix('\u{feff}').unwrap_or(contents);
    let mut lines = contents
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());

    if lines.next().is_none() {
        return Err(ChartError::MissingHeader);
    }

    let mut charts = Vec::new();
    for (line, text) in lines {
        let chart = parse_row(line, text)?;
        if beta_gap_too_small(&chart) {
            log::warn!(
                "line {}: easy and hard difficulty too close for \"{}\" (easy {:.4}, hard {:.4})",
                line,
                chart.title,
                chart.beta_easy,
                chart.beta_hard
            );
        }
        charts.push(chart);
    }
    Ok(charts)
}

/// Easy and hard thresholds closer than [`MIN_BETA_GAP`] (or inverted).
/// Such rows are kept but logged.
pub fn beta_gap_too_small(chart: &ChartRecord) -> bool {
    chart.beta_hard - chart.beta_easy < MIN_BETA_GAP
}

fn parse_row(line: usize, text: &str) -> Result<ChartRecord> {
    let fields = split_csv_line(text);
    if fields.len() < COLUMNS.len() {
        return Err(ChartError::Columns {
            line,
            expected: COLUMNS.len(),
            found: fields.len(),
        });
    }

    let title = fields[0].clone();
    if fields[7].trim() != "True" {
        return Err(ChartError::NoData { line, title });
    }

    let sha256 = fields[3].trim().to_lowercase();
    if sha256.is_empty() {
        return Err(ChartError::Field {
            line,
            field: "sha256",
            message: "empty".into(),
        });
    }

    let beta_easy = parse_float(line, "beta_easy", &fields[4])?;
    let beta_hard = parse_float(line, "beta_hard", &fields[5])?;
    let alpha = parse_float(line, "alpha", &fields[6])?;
    if alpha <= 0.0 {
        return Err(ChartError::Field {
            line,
            field: "alpha",
            message: format!("must be positive, got {alpha}"),
        });
    }

    Ok(ChartRecord {
        title,
        display_level: fields[1].trim().to_string(),
        md5: fields[2].trim().to_lowercase(),
        sha256,
        beta_easy,
        beta_hard,
        alpha,
    })
}

fn parse_float(line: usize, field: &'static str, raw: &str) -> Result<f64> {
    let value: f64 = raw.trim().parse().map_err(|e| ChartError::Field {
        line,
        field,
        message: format!("{raw:?}: {e}"),
    })?;
    if !value.is_finite() {
        return Err(ChartError::Field {
            line,
            field,
            message: format!("not finite: {raw:?}"),
        });
    }
    Ok(value)
}

/// Split one CSV record. Double-quoted fields may contain commas and `""` escapes.
fn split_csv_line(line: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' if in_quotes => {
                if chars.peek() == Some(&'"') {
                    current.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            }
            '"' if current.is_empty() => in_quotes = true,
            ',' if !in_quotes => fields.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    fields.push(current);
    fields
}

/// Lookup from sha256 to chart. When the table lists a hash twice the last
/// row wins.
pub struct ChartIndex<'a> {
    by_sha256: HashMap<&'a str, &'a ChartRecord>,
}

impl<'a> ChartIndex<'a> {
    pub fn new(charts: &'a [ChartRecord]) -> Self {
        let mut by_sha256 = HashMap::with_capacity(charts.len());
        for chart in charts {
            if let Some(prev) = by_sha256.insert(chart.sha256.as_str(), chart) {
                log::warn!(
                    "Duplicate sha256 {} (\"{}\" replaced by \"{}\")",
                    chart.sha256,
                    prev.title,
                    chart.title
                );
            }
        }
        Self { by_sha256 }
    }

    pub fn get(&self, sha256: &str) -> Option<&'a ChartRecord> {
        self.by_sha256.get(sha256).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HEADER: &str = "title,display_level,md5,sha256,beta_easy,beta_hard,alpha,has_data";

    #[test]
    fn test_parse_basic_table() {
        let text = format!(
            "{HEADER}\nSong A,sl3,aa,AB12,1.5,2.5,1.2,True\nSong B,sl4,bb,cd34,2.0,3.1,0.9,True\n"
        );
        let charts = parse_chart_table(&text).unwrap();
        assert_eq!(charts.len(), 2);
        assert_eq!(charts[0].title, "Song A");
        assert_eq!(charts[0].sha256, "ab12");
        assert_eq!(charts[1].display_level, "sl4");
        assert!((charts[1].alpha - 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_quoted_title_with_comma() {
        let text = format!("{HEADER}\n\"Hello, \"\"World\"\"\",sl0,m,s,0.1,0.4,1.0,True\n");
        let charts = parse_chart_table(&text).unwrap();
        assert_eq!(charts[0].title, "Hello, \"World\"");
    }

    #[test]
    fn test_no_data_is_fatal() {
        let text = format!("{HEADER}\nSong A,sl3,aa,ab,1.5,2.5,1.2,True\nSong B,sl4,bb,cd,,,,False\n");
        match parse_chart_table(&text) {
            Err(ChartError::NoData { line, title }) => {
                assert_eq!(line, 3);
                assert_eq!(title, "Song B");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_malformed_float_is_fatal() {
        let text = format!("{HEADER}\nSong A,sl3,aa,ab,abc,2.5,1.2,True\n");
        assert!(matches!(
            parse_chart_table(&text),
            Err(ChartError::Field { field: "beta_easy", line: 2, .. })
        ));
    }

    #[test]
    fn test_short_row_is_fatal() {
        let text = format!("{HEADER}\nSong A,sl3,aa\n");
        assert!(matches!(
            parse_chart_table(&text),
            Err(ChartError::Columns { found: 3, .. })
        ));
    }

    #[test]
    fn test_nonpositive_alpha_rejected() {
        let text = format!("{HEADER}\nSong A,sl3,aa,ab,1.0,2.0,0.0,True\n");
        assert!(matches!(
            parse_chart_table(&text),
            Err(ChartError::Field { field: "alpha", .. })
        ));
    }

    #[test]
    fn test_close_betas_only_warn() {
        let text = format!(
            "{HEADER}\nClose,sl3,aa,ab,1.0,1.005,1.0,True\nInverted,sl3,bb,cd,2.0,1.5,1.0,True\nFine,sl3,cc,ef,1.0,1.5,1.0,True\n"
        );
        let charts = parse_chart_table(&text).unwrap();
        assert_eq!(charts.len(), 3);
        assert!(beta_gap_too_small(&charts[0]));
        assert!(beta_gap_too_small(&charts[1]));
        assert!(!beta_gap_too_small(&charts[2]));
    }

    #[test]
    fn test_empty_input() {
        assert!(matches!(parse_chart_table(""), Err(ChartError::MissingHeader)));
        assert!(parse_chart_table(HEADER).unwrap().is_empty());
    }

    #[test]
    fn test_display_level_parse() {
        assert_eq!(
            DisplayLevel::parse("sl7"),
            Some(DisplayLevel { prefix: "sl".into(), level: 7 })
        );
        assert_eq!(DisplayLevel::parse("st12").unwrap().level, 12);
        assert_eq!(DisplayLevel::parse("sl"), None);
        assert_eq!(DisplayLevel::parse("12"), None);
    }

    #[test]
    fn test_index_last_write_wins() {
        let text = format!(
            "{HEADER}\nFirst,sl1,a,dup,0.0,1.0,1.0,True\nSecond,sl2,b,dup,1.0,2.0,1.0,True\n"
        );
        let charts = parse_chart_table(&text).unwrap();
        let index = ChartIndex::new(&charts);
        assert_eq!(index.get("dup").unwrap().title, "Second");
        assert!(std::ptr::eq(index.get("dup").unwrap(), &charts[1]));
        assert!(index.get("missing").is_none());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        writeln!(file, "Song A,sl3,aa,ab,1.5,2.5,1.2,True").unwrap();
        let charts = load_chart_table(file.path()).unwrap();
        assert_eq!(charts.len(), 1);

        let missing = load_chart_table(Path::new("/nonexistent/table.csv"));
        assert!(matches!(missing, Err(ChartError::Io { .. })));
    }
}
