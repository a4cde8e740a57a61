//! CSV price-data adapter.
//!
//! Reads `{directory}/{code}.csv` with a header row containing at least
//! `date`, `open` and `close`. Extra columns are ignored. Rows that fail to
//! parse or carry an invalid price are dropped.

use crate::domain::error::RotatorError;
use crate::domain::price::PricePoint;
use crate::ports::data_port::DataPort;
use chrono::NaiveDate;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: String,
    open: f64,
    close: f64,
}

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, code: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", code))
    }

    fn read_all(&self, code: &str) -> Result<Vec<PricePoint>, RotatorError> {
        let path = self.csv_path(code);
        let content = fs::read_to_string(&path).map_err(|e| RotatorError::Data {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(content.as_bytes());
        let mut points = Vec::new();
        let mut dropped = 0usize;

        for result in rdr.deserialize::<CsvRow>() {
            let row = match result {
                Ok(row) => row,
                Err(e) => {
                    debug!(code, error = %e, "dropping unparseable row");
                    dropped += 1;
                    continue;
                }
            };
            let Ok(date) = NaiveDate::parse_from_str(&row.date, "%Y-%m-%d") else {
                dropped += 1;
                continue;
            };
            let point = PricePoint::new(date, row.open, row.close);
            if point.is_valid() {
                points.push(point);
            } else {
                dropped += 1;
            }
        }

        if dropped > 0 {
            warn!(code, dropped, "dropped invalid price rows");
        }
        points.sort_by_key(|p| p.date);
        points.dedup_by_key(|p| p.date);
        Ok(points)
    }
}

impl DataPort for CsvAdapter {
    fn fetch_prices(
        &self,
        code: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<Vec<PricePoint>, RotatorError> {
        let mut points = self.read_all(code)?;
        points.retain(|p| p.date >= start_date && p.date <= end_date);
        Ok(points)
    }

    fn list_symbols(&self) -> Result<Vec<String>, RotatorError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| RotatorError::Data {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut symbols = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| RotatorError::Data {
                reason: format!("directory entry error: {}", e),
            })?;
            let name = entry.file_name();
            if let Some(code) = name.to_string_lossy().strip_suffix(".csv") {
                symbols.push(code.to_string());
            }
        }

        symbols.sort();
        Ok(symbols)
    }

    fn get_data_range(
        &self,
        code: &str,
    ) -> Result<Option<(NaiveDate, NaiveDate, usize)>, RotatorError> {
        let points = self.read_all(code)?;
        Ok(match (points.first(), points.last()) {
            (Some(first), Some(last)) => Some((first.date, last.date, points.len())),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "date,open,high,low,close,volume\n\
            2024-01-16,3.51,3.60,3.50,3.55,60000\n\
            2024-01-15,3.50,3.55,3.45,3.52,50000\n\
            2024-01-17,3.55,3.70,3.54,3.66,55000\n";

        fs::write(path.join("510300.csv"), csv_content).unwrap();
        fs::write(
            path.join("518880.csv"),
            "date,open,close\n\
             2024-01-15,4.80,4.82\n\
             not-a-date,4.81,4.83\n\
             2024-01-16,4.82,0\n\
             2024-01-17,4.83,abc\n\
             2024-01-18,4.84,4.90\n",
        )
        .unwrap();
        fs::write(path.join("159915.csv"), "date,open,close\n").unwrap();
        fs::write(path.join("notes.txt"), "ignored").unwrap();

        (dir, path)
    }

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    #[test]
    fn fetch_prices_returns_sorted_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let points = adapter.fetch_prices("510300", date(1), date(31)).unwrap();

        assert_eq!(points.len(), 3);
        assert_eq!(points[0].date, date(15));
        assert_eq!(points[0].open, 3.50);
        assert_eq!(points[0].close, 3.52);
        assert_eq!(points[2].date, date(17));
    }

    #[test]
    fn fetch_prices_filters_by_date() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let points = adapter.fetch_prices("510300", date(16), date(16)).unwrap();

        assert_eq!(points.len(), 1);
        assert_eq!(points[0].date, date(16));
    }

    #[test]
    fn invalid_rows_are_dropped() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let points = adapter.fetch_prices("518880", date(1), date(31)).unwrap();
        let dates: Vec<NaiveDate> = points.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![date(15), date(18)]);
    }

    #[test]
    fn missing_file_is_a_data_error() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let result = adapter.fetch_prices("XYZ", date(1), date(31));
        assert!(matches!(result, Err(RotatorError::Data { .. })));
    }

    #[test]
    fn list_symbols_returns_csv_stems() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let symbols = adapter.list_symbols().unwrap();
        assert_eq!(symbols, vec!["159915", "510300", "518880"]);
    }

    #[test]
    fn data_range_reports_bounds_and_count() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        assert_eq!(
            adapter.get_data_range("510300").unwrap(),
            Some((date(15), date(17), 3))
        );
        assert_eq!(adapter.get_data_range("159915").unwrap(), None);
    }
}
