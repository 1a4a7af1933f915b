use crate::error::{EiaError, Result};
use crate::loader::{RawRowSet, Row};
use crate::period::Frequency;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use polars::prelude::*;
use serde_json::Value;
use std::collections::HashSet;

pub const PERIOD: &str = "period";
pub const VALUE: &str = "value";

/// Merge per-chunk row sets into one typed frame sorted by `period`.
///
/// `period` becomes `Datetime[ms, UTC]` for hourly data and `Date` for daily
/// data, `value` becomes `Float64`. Other columns pass through in first-seen
/// order. The sort is stable, so rows sharing a period keep chunk order.
pub fn stitch_chunks(row_sets: Vec<RawRowSet>, frequency: Frequency) -> Result<DataFrame> {
    // Build one frame from all rows so every chunk shares a single schema.
    let rows: Vec<Row> = row_sets.into_iter().flatten().collect();
    if rows.is_empty() {
        return Err(EiaError::EmptyResult("no rows were returned for the requested range".into()));
    }

    let mut columns = vec![period_column(&rows, frequency)?, value_column(&rows)?];
    for name in passthrough_names(&rows) {
        columns.push(passthrough_column(&rows, &name));
    }

    let frame = DataFrame::new(columns)?;
    let sorted = frame
        .lazy()
        .sort([PERIOD], SortMultipleOptions::default().with_maintain_order(true))
        .collect()?;
    Ok(sorted)
}

fn period_column(rows: &[Row], frequency: Frequency) -> Result<Column> {
    let series = match frequency {
        Frequency::Hourly => {
            let millis = rows
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    parse_hour(i, row.get(PERIOD)).map(|dt| dt.and_utc().timestamp_millis())
                })
                .collect::<Result<Vec<i64>>>()?;
            Int64Chunked::from_vec(PERIOD.into(), millis)
                .into_datetime(TimeUnit::Milliseconds, Some("UTC".into()))
                .into_series()
        }
        Frequency::Daily => {
            let epoch = DateTime::<Utc>::UNIX_EPOCH.date_naive();
            let days = rows
                .iter()
                .enumerate()
                .map(|(i, row)| {
                    parse_day(i, row.get(PERIOD)).map(|d| (d - epoch).num_days() as i32)
                })
                .collect::<Result<Vec<i32>>>()?;
            Int32Chunked::from_vec(PERIOD.into(), days).into_date().into_series()
        }
    };
    Ok(series.into_column())
}

fn period_text(row: usize, raw: Option<&Value>) -> Result<&str> {
    match raw {
        Some(Value::String(s)) => Ok(s.trim()),
        Some(other) => Err(mismatch(PERIOD, row, format!("expected a string, got {other}"))),
        None => Err(mismatch(PERIOD, row, "missing period".into())),
    }
}

/// The API truncates hourly periods to `YYYY-MM-DDTHH`; pad the minutes back.
fn parse_hour(row: usize, raw: Option<&Value>) -> Result<NaiveDateTime> {
    let text = period_text(row, raw)?;
    let padded = if text.len() == 13 { format!("{text}:00") } else { text.to_string() };
    NaiveDateTime::parse_from_str(&padded, "%Y-%m-%dT%H:%M")
        .map_err(|e| mismatch(PERIOD, row, format!("'{text}' is not an hourly period: {e}")))
}

fn parse_day(row: usize, raw: Option<&Value>) -> Result<NaiveDate> {
    let text = period_text(row, raw)?;
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .map_err(|e| mismatch(PERIOD, row, format!("'{text}' is not a daily period: {e}")))
}

fn value_column(rows: &[Row]) -> Result<Column> {
    let values = rows
        .iter()
        .enumerate()
        .map(|(i, row)| parse_value(i, row.get(VALUE)))
        .collect::<Result<Vec<Option<f64>>>>()?;
    Ok(Series::new(VALUE.into(), values).into_column())
}

/// Numbers and numeric strings cast; null stays null; anything else, blank
/// strings included, is an error.
fn parse_value(row: usize, raw: Option<&Value>) -> Result<Option<f64>> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_f64()
            .map(Some)
            .ok_or_else(|| mismatch(VALUE, row, format!("{n} does not fit in f64"))),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| mismatch(VALUE, row, format!("'{s}' is not numeric"))),
        Some(other) => Err(mismatch(VALUE, row, format!("{other} is not numeric"))),
    }
}

fn passthrough_names(rows: &[Row]) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::from([PERIOD, VALUE]);
    let mut names = Vec::new();
    for row in rows {
        for key in row.keys() {
            if seen.insert(key.as_str()) {
                names.push(key.clone());
            }
        }
    }
    names
}

/// Float64 when every present cell is a JSON number, text otherwise.
fn passthrough_column(rows: &[Row], name: &str) -> Column {
    let cells: Vec<Option<&Value>> = rows
        .iter()
        .map(|row| row.get(name).filter(|v| !v.is_null()))
        .collect();

    let series = if cells.iter().flatten().all(|v| v.is_number()) {
        let numbers: Vec<Option<f64>> = cells.iter().map(|c| c.and_then(Value::as_f64)).collect();
        Series::new(name.into(), numbers)
    } else {
        let text: Vec<Option<String>> = cells
            .iter()
            .map(|c| {
                c.map(|v| match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
            })
            .collect();
        Series::new(name.into(), text)
    };
    series.into_column()
}

fn mismatch(column: &str, row: usize, reason: String) -> EiaError {
    EiaError::TypeMismatch {
        column: column.to_string(),
        row,
        reason,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Value) -> RawRowSet {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    fn millis(df: &DataFrame) -> Vec<i64> {
        df.column(PERIOD)
            .unwrap()
            .cast(&DataType::Int64)
            .unwrap()
            .i64()
            .unwrap()
            .into_no_null_iter()
            .collect()
    }

    #[test]
    fn test_stitch_hourly_sorts_and_types() {
        let chunk_b = rows(json!([
            {"period": "2024-01-01T03", "subba": "SDGE", "value": "12.5"},
            {"period": "2024-01-01T02", "subba": "SDGE", "value": 11},
        ]));
        let chunk_a = rows(json!([
            {"period": "2024-01-01T00", "subba": "SDGE", "value": 9},
            {"period": "2024-01-01T01", "subba": "SDGE", "value": null},
        ]));
        let df = stitch_chunks(vec![chunk_b, chunk_a], Frequency::Hourly).unwrap();

        assert_eq!(df.height(), 4);
        assert_eq!(
            df.column(PERIOD).unwrap().dtype(),
            &DataType::Datetime(TimeUnit::Milliseconds, Some("UTC".into()))
        );
        let base = 1_704_067_200_000i64; // 2024-01-01T00:00Z
        assert_eq!(millis(&df), (0..4).map(|h| base + h * 3_600_000).collect::<Vec<_>>());

        let values = df.column(VALUE).unwrap().f64().unwrap();
        assert_eq!(values.get(0), Some(9.0));
        assert_eq!(values.get(1), None);
        assert_eq!(values.get(3), Some(12.5));
        assert_eq!(df.column("subba").unwrap().str().unwrap().get(0), Some("SDGE"));
    }

    #[test]
    fn test_stitch_daily_uses_dates() {
        let df = stitch_chunks(
            vec![rows(json!([
                {"period": "2024-01-02", "value": 2},
                {"period": "2024-01-01", "value": 1},
            ]))],
            Frequency::Daily,
        )
        .unwrap();
        assert_eq!(df.column(PERIOD).unwrap().dtype(), &DataType::Date);
        let days: Vec<i32> = df
            .column(PERIOD)
            .unwrap()
            .cast(&DataType::Int32)
            .unwrap()
            .i32()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(days, vec![19_723, 19_724]);
    }

    #[test]
    fn test_stable_sort_keeps_series_order() {
        let df = stitch_chunks(
            vec![rows(json!([
                {"period": "2024-01-01T01", "subba": "PGAE", "value": 1},
                {"period": "2024-01-01T01", "subba": "SCE", "value": 2},
                {"period": "2024-01-01T00", "subba": "SDGE", "value": 3},
                {"period": "2024-01-01T00", "subba": "PGAE", "value": 4},
            ]))],
            Frequency::Hourly,
        )
        .unwrap();
        let subba: Vec<&str> = df
            .column("subba")
            .unwrap()
            .str()
            .unwrap()
            .into_no_null_iter()
            .collect();
        assert_eq!(subba, vec!["SDGE", "PGAE", "PGAE", "SCE"]);
    }

    #[test]
    fn test_passthrough_typing() {
        let df = stitch_chunks(
            vec![
                rows(json!([
                    {"period": "2024-01-01", "value": 1, "respondent": 7, "units": "MWh"},
                ])),
                rows(json!([{"period": "2024-01-02", "value": 2, "units": 3}])),
            ],
            Frequency::Daily,
        )
        .unwrap();
        let names: Vec<&str> = df.get_column_names().iter().map(|n| n.as_str()).collect();
        assert_eq!(names, vec!["period", "value", "respondent", "units"]);
        assert_eq!(df.column("respondent").unwrap().dtype(), &DataType::Float64);
        assert_eq!(df.column("respondent").unwrap().null_count(), 1);
        let units = df.column("units").unwrap().str().unwrap();
        assert_eq!(units.get(0), Some("MWh"));
        assert_eq!(units.get(1), Some("3"));
    }

    #[test]
    fn test_type_mismatches() {
        let bad_value = stitch_chunks(
            vec![rows(json!([{"period": "2024-01-01T00", "value": "n/a"}]))],
            Frequency::Hourly,
        )
        .unwrap_err();
        assert!(matches!(
            bad_value,
            EiaError::TypeMismatch { ref column, row: 0, .. } if column == VALUE
        ));

        // Blank strings are not numbers and never become nulls.
        for blank in ["", "  "] {
            let err = stitch_chunks(
                vec![rows(json!([
                    {"period": "2024-01-01T00", "value": 1},
                    {"period": "2024-01-01T01", "value": blank},
                ]))],
                Frequency::Hourly,
            )
            .unwrap_err();
            assert!(matches!(
                err,
                EiaError::TypeMismatch { ref column, row: 1, .. } if column == VALUE
            ));
        }

        let bad_period = stitch_chunks(
            vec![rows(json!([
                {"period": "2024-01-01", "value": 1},
                {"period": "2024-13-01", "value": 1},
            ]))],
            Frequency::Daily,
        )
        .unwrap_err();
        assert!(matches!(
            bad_period,
            EiaError::TypeMismatch { ref column, row: 1, .. } if column == PERIOD
        ));

        // A daily period is not an hourly one.
        assert!(stitch_chunks(
            vec![rows(json!([{"period": "2024-01-01", "value": 1}]))],
            Frequency::Hourly
        )
        .is_err());
    }

    #[test]
    fn test_empty_result() {
        let err = stitch_chunks(vec![vec![], vec![]], Frequency::Hourly).unwrap_err();
        assert!(matches!(err, EiaError::EmptyResult(_)));
    }
}
