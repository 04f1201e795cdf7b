//! Structural validation of raw series and derived indicator frames.
//!
//! Each rule yields a [`RuleResult`]; the full set for one run is a
//! [`ValidationReport`]. The validator never fails: every problem is reported
//! as data and the caller decides what to abort on (any failed
//! [`Severity::Error`] rule, for the pipeline).
//!
//! Row-level price rules are evaluated only over rows with all fields
//! present, so a NaN row is counted once, by `required_fields`.

use crate::domain::{Candle, Series};
use crate::indicators::{IndicatorFrame, INDICATOR_COLUMNS};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        f.write_str(s)
    }
}

/// Outcome of one rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleResult {
    pub passed: bool,
    pub detail: String,
    pub affected_row_count: usize,
    pub severity: Severity,
}

impl RuleResult {
    fn check(severity: Severity, affected: usize, detail: impl Into<String>) -> Self {
        Self {
            passed: affected == 0,
            detail: detail.into(),
            affected_row_count: affected,
            severity,
        }
    }

    fn info(affected: usize, detail: impl Into<String>) -> Self {
        Self {
            passed: true,
            detail: detail.into(),
            affected_row_count: affected,
            severity: Severity::Info,
        }
    }
}

/// Rule name → result, in rule-name order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
    rules: BTreeMap<String, RuleResult>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, rule: impl Into<String>, result: RuleResult) {
        self.rules.insert(rule.into(), result);
    }

    pub fn get(&self, rule: &str) -> Option<&RuleResult> {
        self.rules.get(rule)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &RuleResult)> {
        self.rules.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Failed rules at exactly the given severity.
    pub fn failures(&self, severity: Severity) -> impl Iterator<Item = (&str, &RuleResult)> {
        self.iter()
            .filter(move |(_, r)| !r.passed && r.severity == severity)
    }

    /// True if any Error-severity rule failed.
    pub fn has_errors(&self) -> bool {
        self.failures(Severity::Error).next().is_some()
    }

    pub fn all_passed(&self) -> bool {
        self.rules.values().all(|r| r.passed)
    }
}

impl fmt::Display for ValidationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (name, r) in self.iter() {
            let mark = if r.passed { "ok" } else { "FAIL" };
            writeln!(f, "[{mark:>4}] {name} ({}): {}", r.severity, r.detail)?;
        }
        Ok(())
    }
}

pub struct Validator;

impl Validator {
    /// Rules over the raw candle series.
    pub fn validate_raw(series: &Series) -> ValidationReport {
        let candles = series.candles();
        let mut report = ValidationReport::new();

        report.insert(
            "non_empty",
            RuleResult::check(
                Severity::Error,
                usize::from(candles.is_empty()),
                format!("{} candles", candles.len()),
            ),
        );

        let missing = candles.iter().filter(|c| c.has_missing_fields()).count();
        report.insert(
            "required_fields",
            RuleResult::check(
                Severity::Error,
                missing,
                format!("{missing} rows with missing or non-finite OHLCV"),
            ),
        );

        let complete_rows = || candles.iter().filter(|c| !c.has_missing_fields());
        let count_rows = |pred: fn(&Candle) -> bool| complete_rows().filter(|c| pred(c)).count();

        let non_positive = count_rows(|c| !c.has_positive_prices());
        report.insert(
            "positive_prices",
            RuleResult::check(
                Severity::Error,
                non_positive,
                format!("{non_positive} rows with a price <= 0"),
            ),
        );

        let negative_volume = count_rows(|c| c.volume < 0.0);
        report.insert(
            "non_negative_volume",
            RuleResult::check(
                Severity::Error,
                negative_volume,
                format!("{negative_volume} rows with negative volume"),
            ),
        );

        let inverted = count_rows(|c| c.high < c.low);
        report.insert(
            "high_gte_low",
            RuleResult::check(
                Severity::Error,
                inverted,
                format!("{inverted} rows with high < low"),
            ),
        );

        let uncontained = count_rows(|c| !c.is_contained());
        report.insert(
            "ohlc_containment",
            RuleResult::check(
                Severity::Error,
                uncontained,
                format!("{uncontained} rows with open/close outside [low, high]"),
            ),
        );

        let mut seen = HashSet::with_capacity(candles.len());
        let duplicates = candles.iter().filter(|c| !seen.insert(c.open_time)).count();
        report.insert(
            "unique_open_time",
            RuleResult::check(
                Severity::Error,
                duplicates,
                format!("{duplicates} duplicate open times"),
            ),
        );

        let out_of_order = candles
            .windows(2)
            .filter(|w| w[1].open_time <= w[0].open_time)
            .count();
        report.insert(
            "monotonic_open_time",
            RuleResult::check(
                Severity::Error,
                out_of_order,
                format!("{out_of_order} rows not after their predecessor"),
            ),
        );

        let step = series.timeframe().step_millis();
        let irregular = candles
            .windows(2)
            .filter(|w| (w[1].open_time - w[0].open_time).num_milliseconds() != step)
            .count();
        report.insert(
            "timeframe_spacing",
            RuleResult::info(
                irregular,
                format!("{irregular} steps differ from {}", series.timeframe()),
            ),
        );

        report
    }

    /// Rules over the derived indicator columns.
    pub fn validate_derived(frame: &IndicatorFrame) -> ValidationReport {
        let rows = frame.len();
        let mut report = ValidationReport::new();

        let bad_columns: Vec<&str> = INDICATOR_COLUMNS
            .iter()
            .copied()
            .filter(|name| frame.column(name).map_or(true, |c| c.len() != rows))
            .collect();
        let detail = if bad_columns.is_empty() {
            format!("{} columns of {rows} rows", INDICATOR_COLUMNS.len())
        } else {
            format!("missing or mis-sized: {}", bad_columns.join(", "))
        };
        report.insert(
            "indicator_columns_present",
            RuleResult::check(Severity::Warning, bad_columns.len(), detail),
        );

        report.insert(
            "rsi_range",
            match frame.column("rsi") {
                Some(rsi) => {
                    let out = rsi
                        .iter()
                        .flatten()
                        .filter(|v| !(0.0..=100.0).contains(*v))
                        .count();
                    RuleResult::check(
                        Severity::Warning,
                        out,
                        format!("{out} defined values outside [0, 100]"),
                    )
                }
                None => absent("rsi"),
            },
        );

        report.insert(
            "bollinger_order",
            match (
                frame.column("bb_lower"),
                frame.column("bb_middle"),
                frame.column("bb_upper"),
            ) {
                (Some(lower), Some(middle), Some(upper)) => {
                    let disordered = lower
                        .iter()
                        .zip(middle)
                        .zip(upper)
                        .filter(|((l, m), u)| match (l, m, u) {
                            (Some(l), Some(m), Some(u)) => !(l <= m && m <= u),
                            _ => false,
                        })
                        .count();
                    RuleResult::check(
                        Severity::Warning,
                        disordered,
                        format!("{disordered} rows violate lower <= middle <= upper"),
                    )
                }
                _ => absent("bb_*"),
            },
        );

        for name in INDICATOR_COLUMNS {
            if let Some(column) = frame.column(name) {
                let undefined = column.iter().filter(|c| c.is_none()).count();
                let share = if column.is_empty() {
                    0.0
                } else {
                    undefined as f64 / column.len() as f64
                };
                report.insert(
                    format!("warmup_{name}"),
                    RuleResult::info(
                        undefined,
                        format!("{undefined} undefined ({:.2}%)", share * 100.0),
                    ),
                );
            }
        }

        report
    }
}

fn absent(column: &str) -> RuleResult {
    RuleResult {
        passed: false,
        detail: format!("column {column} absent"),
        affected_row_count: 0,
        severity: Severity::Warning,
    }
}
