//! End-to-end run: collect → validate raw → compute indicators → validate
//! derived → hand the result to the caller for persistence.
//!
//! Only a complete series that passed every Error-severity raw rule reaches
//! the indicator engine. Derived-rule failures are warnings: they are logged
//! and returned in the output, never fatal.

use crate::config::PipelineConfig;
use crate::data::{
    CancelToken, CollectError, Collection, CollectionReport, ExchangeClient, HistoricalCollector,
};
use crate::domain::{Series, Timeframe};
use crate::indicators::{IndicatorEngine, IndicatorFrame};
use crate::validate::{Severity, ValidationReport, Validator};
use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Collection(#[from] CollectError),

    #[error("run cancelled after {partial_candles} candles")]
    Cancelled { partial_candles: usize },

    #[error("raw validation failed: {}", failed_rules(.0))]
    ValidationFailed(ValidationReport),
}

fn failed_rules(report: &ValidationReport) -> String {
    report
        .failures(Severity::Error)
        .map(|(name, r)| format!("{name} ({} rows)", r.affected_row_count))
        .collect::<Vec<_>>()
        .join(", ")
}

/// What to collect.
#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    /// Stop after raw validation; no indicator columns.
    pub raw_only: bool,
}

/// The validated data a run hands off for persistence.
#[derive(Debug, Clone)]
pub enum PipelineData {
    Raw(Series),
    Derived(IndicatorFrame),
}

impl PipelineData {
    pub fn series(&self) -> &Series {
        match self {
            PipelineData::Raw(series) => series,
            PipelineData::Derived(frame) => frame.series(),
        }
    }

    pub fn frame(&self) -> Option<&IndicatorFrame> {
        match self {
            PipelineData::Raw(_) => None,
            PipelineData::Derived(frame) => Some(frame),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub data: PipelineData,
    pub collection: CollectionReport,
    pub raw_report: ValidationReport,
    /// Absent in raw-only runs.
    pub derived_report: Option<ValidationReport>,
}

pub struct Pipeline<'a> {
    client: &'a dyn ExchangeClient,
    config: PipelineConfig,
    engine: IndicatorEngine,
}

impl<'a> Pipeline<'a> {
    pub fn new(client: &'a dyn ExchangeClient, config: PipelineConfig) -> Self {
        Self {
            client,
            config,
            engine: IndicatorEngine::standard(),
        }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn run(
        &self,
        request: &PipelineRequest,
        cancel: &CancelToken,
    ) -> Result<PipelineOutput, PipelineError> {
        let mut collector = HistoricalCollector::new(self.client, &self.config);
        let collection = collector.collect(
            &request.symbol,
            request.timeframe,
            request.start,
            request.end,
            cancel,
        )?;
        self.process(collection, request.raw_only)
    }

    /// Validation and indicator stages over an already-collected series.
    pub fn process(
        &self,
        collection: Collection,
        raw_only: bool,
    ) -> Result<PipelineOutput, PipelineError> {
        let Collection { series, report } = collection;

        if !report.complete {
            return Err(PipelineError::Cancelled {
                partial_candles: series.len(),
            });
        }

        let raw_report = Validator::validate_raw(&series);
        if raw_report.has_errors() {
            return Err(PipelineError::ValidationFailed(raw_report));
        }
        info!(
            symbol = series.symbol(),
            candles = series.len(),
            gaps = report.gap_count(),
            "raw validation passed"
        );

        if raw_only {
            return Ok(PipelineOutput {
                data: PipelineData::Raw(series),
                collection: report,
                raw_report,
                derived_report: None,
            });
        }

        let frame = self.engine.compute(&series);
        let derived_report = Validator::validate_derived(&frame);
        for (rule, result) in derived_report.failures(Severity::Warning) {
            warn!(rule, detail = %result.detail, "derived validation warning");
        }

        Ok(PipelineOutput {
            data: PipelineData::Derived(frame),
            collection: report,
            raw_report,
            derived_report: Some(derived_report),
        })
    }
}
