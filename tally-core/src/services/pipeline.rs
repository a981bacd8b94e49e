//! Pipeline service - end-to-end runs over a folder of inputs
//!
//! Reads sources through a provider, ingests them, and hands the snapshots to
//! the merge and statistics services.

use anyhow::Result;
use serde::Serialize;

use crate::domain::{AnnualReport, BatchOutcome, DetailRow, GroupBy, Period, PeriodSummary};
use crate::ports::SourceProvider;
use crate::services::batch_merge::BatchMerge;
use crate::services::ingest::{IngestReport, IngestService};
use crate::services::merge::{MergeOutcome, TemporalMerge};
use crate::services::stats::{annual_detail, annual_report, period_summary};

/// Single-batch merge of every input of a provider
#[derive(Debug, Serialize)]
pub struct BatchRun {
    pub ingest: IngestReport,
    pub outcome: BatchOutcome,
}

/// Temporal merge plus annual statistics
#[derive(Debug)]
pub struct AnnualRun {
    pub ingest: IngestReport,
    pub outcome: MergeOutcome,
    pub report: AnnualReport,
    /// Empty unless the inputs fall in a single year
    pub detail: Vec<DetailRow>,
}

#[derive(Debug)]
pub struct SummaryRun {
    pub ingest: IngestReport,
    pub outcome: MergeOutcome,
    pub summary: PeriodSummary,
}

#[derive(Debug, Clone)]
pub struct PipelineService {
    ingest: IngestService,
    merge: TemporalMerge,
}

impl PipelineService {
    pub fn new(ingest: IngestService, merge: TemporalMerge) -> Self {
        Self { ingest, merge }
    }

    pub fn ingest_service(&self) -> &IngestService {
        &self.ingest
    }

    /// Load and ingest every input; unusable inputs end up in `rejected`
    pub fn ingest(&self, provider: &dyn SourceProvider) -> Result<IngestReport> {
        let load = provider.load()?;
        Ok(self.ingest.ingest_load(load))
    }

    pub fn batch(&self, provider: &dyn SourceProvider) -> Result<BatchRun> {
        let ingest = self.ingest(provider)?;
        let snapshots: Vec<_> = ingest.snapshots().cloned().collect();
        let outcome = BatchMerge::run(&snapshots);
        Ok(BatchRun { ingest, outcome })
    }

    /// Recency-wins merge of all dated inputs
    pub fn temporal(&self, provider: &dyn SourceProvider) -> Result<(IngestReport, MergeOutcome)> {
        let ingest = self.ingest(provider)?;
        let outcome = self.merge.clone().merge_sources(&ingest.accepted);
        Ok((ingest, outcome))
    }

    pub fn annual(&self, provider: &dyn SourceProvider, group_by: GroupBy) -> Result<AnnualRun> {
        let (ingest, outcome) = self.temporal(provider)?;
        let report = annual_report(&outcome, group_by);
        let detail = match report.target_year {
            Some(year) => annual_detail(&outcome, year),
            None => Vec::new(),
        };
        Ok(AnnualRun {
            ingest,
            outcome,
            report,
            detail,
        })
    }

    pub fn summary(&self, provider: &dyn SourceProvider, period: Period, group_by: GroupBy) -> Result<SummaryRun> {
        let (ingest, outcome) = self.temporal(provider)?;
        let summary = period_summary(&outcome.ledger, &outcome.profiles, period, group_by);
        Ok(SummaryRun {
            ingest,
            outcome,
            summary,
        })
    }
}

impl Default for PipelineService {
    fn default() -> Self {
        Self::new(IngestService::default(), TemporalMerge::default())
    }
}
