// mulegraph/src/aggregate.rs
//
// Chart data. Three independent pure reductions over one AnalysisResult:
//
//   risk histogram    : suspicious accounts by score band (high ≥70, medium 40–69, low <40)
//   pattern histogram : rings by known pattern type, unknown labels ignored
//   volume series     : edges in given order, N contiguous buckets of summed weight
//
// Plus the KPI summary shown above the charts.

use serde::Serialize;

use crate::model::{AnalysisResult, GraphEdge, PatternType, SuspiciousAccount};

pub const HIGH_RISK:   f64 = 70.0;
pub const MEDIUM_RISK: f64 = 40.0;

const MIN_BUCKETS:     usize = 3;
const MAX_BUCKETS:     usize = 10;
const EDGES_PER_BUCKET: usize = 8;

// ── Risk bands ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskBand {
    High,
    Medium,
    Low,
}

impl RiskBand {
    pub fn of(score: f64) -> Self {
        if score >= HIGH_RISK {
            Self::High
        } else if score >= MEDIUM_RISK {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::High   => "High (≥70)",
            Self::Medium => "Medium (40–69)",
            Self::Low    => "Low (<40)",
        }
    }

    pub fn color(&self) -> &'static str {
        match self {
            Self::High   => "#ef4444",
            Self::Medium => "#f59e0b",
            Self::Low    => "#16a34a",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct RiskHistogram {
    pub high:   u64,
    pub medium: u64,
    pub low:    u64,
}

impl RiskHistogram {
    pub fn compute(accounts: &[SuspiciousAccount]) -> Self {
        let mut h = Self::default();
        for a in accounts {
            match RiskBand::of(a.suspicion_score) {
                RiskBand::High   => h.high   += 1,
                RiskBand::Medium => h.medium += 1,
                RiskBand::Low    => h.low    += 1,
            }
        }
        h
    }

    pub fn total(&self) -> u64 { self.high + self.medium + self.low }

    pub fn bands(&self) -> [(RiskBand, u64); 3] {
        [
            (RiskBand::High,   self.high),
            (RiskBand::Medium, self.medium),
            (RiskBand::Low,    self.low),
        ]
    }
}

/// Account-table risk selector. Shares the histogram's band boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RiskFilter {
    #[default]
    All,
    Band(RiskBand),
}

impl RiskFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "all"  => Some(Self::All),
            "high" => Some(Self::Band(RiskBand::High)),
            "med" | "medium" => Some(Self::Band(RiskBand::Medium)),
            "low"  => Some(Self::Band(RiskBand::Low)),
            _      => None,
        }
    }

    pub fn accepts(&self, score: f64) -> bool {
        match self {
            Self::All        => true,
            Self::Band(band) => RiskBand::of(score) == *band,
        }
    }

    pub fn apply<'a>(&self, accounts: &'a [SuspiciousAccount]) -> Vec<&'a SuspiciousAccount> {
        accounts.iter().filter(|a| self.accepts(a.suspicion_score)).collect()
    }
}

// ── Pattern histogram ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct PatternHistogram {
    pub cycle:         u64,
    pub fan_in:        u64,
    pub fan_out:       u64,
    pub shell_network: u64,
}

impl PatternHistogram {
    pub fn compute(result: &AnalysisResult) -> Self {
        let mut h = Self::default();
        for p in result.fraud_rings.iter().filter_map(|r| r.pattern_type.known()) {
            *h.slot(p) += 1;
        }
        h
    }

    fn slot(&mut self, p: PatternType) -> &mut u64 {
        match p {
            PatternType::Cycle        => &mut self.cycle,
            PatternType::FanIn        => &mut self.fan_in,
            PatternType::FanOut       => &mut self.fan_out,
            PatternType::ShellNetwork => &mut self.shell_network,
        }
    }

    pub fn get(&self, p: PatternType) -> u64 {
        match p {
            PatternType::Cycle        => self.cycle,
            PatternType::FanIn        => self.fan_in,
            PatternType::FanOut       => self.fan_out,
            PatternType::ShellNetwork => self.shell_network,
        }
    }

    pub fn entries(&self) -> [(PatternType, u64); 4] {
        PatternType::ALL.map(|p| (p, self.get(p)))
    }

    pub fn total(&self) -> u64 {
        self.cycle + self.fan_in + self.fan_out + self.shell_network
    }
}

// ── Edge-volume series ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeBucket {
    pub label: String,
    pub edges: usize,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VolumeSeries {
    pub buckets: Vec<VolumeBucket>,
}

impl VolumeSeries {
    /// Bucket count for `edge_count` edges: clamp(floor(n / 8), 3, 10).
    pub fn bucket_count(edge_count: usize) -> usize {
        (edge_count / EDGES_PER_BUCKET).clamp(MIN_BUCKETS, MAX_BUCKETS)
    }

    /// Edges are taken in their given order. Every bucket but the last holds
    /// `max(1, floor(n / N))` edges; the last absorbs the remainder.
    pub fn compute(edges: &[GraphEdge]) -> Self {
        let n     = edges.len();
        let count = Self::bucket_count(n);
        let step  = (n / count).max(1);

        let buckets = (0..count)
            .map(|i| {
                let start = (i * step).min(n);
                let end   = if i + 1 == count { n } else { (start + step).min(n) };
                let slice = &edges[start..end];
                VolumeBucket {
                    label: format!("B{}", i + 1),
                    edges: slice.len(),
                    value: slice.iter().map(|e| e.weight).sum(),
                }
            })
            .collect();

        Self { buckets }
    }

    pub fn total(&self) -> f64 { self.buckets.iter().map(|b| b.value).sum() }

    pub fn max_value(&self) -> f64 {
        self.buckets.iter().map(|b| b.value).fold(0.0, f64::max)
    }
}

// ── KPIs ──────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Kpis {
    pub total_accounts:      u64,
    pub suspicious_accounts: u64,
    pub rings:               u64,
    pub processing_seconds:  f64,
    /// Suspicious share of total, one decimal, "0.0" for an empty run.
    pub suspicious_pct:      String,
    pub ai_insight:          Option<String>,
}

impl Kpis {
    pub fn compute(result: &AnalysisResult) -> Self {
        let s     = &result.summary;
        let total = s.total_accounts_analyzed;
        let susp  = s.suspicious_accounts_flagged;
        let pct   = if total == 0 {
            "0.0".to_string()
        } else {
            format!("{:.1}", susp as f64 / total as f64 * 100.0)
        };
        Self {
            total_accounts:      total,
            suspicious_accounts: susp,
            rings:               s.fraud_rings_detected,
            processing_seconds:  s.processing_time_seconds,
            suspicious_pct:      pct,
            ai_insight:          s.ai_insight.clone(),
        }
    }
}

/// Everything the chart collaborator needs for one run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartData {
    pub kpis:     Kpis,
    pub risk:     RiskHistogram,
    pub patterns: PatternHistogram,
    pub volume:   VolumeSeries,
}

impl ChartData {
    pub fn compute(result: &AnalysisResult) -> Self {
        Self {
            kpis:     Kpis::compute(result),
            risk:     RiskHistogram::compute(&result.suspicious_accounts),
            patterns: PatternHistogram::compute(result),
            volume:   VolumeSeries::compute(&result.graph_data.edges),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FraudRing, PatternLabel};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn account(id: &str, score: f64) -> SuspiciousAccount {
        SuspiciousAccount {
            account_id:        id.into(),
            suspicion_score:   score,
            detected_patterns: vec![],
            ring_id:           None,
        }
    }

    fn edge(weight: f64) -> GraphEdge {
        GraphEdge { source: "A".into(), target: "B".into(), weight, count: None }
    }

    fn ring(p: &str) -> FraudRing {
        FraudRing {
            ring_id:         "R".into(),
            member_accounts: vec!["A".into()],
            pattern_type:    PatternLabel::from(p.to_string()),
            risk_score:      10.0,
        }
    }

    #[test]
    fn single_ring_example_histograms() {
        let result = AnalysisResult {
            suspicious_accounts: vec![account("A", 75.0)],
            fraud_rings:         vec![ring("cycle")],
            ..Default::default()
        };
        let charts = ChartData::compute(&result);
        assert_eq!(charts.risk, RiskHistogram { high: 1, medium: 0, low: 0 });
        assert_eq!(
            charts.patterns,
            PatternHistogram { cycle: 1, fan_in: 0, fan_out: 0, shell_network: 0 }
        );
    }

    #[test]
    fn band_boundaries() {
        assert_eq!(RiskBand::of(70.0), RiskBand::High);
        assert_eq!(RiskBand::of(69.9), RiskBand::Medium);
        assert_eq!(RiskBand::of(40.0), RiskBand::Medium);
        assert_eq!(RiskBand::of(39.99), RiskBand::Low);
        assert_eq!(RiskBand::of(f64::NAN), RiskBand::Low);
    }

    #[test]
    fn unknown_patterns_are_ignored() {
        let result = AnalysisResult {
            fraud_rings: vec![ring("fan_in"), ring("smurf"), ring("fan_in"), ring("shell_network")],
            ..Default::default()
        };
        let h = PatternHistogram::compute(&result);
        assert_eq!(h.fan_in, 2);
        assert_eq!(h.shell_network, 1);
        assert_eq!(h.total(), 3);
    }

    #[test]
    fn seventeen_edges_make_three_buckets() {
        let edges: Vec<_> = (0..17).map(|_| edge(1.0)).collect();
        let s = VolumeSeries::compute(&edges);
        let sizes: Vec<_> = s.buckets.iter().map(|b| b.edges).collect();
        let sums:  Vec<_> = s.buckets.iter().map(|b| b.value).collect();
        let labels: Vec<_> = s.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(sizes, vec![5, 5, 7]);
        assert_eq!(sums, vec![5.0, 5.0, 7.0]);
        assert_eq!(labels, vec!["B1", "B2", "B3"]);
    }

    #[test]
    fn zero_edges_give_three_empty_buckets() {
        let s = VolumeSeries::compute(&[]);
        assert_eq!(s.buckets.len(), 3);
        assert!(s.buckets.iter().all(|b| b.value == 0.0 && b.edges == 0));
    }

    #[test]
    fn fewer_edges_than_buckets() {
        let s = VolumeSeries::compute(&[edge(2.0), edge(3.0)]);
        let sizes: Vec<_> = s.buckets.iter().map(|b| b.edges).collect();
        assert_eq!(sizes, vec![1, 1, 0]);
        assert_eq!(s.total(), 5.0);
    }

    #[test]
    fn bucket_count_caps_at_ten() {
        assert_eq!(VolumeSeries::bucket_count(0), 3);
        assert_eq!(VolumeSeries::bucket_count(40), 5);
        assert_eq!(VolumeSeries::bucket_count(1_000), 10);
    }

    #[test]
    fn kpi_percentage() {
        let mut result = AnalysisResult::default();
        assert_eq!(Kpis::compute(&result).suspicious_pct, "0.0");
        result.summary.total_accounts_analyzed     = 8;
        result.summary.suspicious_accounts_flagged = 3;
        assert_eq!(Kpis::compute(&result).suspicious_pct, "37.5");
    }

    #[test]
    fn risk_filter_matches_bands() {
        let accounts = vec![account("A", 90.0), account("B", 55.0), account("C", 5.0)];
        let med = RiskFilter::parse("med").unwrap().apply(&accounts);
        assert_eq!(med.len(), 1);
        assert_eq!(med[0].account_id, "B");
        assert_eq!(RiskFilter::parse("all").unwrap().apply(&accounts).len(), 3);
        assert_eq!(RiskFilter::parse("extreme"), None);
    }

    proptest! {
        #[test]
        fn risk_buckets_partition_accounts(scores in prop::collection::vec(0.0f64..=100.0, 0..64)) {
            let accounts: Vec<_> = scores.iter().map(|s| account("X", *s)).collect();
            prop_assert_eq!(RiskHistogram::compute(&accounts).total(), accounts.len() as u64);
        }

        #[test]
        fn volume_series_conserves_weight(weights in prop::collection::vec(0u32..10_000, 0..200)) {
            let edges: Vec<_> = weights.iter().map(|w| edge(*w as f64)).collect();
            let s = VolumeSeries::compute(&edges);
            let expected: f64 = weights.iter().map(|w| *w as f64).sum();
            prop_assert_eq!(s.total(), expected);
            prop_assert_eq!(s.buckets.iter().map(|b| b.edges).sum::<usize>(), edges.len());
            prop_assert_eq!(s.buckets.len(), VolumeSeries::bucket_count(edges.len()));
        }
    }
}
