// mulegraph/src/filter.rs
//
// Filter & highlight engine. Presentation only: nothing here touches the
// result or the layout, it maps (node, filter state, pattern index) to how
// the node is drawn.
//
// Opacity precedence, first match wins:
//   suspicious-only set, node clean                    → strong dim   0.08
//   node suspicious, score < min risk                  → moderate dim 0.15
//   pattern filter set, node suspicious, not in index  → light dim    0.12
//   otherwise                                          → visible      1.0

use std::collections::HashSet;

use serde::Serialize;
use tracing::debug;

use crate::aggregate::HIGH_RISK;
use crate::error::SessionError;
use crate::index::PatternIndex;
use crate::model::{AnalysisResult, GraphNode, PatternType};

pub const STROKE_DEFAULT:  &str = "rgba(0,0,0,0.25)";
pub const STROKE_EMPHASIS: &str = "rgba(22,163,74,0.9)";

const LABEL_MAX_CHARS: usize = 12;

// ── Filter state ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PatternFilter {
    #[default]
    All,
    Only(PatternType),
}

impl PatternFilter {
    pub fn parse(s: &str) -> Option<Self> {
        if s == "all" {
            return Some(Self::All);
        }
        PatternType::parse(s).map(Self::Only)
    }
}

/// At most one highlight target at a time.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Focus {
    #[default]
    None,
    Ring(String),
    Account(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FilterState {
    pub min_risk:        f64,
    pub suspicious_only: bool,
    pub pattern:         PatternFilter,
    pub show_labels:     bool,
    pub focus:           Focus,
}

impl Default for FilterState {
    fn default() -> Self {
        Self {
            min_risk:        0.0,
            suspicious_only: false,
            pattern:         PatternFilter::All,
            show_labels:     true,
            focus:           Focus::None,
        }
    }
}

impl FilterState {
    pub fn set_min_risk(&mut self, v: f64) {
        self.min_risk = if v.is_nan() { 0.0 } else { v.clamp(0.0, 100.0) };
    }

    pub fn toggle_labels(&mut self) -> bool {
        self.show_labels = !self.show_labels;
        self.show_labels
    }

    /// Highlight every member of `ring_id`, replacing any account highlight.
    /// An unknown ring leaves the current focus untouched.
    pub fn focus_ring(&mut self, result: &AnalysisResult, ring_id: &str) -> Result<(), SessionError> {
        if result.ring(ring_id).is_none() {
            return Err(SessionError::UnknownRing(ring_id.to_string()));
        }
        debug!("focus ring {}", ring_id);
        self.focus = Focus::Ring(ring_id.to_string());
        Ok(())
    }

    /// Highlight a single account. Ids with no node simply highlight nothing.
    pub fn focus_account(&mut self, account_id: &str) {
        debug!("focus account {}", account_id);
        self.focus = Focus::Account(account_id.to_string());
    }

    pub fn clear_focus(&mut self) {
        self.focus = Focus::None;
    }
}

// ── Treatments ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Opacity {
    Visible,
    LightDim,
    ModerateDim,
    StrongDim,
}

impl Opacity {
    pub fn value(&self) -> f64 {
        match self {
            Self::Visible     => 1.0,
            Self::LightDim    => 0.12,
            Self::ModerateDim => 0.15,
            Self::StrongDim   => 0.08,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Stroke {
    Default,
    Emphasis,
}

impl Stroke {
    pub fn color(&self) -> &'static str {
        match self {
            Self::Default  => STROKE_DEFAULT,
            Self::Emphasis => STROKE_EMPHASIS,
        }
    }

    pub fn width(&self) -> f64 {
        match self {
            Self::Default  => 1.5,
            Self::Emphasis => 3.0,
        }
    }
}

pub fn node_opacity(node: &GraphNode, state: &FilterState, index: &PatternIndex) -> Opacity {
    let susp = node.is_suspicious;

    if state.suspicious_only && !susp {
        return Opacity::StrongDim;
    }
    if susp && node.suspicion_score < state.min_risk {
        return Opacity::ModerateDim;
    }
    if let PatternFilter::Only(p) = state.pattern {
        if susp && !index.has_pattern(&node.id, p) {
            return Opacity::LightDim;
        }
    }
    Opacity::Visible
}

/// Account ids that carry the emphasis stroke under `focus`.
pub fn highlighted(focus: &Focus, result: &AnalysisResult) -> HashSet<String> {
    match focus {
        Focus::None => HashSet::new(),
        Focus::Ring(id) => result
            .ring(id)
            .map(|r| r.member_accounts.iter().cloned().collect())
            .unwrap_or_default(),
        Focus::Account(id) => [id.clone()].into_iter().collect(),
    }
}

// ── Per-node presentation ─────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeStyle {
    pub id:            String,
    pub radius:        f64,
    pub fill:          &'static str,
    pub opacity:       Opacity,
    pub stroke:        Stroke,
    pub label:         String,
    pub label_visible: bool,
}

pub fn node_fill(node: &GraphNode) -> &'static str {
    if !node.is_suspicious {
        "#94a3b8"
    } else if node.suspicion_score >= HIGH_RISK {
        "#ef4444"
    } else {
        "#f59e0b"
    }
}

pub fn node_radius(node: &GraphNode) -> f64 {
    if node.is_suspicious { 9.0 } else { 6.0 }
}

pub fn edge_width(weight: f64) -> f64 {
    (0.6 + (weight / 2000.0).max(0.0).sqrt()).min(3.0)
}

/// Ids longer than 12 characters are cut and marked with an ellipsis.
pub fn short_label(id: &str) -> String {
    if id.chars().count() > LABEL_MAX_CHARS {
        let head: String = id.chars().take(LABEL_MAX_CHARS).collect();
        format!("{head}…")
    } else {
        id.to_string()
    }
}

/// Resolve every node's treatment in one pass.
pub fn present<'a, I>(
    nodes:  I,
    state:  &FilterState,
    index:  &PatternIndex,
    result: &AnalysisResult,
) -> Vec<NodeStyle>
where
    I: IntoIterator<Item = &'a GraphNode>,
{
    let lit = highlighted(&state.focus, result);
    nodes
        .into_iter()
        .map(|n| NodeStyle {
            id:            n.id.clone(),
            radius:        node_radius(n),
            fill:          node_fill(n),
            opacity:       node_opacity(n, state, index),
            stroke:        if lit.contains(&n.id) { Stroke::Emphasis } else { Stroke::Default },
            label:         short_label(&n.id),
            label_visible: state.show_labels,
        })
        .collect()
}

// ── Node detail ───────────────────────────────────────────────────────────────

/// Thousands-separated, two decimals: 1234567.5 → "1,234,567.50".
pub fn format_money(v: f64) -> String {
    let v        = if v.is_finite() { v } else { 0.0 };
    let fixed    = format!("{:.2}", v.abs());
    let (int, frac) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));
    let mut grouped = String::with_capacity(int.len() + int.len() / 3);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    let sign = if v < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac}")
}

/// What the tooltip / selection panel shows for one node.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodeDetail {
    pub id:           String,
    pub sent:         String,
    pub received:     String,
    pub transactions: u64,
    pub score:        String,
    pub patterns:     String,
}

impl NodeDetail {
    pub fn of(node: &GraphNode, index: &PatternIndex) -> Self {
        Self {
            id:           node.id.clone(),
            sent:         format_money(node.total_sent),
            received:     format_money(node.total_received),
            transactions: node.transaction_count,
            score:        format!("{:.1}", node.suspicion_score),
            patterns:     index.describe(&node.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FraudRing, PatternLabel};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn node(id: &str, susp: bool, score: f64) -> GraphNode {
        GraphNode {
            id:                id.into(),
            total_sent:        1234.5,
            total_received:    0.0,
            transaction_count: 3,
            is_suspicious:     susp,
            suspicion_score:   score,
            ring_ids:          vec![],
        }
    }

    fn fixture() -> (AnalysisResult, PatternIndex) {
        let result = AnalysisResult {
            fraud_rings: vec![
                FraudRing {
                    ring_id:         "R1".into(),
                    member_accounts: vec!["A".into(), "B".into()],
                    pattern_type:    PatternLabel::Known(PatternType::Cycle),
                    risk_score:      90.0,
                },
                FraudRing {
                    ring_id:         "R2".into(),
                    member_accounts: vec!["C".into()],
                    pattern_type:    PatternLabel::Known(PatternType::FanOut),
                    risk_score:      60.0,
                },
            ],
            ..Default::default()
        };
        let index = PatternIndex::build(&result.fraud_rings);
        (result, index)
    }

    #[test]
    fn precedence_of_dimming_rules() {
        let (_, index) = fixture();
        let mut s = FilterState { suspicious_only: true, ..Default::default() };
        s.set_min_risk(50.0);
        s.pattern = PatternFilter::Only(PatternType::FanOut);

        assert_eq!(node_opacity(&node("X", false, 0.0), &s, &index), Opacity::StrongDim);
        // below threshold beats pattern mismatch
        assert_eq!(node_opacity(&node("A", true, 45.0), &s, &index), Opacity::ModerateDim);
        assert_eq!(node_opacity(&node("A", true, 80.0), &s, &index), Opacity::LightDim);
        assert_eq!(node_opacity(&node("C", true, 80.0), &s, &index), Opacity::Visible);
        // suspicious account outside every ring is dimmed by a pattern filter
        assert_eq!(node_opacity(&node("Q", true, 80.0), &s, &index), Opacity::LightDim);
    }

    #[test]
    fn clean_nodes_ignore_risk_and_pattern() {
        let (_, index) = fixture();
        let s = FilterState {
            min_risk: 90.0,
            pattern: PatternFilter::Only(PatternType::Cycle),
            ..Default::default()
        };
        assert_eq!(node_opacity(&node("X", false, 0.0), &s, &index), Opacity::Visible);
    }

    #[test]
    fn ring_focus_replaces_account_focus() {
        let (result, index) = fixture();
        let mut s = FilterState::default();
        s.focus_account("C");
        s.focus_ring(&result, "R1").unwrap();

        let nodes = [node("A", true, 80.0), node("B", true, 80.0), node("C", true, 80.0)];
        let styles = present(nodes.iter(), &s, &index, &result);
        let strokes: Vec<_> = styles.iter().map(|n| n.stroke).collect();
        assert_eq!(strokes, vec![Stroke::Emphasis, Stroke::Emphasis, Stroke::Default]);

        s.focus_account("C");
        let styles = present(nodes.iter(), &s, &index, &result);
        let lit: Vec<_> = styles.iter().filter(|n| n.stroke == Stroke::Emphasis).map(|n| n.id.as_str()).collect();
        assert_eq!(lit, vec!["C"]);
    }

    #[test]
    fn unknown_ring_keeps_previous_focus() {
        let (result, _) = fixture();
        let mut s = FilterState::default();
        s.focus_account("A");
        assert_eq!(s.focus_ring(&result, "R9"), Err(SessionError::UnknownRing("R9".into())));
        assert_eq!(s.focus, Focus::Account("A".into()));
    }

    #[test]
    fn labels_follow_global_flag() {
        let (result, index) = fixture();
        let mut s = FilterState { suspicious_only: true, ..Default::default() };
        assert!(!s.toggle_labels());
        let styles = present([node("VERY_LONG_ACCOUNT_ID", false, 0.0)].iter(), &s, &index, &result);
        assert!(!styles[0].label_visible);
        assert_eq!(styles[0].opacity, Opacity::StrongDim);
        assert_eq!(styles[0].label, "VERY_LONG_AC…");
    }

    #[test]
    fn visual_encoding() {
        assert_eq!(node_fill(&node("A", true, 70.0)), "#ef4444");
        assert_eq!(node_fill(&node("A", true, 69.0)), "#f59e0b");
        assert_eq!(node_fill(&node("A", false, 99.0)), "#94a3b8");
        assert_eq!(edge_width(0.0), 0.6);
        assert_eq!(edge_width(1_000_000.0), 3.0);
    }

    #[test]
    fn money_and_detail() {
        assert_eq!(format_money(1234567.5), "1,234,567.50");
        assert_eq!(format_money(999.999), "1,000.00");
        assert_eq!(format_money(0.0), "0.00");
        assert_eq!(format_money(-42.0), "-42.00");

        let (_, index) = fixture();
        let d = NodeDetail::of(&node("A", true, 75.24), &index);
        assert_eq!(d.sent, "1,234.50");
        assert_eq!(d.score, "75.2");
        assert_eq!(d.patterns, "cycle");
    }

    #[test]
    fn min_risk_is_clamped() {
        let mut s = FilterState::default();
        s.set_min_risk(140.0);
        assert_eq!(s.min_risk, 100.0);
        s.set_min_risk(-3.0);
        assert_eq!(s.min_risk, 0.0);
    }

    proptest! {
        #[test]
        fn opacity_is_one_of_four_levels(
            susp in any::<bool>(), score in 0.0f64..=100.0, min_risk in 0.0f64..=100.0,
            only in any::<bool>(), pattern in 0usize..5, id in "[A-D]",
        ) {
            let (_, index) = fixture();
            let s = FilterState {
                min_risk,
                suspicious_only: only,
                pattern: if pattern == 4 { PatternFilter::All } else { PatternFilter::Only(PatternType::ALL[pattern]) },
                ..Default::default()
            };
            let o = node_opacity(&node(&id, susp, score), &s, &index);
            prop_assert!([1.0, 0.12, 0.15, 0.08].contains(&o.value()));
        }
    }
}
