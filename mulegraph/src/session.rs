// mulegraph/src/session.rs
//
// The explicit session object. Owns the single active analysis result and
// everything derived from it, the filter state, the export history and the
// run generation counter.
//
// Run protocol:
//   begin_run()   : bump the generation (halts the live layout loop), hand
//                   out a RunToken and the selected file
//   <await the service>
//   apply(token)  : rejected if a newer run or a reset happened meanwhile,
//                   otherwise replaces result + index + charts + layout in
//                   one assignment so readers never see a half-updated run
//
// Nothing is persisted; reset() drops it all.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use crate::aggregate::ChartData;
use crate::client::CsvFile;
use crate::config::{ExportConfig, LayoutConfig};
use crate::error::{InputError, Result, SessionError};
use crate::export::{self, Artifact, ExportHistory, ExportKind};
use crate::filter::{self, FilterState, NodeDetail, NodeStyle};
use crate::graph::NetworkGraph;
use crate::index::PatternIndex;
use crate::layout::LayoutEngine;
use crate::model::AnalysisResult;

// ── Run generation ────────────────────────────────────────────────────────────

/// Monotonic run counter shared with every token it hands out.
#[derive(Debug, Clone, Default)]
pub struct RunCounter(Arc<AtomicU64>);

impl RunCounter {
    /// Start a new generation; every earlier token goes stale.
    pub fn begin(&self) -> RunToken {
        let generation = self.0.fetch_add(1, Ordering::SeqCst) + 1;
        RunToken { generation, current: Arc::clone(&self.0) }
    }

    pub fn current(&self) -> u64 { self.0.load(Ordering::SeqCst) }
}

#[derive(Debug, Clone)]
pub struct RunToken {
    generation: u64,
    current:    Arc<AtomicU64>,
}

impl RunToken {
    pub fn generation(&self) -> u64 { self.generation }

    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::SeqCst) == self.generation
    }

    pub fn check(&self) -> Result<(), SessionError> {
        let current = self.current.load(Ordering::SeqCst);
        if current == self.generation {
            Ok(())
        } else {
            Err(SessionError::StaleRun { got: self.generation, current })
        }
    }
}

// ── Active run ────────────────────────────────────────────────────────────────

/// Everything derived from one result. Built completely before it replaces
/// the previous run.
pub struct ActiveRun {
    pub generation: u64,
    pub result:     Arc<AnalysisResult>,
    pub index:      PatternIndex,
    pub charts:     ChartData,
    pub layout:     Arc<Mutex<LayoutEngine>>,
}

impl ActiveRun {
    fn build(generation: u64, result: AnalysisResult, layout: &LayoutConfig) -> Result<Self> {
        let graph  = NetworkGraph::build(&result.graph_data)?;
        let index  = PatternIndex::build(&result.fraud_rings);
        let charts = ChartData::compute(&result);
        let layout = LayoutEngine::start(graph, layout.clone());
        Ok(Self {
            generation,
            result: Arc::new(result),
            index,
            charts,
            layout: Arc::new(Mutex::new(layout)),
        })
    }
}

// ── Session ───────────────────────────────────────────────────────────────────

pub struct Session {
    runs:          RunCounter,
    layout_config: LayoutConfig,
    selected:      Option<CsvFile>,
    active:        Option<ActiveRun>,
    pub filter:    FilterState,
    pub history:   ExportHistory,
}

impl Session {
    pub fn new(layout_config: LayoutConfig) -> Self {
        Self {
            runs:     RunCounter::default(),
            layout_config,
            selected: None,
            active:   None,
            filter:   FilterState::default(),
            history:  ExportHistory::default(),
        }
    }

    pub fn generation(&self) -> u64 { self.runs.current() }

    // ── File selection ────────────────────────────────────────────────────────

    /// Reject anything that is not a .csv before any network call.
    pub fn select_file(&mut self, name: &str, data: impl Into<bytes::Bytes>) -> Result<&CsvFile, InputError> {
        let file = CsvFile::validate(name, data)?;
        info!("selected {} ({:.1} KB)", file.name, file.size_kb());
        Ok(&*self.selected.insert(file))
    }

    pub fn selected_file(&self) -> Option<&CsvFile> { self.selected.as_ref() }

    pub fn clear_file(&mut self) { self.selected = None; }

    // ── Run lifecycle ─────────────────────────────────────────────────────────

    /// Start a run for the selected file. The previous run's layout loop sees
    /// its token go stale and stops; its result stays readable until replaced.
    pub fn begin_run(&mut self) -> Result<(RunToken, CsvFile), InputError> {
        let file  = self.selected.clone().ok_or(InputError::NoFile)?;
        let token = self.runs.begin();
        info!("run {} started for {}", token.generation(), file.name);
        Ok((token, file))
    }

    /// Install a finished result. Stale tokens and malformed graph data leave
    /// the session exactly as it was.
    pub fn apply(&mut self, token: &RunToken, result: AnalysisResult) -> Result<&ActiveRun> {
        if let Err(e) = token.check() {
            warn!("{}", e);
            return Err(e.into());
        }
        let run = ActiveRun::build(token.generation(), result, &self.layout_config)?;
        info!(
            "run {} applied: {} accounts, {} rings, {} nodes",
            run.generation,
            run.result.suspicious_accounts.len(),
            run.result.fraud_rings.len(),
            run.result.graph_data.nodes.len(),
        );
        self.filter.clear_focus();
        Ok(&*self.active.insert(run))
    }

    /// Begin and apply in one step, for results that need no network round trip.
    pub fn load(&mut self, result: AnalysisResult) -> Result<&ActiveRun> {
        let token = self.runs.begin();
        self.apply(&token, result)
    }

    /// Drop the result, filters, history and file; halt any layout loop.
    pub fn reset(&mut self) {
        let token = self.runs.begin();
        self.active   = None;
        self.selected = None;
        self.filter   = FilterState::default();
        self.history.clear();
        info!("session reset (generation {})", token.generation());
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn active(&self) -> Option<&ActiveRun> { self.active.as_ref() }

    pub fn require(&self) -> Result<&ActiveRun, SessionError> {
        self.active.as_ref().ok_or(SessionError::NoResult)
    }

    /// Token for driving the active run's layout loop.
    pub fn layout_token(&self) -> Result<(Arc<Mutex<LayoutEngine>>, RunToken), SessionError> {
        let run = self.require()?;
        let token = RunToken { generation: run.generation, current: Arc::clone(&self.runs.0) };
        token.check()?;
        Ok((Arc::clone(&run.layout), token))
    }

    pub fn focus_ring(&mut self, ring_id: &str) -> Result<(), SessionError> {
        let run = self.active.as_ref().ok_or(SessionError::NoResult)?;
        self.filter.focus_ring(&run.result, ring_id)
    }

    /// Exact-id account search. Needs a loaded result.
    pub fn search(&mut self, query: &str) -> Result<(), SessionError> {
        self.require()?;
        let q = query.trim();
        if !q.is_empty() {
            self.filter.focus_account(q);
        }
        Ok(())
    }

    /// Node treatments in arena order, aligned with the layout's node indices.
    pub fn presentation(&self) -> Result<Vec<NodeStyle>, SessionError> {
        let run    = self.require()?;
        let layout = run.layout.lock();
        Ok(filter::present(
            layout.graph().nodes().map(|(_, n)| n),
            &self.filter,
            &run.index,
            &run.result,
        ))
    }

    pub fn node_detail(&self, id: &str) -> Result<NodeDetail> {
        let run    = self.require()?;
        let layout = run.layout.lock();
        let node   = layout.graph().lookup(id)?;
        Ok(NodeDetail::of(node, &run.index))
    }

    /// Clicking a node: its detail, and the account becomes the focus.
    /// An unknown id leaves the focus untouched.
    pub fn select_node(&mut self, id: &str) -> Result<NodeDetail> {
        let detail = self.node_detail(id)?;
        self.filter.focus_account(id);
        Ok(detail)
    }

    // ── Exports ───────────────────────────────────────────────────────────────

    /// Build the artifacts for `kind` from the active run and record them.
    /// A failed export leaves the history untouched.
    pub fn export(&mut self, kind: ExportKind, config: &ExportConfig) -> Result<Vec<Artifact>> {
        let run = self.require()?;
        let artifacts = match kind {
            ExportKind::Json => vec![export::json_report(&run.result)?],
            ExportKind::Csv  => export::csv_reports(&run.result)?.to_vec(),
            ExportKind::Svg  => {
                let styles = self.presentation()?;
                vec![export::graph_svg(&run.layout.lock(), &styles, config.theme)]
            }
            ExportKind::Png  => {
                let styles = self.presentation()?;
                vec![export::graph_png(&run.layout.lock(), &styles, config)?]
            }
            ExportKind::Pdf  => vec![export::dashboard_pdf(&run.result, &run.charts, config)?],
        };
        self.history.record(kind, &artifacts);
        Ok(artifacts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::filter::{Focus, Stroke};
    use crate::model::{FraudRing, GraphData, GraphEdge, GraphNode, PatternLabel, PatternType};
    use pretty_assertions::assert_eq;

    fn node(id: &str, susp: bool) -> GraphNode {
        GraphNode {
            id:                id.into(),
            total_sent:        100.0,
            total_received:    50.0,
            transaction_count: 2,
            is_suspicious:     susp,
            suspicion_score:   if susp { 80.0 } else { 0.0 },
            ring_ids:          vec![],
        }
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            fraud_rings: vec![FraudRing {
                ring_id:         "R1".into(),
                member_accounts: vec!["A".into(), "B".into()],
                pattern_type:    PatternLabel::Known(PatternType::Cycle),
                risk_score:      80.0,
            }],
            graph_data: GraphData {
                nodes: vec![node("A", true), node("B", true), node("C", false)],
                edges: vec![GraphEdge { source: "A".into(), target: "B".into(), weight: 10.0, count: None }],
            },
            ..Default::default()
        }
    }

    fn session_with_file() -> Session {
        let mut s = Session::new(LayoutConfig::default());
        s.select_file("tx.csv", &b"transaction_id,sender_id\n"[..]).unwrap();
        s
    }

    #[test]
    fn non_csv_rejected_without_state_change() {
        let mut s = Session::new(LayoutConfig::default());
        assert!(s.select_file("report.xlsx", &b""[..]).is_err());
        assert!(s.selected_file().is_none());
        assert!(matches!(s.begin_run(), Err(InputError::NoFile)));
        assert_eq!(s.generation(), 0);
    }

    #[test]
    fn apply_replaces_run_wholesale() {
        let mut s = session_with_file();
        let (token, _) = s.begin_run().unwrap();
        s.apply(&token, result()).unwrap();
        let run = s.require().unwrap();
        assert_eq!(run.generation, 1);
        assert_eq!(run.index.len(), 2);
        assert_eq!(run.layout.lock().graph().node_count(), 3);
    }

    #[test]
    fn stale_response_after_reset_is_ignored() {
        let mut s = session_with_file();
        let (token, _) = s.begin_run().unwrap();
        s.reset();
        match s.apply(&token, result()) {
            Err(Error::Session(SessionError::StaleRun { got: 1, current: 2 })) => {}
            Err(other) => panic!("unexpected {other:?}"),
            Ok(_) => panic!("stale result applied"),
        }
        assert!(s.active().is_none());
    }

    #[test]
    fn superseded_run_cannot_overwrite_newer_one() {
        let mut s = session_with_file();
        let (first, _)  = s.begin_run().unwrap();
        let (second, _) = s.begin_run().unwrap();
        s.apply(&second, result()).unwrap();
        assert!(s.apply(&first, AnalysisResult::default()).is_err());
        assert_eq!(s.require().unwrap().generation, 2);
    }

    #[test]
    fn malformed_graph_keeps_previous_result() {
        let mut s = Session::new(LayoutConfig::default());
        s.load(result()).unwrap();

        let mut bad = result();
        bad.graph_data.edges.push(GraphEdge { source: "A".into(), target: "Z".into(), weight: 1.0, count: None });
        assert!(matches!(s.load(bad), Err(Error::Graph(_))));
        assert_eq!(s.require().unwrap().generation, 1);
    }

    #[test]
    fn new_run_halts_previous_layout_loop() {
        let mut s = session_with_file();
        let (token, _) = s.begin_run().unwrap();
        s.apply(&token, result()).unwrap();
        let (_, layout_token) = s.layout_token().unwrap();
        assert!(layout_token.is_current());
        s.begin_run().unwrap();
        assert!(!layout_token.is_current());
        assert!(s.layout_token().is_err());
    }

    #[test]
    fn presentation_tracks_focus_and_search() {
        let mut s = Session::new(LayoutConfig::default());
        assert_eq!(s.search("A"), Err(SessionError::NoResult));

        s.load(result()).unwrap();
        s.focus_ring("R1").unwrap();
        let strokes: Vec<_> = s.presentation().unwrap().iter().map(|n| n.stroke).collect();
        assert_eq!(strokes, vec![Stroke::Emphasis, Stroke::Emphasis, Stroke::Default]);

        s.search("  C ").unwrap();
        assert_eq!(s.filter.focus, Focus::Account("C".into()));
    }

    #[test]
    fn reset_clears_everything() {
        let mut s = session_with_file();
        s.load(result()).unwrap();
        s.filter.suspicious_only = true;
        s.reset();
        assert!(s.active().is_none());
        assert!(s.selected_file().is_none());
        assert_eq!(s.filter, FilterState::default());
        assert!(s.history.is_empty());
    }

    #[test]
    fn exports_need_a_result_and_are_recorded() {
        let mut s   = Session::new(LayoutConfig::default());
        let config  = ExportConfig::default();
        assert!(matches!(
            s.export(ExportKind::Json, &config),
            Err(Error::Session(SessionError::NoResult))
        ));
        assert!(s.history.is_empty());

        s.load(result()).unwrap();
        let csv = s.export(ExportKind::Csv, &config).unwrap();
        assert_eq!(csv.len(), 2);
        let svg = s.export(ExportKind::Svg, &config).unwrap();
        assert_eq!(svg[0].filename, "network_graph.svg");

        let names: Vec<_> = s.history.recent().iter().map(|r| r.filename).collect();
        assert_eq!(names, vec!["network_graph.svg", "suspicious_accounts.csv", "fraud_rings.csv"]);
    }

    #[test]
    fn node_detail_lists_patterns() {
        let mut s = Session::new(LayoutConfig::default());
        s.load(result()).unwrap();
        let d = s.node_detail("A").unwrap();
        assert_eq!(d.patterns, "cycle");
        assert_eq!(s.node_detail("C").unwrap().patterns, "—");
        assert!(s.node_detail("nope").is_err());
    }

    #[test]
    fn selecting_a_node_focuses_its_account() {
        let mut s = Session::new(LayoutConfig::default());
        s.load(result()).unwrap();

        let d = s.select_node("B").unwrap();
        assert_eq!(d.patterns, "cycle");
        assert_eq!(s.filter.focus, Focus::Account("B".into()));
        let strokes: Vec<_> = s.presentation().unwrap().iter().map(|n| n.stroke).collect();
        assert_eq!(strokes, vec![Stroke::Default, Stroke::Emphasis, Stroke::Default]);

        assert!(s.select_node("nope").is_err());
        assert_eq!(s.filter.focus, Focus::Account("B".into()));
    }
}
