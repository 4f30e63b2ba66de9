// mulegraph/src/render.rs
//
// SVG documents for the two visual surfaces: the network graph (exported as
// SVG and rasterized to PNG) and the dashboard (rasterized into the PDF).
// Plain string building; every user-supplied string goes through escape().

use std::fmt::Write;

use crate::aggregate::{ChartData, RiskBand};
use crate::config::Theme;
use crate::filter::{edge_width, NodeStyle};
use crate::layout::LayoutEngine;
use crate::model::AnalysisResult;

pub const DASHBOARD_WIDTH: u32 = 1000;

const MARGIN:      f64 = 24.0;
const ROW_HEIGHT:  f64 = 24.0;
const INSIGHT_WRAP: usize = 120;

#[derive(Debug, Clone, PartialEq)]
pub struct SvgDocument {
    pub markup: String,
    pub width:  u32,
    pub height: u32,
}

pub fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&'  => out.push_str("&amp;"),
            '<'  => out.push_str("&lt;"),
            '>'  => out.push_str("&gt;"),
            '"'  => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c    => out.push(c),
        }
    }
    out
}

fn open(svg: &mut String, width: u32, height: u32) {
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{width}" height="{height}" viewBox="0 0 {width} {height}" font-family="Inter, Arial, sans-serif">"#
    );
}

// ── Network graph ─────────────────────────────────────────────────────────────

/// Current layout frame as a standalone SVG. `styles` is in arena order, as
/// produced by `filter::present` over `engine.graph().nodes()`.
pub fn graph_svg(engine: &LayoutEngine, styles: &[NodeStyle], theme: Theme) -> SvgDocument {
    let width  = engine.config().width.max(1.0).round() as u32;
    let height = engine.config().height.max(1.0).round() as u32;
    let frame  = engine.frame();
    let link   = theme.link();

    let mut svg = String::with_capacity(256 + frame.nodes.len() * 220 + frame.edges.len() * 160);
    open(&mut svg, width, height);
    let _ = write!(
        svg,
        r#"<defs><marker id="arrow" viewBox="0 -5 10 10" refX="18" refY="0" markerWidth="6" markerHeight="6" orient="auto"><path d="M0,-5L10,0L0,5" fill="{link}"/></marker></defs><g>"#
    );

    svg.push_str("<g>");
    for e in &frame.edges {
        let _ = write!(
            svg,
            r#"<line x1="{:.2}" y1="{:.2}" x2="{:.2}" y2="{:.2}" stroke="{link}" stroke-opacity="0.8" stroke-width="{:.3}" marker-end="url(#arrow)"/>"#,
            e.x1, e.y1, e.x2, e.y2, edge_width(e.weight)
        );
    }
    svg.push_str("</g><g>");

    for (point, style) in frame.nodes.iter().zip(styles) {
        let _ = write!(
            svg,
            r#"<circle cx="{:.2}" cy="{:.2}" r="{}" fill="{}" stroke="{}" stroke-width="{}" opacity="{}"><title>{}</title></circle>"#,
            point.x,
            point.y,
            style.radius,
            style.fill,
            style.stroke.color(),
            style.stroke.width(),
            style.opacity.value(),
            escape(&point.id),
        );
    }
    svg.push_str("</g><g>");

    for (point, style) in frame.nodes.iter().zip(styles) {
        let display = if style.label_visible { "block" } else { "none" };
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" dx="10" dy="3" font-size="9" fill="{}" display="{display}">{}</text>"#,
            point.x,
            point.y,
            theme.muted(),
            escape(&style.label),
        );
    }
    svg.push_str("</g></g></svg>");

    SvgDocument { markup: svg, width, height }
}

// ── Dashboard ─────────────────────────────────────────────────────────────────

fn wrap_words(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut line  = String::new();
    for word in text.split_whitespace() {
        if !line.is_empty() && line.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn panel(svg: &mut String, x: f64, y: f64, w: f64, h: f64, title: &str, theme: Theme) {
    let _ = write!(
        svg,
        r#"<rect x="{x}" y="{y}" width="{w}" height="{h}" rx="12" fill="none" stroke="{}"/><text x="{}" y="{}" font-size="13" font-weight="600" fill="{}">{}</text>"#,
        theme.grid(),
        x + 14.0,
        y + 24.0,
        theme.text(),
        escape(title),
    );
}

/// Full dashboard: KPIs, insight, risk/pattern/volume charts, rings table and
/// suspicious accounts table. Height grows with the tables.
pub fn dashboard_svg(result: &AnalysisResult, charts: &ChartData, theme: Theme) -> SvgDocument {
    let width   = DASHBOARD_WIDTH as f64;
    let inner   = width - 2.0 * MARGIN;
    let text    = theme.text();
    let muted   = theme.muted();
    let insight = charts.kpis.ai_insight.as_deref().map(|t| wrap_words(t, INSIGHT_WRAP)).unwrap_or_default();

    let mut accounts: Vec<_> = result.suspicious_accounts.iter().collect();
    accounts.sort_by(|a, b| b.suspicion_score.total_cmp(&a.suspicion_score));

    let kpi_y      = 76.0;
    let insight_y  = kpi_y + 96.0;
    let insight_h  = if insight.is_empty() { 0.0 } else { 44.0 + insight.len() as f64 * 18.0 };
    let charts_y   = insight_y + insight_h + if insight.is_empty() { 0.0 } else { 16.0 };
    let chart_h    = 230.0;
    let rings_y    = charts_y + chart_h + 16.0;
    let rings_h    = 48.0 + (result.fraud_rings.len().max(1) as f64) * ROW_HEIGHT;
    let accounts_y = rings_y + rings_h + 16.0;
    let accounts_h = 48.0 + (accounts.len().max(1) as f64) * ROW_HEIGHT;
    let height     = (accounts_y + accounts_h + MARGIN).ceil() as u32;

    let mut svg = String::with_capacity(8192);
    open(&mut svg, DASHBOARD_WIDTH, height);
    let _ = write!(svg, r#"<rect width="100%" height="100%" fill="{}"/>"#, theme.background_hex());
    let _ = write!(
        svg,
        r#"<text x="{MARGIN}" y="40" font-size="22" font-weight="700" fill="{text}">Money muling analysis</text><text x="{MARGIN}" y="60" font-size="12" fill="{muted}">Processed in {:.2}s</text>"#,
        charts.kpis.processing_seconds
    );

    // KPI cards
    let kpis = [
        ("Accounts analyzed", charts.kpis.total_accounts.to_string()),
        ("Suspicious accounts", charts.kpis.suspicious_accounts.to_string()),
        ("Suspicious share", format!("{}%", charts.kpis.suspicious_pct)),
        ("Fraud rings", charts.kpis.rings.to_string()),
    ];
    let card_w = (inner - 3.0 * 16.0) / 4.0;
    for (i, (label, value)) in kpis.iter().enumerate() {
        let x = MARGIN + i as f64 * (card_w + 16.0);
        let _ = write!(
            svg,
            r#"<rect x="{x}" y="{kpi_y}" width="{card_w}" height="80" rx="12" fill="none" stroke="{}"/><text x="{}" y="{}" font-size="12" fill="{muted}">{label}</text><text x="{}" y="{}" font-size="24" font-weight="700" fill="{text}">{value}</text>"#,
            theme.grid(),
            x + 14.0,
            kpi_y + 26.0,
            x + 14.0,
            kpi_y + 60.0,
        );
    }

    if !insight.is_empty() {
        panel(&mut svg, MARGIN, insight_y, inner, insight_h, "AI insight", theme);
        for (i, line) in insight.iter().enumerate() {
            let _ = write!(
                svg,
                r#"<text x="{}" y="{}" font-size="12" fill="{text}">{}</text>"#,
                MARGIN + 14.0,
                insight_y + 48.0 + i as f64 * 18.0,
                escape(line)
            );
        }
    }

    let panel_w = (inner - 2.0 * 16.0) / 3.0;
    risk_chart(&mut svg, charts, MARGIN, charts_y, panel_w, chart_h, theme);
    pattern_chart(&mut svg, charts, MARGIN + panel_w + 16.0, charts_y, panel_w, chart_h, theme);
    volume_chart(&mut svg, charts, MARGIN + 2.0 * (panel_w + 16.0), charts_y, panel_w, chart_h, theme);

    // Rings table
    panel(&mut svg, MARGIN, rings_y, inner, rings_h, "Fraud rings", theme);
    let ring_cols = [0.0, 160.0, 340.0, 460.0];
    table_header(&mut svg, rings_y, &ring_cols, &["Ring", "Pattern", "Risk", "Members"], theme);
    if result.fraud_rings.is_empty() {
        empty_row(&mut svg, rings_y, "No rings detected", theme);
    }
    for (i, ring) in result.fraud_rings.iter().enumerate() {
        let y = rings_y + 62.0 + i as f64 * ROW_HEIGHT;
        let members = ring.member_accounts.join(", ");
        let members = if members.chars().count() > 70 {
            format!("{}…", members.chars().take(70).collect::<String>())
        } else {
            members
        };
        let cells = [
            ring.ring_id.clone(),
            ring.pattern_type.as_str().to_string(),
            format!("{:.1}", ring.risk_score),
            members,
        ];
        table_row(&mut svg, y, &ring_cols, &cells, theme);
    }

    // Accounts table
    panel(&mut svg, MARGIN, accounts_y, inner, accounts_h, "Suspicious accounts", theme);
    let acct_cols = [0.0, 220.0, 320.0, 700.0];
    table_header(&mut svg, accounts_y, &acct_cols, &["Account", "Score", "Patterns", "Ring"], theme);
    if accounts.is_empty() {
        empty_row(&mut svg, accounts_y, "No suspicious accounts", theme);
    }
    for (i, acct) in accounts.iter().enumerate() {
        let y = accounts_y + 62.0 + i as f64 * ROW_HEIGHT;
        let band = RiskBand::of(acct.suspicion_score);
        let _ = write!(
            svg,
            r#"<circle cx="{}" cy="{}" r="4" fill="{}"/>"#,
            MARGIN + 14.0 + acct_cols[1] - 10.0,
            y - 4.0,
            band.color()
        );
        let cells = [
            acct.account_id.clone(),
            format!("{:.1}", acct.suspicion_score),
            acct.detected_patterns.join(", "),
            acct.ring_id.clone().unwrap_or_else(|| "—".into()),
        ];
        table_row(&mut svg, y, &acct_cols, &cells, theme);
    }

    svg.push_str("</svg>");
    SvgDocument { markup: svg, width: DASHBOARD_WIDTH, height }
}

fn table_header(svg: &mut String, top: f64, cols: &[f64], names: &[&str], theme: Theme) {
    for (x, name) in cols.iter().zip(names) {
        let _ = write!(
            svg,
            r#"<text x="{}" y="{}" font-size="11" font-weight="600" fill="{}">{name}</text>"#,
            MARGIN + 14.0 + x,
            top + 44.0,
            theme.muted()
        );
    }
}

fn table_row(svg: &mut String, y: f64, cols: &[f64], cells: &[String], theme: Theme) {
    for (x, cell) in cols.iter().zip(cells) {
        let _ = write!(
            svg,
            r#"<text x="{}" y="{y}" font-size="12" fill="{}">{}</text>"#,
            MARGIN + 14.0 + x,
            theme.text(),
            escape(cell)
        );
    }
}

fn empty_row(svg: &mut String, top: f64, message: &str, theme: Theme) {
    let _ = write!(
        svg,
        r#"<text x="{}" y="{}" font-size="12" fill="{}">{message}</text>"#,
        MARGIN + 14.0,
        top + 62.0,
        theme.muted()
    );
}

// ── Charts ────────────────────────────────────────────────────────────────────

fn risk_chart(svg: &mut String, charts: &ChartData, x: f64, y: f64, w: f64, h: f64, theme: Theme) {
    panel(svg, x, y, w, h, "Risk distribution", theme);
    let bands = charts.risk.bands();
    let max   = bands.iter().map(|(_, n)| *n).max().unwrap_or(0).max(1) as f64;
    let bar_w = (w - 28.0 - 2.0 * 12.0) / 3.0;
    let base  = y + h - 36.0;
    let span  = h - 90.0;
    for (i, (band, n)) in bands.iter().enumerate() {
        let bx = x + 14.0 + i as f64 * (bar_w + 12.0);
        let bh = span * *n as f64 / max;
        let _ = write!(
            svg,
            r#"<rect x="{bx:.2}" y="{:.2}" width="{bar_w:.2}" height="{bh:.2}" rx="4" fill="{}"/><text x="{:.2}" y="{:.2}" font-size="11" text-anchor="middle" fill="{}">{n}</text><text x="{:.2}" y="{:.2}" font-size="10" text-anchor="middle" fill="{}">{}</text>"#,
            base - bh,
            band.color(),
            bx + bar_w / 2.0,
            base - bh - 6.0,
            theme.text(),
            bx + bar_w / 2.0,
            base + 16.0,
            theme.muted(),
            escape(band.label()),
        );
    }
}

fn pattern_chart(svg: &mut String, charts: &ChartData, x: f64, y: f64, w: f64, h: f64, theme: Theme) {
    panel(svg, x, y, w, h, "Ring patterns", theme);
    let entries = charts.patterns.entries();
    let max     = entries.iter().map(|(_, n)| *n).max().unwrap_or(0).max(1) as f64;
    let label_w = 96.0;
    let track   = w - 28.0 - label_w - 30.0;
    for (i, (pattern, n)) in entries.iter().enumerate() {
        let ry = y + 52.0 + i as f64 * 40.0;
        let bw = track * *n as f64 / max;
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" font-size="11" fill="{}">{}</text><rect x="{:.2}" y="{ry:.2}" width="{bw:.2}" height="20" rx="4" fill="{}"/><text x="{:.2}" y="{:.2}" font-size="11" fill="{}">{n}</text>"#,
            x + 14.0,
            ry + 14.0,
            theme.muted(),
            pattern,
            x + 14.0 + label_w,
            theme.brand(),
            x + 14.0 + label_w + bw + 6.0,
            ry + 14.0,
            theme.text(),
        );
    }
}

fn volume_chart(svg: &mut String, charts: &ChartData, x: f64, y: f64, w: f64, h: f64, theme: Theme) {
    panel(svg, x, y, w, h, "Edge volume", theme);
    let buckets = &charts.volume.buckets;
    let max     = charts.volume.max_value().max(1.0);
    let left    = x + 14.0;
    let right   = x + w - 14.0;
    let base    = y + h - 36.0;
    let span    = h - 90.0;
    let step    = if buckets.len() > 1 { (right - left) / (buckets.len() - 1) as f64 } else { 0.0 };

    let _ = write!(
        svg,
        r#"<line x1="{left:.2}" y1="{base:.2}" x2="{right:.2}" y2="{base:.2}" stroke="{}"/>"#,
        theme.grid()
    );
    let points: Vec<String> = buckets
        .iter()
        .enumerate()
        .map(|(i, b)| format!("{:.2},{:.2}", left + i as f64 * step, base - span * b.value / max))
        .collect();
    let _ = write!(
        svg,
        r#"<polyline points="{}" fill="none" stroke="{}" stroke-width="2"/>"#,
        points.join(" "),
        theme.brand()
    );
    for (i, b) in buckets.iter().enumerate() {
        let _ = write!(
            svg,
            r#"<text x="{:.2}" y="{:.2}" font-size="10" text-anchor="middle" fill="{}">{}</text>"#,
            left + i as f64 * step,
            base + 16.0,
            theme.muted(),
            escape(&b.label)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LayoutConfig;
    use crate::filter::{present, FilterState};
    use crate::graph::NetworkGraph;
    use crate::index::PatternIndex;
    use crate::model::{FraudRing, GraphData, GraphEdge, GraphNode, PatternLabel, PatternType, Summary, SuspiciousAccount};
    use pretty_assertions::assert_eq;

    fn node(id: &str, susp: bool) -> GraphNode {
        GraphNode {
            id:                id.into(),
            total_sent:        10.0,
            total_received:    0.0,
            transaction_count: 1,
            is_suspicious:     susp,
            suspicion_score:   if susp { 90.0 } else { 0.0 },
            ring_ids:          vec![],
        }
    }

    fn result() -> AnalysisResult {
        AnalysisResult {
            suspicious_accounts: vec![SuspiciousAccount {
                account_id:        "ACC<1>".into(),
                suspicion_score:   90.0,
                detected_patterns: vec!["cycle".into()],
                ring_id:           Some("R1".into()),
            }],
            fraud_rings: vec![FraudRing {
                ring_id:         "R1".into(),
                member_accounts: vec!["ACC<1>".into(), "B".into()],
                pattern_type:    PatternLabel::Known(PatternType::Cycle),
                risk_score:      88.0,
            }],
            summary: Summary {
                total_accounts_analyzed:     10,
                suspicious_accounts_flagged: 1,
                fraud_rings_detected:        1,
                processing_time_seconds:     0.5,
                ai_insight:                  Some("One tight cycle & a quiet fan-in.".into()),
            },
            graph_data: GraphData {
                nodes: vec![node("ACC<1>", true), node("B", false)],
                edges: vec![GraphEdge { source: "ACC<1>".into(), target: "B".into(), weight: 5000.0, count: Some(2) }],
            },
        }
    }

    #[test]
    fn escapes_markup() {
        assert_eq!(escape(r#"<a & "b">"#), "&lt;a &amp; &quot;b&quot;&gt;");
    }

    #[test]
    fn wraps_on_word_boundaries() {
        assert_eq!(wrap_words("aa bb cc dd", 5), vec!["aa bb", "cc dd"]);
        assert!(wrap_words("   ", 10).is_empty());
    }

    #[test]
    fn graph_svg_has_one_shape_per_element() {
        let r      = result();
        let graph  = NetworkGraph::build(&r.graph_data).unwrap();
        let engine = LayoutEngine::start(graph, LayoutConfig::default());
        let index  = PatternIndex::build(&r.fraud_rings);
        let mut state = FilterState::default();
        state.show_labels = false;
        let styles = present(engine.graph().nodes().map(|(_, n)| n), &state, &index, &r);

        let doc = graph_svg(&engine, &styles, Theme::Light);
        assert_eq!((doc.width, doc.height), (1200, 700));
        assert_eq!(doc.markup.matches("<circle").count(), 2);
        assert_eq!(doc.markup.matches("<line").count(), 1);
        assert_eq!(doc.markup.matches(r#"display="none""#).count(), 2);
        assert!(doc.markup.contains("ACC&lt;1&gt;"));
        assert!(doc.markup.contains(r#"marker-end="url(#arrow)""#));
    }

    #[test]
    fn dashboard_grows_with_tables() {
        let r      = result();
        let charts = ChartData::compute(&r);
        let small  = dashboard_svg(&r, &charts, Theme::Dark);

        let mut big = r.clone();
        for i in 0..40 {
            big.suspicious_accounts.push(SuspiciousAccount {
                account_id:        format!("X{i}"),
                suspicion_score:   50.0,
                detected_patterns: vec![],
                ring_id:           None,
            });
        }
        let tall = dashboard_svg(&big, &ChartData::compute(&big), Theme::Dark);

        assert_eq!(small.width, DASHBOARD_WIDTH);
        assert_eq!(tall.height - small.height, 40 * ROW_HEIGHT as u32);
        assert!(small.markup.contains("#0b0f1d"));
        assert!(small.markup.contains("One tight cycle &amp; a quiet fan-in."));
    }
}
