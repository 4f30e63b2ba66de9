// mulegraph/src/export.rs
//
// Export pipeline. Every export is built from the active result and the
// current layout/presentation as an in-memory Artifact; the host decides
// where the bytes go. Each successful export is recorded in ExportHistory
// (newest first, session-scoped).
//
//   JSON  money_muling_report.json     suspicious_accounts + fraud_rings + summary
//   CSV   suspicious_accounts.csv      one row per account, patterns ';'-joined
//         fraud_rings.csv              one row per ring, members ';'-joined
//   SVG   network_graph.svg            current layout frame
//   PNG   network_graph.png            SVG rasterized over the theme background
//   PDF   dashboard_report.pdf         dashboard raster, paginated top to bottom

use std::fmt;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use png::{BitDepth, ColorType, Encoder};
use resvg::tiny_skia::{Color, Pixmap, Transform};
use resvg::usvg::{Options, Tree};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::aggregate::ChartData;
use crate::config::{ExportConfig, PageFormat, Theme};
use crate::error::ExportError;
use crate::filter::NodeStyle;
use crate::layout::LayoutEngine;
use crate::model::{AnalysisResult, FraudRing, Summary, SuspiciousAccount};
use crate::render::{self, SvgDocument};

pub const JSON_FILE:     &str = "money_muling_report.json";
pub const ACCOUNTS_FILE: &str = "suspicious_accounts.csv";
pub const RINGS_FILE:    &str = "fraud_rings.csv";
pub const SVG_FILE:      &str = "network_graph.svg";
pub const PNG_FILE:      &str = "network_graph.png";
pub const PDF_FILE:      &str = "dashboard_report.pdf";

/// Canvas size used when the graph surface reports no size of its own.
pub const FALLBACK_WIDTH:  u32 = 1200;
pub const FALLBACK_HEIGHT: u32 = 700;

const HISTORY_VIEW: usize = 8;
const DIGEST_CHARS: usize = 12;

// ── Artifacts ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExportKind {
    Json,
    Csv,
    Svg,
    Png,
    Pdf,
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Json => "JSON",
            Self::Csv  => "CSV",
            Self::Svg  => "SVG",
            Self::Png  => "PNG",
            Self::Pdf  => "PDF",
        };
        f.pad(s)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Artifact {
    pub filename: &'static str,
    pub mime:     &'static str,
    pub data:     Bytes,
}

impl Artifact {
    fn new(filename: &'static str, mime: &'static str, data: impl Into<Bytes>) -> Self {
        Self { filename, mime, data: data.into() }
    }

    /// Leading hex chars of the payload's SHA-256.
    pub fn digest(&self) -> String {
        let mut hex = hex::encode(Sha256::digest(&self.data));
        hex.truncate(DIGEST_CHARS);
        hex
    }

    pub async fn write_to(&self, dir: &Path) -> Result<PathBuf, ExportError> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(self.filename);
        tokio::fs::write(&path, &self.data).await?;
        debug!("wrote {} ({} bytes)", path.display(), self.data.len());
        Ok(path)
    }
}

// ── History ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExportRecord {
    pub kind:      ExportKind,
    pub timestamp: DateTime<Utc>,
    pub filename:  &'static str,
    pub bytes:     usize,
    pub digest:    String,
}

impl fmt::Display for ExportRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:<4} {}  {:<26} {:>9} B  {}",
            self.kind,
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.filename,
            self.bytes,
            self.digest
        )
    }
}

/// Session-scoped log of completed exports, newest first.
#[derive(Debug, Clone, Default)]
pub struct ExportHistory {
    records: Vec<ExportRecord>,
}

impl ExportHistory {
    pub fn record(&mut self, kind: ExportKind, artifacts: &[Artifact]) {
        let timestamp = Utc::now();
        for a in artifacts.iter().rev() {
            let record = ExportRecord {
                kind,
                timestamp,
                filename: a.filename,
                bytes:    a.data.len(),
                digest:   a.digest(),
            };
            info!("{} export {} ({} bytes, sha256 {})", kind, record.filename, record.bytes, record.digest);
            self.records.insert(0, record);
        }
    }

    /// What the history panel shows.
    pub fn recent(&self) -> &[ExportRecord] {
        &self.records[..self.records.len().min(HISTORY_VIEW)]
    }

    pub fn all(&self) -> &[ExportRecord] { &self.records }
    pub fn len(&self) -> usize { self.records.len() }
    pub fn is_empty(&self) -> bool { self.records.is_empty() }
    pub fn clear(&mut self) { self.records.clear(); }
}

// ── JSON / CSV ────────────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Report<'a> {
    suspicious_accounts: &'a [SuspiciousAccount],
    fraud_rings:         &'a [FraudRing],
    summary:             &'a Summary,
}

/// The result without graph_data, pretty-printed.
pub fn json_report(result: &AnalysisResult) -> Result<Artifact, ExportError> {
    let report = Report {
        suspicious_accounts: &result.suspicious_accounts,
        fraud_rings:         &result.fraud_rings,
        summary:             &result.summary,
    };
    let data = serde_json::to_vec_pretty(&report)?;
    Ok(Artifact::new(JSON_FILE, "application/json", data))
}

fn csv_bytes<F>(header: &[&str], rows: F) -> Result<Vec<u8>, ExportError>
where
    F: FnOnce(&mut csv::Writer<Vec<u8>>) -> Result<(), csv::Error>,
{
    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(header)?;
    rows(&mut wtr)?;
    wtr.into_inner().map_err(|e| ExportError::Io(e.into_error()))
}

/// suspicious_accounts.csv and fraud_rings.csv, in that order.
pub fn csv_reports(result: &AnalysisResult) -> Result<[Artifact; 2], ExportError> {
    let accounts = csv_bytes(
        &["account_id", "suspicion_score", "detected_patterns", "ring_id"],
        |w| {
            for a in &result.suspicious_accounts {
                w.write_record([
                    a.account_id.clone(),
                    a.suspicion_score.to_string(),
                    a.detected_patterns.join(";"),
                    a.ring_id.clone().unwrap_or_default(),
                ])?;
            }
            Ok(())
        },
    )?;

    let rings = csv_bytes(
        &["ring_id", "pattern_type", "member_count", "risk_score", "member_accounts"],
        |w| {
            for r in &result.fraud_rings {
                w.write_record([
                    r.ring_id.clone(),
                    r.pattern_type.as_str().to_string(),
                    r.member_accounts.len().to_string(),
                    r.risk_score.to_string(),
                    r.member_accounts.join(";"),
                ])?;
            }
            Ok(())
        },
    )?;

    Ok([
        Artifact::new(ACCOUNTS_FILE, "text/csv", accounts),
        Artifact::new(RINGS_FILE, "text/csv", rings),
    ])
}

// ── Graph image ───────────────────────────────────────────────────────────────

pub fn graph_svg(engine: &LayoutEngine, styles: &[NodeStyle], theme: Theme) -> Artifact {
    let doc = render::graph_svg(engine, styles, theme);
    Artifact::new(SVG_FILE, "image/svg+xml", doc.markup)
}

/// Rasterize `doc` at `scale` over an opaque theme background. A zero-sized
/// document falls back to 1200×700.
pub fn rasterize(doc: &SvgDocument, theme: Theme, scale: f64) -> Result<Pixmap, ExportError> {
    let (w, h) = if doc.width == 0 || doc.height == 0 {
        (FALLBACK_WIDTH, FALLBACK_HEIGHT)
    } else {
        (doc.width, doc.height)
    };
    let scale  = if scale.is_finite() && scale > 0.0 { scale } else { 1.0 };
    let width  = (w as f64 * scale).round() as u32;
    let height = (h as f64 * scale).round() as u32;

    let mut options = Options::default();
    options.fontdb_mut().load_system_fonts();
    let tree = Tree::from_data(doc.markup.as_bytes(), &options)
        .map_err(|e| ExportError::Svg(e.to_string()))?;

    let mut pixmap = Pixmap::new(width, height).ok_or(ExportError::Pixmap { width, height })?;
    let [r, g, b] = theme.background();
    pixmap.fill(Color::from_rgba8(r, g, b, 255));
    resvg::render(&tree, Transform::from_scale(scale as f32, scale as f32), &mut pixmap.as_mut());
    debug!("rasterized {}x{} at {}x → {}x{}", w, h, scale, width, height);
    Ok(pixmap)
}

/// RGBA8 PNG. The pixmap is fully opaque, so premultiplied data is already
/// straight alpha.
pub fn encode_png(pixmap: &Pixmap) -> Result<Vec<u8>, ExportError> {
    let mut out = Vec::new();
    {
        let mut encoder = Encoder::new(&mut out, pixmap.width(), pixmap.height());
        encoder.set_color(ColorType::Rgba);
        encoder.set_depth(BitDepth::Eight);
        encoder.write_header()?.write_image_data(pixmap.data())?;
    }
    Ok(out)
}

pub fn graph_png(engine: &LayoutEngine, styles: &[NodeStyle], config: &ExportConfig) -> Result<Artifact, ExportError> {
    let doc    = render::graph_svg(engine, styles, config.theme);
    // surface size; capture_scale only applies to the dashboard capture
    let pixmap = rasterize(&doc, config.theme, 1.0)?;
    Ok(Artifact::new(PNG_FILE, "image/png", encode_png(&pixmap)?))
}

// ── PDF ───────────────────────────────────────────────────────────────────────

/// One page's view of the tall image. Offsets are in points from the page
/// top; `offset` is ≤ 0 and moves the image up so the next strip shows.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PagePlacement {
    pub index:  usize,
    pub offset: f64,
    pub top:    f64,
    pub bottom: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PagePlan {
    pub page:         PageFormat,
    pub image_width:  f64,
    pub image_height: f64,
    pub pages:        Vec<PagePlacement>,
}

/// Scale a `px_width`×`px_height` image to the page width and slice it into
/// page-height strips: max(1, ceil(H / P)) pages, page k offset by −k·P.
pub fn paginate(px_width: u32, px_height: u32, page: PageFormat) -> PagePlan {
    let image_width  = page.width;
    let image_height = if px_width == 0 {
        0.0
    } else {
        page.width * px_height as f64 / px_width as f64
    };

    // tolerance keeps an exact multiple from spilling onto an empty page
    let count = ((image_height / page.height) - 1e-9).ceil().max(1.0) as usize;
    let pages = (0..count)
        .map(|k| {
            let top = k as f64 * page.height;
            PagePlacement {
                index:  k,
                offset: -top,
                top,
                bottom: (top + page.height).min(image_height),
            }
        })
        .collect();

    PagePlan { page, image_width, image_height, pages }
}

fn real(v: f64) -> Object {
    Object::Real((v as f32).into())
}

/// Embed the raster once and place it on every page of the plan.
pub fn pdf_from_pixmap(pixmap: &Pixmap, page: PageFormat) -> Result<Vec<u8>, ExportError> {
    let plan = paginate(pixmap.width(), pixmap.height(), page);

    let mut doc  = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let rgb: Vec<u8> = pixmap
        .data()
        .chunks_exact(4)
        .flat_map(|px| [px[0], px[1], px[2]])
        .collect();
    let image_id = doc.add_object(Stream::new(
        dictionary! {
            "Type"             => "XObject",
            "Subtype"          => "Image",
            "Width"            => pixmap.width() as i64,
            "Height"           => pixmap.height() as i64,
            "ColorSpace"       => "DeviceRGB",
            "BitsPerComponent" => 8_i64,
        },
        rgb,
    ));

    let mut kids: Vec<Object> = Vec::with_capacity(plan.pages.len());
    for placement in &plan.pages {
        // PDF origin is bottom-left: image bottom sits at pageH − (−offset + imgH)
        let y = page.height - (-placement.offset + plan.image_height);
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new("cm", vec![
                    real(plan.image_width),
                    real(0.0),
                    real(0.0),
                    real(plan.image_height),
                    real(0.0),
                    real(y),
                ]),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));
        let page_id = doc.add_object(dictionary! {
            "Type"      => "Page",
            "Parent"    => pages_id,
            "Contents"  => content_id,
            "MediaBox"  => vec![real(0.0), real(0.0), real(page.width), real(page.height)],
            "Resources" => dictionary! {
                "XObject" => dictionary! { "Im0" => image_id },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
        "Type"  => "Pages",
        "Kids"  => kids,
        "Count" => count,
    }));
    let catalog_id = doc.add_object(dictionary! {
        "Type"  => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    debug!("pdf: {} page(s), {} bytes", count, out.len());
    Ok(out)
}

pub fn dashboard_pdf(result: &AnalysisResult, charts: &ChartData, config: &ExportConfig) -> Result<Artifact, ExportError> {
    let doc    = render::dashboard_svg(result, charts, config.theme);
    let pixmap = rasterize(&doc, config.theme, config.capture_scale)?;
    let pdf    = pdf_from_pixmap(&pixmap, config.page)?;
    Ok(Artifact::new(PDF_FILE, "application/pdf", pdf))
}
