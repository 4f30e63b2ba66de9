// mulegraph/src/layout.rs
//
// Force-directed network layout as a pollable stepper.
//
// State machine per analysis run:  Idle → Running → Idle
//   start     : seed positions, energy (alpha) = 1, status Running
//   tick      : one integration step; returns Converged once alpha < alpha_min
//   drag      : re-heats towards drag_alpha_target and pins the dragged node
//
// Forces, applied in this order every tick:
//   link     : spring towards link_distance, strength 1/min(deg(s), deg(t))
//   charge   : pairwise repulsion with inverse-distance falloff
//   center   : translate the layout so its centroid is the viewport center
//   collide  : push apart nodes closer than 2 × collide_radius
//
// Pairwise forces are exact O(n²); result graphs are a few hundred nodes.
// Layout is not deterministic: coincident nodes are separated with a random
// jiggle.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use petgraph::graph::NodeIndex;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::LayoutConfig;
use crate::error::GraphError;
use crate::graph::NetworkGraph;
use crate::session::RunToken;

const INITIAL_RADIUS: f64 = 10.0;
const DISTANCE_MIN2:  f64 = 1.0;

fn jiggle() -> f64 {
    (rand::random::<f64>() - 0.5) * 1e-6
}

// ── Per-node simulation state ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Body {
    pub x:  f64,
    pub y:  f64,
    pub vx: f64,
    pub vy: f64,
    /// Pinned position while dragged. Pinned bodies skip integration.
    pub fx: Option<f64>,
    pub fy: Option<f64>,
}

impl Body {
    pub fn is_pinned(&self) -> bool { self.fx.is_some() || self.fy.is_some() }

    pub fn kinetic_energy(&self) -> f64 {
        0.5 * (self.vx * self.vx + self.vy * self.vy)
    }
}

#[derive(Debug, Clone, Copy)]
struct Spring {
    source:   usize,
    target:   usize,
    strength: f64,
    bias:     f64, // share of the correction taken by the target
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LayoutStatus {
    Idle,
    Running,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum Tick {
    Running { alpha: f64 },
    Converged,
}

// ── Rendered positions ────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NodePoint {
    pub id: String,
    pub x:  f64,
    pub y:  f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EdgeSegment {
    pub source: String,
    pub target: String,
    pub x1:     f64,
    pub y1:     f64,
    pub x2:     f64,
    pub y2:     f64,
    pub weight: f64,
}

/// Positions of nodes, edges and labels after one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutFrame {
    pub tick:  u64,
    pub nodes: Vec<NodePoint>,
    pub edges: Vec<EdgeSegment>,
}

// ── Engine ────────────────────────────────────────────────────────────────────

pub struct LayoutEngine {
    graph:        NetworkGraph,
    config:       LayoutConfig,
    bodies:       Vec<Body>,
    springs:      Vec<Spring>,
    alpha:        f64,
    alpha_target: f64,
    status:       LayoutStatus,
    ticks:        u64,
    dragging:     Option<NodeIndex>,
}

impl LayoutEngine {
    /// Enter Running with freshly seeded positions. Any previous layout state
    /// belongs to the previous engine and is simply dropped with it.
    pub fn start(graph: NetworkGraph, config: LayoutConfig) -> Self {
        let (cx, cy) = (config.width / 2.0, config.height / 2.0);
        let golden   = std::f64::consts::PI * (3.0 - 5f64.sqrt());

        let bodies = (0..graph.node_count())
            .map(|i| {
                let radius = INITIAL_RADIUS * (0.5 + i as f64).sqrt();
                let angle  = i as f64 * golden;
                Body {
                    x: cx + radius * angle.cos(),
                    y: cy + radius * angle.sin(),
                    ..Body::default()
                }
            })
            .collect();

        let springs = graph
            .links()
            .map(|(_, s, t, _)| {
                let ds = graph.degree(s) as f64;
                let dt = graph.degree(t) as f64;
                Spring {
                    source:   s.index(),
                    target:   t.index(),
                    strength: 1.0 / ds.min(dt),
                    bias:     ds / (ds + dt),
                }
            })
            .collect();

        info!(
            "layout started: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Self {
            graph,
            config,
            bodies,
            springs,
            alpha:        1.0,
            alpha_target: 0.0,
            status:       LayoutStatus::Running,
            ticks:        0,
            dragging:     None,
        }
    }

    pub fn graph(&self) -> &NetworkGraph { &self.graph }
    pub fn config(&self) -> &LayoutConfig { &self.config }
    pub fn status(&self) -> LayoutStatus { self.status }
    pub fn alpha(&self) -> f64 { self.alpha }
    pub fn ticks(&self) -> u64 { self.ticks }

    pub fn body(&self, ix: NodeIndex) -> &Body { &self.bodies[ix.index()] }

    pub fn position(&self, id: &str) -> Option<(f64, f64)> {
        self.graph.index_of(id).map(|ix| {
            let b = &self.bodies[ix.index()];
            (b.x, b.y)
        })
    }

    pub fn kinetic_energy(&self) -> f64 {
        self.bodies.iter().map(Body::kinetic_energy).sum()
    }

    /// Advance one step. An Idle engine stays Idle and reports Converged.
    pub fn tick(&mut self) -> Tick {
        if self.status == LayoutStatus::Idle {
            return Tick::Converged;
        }

        self.alpha += (self.alpha_target - self.alpha) * self.config.alpha_decay;

        self.apply_links();
        self.apply_charge();
        self.apply_center();
        self.apply_collide();
        self.integrate();

        self.ticks += 1;

        if self.alpha < self.config.alpha_min {
            self.status = LayoutStatus::Idle;
            info!("layout converged after {} ticks", self.ticks);
            Tick::Converged
        } else {
            Tick::Running { alpha: self.alpha }
        }
    }

    /// Run ticks back to back until convergence. Returns ticks taken.
    pub fn settle(&mut self) -> u64 {
        let start = self.ticks;
        while let Tick::Running { .. } = self.tick() {}
        self.ticks - start
    }

    // ── Drag ──────────────────────────────────────────────────────────────────

    /// Pin `id` where it stands and re-heat the simulation.
    pub fn begin_drag(&mut self, id: &str) -> Result<(), GraphError> {
        let ix = self
            .graph
            .index_of(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;

        // one pointer, one drag
        if let Some(prev) = self.dragging.take() {
            self.unpin(prev);
        }
        self.alpha_target = self.config.drag_alpha_target;
        self.status       = LayoutStatus::Running;

        let b = &mut self.bodies[ix.index()];
        b.fx = Some(b.x);
        b.fy = Some(b.y);
        self.dragging = Some(ix);
        debug!("drag start {}", id);
        Ok(())
    }

    /// Move the pinned node to the pointer.
    pub fn drag_to(&mut self, x: f64, y: f64) {
        if let Some(ix) = self.dragging {
            let b = &mut self.bodies[ix.index()];
            b.fx = Some(x);
            b.fy = Some(y);
        }
    }

    /// Release the pin and let the simulation cool off again.
    pub fn end_drag(&mut self) {
        if let Some(ix) = self.dragging.take() {
            self.unpin(ix);
            self.alpha_target = 0.0;
            debug!("drag end {}", self.graph.node(ix).id);
        }
    }

    fn unpin(&mut self, ix: NodeIndex) {
        let b = &mut self.bodies[ix.index()];
        b.fx = None;
        b.fy = None;
    }

    // ── Forces ────────────────────────────────────────────────────────────────

    fn apply_links(&mut self) {
        let distance = self.config.link_distance;
        for s in &self.springs {
            let (src, tgt) = (self.bodies[s.source], self.bodies[s.target]);
            let mut x = tgt.x + tgt.vx - src.x - src.vx;
            let mut y = tgt.y + tgt.vy - src.y - src.vy;
            if x == 0.0 { x = jiggle(); }
            if y == 0.0 { y = jiggle(); }

            let l = (x * x + y * y).sqrt();
            let k = (l - distance) / l * self.alpha * s.strength;
            x *= k;
            y *= k;

            let t = &mut self.bodies[s.target];
            t.vx -= x * s.bias;
            t.vy -= y * s.bias;
            let src = &mut self.bodies[s.source];
            src.vx += x * (1.0 - s.bias);
            src.vy += y * (1.0 - s.bias);
        }
    }

    fn apply_charge(&mut self) {
        let w = self.config.charge_strength * self.alpha;
        let n = self.bodies.len();
        for i in 0..n {
            let (mut dvx, mut dvy) = (0.0, 0.0);
            let (xi, yi) = (self.bodies[i].x, self.bodies[i].y);
            for j in 0..n {
                if i == j { continue; }
                let mut x = self.bodies[j].x - xi;
                let mut y = self.bodies[j].y - yi;
                let mut l = x * x + y * y;
                if x == 0.0 { x = jiggle(); l += x * x; }
                if y == 0.0 { y = jiggle(); l += y * y; }
                if l < DISTANCE_MIN2 { l = (DISTANCE_MIN2 * l).sqrt(); }
                dvx += x * w / l;
                dvy += y * w / l;
            }
            self.bodies[i].vx += dvx;
            self.bodies[i].vy += dvy;
        }
    }

    fn apply_center(&mut self) {
        let n = self.bodies.len();
        if n == 0 { return; }
        let (sx, sy) = self
            .bodies
            .iter()
            .fold((0.0, 0.0), |(sx, sy), b| (sx + b.x, sy + b.y));
        let dx = sx / n as f64 - self.config.width / 2.0;
        let dy = sy / n as f64 - self.config.height / 2.0;
        for b in &mut self.bodies {
            b.x -= dx;
            b.y -= dy;
        }
    }

    fn apply_collide(&mut self) {
        let r  = 2.0 * self.config.collide_radius;
        let r2 = r * r;
        let n  = self.bodies.len();
        for i in 0..n {
            let xi = self.bodies[i].x + self.bodies[i].vx;
            let yi = self.bodies[i].y + self.bodies[i].vy;
            for j in (i + 1)..n {
                let other = self.bodies[j];
                let mut x = xi - other.x - other.vx;
                let mut y = yi - other.y - other.vy;
                let mut l = x * x + y * y;
                if l >= r2 { continue; }
                if x == 0.0 { x = jiggle(); l += x * x; }
                if y == 0.0 { y = jiggle(); l += y * y; }
                let d = l.sqrt();
                let k = (r - d) / d;
                x *= k;
                y *= k;
                // equal radii: the push is split evenly
                self.bodies[i].vx += x * 0.5;
                self.bodies[i].vy += y * 0.5;
                self.bodies[j].vx -= x * 0.5;
                self.bodies[j].vy -= y * 0.5;
            }
        }
    }

    fn integrate(&mut self) {
        let keep = 1.0 - self.config.velocity_decay;
        for b in &mut self.bodies {
            match b.fx {
                Some(fx) => { b.x = fx; b.vx = 0.0; }
                None     => { b.vx *= keep; b.x += b.vx; }
            }
            match b.fy {
                Some(fy) => { b.y = fy; b.vy = 0.0; }
                None     => { b.vy *= keep; b.y += b.vy; }
            }
        }
    }

    // ── Output ────────────────────────────────────────────────────────────────

    pub fn frame(&self) -> LayoutFrame {
        let nodes = self
            .graph
            .nodes()
            .map(|(ix, n)| {
                let b = &self.bodies[ix.index()];
                NodePoint { id: n.id.clone(), x: b.x, y: b.y }
            })
            .collect();

        let edges = self
            .graph
            .links()
            .map(|(_, s, t, link)| {
                let (a, b) = (&self.bodies[s.index()], &self.bodies[t.index()]);
                EdgeSegment {
                    source: self.graph.node(s).id.clone(),
                    target: self.graph.node(t).id.clone(),
                    x1: a.x,
                    y1: a.y,
                    x2: b.x,
                    y2: b.y,
                    weight: link.weight,
                }
            })
            .collect();

        LayoutFrame { tick: self.ticks, nodes, edges }
    }
}

// ── Cooperative driver ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveOutcome {
    /// Energy fell below alpha_min.
    Settled { ticks: u64 },
    /// The run this layout belongs to was superseded or reset.
    Cancelled { ticks: u64 },
}

/// Step `layout` on the current task until it converges or `token` goes
/// stale, calling `on_frame` with each tick's positions. The engine lock is
/// released before `on_frame` runs, so the callback may lock the layout
/// again (presentation, node detail, exports). Control is yielded between
/// ticks, either immediately or on a fixed frame interval. A settled layout
/// re-heated by a drag needs another call.
pub async fn drive<F>(
    layout:   Arc<Mutex<LayoutEngine>>,
    token:    RunToken,
    interval: Option<Duration>,
    mut on_frame: F,
) -> DriveOutcome
where
    F: FnMut(&LayoutFrame),
{
    let mut pacer = interval.map(tokio::time::interval);
    let mut ticks = 0u64;

    loop {
        if !token.is_current() {
            info!("layout loop for run {} cancelled after {} ticks", token.generation(), ticks);
            return DriveOutcome::Cancelled { ticks };
        }

        let (step, frame) = {
            let mut engine = layout.lock();
            let step = engine.tick();
            (step, engine.frame())
        };
        on_frame(&frame);
        ticks += 1;

        if step == Tick::Converged {
            return DriveOutcome::Settled { ticks };
        }

        match pacer.as_mut() {
            Some(p) => { p.tick().await; }
            None    => tokio::task::yield_now().await,
        }
    }
}
