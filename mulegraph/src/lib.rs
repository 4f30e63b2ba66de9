// mulegraph/src/lib.rs
//
// Mulegraph: explorer for money-muling analysis results.
//
// A transaction CSV goes to the analysis service; the returned result
// (suspicious accounts, fraud rings, summary, transaction graph) is indexed,
// aggregated into chart series, laid out with a force-directed simulation,
// filtered/highlighted for presentation and exported as JSON, CSV, SVG, PNG
// and a paginated PDF dashboard.
//
//   model      result types as they arrive over the wire
//   index      account → ring pattern labels
//   aggregate  KPIs, risk/pattern histograms, edge-volume series
//   graph      petgraph arena of the transaction network
//   layout     force simulation + cooperative driver
//   filter     opacity/stroke/label rules and node detail
//   render     SVG for the graph and the dashboard
//   export     artifacts, rasterizing, pagination, history
//   client     analysis service HTTP client
//   session    run generations and the single active result
//   config     service/layout/export settings and themes
//   error      fault taxonomy

pub mod aggregate;
pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod graph;
pub mod index;
pub mod layout;
pub mod model;
pub mod render;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
pub use model::AnalysisResult;
pub use session::Session;
