// mulegraph/src/model.rs
//
// Analysis result model: the fixed JSON shape returned by the detection
// service. One AnalysisResult per run; it is never edited in place, a new run
// replaces it wholesale.
//
// Field order in these structs is the serialization order of the JSON export,
// so it mirrors the service payload.

use serde::{Deserialize, Serialize};

// ── Pattern types ─────────────────────────────────────────────────────────────

/// The fixed enumeration of ring shapes the detector reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternType {
    Cycle,        // A → B → C → A circular routing
    FanIn,        // many senders aggregate into one account
    FanOut,       // one account disperses to many
    ShellNetwork, // layered low-activity intermediaries
}

impl PatternType {
    pub const ALL: [PatternType; 4] = [
        PatternType::Cycle,
        PatternType::FanIn,
        PatternType::FanOut,
        PatternType::ShellNetwork,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cycle        => "cycle",
            Self::FanIn        => "fan_in",
            Self::FanOut       => "fan_out",
            Self::ShellNetwork => "shell_network",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

impl std::fmt::Display for PatternType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

/// A ring's `pattern_type` as it arrived on the wire. Labels outside the known
/// enumeration are kept verbatim so exports never lose them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum PatternLabel {
    Known(PatternType),
    Other(String),
}

impl PatternLabel {
    pub fn known(&self) -> Option<PatternType> {
        match self {
            Self::Known(p) => Some(*p),
            Self::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(p) => p.as_str(),
            Self::Other(s) => s,
        }
    }
}

impl From<String> for PatternLabel {
    fn from(s: String) -> Self {
        match PatternType::parse(&s) {
            Some(p) => Self::Known(p),
            None    => Self::Other(s),
        }
    }
}

impl From<PatternLabel> for String {
    fn from(l: PatternLabel) -> Self {
        match l {
            PatternLabel::Known(p) => p.as_str().to_string(),
            PatternLabel::Other(s) => s,
        }
    }
}

impl From<PatternType> for PatternLabel {
    fn from(p: PatternType) -> Self { Self::Known(p) }
}

impl std::fmt::Display for PatternLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.as_str())
    }
}

// ── Result payload ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub total_accounts_analyzed:     u64,
    #[serde(default)]
    pub suspicious_accounts_flagged: u64,
    #[serde(default)]
    pub fraud_rings_detected:        u64,
    #[serde(default)]
    pub processing_time_seconds:     f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ai_insight:                  Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuspiciousAccount {
    pub account_id:        String,
    pub suspicion_score:   f64,
    #[serde(default)]
    pub detected_patterns: Vec<String>,
    #[serde(default)]
    pub ring_id:           Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FraudRing {
    pub ring_id:         String,
    pub member_accounts: Vec<String>,
    pub pattern_type:    PatternLabel,
    pub risk_score:      f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id:                String,
    #[serde(default)]
    pub total_sent:        f64,
    #[serde(default)]
    pub total_received:    f64,
    #[serde(default)]
    pub transaction_count: u64,
    #[serde(default)]
    pub is_suspicious:     bool,
    #[serde(default)]
    pub suspicion_score:   f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ring_ids:          Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count:  Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct GraphData {
    #[serde(default)]
    pub nodes: Vec<GraphNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
}

/// One complete analysis run as returned by `/api/analyze`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub suspicious_accounts: Vec<SuspiciousAccount>,
    #[serde(default)]
    pub fraud_rings:         Vec<FraudRing>,
    #[serde(default)]
    pub summary:             Summary,
    #[serde(default)]
    pub graph_data:          GraphData,
}

impl AnalysisResult {
    pub fn from_json(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    pub fn ring(&self, ring_id: &str) -> Option<&FraudRing> {
        self.fraud_rings.iter().find(|r| r.ring_id == ring_id)
    }

    pub fn account(&self, account_id: &str) -> Option<&SuspiciousAccount> {
        self.suspicious_accounts.iter().find(|a| a.account_id == account_id)
    }
}

/// Error body the service sends alongside a non-success status.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorPayload {
    #[serde(default)]
    pub error: Option<String>,
}

/// One raw transaction row from `/api/sample-data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionRow {
    pub transaction_id: String,
    pub sender_id:      String,
    pub receiver_id:    String,
    pub amount:         f64,
    pub timestamp:      String,
}
