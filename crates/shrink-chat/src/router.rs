//! Deterministic query router.
//!
//! Decides whether a question asks for report data or for knowledge-base
//! guidance. The score combines the best catalog keyword match, data-request
//! cues and extracted parameters, minus explanation cues, clamped to [0, 1].

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::RouterError;
use crate::recommender::{contains_phrase, ReportRecommender};

// =============================================================================
// Patterns
// =============================================================================

struct ParamPatterns {
    store: Regex,
    department: Regex,
    fiscal_week: Regex,
    iso_date: Regex,
    us_date: Regex,
}

static PARAM_PATTERNS: LazyLock<ParamPatterns> = LazyLock::new(|| {
    let mk = |p: &str| Regex::new(p).expect("Invalid parameter regex");
    ParamPatterns {
        store: mk(r"(?i)\bstore\s*(?:#|number|nbr|no\.?)?\s*(\d{1,5})\b"),
        department: mk(r"(?i)\b(?:dept|department)\s*(?:#|number|nbr|no\.?)?\s*(\d{1,3})\b"),
        fiscal_week: mk(r"(?i)\b(?:fiscal\s+week|fw|wk|week)\s*#?\s*(\d{1,2})\b"),
        iso_date: mk(r"\b(\d{4}-\d{2}-\d{2})\b"),
        us_date: mk(r"\b(\d{1,2}/\d{1,2}/\d{2,4})\b"),
    }
});

const DATA_CUES: &[&str] = &[
    "show me",
    "give me",
    "list",
    "details",
    "detail",
    "transactions",
    "report",
    "pull",
    "display",
];

const KNOWLEDGE_CUES: &[&str] = &[
    "why",
    "what causes",
    "how do",
    "how can",
    "how should",
    "explain",
    "best practice",
    "best practices",
    "what is",
    "what does",
    "meaning of",
];

const REPORT_BASE: f32 = 0.3;
const REPORT_PER_POINT: f32 = 0.15;
const REPORT_CAP: f32 = 0.6;
const DATA_CUE_BONUS: f32 = 0.2;
const PARAM_BONUS: f32 = 0.1;
const PARAM_BONUS_CAP: f32 = 0.2;
const KNOWLEDGE_PENALTY: f32 = 0.3;

/// Confidence above which the router itself labels a decision `report`.
pub const REPORT_THRESHOLD: f32 = 0.5;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    Report,
    Knowledge,
}

/// Routing outcome for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RouteDecision {
    pub kind: RouteKind,
    pub confidence: f32,
    /// Keys: `store_number`, `department`, `fiscal_week`, `date`.
    pub extracted_parameters: BTreeMap<String, String>,
    /// Best matching catalog report, when any keyword matched.
    pub report: Option<String>,
}

impl RouteDecision {
    /// Zero-confidence knowledge route.
    pub fn knowledge_fallback() -> Self {
        Self {
            kind: RouteKind::Knowledge,
            confidence: 0.0,
            extracted_parameters: BTreeMap::new(),
            report: None,
        }
    }
}

// =============================================================================
// QueryRouter
// =============================================================================

#[derive(Debug, Clone, Copy, Default)]
pub struct QueryRouter {
    recommender: ReportRecommender,
}

impl QueryRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recommender(&self) -> &ReportRecommender {
        &self.recommender
    }

    /// Score `query`. Same input always yields the same decision.
    pub fn route(&self, query: &str) -> Result<RouteDecision, RouterError> {
        let trimmed = query.trim();
        if trimmed.is_empty() {
            return Err(RouterError::EmptyQuery);
        }
        let lower = trimmed.to_lowercase();

        let best = self.recommender.best_match(trimmed);
        let params = extract_parameters(trimmed);

        let mut confidence = match best {
            Some(m) => (REPORT_BASE + REPORT_PER_POINT * m.score as f32).min(REPORT_CAP),
            None => 0.0,
        };
        if DATA_CUES.iter().any(|cue| contains_phrase(&lower, cue)) {
            confidence += DATA_CUE_BONUS;
        }
        confidence += (PARAM_BONUS * params.len() as f32).min(PARAM_BONUS_CAP);
        if KNOWLEDGE_CUES.iter().any(|cue| contains_phrase(&lower, cue)) {
            confidence -= KNOWLEDGE_PENALTY;
        }
        let confidence = confidence.clamp(0.0, 1.0);

        let kind = if best.is_some() && confidence > REPORT_THRESHOLD {
            RouteKind::Report
        } else {
            RouteKind::Knowledge
        };

        debug!(?kind, confidence, report = ?best.map(|m| m.report.name), "Query routed");
        Ok(RouteDecision {
            kind,
            confidence,
            extracted_parameters: params,
            report: best.map(|m| m.report.name.to_string()),
        })
    }

    /// As [`route`](Self::route), mapping router errors to a
    /// zero-confidence knowledge decision.
    pub fn route_or_fallback(&self, query: &str) -> RouteDecision {
        self.route(query).unwrap_or_else(|e| {
            debug!(error = %e, "Router fallback");
            RouteDecision::knowledge_fallback()
        })
    }
}

/// Pull store, department, fiscal week and date references out of a query.
pub fn extract_parameters(query: &str) -> BTreeMap<String, String> {
    let pats = &*PARAM_PATTERNS;
    let mut params = BTreeMap::new();

    if let Some(c) = pats.store.captures(query) {
        params.insert("store_number".to_string(), c[1].to_string());
    }
    if let Some(c) = pats.department.captures(query) {
        params.insert("department".to_string(), c[1].to_string());
    }
    if let Some(c) = pats.fiscal_week.captures(query) {
        params.insert("fiscal_week".to_string(), c[1].to_string());
    }
    if let Some(c) = pats
        .iso_date
        .captures(query)
        .or_else(|| pats.us_date.captures(query))
    {
        params.insert("date".to_string(), c[1].to_string());
    }
    params
}
