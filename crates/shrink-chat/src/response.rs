//! Response text for the assistant transcript.
//!
//! Report recommendations, knowledge-base answers, model prompts and the
//! system messages shown when an answer fails.

use std::collections::BTreeMap;

use shrink_knowledge::KnowledgeHit;

use crate::error::ChatError;
use crate::model::ErrorClass;
use crate::recommender::ReportDefinition;

pub const NO_KNOWLEDGE_RESULTS: &str =
    "I searched the knowledge base but couldn't find specific details on that topic.";

const MAX_USE_CASES: usize = 3;

// =============================================================================
// Reports
// =============================================================================

/// Recommendation text for a catalog report.
pub fn format_report(report: &ReportDefinition, parameters: &BTreeMap<String, String>) -> String {
    let mut out = format!(
        "📊 **Report Recommendation:** {}\n\nThis report is available in the **Custom Reports** tab.\n\n",
        report.name
    );

    if !parameters.is_empty() {
        out.push_str("**Detected Parameters:**\n");
        for (key, value) in parameters {
            out.push_str(&format!("- {}: {}\n", title_case(key), value));
        }
        out.push('\n');
    }

    if !report.use_cases.is_empty() {
        out.push_str("**What this report shows:**\n");
        for use_case in report.use_cases.iter().take(MAX_USE_CASES) {
            out.push_str(&format!("- {}\n", use_case));
        }
    }
    out.trim_end().to_string()
}

fn title_case(key: &str) -> String {
    key.split('_')
        .filter(|w| !w.is_empty())
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

// =============================================================================
// Knowledge
// =============================================================================

/// Knowledge hits as `**Source:**` blocks separated by `---`.
pub fn format_knowledge(hits: &[KnowledgeHit]) -> String {
    if hits.is_empty() {
        return NO_KNOWLEDGE_RESULTS.to_string();
    }
    hits.iter()
        .map(|h| format!("**Source:** {}\n{}\n", h.source, h.content.trim()))
        .collect::<Vec<_>>()
        .join("\n---\n")
}

/// Model input combining retrieved context with the user's question.
pub fn build_model_input(question: &str, hits: &[KnowledgeHit]) -> String {
    if hits.is_empty() {
        return question.to_string();
    }
    format!(
        "Relevant documentation:\n\n{}\n\nQuestion: {}",
        format_knowledge(hits),
        question
    )
}

// =============================================================================
// Failures
// =============================================================================

/// Human-readable system message for a failed answer.
pub fn explain_failure(error: &ChatError) -> String {
    let detail = match error {
        ChatError::Model(e) => match e.class {
            ErrorClass::SafetyBlock => "The answer was blocked by the model's content filters. \
                 Try rephrasing the question in terms of store or inventory data."
                .to_string(),
            ErrorClass::Quota => {
                "The assistant is receiving too many requests right now. Please wait a moment and try again."
                    .to_string()
            }
            ErrorClass::Timeout => {
                "The assistant took too long to respond. Please try again.".to_string()
            }
            ErrorClass::Other => format!("The assistant could not generate a response ({}).", e.message),
        },
        ChatError::Knowledge(e) => format!("The knowledge base could not be searched ({}).", e),
        other => other.to_string(),
    };
    format!("Error: {}", detail)
}
