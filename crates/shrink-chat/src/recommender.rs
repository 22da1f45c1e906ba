//! Custom Reports catalog and keyword matching.

use serde::Serialize;

/// One report available in the Custom Reports tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReportDefinition {
    pub name: &'static str,
    /// Lowercase words or phrases that point at this report.
    pub keywords: &'static [&'static str],
    pub use_cases: &'static [&'static str],
}

pub const REPORT_CATALOG: &[ReportDefinition] = &[
    ReportDefinition {
        name: "Markdown Detail",
        keywords: &[
            "markdown details",
            "markdown detail",
            "markdown transactions",
            "markdown",
            "markdowns",
            "price reduction",
            "clearance",
        ],
        use_cases: &[
            "Item-level markdown transactions by store and department",
            "Markdown quantity and dollar amount per event",
            "Markdown reasons such as clearance, damage and price match",
            "Investigating unusual markdown activity",
        ],
    },
    ReportDefinition {
        name: "IRR Recap",
        keywords: &[
            "irr recap",
            "inventory recap",
            "irr",
            "recap",
            "book inventory",
            "on-hand",
        ],
        use_cases: &[
            "Weekly book versus SKU inventory totals by store",
            "Tracking inventory record accuracy across fiscal weeks",
            "Spotting weeks with a large book-to-SKU gap",
        ],
    },
    ReportDefinition {
        name: "Book vs SKU Variance",
        keywords: &[
            "book vs sku",
            "book versus sku",
            "book to sku",
            "sku variance",
            "inventory variance",
            "variance",
        ],
        use_cases: &[
            "Book versus SKU variance by store and department",
            "Ranking departments by variance dollars and percent",
            "Finding departments that need a count or review",
        ],
    },
    ReportDefinition {
        name: "Store Shrink Summary",
        keywords: &[
            "store summary",
            "shrink summary",
            "store shrink",
            "shrink by store",
            "overall shrink",
            "summary",
        ],
        use_cases: &[
            "Markdown totals and counts for every store",
            "Comparing stores side by side",
            "Starting point before drilling into a store",
        ],
    },
    ReportDefinition {
        name: "Department Markdown Trend",
        keywords: &[
            "markdown trend",
            "department markdown",
            "markdowns by department",
            "department trend",
            "trend",
        ],
        use_cases: &[
            "Week-over-week markdown dollars by department",
            "Seasonal markdown patterns",
            "Departments with rising markdown activity",
        ],
    },
    ReportDefinition {
        name: "Inventory Adjustment Detail",
        keywords: &[
            "inventory adjustment",
            "adjustments",
            "adjustment",
            "write off",
            "write-off",
            "known loss",
        ],
        use_cases: &[
            "Manual on-hand adjustments by item",
            "Write-offs and known loss entries",
            "Auditing adjustments made outside the count cycle",
        ],
    },
];

/// A catalog report and how strongly the query points at it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReportMatch {
    pub report: &'static ReportDefinition,
    /// Sum of matched keyword weights. Phrases weigh 2, single words 1.
    pub score: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ReportRecommender {
    catalog: &'static [ReportDefinition],
}

impl Default for ReportRecommender {
    fn default() -> Self {
        Self {
            catalog: REPORT_CATALOG,
        }
    }
}

impl ReportRecommender {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn catalog(&self) -> &'static [ReportDefinition] {
        self.catalog
    }

    pub fn find(&self, name: &str) -> Option<&'static ReportDefinition> {
        self.catalog
            .iter()
            .find(|r| r.name.eq_ignore_ascii_case(name))
    }

    /// Highest-scoring report for `query`; ties go to the earlier catalog
    /// entry. `None` when no keyword matches.
    pub fn best_match(&self, query: &str) -> Option<ReportMatch> {
        let lower = query.to_lowercase();
        let mut best: Option<ReportMatch> = None;
        for report in self.catalog {
            let score: u32 = report
                .keywords
                .iter()
                .filter(|kw| contains_phrase(&lower, kw))
                .map(|kw| if kw.contains(' ') { 2 } else { 1 })
                .sum();
            if score > 0 && best.map_or(true, |b| score > b.score) {
                best = Some(ReportMatch { report, score });
            }
        }
        best
    }
}

/// Whether `phrase` occurs in `text` bounded by non-alphanumeric characters.
pub(crate) fn contains_phrase(text: &str, phrase: &str) -> bool {
    text.match_indices(phrase).any(|(start, _)| {
        let end = start + phrase.len();
        let before_ok = text[..start]
            .chars()
            .next_back()
            .map_or(true, |c| !c.is_alphanumeric());
        let after_ok = text[end..]
            .chars()
            .next()
            .map_or(true, |c| !c.is_alphanumeric());
        before_ok && after_ok
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_has_six_reports() {
        let names: Vec<&str> = REPORT_CATALOG.iter().map(|r| r.name).collect();
        assert_eq!(
            names,
            vec![
                "Markdown Detail",
                "IRR Recap",
                "Book vs SKU Variance",
                "Store Shrink Summary",
                "Department Markdown Trend",
                "Inventory Adjustment Detail",
            ]
        );
        assert!(REPORT_CATALOG.iter().all(|r| !r.use_cases.is_empty()));
    }

    #[test]
    fn test_contains_phrase_word_boundaries() {
        assert!(contains_phrase("show markdowns now", "markdowns"));
        assert!(!contains_phrase("show markdowns now", "markdown"));
        assert!(contains_phrase("irr recap for week 3", "irr recap"));
        assert!(!contains_phrase("mirror", "irr"));
        assert!(contains_phrase("(irr)", "irr"));
    }

    #[test]
    fn test_best_match_markdown_detail() {
        let rec = ReportRecommender::new();
        let m = rec
            .best_match("Show me markdown details for store 5")
            .unwrap();
        assert_eq!(m.report.name, "Markdown Detail");
        assert_eq!(m.score, 3);
    }

    #[test]
    fn test_best_match_variance() {
        let rec = ReportRecommender::new();
        let m = rec.best_match("book vs sku variance for dept 7").unwrap();
        assert_eq!(m.report.name, "Book vs SKU Variance");
    }

    #[test]
    fn test_phrase_outweighs_single_word() {
        let rec = ReportRecommender::new();
        let m = rec.best_match("markdown trend").unwrap();
        assert_eq!(m.report.name, "Department Markdown Trend");
    }

    #[test]
    fn test_no_match() {
        let rec = ReportRecommender::new();
        assert!(rec.best_match("hello there").is_none());
    }

    #[test]
    fn test_find_by_name() {
        let rec = ReportRecommender::new();
        assert_eq!(rec.find("irr recap").unwrap().name, "IRR Recap");
        assert!(rec.find("Payroll").is_none());
    }
}
