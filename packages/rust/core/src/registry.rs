//! Static task tables for both pipelines.
//!
//! Order is significant: it is both the execution order and the display order.

use leadconsole_shared::PipelineKind;

/// Read-only descriptor of one pipeline task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskDescriptor {
    /// Unique within its pipeline; also the detailed-log step key.
    pub key: &'static str,
    pub name: &'static str,
    /// Output fields the rendered result declares, in display order.
    pub fields: &'static [&'static str],
}

const INGEST_TASKS: &[TaskDescriptor] = &[
    TaskDescriptor {
        key: "website",
        name: "Website Extraction",
        fields: &["Official Domain"],
    },
    TaskDescriptor {
        key: "firmo",
        name: "Firmographic Enrichment",
        fields: &[
            "Company Overview",
            "Company Founding Year",
            "Headquarter Location",
            "Employee Range",
            "Company Revenue($)",
            "Company Industry",
            "Other Locations",
            "Facebook URL",
            "LinkedIn URL",
            "Instagram URL",
            "Company Board Line Number",
        ],
    },
    TaskDescriptor {
        key: "techno",
        name: "Technographic Profiling",
        fields: &["Tech Install"],
    },
    TaskDescriptor {
        key: "financials",
        name: "Financial Insights",
        fields: &[
            "Financial Summary",
            "Revenue Growth",
            "Net Income Change",
            "Operating Cash Flow Change",
            "CapEx Change",
            "EPS Change",
            "Funding Amount($)",
        ],
    },
    TaskDescriptor {
        key: "growth",
        name: "Growth Signals",
        fields: &["Signal Type", "Signal Details", "Signal Links"],
    },
];

const SCORE_TASKS: &[TaskDescriptor] = &[
    TaskDescriptor {
        key: "business_context",
        name: "Business Context Analyzer",
        fields: &[
            "Business Objective",
            "Target Segment",
            "Geography",
            "Primary Goal",
            "Key Products",
            "Key Challenges",
            "Success Metrics",
        ],
    },
    TaskDescriptor {
        key: "category_weights",
        name: "AI-Driven Category Weights",
        fields: &[
            "Growth Signals",
            "Technographics",
            "Firmographics",
            "Financial Data",
            "Company Profile",
        ],
    },
    TaskDescriptor {
        key: "prioritization_table",
        name: "Prioritization Segment Classifier",
        fields: &[
            "Priority",
            "Growth Signals",
            "Tech Maturity",
            "Financial Strength",
            "Intent Signals",
            "GTM Fit",
            "Priority Rationale",
        ],
    },
];

/// Tasks of `kind`, in execution order.
pub fn tasks(kind: PipelineKind) -> &'static [TaskDescriptor] {
    match kind {
        PipelineKind::Ingest => INGEST_TASKS,
        PipelineKind::Score => SCORE_TASKS,
    }
}

/// Look up a task by key.
pub fn find(kind: PipelineKind, key: &str) -> Option<&'static TaskDescriptor> {
    tasks(kind).iter().find(|t| t.key == key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn pipeline_sizes() {
        assert_eq!(tasks(PipelineKind::Ingest).len(), 5);
        assert_eq!(tasks(PipelineKind::Score).len(), 3);
    }

    #[test]
    fn keys_are_unique_per_pipeline() {
        for kind in PipelineKind::ALL {
            let keys: HashSet<_> = tasks(kind).iter().map(|t| t.key).collect();
            assert_eq!(keys.len(), tasks(kind).len(), "{kind} has duplicate keys");
        }
    }

    #[test]
    fn order_is_fixed() {
        let keys: Vec<_> = tasks(PipelineKind::Ingest).iter().map(|t| t.key).collect();
        assert_eq!(keys, ["website", "firmo", "techno", "financials", "growth"]);
        assert_eq!(
            find(PipelineKind::Score, "category_weights").map(|t| t.name),
            Some("AI-Driven Category Weights")
        );
        assert!(find(PipelineKind::Ingest, "business_context").is_none());
    }
}
