//! Turns a resolved record into the display payload of a completed task.

use leadconsole_records::RecordTable;
use leadconsole_records::format::{
    format_growth_signals, format_locations, format_tech_install, format_text, pretty_label,
    split_scored_cell, strip_icons,
};
use leadconsole_shared::{
    Bullet, FieldValue, PipelineKind, Record, RenderedField, ResultPayload,
};

use crate::registry::TaskDescriptor;

/// Inputs beyond the record that some renderers need.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext<'a> {
    /// Free-text business context typed by the user.
    pub business_context: &'a str,
    /// Scored lead list shown by the prioritization task.
    pub prioritization: Option<&'a RecordTable>,
}

/// Render the result of `task` for `record`.
pub fn render_result(
    kind: PipelineKind,
    task: &TaskDescriptor,
    record: &Record,
    ctx: &RenderContext<'_>,
) -> ResultPayload {
    let fields = match (kind, task.key) {
        (PipelineKind::Ingest, "growth") => vec![RenderedField::new(
            "Growth Signals",
            format_growth_signals(record.get("Signal Details"), record.get("Signal Links")),
        )],
        (PipelineKind::Ingest, _) => task
            .fields
            .iter()
            .map(|col| RenderedField::new(pretty_label(col), format_column(col, record.get(col))))
            .collect(),
        (PipelineKind::Score, "business_context") => business_context_fields(ctx.business_context),
        (PipelineKind::Score, "category_weights") => category_weight_fields(),
        (PipelineKind::Score, "prioritization_table") => {
            return ResultPayload {
                task_key: task.key.to_string(),
                heading: Some(PRIORITIZATION_HEADING.to_string()),
                fields: ctx.prioritization.map(prioritization_fields).unwrap_or_default(),
            };
        }
        (PipelineKind::Score, _) => Vec::new(),
    };

    ResultPayload {
        task_key: task.key.to_string(),
        heading: None,
        fields,
    }
}

fn format_column(column: &str, raw: Option<&str>) -> FieldValue {
    match column {
        "Other Locations" => format_locations(raw),
        "Tech Install" => format_tech_install(raw),
        _ => format_text(raw),
    }
}

// ---------------------------------------------------------------------------
// Business context
// ---------------------------------------------------------------------------

const KEY_PRODUCTS: &[&str] = &[
    "Dedicated Fiber",
    "Internet",
    "Communication",
    "Security products",
];

const KEY_CHALLENGES: &[&str] = &[
    "Lack of granular insights to identify high-potential accounts",
    "Misalignment of sales execution with digital and connectivity demands in the mid-market space",
];

const SUCCESS_METRICS: &[&str] = &[
    "Increased adoption of Dedicated Fiber, Internet, Communication, and Security products",
    "Improved market penetration in the mid-market segment",
    "Revenue growth in the mid-market segment",
    "Optimized GTM strategy with better customer targeting and segmentation",
];

fn business_context_fields(text: &str) -> Vec<RenderedField> {
    let objective = text
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or("(no objective provided)");

    let list = |items: &[&str]| FieldValue::Bullets(items.iter().map(|s| Bullet::plain(*s)).collect());

    vec![
        RenderedField::new("Business Objective", FieldValue::Text(objective.to_string())),
        RenderedField::new("Target Segment", FieldValue::Text("Mid-market businesses".into())),
        RenderedField::new("Geography", FieldValue::Text("US region".into())),
        RenderedField::new(
            "Primary Goal",
            FieldValue::Text(
                "Increase market penetration, drive revenue growth, and optimize Go-To-Market (GTM) strategy."
                    .into(),
            ),
        ),
        RenderedField::new("Key Products", list(KEY_PRODUCTS)),
        RenderedField::new("Key Challenges", list(KEY_CHALLENGES)),
        RenderedField::new("Success Metrics", list(SUCCESS_METRICS)),
    ]
}

// ---------------------------------------------------------------------------
// Category weights
// ---------------------------------------------------------------------------

struct CategoryWeight {
    title: &'static str,
    priority: &'static str,
    weight: u8,
    attributes: &'static str,
    reasoning: &'static str,
    value: &'static str,
}

const CATEGORY_WEIGHTS: &[CategoryWeight] = &[
    CategoryWeight {
        title: "Growth Signals",
        priority: "High",
        weight: 35,
        attributes: "Funding rounds, hiring spikes, expansions, acquisitions, new locations",
        reasoning: "**Highest Weight**: Dynamic growth events are the **strongest leading indicators** of **near-term demand** for upgraded connectivity and security. They align directly with the objective of identifying **high-potential, high-urgency accounts**.",
        value: "**Detects Near-Term Demand**: Surfaces accounts **actively expanding or transforming**, the most likely to require new or scaled **Dedicated Fiber, Internet, Communication, or Security solutions** in the short term.",
    },
    CategoryWeight {
        title: "Technographics",
        priority: "High",
        weight: 30,
        attributes: "Current network stack, cloud usage (AWS/Azure), security tools, SD-WAN, digital maturity",
        reasoning: "**High Weight**: Validates **technology readiness** and **product-market fit** for advanced offerings. Strong technical signals **reduce sales friction** and increase conversion for **premium connectivity/security**.",
        value: "**Confirms Product-Market Fit**: Shows whether an account's **technical environment** can adopt and utilize premium connectivity and security products, **improving targeting quality**.",
    },
    CategoryWeight {
        title: "Firmographics",
        priority: "Medium",
        weight: 15,
        attributes: "Employee count, revenue band, location count, industry (NAICS/SIC)",
        reasoning: "**Medium Weight**: Provides **essential structural context** to ensure the account fits the **mid-market focus**. Useful for **segmentation** but **less predictive** of immediate purchase timing.",
        value: "**Segmentation & Qualification**: Ensures accounts meet **mid-market criteria** and typically have the operational profile that requires **dedicated connectivity solutions**.",
    },
    CategoryWeight {
        title: "Financial Data",
        priority: "Medium",
        weight: 15,
        attributes: "Credit rating, cash flow, funding stage, YoY revenue growth, YoY employee growth",
        reasoning: "**Medium Weight**: Validates the account's **ability to commit** to multi-year contracts and **filters deal risk**. Used as **supporting evidence** rather than a primary intent signal.",
        value: "**Validates Deal Quality**: Confirms **financial capacity** and **reduces credit/risk exposure** for long-term contracts.",
    },
    CategoryWeight {
        title: "Company Profile",
        priority: "Low",
        weight: 5,
        attributes: "HQ location, years in business, business model, operational footprint",
        reasoning: "**Lowest Weight**: Provides **contextual background** that aids GTM planning (e.g., multi-site potential), but has the **weakest correlation** with **short-term purchase intent**.",
        value: "**GTM Context**: Adds **strategic depth** to account profiles to better plan **territory coverage** and multi-product approaches.",
    },
];

fn category_weight_fields() -> Vec<RenderedField> {
    CATEGORY_WEIGHTS
        .iter()
        .map(|c| {
            RenderedField::new(
                c.title,
                FieldValue::Bullets(vec![
                    Bullet::labeled("Priority", c.priority),
                    Bullet::labeled("Weight", format!("{}%", c.weight)),
                    Bullet::labeled("Attributes", c.attributes),
                    Bullet::labeled("Why this weight", c.reasoning.replace("**", "")),
                    Bullet::labeled("Value in prioritization", c.value.replace("**", "")),
                ]),
            )
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Prioritization table
// ---------------------------------------------------------------------------

const PRIORITIZATION_HEADING: &str = "Lead Prioritization — Explanatory Data";

/// Scored columns shown per lead, after the priority.
const DISPLAY_COLUMNS: &[&str] = &[
    "Growth Signals",
    "Tech Maturity",
    "Financial Strength",
    "Intent Signals",
    "GTM Fit",
    "Priority Rationale",
];

fn prioritization_fields(table: &RecordTable) -> Vec<RenderedField> {
    table
        .records()
        .map(|row| {
            let name = row.get("Company Name").unwrap_or("(unnamed)").to_string();
            let mut bullets = Vec::with_capacity(DISPLAY_COLUMNS.len() + 1);
            if let Some(priority) = row.get("Priority") {
                bullets.push(Bullet::labeled("Priority", strip_icons(priority)));
            }
            for col in DISPLAY_COLUMNS {
                let Some(cell) = row.get(col) else { continue };
                let text = match split_scored_cell(cell) {
                    (score, Some(why)) => format!("{score} — {why}"),
                    (score, None) => score,
                };
                bullets.push(Bullet::labeled(*col, text));
            }
            RenderedField::new(name, FieldValue::Bullets(bullets))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use leadconsole_records::{RecordSource, demo_prioritization};
    use leadconsole_shared::DEFAULT_BUSINESS_CONTEXT;

    fn verisign() -> Record {
        leadconsole_records::RecordTable::demo()
            .expect("demo dataset")
            .resolve("VeriSign")
            .expect("resolves")
    }

    fn task(kind: PipelineKind, key: &str) -> &'static TaskDescriptor {
        registry::find(kind, key).expect("registered task")
    }

    #[test]
    fn ingest_fields_follow_declared_columns() {
        let record = verisign();
        let firmo = task(PipelineKind::Ingest, "firmo");
        let payload = render_result(PipelineKind::Ingest, firmo, &record, &RenderContext::default());

        assert_eq!(payload.task_key, "firmo");
        assert_eq!(payload.fields.len(), firmo.fields.len());
        assert_eq!(payload.fields[0].label, "Company Overview");
        assert_eq!(payload.fields[8].label, "Linkedin Url");
    }

    #[test]
    fn missing_cells_render_as_missing() {
        let record = leadconsole_records::RecordTable::demo()
            .expect("demo dataset")
            .resolve("Allied Fire Protection")
            .expect("resolves");
        let payload = render_result(
            PipelineKind::Ingest,
            task(PipelineKind::Ingest, "financials"),
            &record,
            &RenderContext::default(),
        );
        assert!(payload.fields[0].value.is_missing());
    }

    #[test]
    fn growth_task_renders_single_signal_field() {
        let payload = render_result(
            PipelineKind::Ingest,
            task(PipelineKind::Ingest, "growth"),
            &verisign(),
            &RenderContext::default(),
        );
        assert_eq!(payload.fields.len(), 1);
        assert_eq!(payload.fields[0].label, "Growth Signals");
        assert!(matches!(payload.fields[0].value, FieldValue::Bullets(_)));
    }

    #[test]
    fn business_context_uses_first_paragraph() {
        let ctx = RenderContext {
            business_context: "\n  Grow fiber sales.\n\nSecond paragraph.",
            prioritization: None,
        };
        let payload = render_result(
            PipelineKind::Score,
            task(PipelineKind::Score, "business_context"),
            &Record::default(),
            &ctx,
        );
        assert_eq!(
            payload.fields[0].value,
            FieldValue::Text("Grow fiber sales.".into())
        );
        assert_eq!(payload.fields.len(), 7);

        let empty = render_result(
            PipelineKind::Score,
            task(PipelineKind::Score, "business_context"),
            &Record::default(),
            &RenderContext::default(),
        );
        assert_eq!(
            empty.fields[0].value,
            FieldValue::Text("(no objective provided)".into())
        );
        assert!(!DEFAULT_BUSINESS_CONTEXT.is_empty());
    }

    #[test]
    fn category_weights_sum_to_hundred() {
        let total: u32 = CATEGORY_WEIGHTS.iter().map(|c| c.weight as u32).sum();
        assert_eq!(total, 100);

        let payload = render_result(
            PipelineKind::Score,
            task(PipelineKind::Score, "category_weights"),
            &Record::default(),
            &RenderContext::default(),
        );
        let labels: Vec<_> = payload.fields.iter().map(|f| f.label.as_str()).collect();
        assert_eq!(labels, task(PipelineKind::Score, "category_weights").fields);
        assert!(!payload.fields[0].value.to_plain_text().contains("**"));
    }

    #[test]
    fn prioritization_rows_strip_icons() {
        let table = demo_prioritization().expect("prioritization table");
        let ctx = RenderContext {
            business_context: "",
            prioritization: Some(&table),
        };
        let payload = render_result(
            PipelineKind::Score,
            task(PipelineKind::Score, "prioritization_table"),
            &Record::default(),
            &ctx,
        );
        assert_eq!(payload.heading.as_deref(), Some(PRIORITIZATION_HEADING));
        assert_eq!(payload.fields.len(), table.len());

        let FieldValue::Bullets(bullets) = &payload.fields[0].value else {
            panic!("expected bullets");
        };
        assert_eq!(bullets[0].label.as_deref(), Some("Priority"));
        assert!(!bullets[0].text.starts_with(['⭐', '🟡', '⚪', '🟢', '🔴']));
    }
}
