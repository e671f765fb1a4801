//! Agent log generation.
//!
//! [`generate`] produces the short, classified lines streamed while a task
//! runs; [`detailed_log`] produces the longer timestamped text bundled into
//! exports. Both are pure: identical inputs give identical output.

use chrono::{DateTime, FixedOffset, SecondsFormat};

use leadconsole_records::safe_filename_component;
use leadconsole_shared::{LogLine, PipelineKind};

/// Trailing line appended to every streamed sequence.
pub const META_LINE: &str = "Background execution completed just now.";

const ENTITY_FALLBACK: &str = "the selected company";

// ---------------------------------------------------------------------------
// Static signal counts
// ---------------------------------------------------------------------------

/// Signal volumes quoted in ingestion success lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalCounts {
    pub firmo: u32,
    pub web: u32,
    pub tech: u32,
    pub fin: u32,
    pub growth: u32,
}

const STATIC_SIGNAL_COUNTS: &[(&str, SignalCounts)] = &[
    ("A-Mark Precious Metals", SignalCounts { firmo: 41, web: 7, tech: 3, fin: 12, growth: 5 }),
    ("VeriSign", SignalCounts { firmo: 42, web: 9, tech: 7, fin: 13, growth: 3 }),
    ("Allied Fire Protection", SignalCounts { firmo: 41, web: 8, tech: 7, fin: 0, growth: 3 }),
    ("Aroma360", SignalCounts { firmo: 42, web: 8, tech: 20, fin: 0, growth: 2 }),
    ("Sigmatron International", SignalCounts { firmo: 41, web: 7, tech: 1, fin: 2, growth: 3 }),
    ("Wolfspeed", SignalCounts { firmo: 41, web: 8, tech: 8, fin: 13, growth: 5 }),
    ("VF Corporation", SignalCounts { firmo: 42, web: 8, tech: 6, fin: 6, growth: 5 }),
];

/// Case-insensitive lookup of the static counts for an entity.
pub fn static_signal_counts(entity: &str) -> Option<SignalCounts> {
    let wanted = entity.trim().to_lowercase();
    if wanted.is_empty() {
        return None;
    }
    STATIC_SIGNAL_COUNTS
        .iter()
        .find(|(name, _)| name.to_lowercase() == wanted)
        .map(|(_, counts)| *counts)
}

/// `" (41 firmographic attributes, 7 website-derived fields)."`, or empty when
/// every count is zero.
fn count_suffix(parts: &[(u32, &str)]) -> String {
    let rendered: Vec<String> = parts
        .iter()
        .filter(|(value, _)| *value > 0)
        .map(|(value, label)| format!("{value} {label}"))
        .collect();
    if rendered.is_empty() {
        String::new()
    } else {
        format!(" ({}).", rendered.join(", "))
    }
}

// ---------------------------------------------------------------------------
// Streamed agent steps
// ---------------------------------------------------------------------------

/// Streamed log lines for one task, always ending with a success line followed
/// by the [`META_LINE`].
///
/// Unknown task keys produce the generic three-line sequence.
pub fn generate(kind: PipelineKind, task_key: &str, entity: &str) -> Vec<LogLine> {
    let mut lines = match kind {
        PipelineKind::Ingest => ingest_steps(task_key, entity),
        PipelineKind::Score => score_steps(task_key),
    }
    .unwrap_or_else(|| fallback_steps(task_key));
    lines.push(LogLine::meta(META_LINE));
    lines
}

fn fallback_steps(task_key: &str) -> Vec<LogLine> {
    vec![
        LogLine::title(format!("Running Agentic Step for {task_key}")),
        LogLine::info("Orchestrating specialized agents for this capability..."),
        LogLine::success("✅ Step completed."),
    ]
}

fn ingest_steps(task_key: &str, entity: &str) -> Option<Vec<LogLine>> {
    let c = if entity.trim().is_empty() {
        ENTITY_FALLBACK
    } else {
        entity.trim()
    };
    let counts = static_signal_counts(entity);

    let lines = match task_key {
        "website" => {
            let suffix = counts
                .map(|s| count_suffix(&[(s.web, "web touchpoints")]))
                .unwrap_or_default();
            vec![
                LogLine::title("STEP 1 — Website & Entity Resolution Phase"),
                LogLine::info(format!("🧾 User input: \"{c}\"")),
                LogLine::info("🎯 Initializing Website Extraction Utility Agent."),
                LogLine::info("🌐 Extracting company websites via Google Search Crawler and LLM ranking..."),
                LogLine::info("🔗 Identifying official domain and key web properties (regional sites, subdomains, social handles)."),
                LogLine::info("🧩 Performing entity resolution — UID generation, fuzzy matching variants, and deduplication across sources."),
                LogLine::info(format!("📌 Locking canonical entity record for \"{c}\" for downstream enrichment.")),
                LogLine::success(format!("✅ Website set & canonical company ID created successfully{suffix}")),
            ]
        }
        "firmo" => {
            let suffix = counts
                .map(|s| {
                    count_suffix(&[
                        (s.firmo, "firmographic attributes"),
                        (s.web, "website-derived fields"),
                    ])
                })
                .unwrap_or_default();
            vec![
                LogLine::title("STEP 2 — Firmographic & Website Signal Enrichment Phase"),
                LogLine::info(format!("🚀 Initializing Firmographic Enrichment Agent for \"{c}\"...")),
                LogLine::info("📞 Hitting vendor firmographic APIs with the canonical Company UID, Name and Domain."),
                LogLine::info("🏛️ Extracting legal name, founding year, HQ location, and global office footprint."),
                LogLine::info("👥 Reconciling employee range and revenue bands from multiple data providers."),
                LogLine::info(format!("🏭 Classifying industry, sub-industry, and key segments for \"{c}\".")),
                LogLine::info("📰 Crawling company website sections — About Us, Newsroom, Product & Services, Contact Us."),
                LogLine::info("🧠 Converting unstructured page content into structured fields: company overview, solution areas, ICP hints, and positioning signals."),
                LogLine::success(format!("✅ Firmographic snapshot + website-derived signals enriched successfully{suffix}")),
            ]
        }
        "techno" => {
            let suffix = counts
                .map(|s| count_suffix(&[(s.tech, "technographic signals")]))
                .unwrap_or_default();
            vec![
                LogLine::title("STEP 3 — Technographic Profiling Phase"),
                LogLine::info(format!("🧪 Initializing Technographic Intelligence Agent for \"{c}\"...")),
                LogLine::info("🔌 Hitting technographic vendor APIs and public fingerprints for the detected domains."),
                LogLine::info("🗂️ Mapping raw product names into normalized product categories (CRM, Marketing Automation, Cloud, Data, Security, etc.)."),
                LogLine::info("📊 Estimating tech maturity level based on stack depth, cloud adoption and modern tool usage."),
                LogLine::success(format!("✅ Technographic profile and maturity score generated for \"{c}\"{suffix}")),
            ]
        }
        "financials" => {
            let suffix = counts
                .map(|s| count_suffix(&[(s.fin, "financial metrics & growth indicators")]))
                .unwrap_or_default();
            vec![
                LogLine::title("STEP 4 — Financial Insights Phase"),
                LogLine::info(format!("💹 Initializing Financials Enrichment Agent for \"{c}\"...")),
                LogLine::info("🌍 Hitting public financial APIs / filings aggregators using the canonical legal entity."),
                LogLine::info("🧽 Filtering returned records to the focal company and most recent filings."),
                LogLine::info("📑 Extracting last 3 years (and latest quarters where available) of revenue, EBITDA, net income and operating cash flow."),
                LogLine::info("📈 Computing YoY and QoQ growth rates for revenue, profitability and cash flow."),
                LogLine::info("🧮 Deriving financial health & momentum indicators (growth, profitability, leverage and liquidity)."),
                LogLine::success(format!("✅ Financial summary and growth metrics prepared for scoring engines{suffix}")),
            ]
        }
        "growth" => {
            let suffix = counts
                .map(|s| count_suffix(&[(s.growth, "news-based growth & risk signals")]))
                .unwrap_or_default();
            vec![
                LogLine::title("STEP 5 — News & Signal Detection Phase"),
                LogLine::info(format!("🛰️ Initializing News & Signal Detection Agent for \"{c}\"...")),
                LogLine::info(format!("📰 Fetching last 12 months of news, press releases, blogs and regulatory disclosures mentioning \"{c}\".")),
                LogLine::info("🧽 Deduplicating articles and filtering for high-relevance company events."),
                LogLine::info("🧠 Running LLM-based theme classification using the GTM taxonomy (Growth Signals, Financials, Risk, Strategic Outlook, Customer & Market, Competitor, ESG, Challenges)."),
                LogLine::info("📌 Highlighting Growth Signal sub-themes: Acquisition & Mergers, Awards & Industry Recognition, Business Expansion, Leadership Changes, New Product/Technology Launches, Fundings & Capital Raises."),
                LogLine::info("⚠️ Capturing Risk-oriented themes: Regulatory/Legal/Compliance, ESG & Sustainability, Bankruptcy & Financial Distress."),
                LogLine::info("💰 Enriching Financials-related news: Revenue & Earnings, Profitability & Dividends, Debt & Liquidity."),
                LogLine::info("📊 Adding context from Strategic Outlook, Customer/Market focus, Competitor actions and Business Pain Points."),
                LogLine::info("🔗 For each signal, attaching source URL, timestamp, sentiment and theme/sub-theme label."),
                LogLine::success(format!("✅ Prioritized growth & risk signal cards prepared for \"{c}\"{suffix}")),
            ]
        }
        _ => return None,
    };
    Some(lines)
}

fn score_steps(task_key: &str) -> Option<Vec<LogLine>> {
    let lines = match task_key {
        "business_context" => vec![
            LogLine::title("STEP 2 — Business Context Analyzer"),
            LogLine::info("🤖 Initializing Business Context Analyzer Agent…"),
            LogLine::info("🧠 Analyzing narrative input to extract structured context dimensions…"),
            LogLine::info("🎯 Identified business objective and strategic intent."),
            LogLine::info("👥 Classified target segment and customer archetype."),
            LogLine::info("🗺️ Recognized operational geography and market coverage."),
            LogLine::info("🧩 Mapped key product focus areas (Connectivity, Internet, Communication, Security)."),
            LogLine::info("⚠️ Highlighted business challenges impacting GTM execution."),
            LogLine::info("📈 Derived success metrics aligned to revenue and penetration goals."),
            LogLine::success("📌 Agent Summary: Business context translated into actionable signals for downstream weighting, logic design, and prioritization scoring."),
        ],
        "category_weights" => vec![
            LogLine::title("STEP 3 — Category Weight Optimization"),
            LogLine::info("⚖️ Initializing Category Weight Optimizer Agent…"),
            LogLine::info("🔎 Evaluating signal families: Technographics, Growth Signals, Financial Strength, Firmographics, Company Profile…"),
            LogLine::info("📐 Calibrating category weights to align with business objective, target segment, and GTM priorities."),
            LogLine::info("🏷️ Generating importance hierarchy and relevance tags:"),
            LogLine::info("   • Technology category relevance"),
            LogLine::info("   • Industry prioritization"),
            LogLine::info("   • Location classification"),
            LogLine::info("   • All category relevance tags generated."),
            LogLine::success("✓ Optimization complete — category weights finalized successfully."),
        ],
        "prioritization_table" => vec![
            LogLine::title("STEP 4 — Priority Segment Logic & Scoring"),
            LogLine::info("🏗️ Initializing Logic Architect Agent…"),
            LogLine::info("🧮 Constructing prioritization logic based on inputs, weights, and relevance tags…"),
            LogLine::info("🔧 Applying scoring framework…"),
            LogLine::info("   • Extracting calibrated sub-weights…"),
            LogLine::info("   ✓ Sub-weights extracted successfully."),
            LogLine::info("   • Applying weighted scoring across all accounts…"),
            LogLine::info("   ✓ Weighted scores computed."),
            LogLine::info("   • Assigning priority segments (High / Medium / Low)…"),
            LogLine::success("✓ Priority segments generated and applied."),
        ],
        _ => return None,
    };
    Some(lines)
}

/// Opening lines of the scoring pipeline, streamed before its first task.
pub fn scoring_preamble(lead_list_name: &str, account_count: usize) -> Vec<LogLine> {
    vec![
        LogLine::title("STEP 1 — Lead Scoring Phase"),
        LogLine::info(format!(
            "Initializing Lead Scoring Super Agent to prioritize leads for \"{lead_list_name}\"…"
        )),
        LogLine::info("📥 Reading Customer 360° signals in-memory…"),
        LogLine::info(format!("🔍 Extracted {account_count} unique account IDs.")),
        LogLine::info("🚀 Invoking Prioritization Super Agent..."),
        LogLine::info(format!("✓ C360 data loaded: {account_count} companies.")),
        LogLine::success("✓ Passing enriched dataset to Business Context Analyzer Agent…"),
    ]
}

// ---------------------------------------------------------------------------
// Detailed log
// ---------------------------------------------------------------------------

/// Inputs of one detailed log.
#[derive(Debug, Clone)]
pub struct DetailedLogRequest<'a> {
    pub kind: PipelineKind,
    pub task_key: &'a str,
    pub entity: &'a str,
    /// Official domain of the entity, if known.
    pub website: &'a str,
    /// Defaults to the current local time.
    pub run_ts: Option<DateTime<FixedOffset>>,
}

/// Build the timestamped detailed log for one task.
pub fn detailed_log(req: &DetailedLogRequest<'_>) -> String {
    let run_ts = req
        .run_ts
        .unwrap_or_else(|| chrono::Local::now().fixed_offset());
    let run_iso = run_ts.to_rfc3339_opts(SecondsFormat::Micros, false);
    let company = if req.entity.trim().is_empty() {
        "UNKNOWN"
    } else {
        req.entity
    };

    let mut buf = [
        "=== AGENTIC PIPELINE DETAILED LOG ===".to_string(),
        format!("Pipeline: {}", req.kind.title()),
        format!("Run Timestamp: {run_iso}"),
        format!("Company: {company}"),
        format!("Task: {}", req.task_key),
        "-".repeat(39),
        String::new(),
    ]
    .join("\n");

    let ts = run_ts.format("%Y-%m-%d %H:%M:%S,%3f").to_string();
    let csafe = safe_filename_component(req.entity);
    let body = template_lines(req.task_key, req.entity, req.website, &csafe);

    let block: Vec<String> = body.into_iter().map(|l| format!("{ts} - INFO - {l}")).collect();
    buf.push_str(&block.join("\n"));
    buf.push_str("\n\n");

    buf.push_str(&format!(
        "\n--- Generated by Agentic Lead Intelligence on {run_iso} ---\n"
    ));
    buf
}

fn lambda_event(csafe: &str, flag: &str) -> String {
    format!(
        "[LAMBDA] Event received: {{\"Records\": [{{\"s3\": {{\"bucket\": {{\"name\": \"b2b-growth-agent\"}}, \"object\": {{\"key\": \"data_ingestion/Output/website/{csafe}.json\"}}}}}}], \"{flag}\": true}}"
    )
}

fn saved_to(stage: &str, csafe: &str) -> String {
    format!("Saved to: s3://b2b-growth-agent/data_ingestion/Output/{stage}/{csafe}.json")
}

fn template_lines(task_key: &str, company: &str, website: &str, csafe: &str) -> Vec<String> {
    match task_key {
        "website" => vec![
            "Starting Website Extraction Pipeline".into(),
            format!("Input: Company Name = \"{company}\""),
            "Searching Google for official website (region = USA)".into(),
            "Applying LLM-based ranking to find the most authoritative domain".into(),
            format!("Extracted Website: {website}"),
            "Performing entity resolution".into(),
            "- Normalizing entity name variants".into(),
            "- Deduping against existing entity registry (S3 master list)".into(),
            "Canonical Company Profile created".into(),
            "Storing extracted website record".into(),
            saved_to("website", csafe),
            "Website extraction completed successfully".into(),
        ],
        "firmo" => {
            let mut lines = vec![
                "Starting Firmographic Enrichment".into(),
                format!(
                    "Reading input file from s3://b2b-growth-agent/data_ingestion/Output/website/{csafe}.json"
                ),
                format!("Input: Company = \"{company}\", Website = {website}"),
                lambda_event(csafe, "run_firmo_lambda"),
                "Pulling data from firmographic sources (LLM-enriched + multi-source lookup)".into(),
                "Extracting legal name, HQ, founding year, addresses, and entity hierarchy".into(),
                "Enriching revenue, employee range, industry classification".into(),
                "Fetching social links (LinkedIn, Facebook, Instagram)".into(),
                "Lambda completed successfully".into(),
                "🌐 Crawling company homepages and classifying links by theme...".into(),
                format!("Scraping {} - {website} ...", csafe.to_lowercase()),
                "🤖 Extracting structured info using Gemini URL Context + Google Search fallback..."
                    .into(),
            ];
            for section in [
                "About Us / Company Info",
                "Leadership & Governance",
                "Products / Services / Solutions",
                "Subsidiaries / Brands",
                "Headquarters / Locations",
                "Contact Us",
                "Social Media",
            ] {
                lines.push(format!("🔎 URL-context retrieved {section} for {company}"));
            }
            lines.extend([
                "Running website content extraction (About, Products, Contact, Newsroom)".into(),
                "Generating company overview summary using LLM".into(),
                "Performing final entity dedupe and consistency checks".into(),
                "Writing enriched firmographic profile to S3".into(),
                saved_to("firmo", csafe),
                "Firmographic enrichment completed successfully".into(),
            ]);
            lines
        }
        "techno" => vec![
            "Starting Technographic Profiling".into(),
            format!("Input Entity = \"{company}\""),
            lambda_event(csafe, "run_techno_lambda"),
            "Hitting technographic vendor APIs and public fingerprints for the detected domains".into(),
            "Mapping identified products to normalized product categories (CRM, Marketing Automation, Cloud, Data, Security, etc.)".into(),
            "Computing tech maturity level based on stack depth, cloud adoption and modern tool usage".into(),
            "Writing technographic profile to S3".into(),
            saved_to("techno", csafe),
            "Lambda completed successfully".into(),
            "Technographic profiling completed successfully".into(),
        ],
        "financials" => vec![
            "Starting Financial Insights Pipeline".into(),
            format!("Input Entity = \"{company}\""),
            lambda_event(csafe, "run_finance_lambda"),
            format!("Gathering available financial data for \"{company}\""),
            "Extracting last 3 years (and latest quarters where available) of revenue, EBITDA, net income and operating cash flow".into(),
            "Computing YoY and QoQ percentage changes".into(),
            "Deriving financial health & momentum indicators (growth, profitability, leverage and liquidity)".into(),
            "Preparing financial summary for downstream 360 view".into(),
            saved_to("financials", csafe),
            "Lambda completed successfully".into(),
            "Financial insights generated successfully".into(),
        ],
        "growth" => vec![
            "Starting Growth Signal Extraction".into(),
            format!("Input Entity = \"{company}\""),
            lambda_event(csafe, "run_growth_signals_lambda"),
            format!("Fetching last 12 months of news, blogs, and press releases for \"{company}\""),
            "Deduping articles and filtering high-quality signals".into(),
            "Running LLM-based theme classification using the GTM taxonomy (Growth Signals, Financials, Risk, Strategic Outlook, Customer & Market, Competitor, ESG, Challenges)".into(),
            "Highlighting Growth Signal sub-themes: Acquisition & Mergers, Awards & Industry Recognition, Business Expansion, Leadership Changes, New Product/Technology Launches, Fundings & Capital Raises.".into(),
            "Capturing Risk-oriented themes: Regulatory/Legal/Compliance, ESG & Sustainability, Bankruptcy & Financial Distress.".into(),
            "Enriching Financials-related news: Revenue & Earnings, Profitability & Dividends, Debt & Liquidity.".into(),
            "Adding context from Strategic Outlook, Customer/Market focus, Competitor actions and Business Pain Points.".into(),
            "Tagging sentiment, timestamps, and source URLs".into(),
            "Exporting structured signal dataset".into(),
            saved_to("growth", csafe),
            "Lambda completed successfully".into(),
            "Growth signal extraction completed successfully".into(),
        ],
        other => vec![
            format!("Starting {other}"),
            "No specific template found; logging basic step info".into(),
            format!("Completed {other}"),
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry;
    use chrono::TimeZone;
    use leadconsole_shared::LogClass;

    fn fixed_ts() -> DateTime<FixedOffset> {
        FixedOffset::east_opt(0)
            .expect("offset")
            .with_ymd_and_hms(2025, 11, 20, 9, 30, 15)
            .single()
            .expect("timestamp")
    }

    #[test]
    fn known_tasks_end_with_success_then_meta() {
        for kind in PipelineKind::ALL {
            for task in registry::tasks(kind) {
                let lines = generate(kind, task.key, "VeriSign");
                assert!(lines.len() >= 3, "{} too short", task.key);
                let n = lines.len();
                assert_eq!(lines[n - 1].class, LogClass::Meta);
                assert_eq!(lines[n - 2].class, LogClass::Success);
                assert_eq!(
                    lines.iter().filter(|l| l.class == LogClass::Meta).count(),
                    1
                );
                assert_eq!(lines[0].class, LogClass::Title);
            }
        }
    }

    #[test]
    fn unknown_task_falls_back_to_three_lines() {
        for kind in PipelineKind::ALL {
            let lines = generate(kind, "sentiment", "Acme");
            let classes: Vec<_> = lines.iter().map(|l| l.class).collect();
            assert_eq!(
                classes,
                [LogClass::Title, LogClass::Info, LogClass::Success, LogClass::Meta]
            );
            assert_eq!(lines[0].text, "Running Agentic Step for sentiment");
        }
    }

    #[test]
    fn generation_is_deterministic() {
        let a = generate(PipelineKind::Ingest, "firmo", "Wolfspeed");
        let b = generate(PipelineKind::Ingest, "firmo", "Wolfspeed");
        assert_eq!(a, b);
    }

    #[test]
    fn success_line_carries_nonzero_counts_only() {
        let lines = generate(PipelineKind::Ingest, "firmo", "verisign");
        let success = &lines[lines.len() - 2].text;
        assert!(success.ends_with("(42 firmographic attributes, 9 website-derived fields)."));

        // Allied Fire Protection has no financial signals: no suffix at all.
        let lines = generate(PipelineKind::Ingest, "financials", "Allied Fire Protection");
        assert!(lines[lines.len() - 2].text.ends_with("prepared for scoring engines"));

        // Unknown entities get no suffix either.
        let lines = generate(PipelineKind::Ingest, "website", "Acme");
        assert!(lines[lines.len() - 2].text.ends_with("created successfully"));
    }

    #[test]
    fn blank_entity_uses_generic_name() {
        let lines = generate(PipelineKind::Ingest, "website", "  ");
        assert_eq!(lines[1].text, "🧾 User input: \"the selected company\"");
    }

    #[test]
    fn static_counts_are_case_insensitive() {
        let counts = static_signal_counts("  SIGMATRON international ").expect("known company");
        assert_eq!(counts.tech, 1);
        assert!(static_signal_counts("Acme").is_none());
    }

    #[test]
    fn preamble_quotes_lead_list_and_counts() {
        let lines = scoring_preamble("Q4 Accounts", 7);
        assert_eq!(lines.len(), 7);
        assert!(lines[1].text.contains("\"Q4 Accounts\""));
        assert_eq!(lines[5].text, "✓ C360 data loaded: 7 companies.");
        assert_eq!(lines[6].class, LogClass::Success);
    }

    #[test]
    fn detailed_log_layout() {
        let log = detailed_log(&DetailedLogRequest {
            kind: PipelineKind::Ingest,
            task_key: "website",
            entity: "VF Corporation",
            website: "vfc.com",
            run_ts: Some(fixed_ts()),
        });

        let mut lines = log.lines();
        assert_eq!(lines.next(), Some("=== AGENTIC PIPELINE DETAILED LOG ==="));
        assert_eq!(lines.next(), Some("Pipeline: Data Ingestion & Enrichment"));
        assert_eq!(
            lines.next(),
            Some("Run Timestamp: 2025-11-20T09:30:15.000000+00:00")
        );
        assert_eq!(lines.next(), Some("Company: VF Corporation"));
        assert_eq!(lines.next(), Some("Task: website"));
        assert_eq!(lines.next(), Some("-".repeat(39).as_str()));
        assert_eq!(
            lines.next(),
            Some("2025-11-20 09:30:15,000 - INFO - Starting Website Extraction Pipeline")
        );

        assert!(log.contains("Extracted Website: vfc.com"));
        assert!(log.contains("Output/website/VF_Corporation.json"));
        assert!(log.ends_with(
            "\n\n\n--- Generated by Agentic Lead Intelligence on 2025-11-20T09:30:15.000000+00:00 ---\n"
        ));
    }

    #[test]
    fn detailed_log_generic_template() {
        let log = detailed_log(&DetailedLogRequest {
            kind: PipelineKind::Score,
            task_key: "category_weights",
            entity: "",
            website: "",
            run_ts: Some(fixed_ts()),
        });
        assert!(log.contains("Company: UNKNOWN"));
        assert!(log.contains("INFO - Starting category_weights"));
        assert!(log.contains("INFO - Completed category_weights"));
    }

    #[test]
    fn detailed_log_is_repeatable_with_fixed_timestamp() {
        let req = DetailedLogRequest {
            kind: PipelineKind::Ingest,
            task_key: "growth",
            entity: "Wolfspeed",
            website: "wolfspeed.com",
            run_ts: Some(fixed_ts()),
        };
        assert_eq!(detailed_log(&req), detailed_log(&req));
    }
}
