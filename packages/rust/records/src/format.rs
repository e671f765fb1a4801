//! Field formatting for rendered task results.
//!
//! Multi-value cells arrive in several free-text shapes (Python-style list
//! literals, `•`-merged runs, delimiter-separated lists, newline lists). These
//! helpers normalize them into [`FieldValue::Bullets`] without interpreting
//! the content.

use leadconsole_shared::{Bullet, FieldValue, MISSING_VALUE};

/// Glyphs prefixed to scored cells in the prioritization table.
const ICON_CHARS: &[char] = &['⭐', '🟡', '⚪', '🟢', '🔴'];

/// Column name to display title: underscores become spaces, then title case.
pub fn pretty_label(column: &str) -> String {
    let spaced = column.replace('_', " ");
    let mut out = String::with_capacity(spaced.len());
    let mut prev_cased = false;
    for c in spaced.chars() {
        if c.is_alphabetic() {
            if prev_cased {
                out.extend(c.to_lowercase());
            } else {
                out.extend(c.to_uppercase());
            }
            prev_cased = true;
        } else {
            out.push(c);
            prev_cased = false;
        }
    }
    out
}

/// Plain value of a single-valued column.
pub fn format_text(raw: Option<&str>) -> FieldValue {
    match raw.map(str::trim) {
        None | Some("") => FieldValue::Missing,
        Some(s) if s == MISSING_VALUE => FieldValue::Missing,
        Some(s) => FieldValue::Text(s.to_string()),
    }
}

/// Technology stack cell.
pub fn format_tech_install(raw: Option<&str>) -> FieldValue {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return FieldValue::Missing;
    };

    if let Some(items) = parse_list_literal(s) {
        return if items.is_empty() {
            FieldValue::Missing
        } else {
            FieldValue::Bullets(items.into_iter().map(Bullet::plain).collect())
        };
    }

    if s.contains('•') {
        return FieldValue::Bullets(
            split_trimmed(s, '•', &[' ', '•', '\n'])
                .map(labeled_bullet)
                .collect(),
        );
    }

    let lines: Vec<&str> = split_trimmed(s, '\n', &[' ', '-', '•', '\n']).collect();
    if lines.len() > 1 {
        return FieldValue::Bullets(lines.into_iter().map(labeled_bullet).collect());
    }

    FieldValue::Text(s.to_string())
}

/// Growth signal cards, each paired by position with a comma-separated source link.
pub fn format_growth_signals(details: Option<&str>, links: Option<&str>) -> FieldValue {
    let Some(details) = details.map(str::trim).filter(|s| !s.is_empty()) else {
        return FieldValue::Missing;
    };

    let urls: Vec<&str> = links
        .map(|l| l.split(',').map(str::trim).filter(|u| !u.is_empty()).collect())
        .unwrap_or_default();

    let bullets = split_trimmed(details, '•', &[' ', '•', '\n'])
        .enumerate()
        .map(|(i, part)| {
            let mut bullet = labeled_bullet(part);
            bullet.source = urls.get(i).map(|u| u.to_string());
            bullet
        })
        .collect::<Vec<_>>();

    if bullets.is_empty() {
        FieldValue::Missing
    } else {
        FieldValue::Bullets(bullets)
    }
}

/// Office/location list cell.
pub fn format_locations(raw: Option<&str>) -> FieldValue {
    let Some(s) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return FieldValue::Missing;
    };
    if s == MISSING_VALUE || s == "(not available)" {
        return FieldValue::Text(s.to_string());
    }

    if let Some(items) = parse_list_literal(s) {
        return if items.is_empty() {
            FieldValue::Missing
        } else {
            FieldValue::Bullets(items.into_iter().map(Bullet::plain).collect())
        };
    }

    for delim in ['•', ';', '|'] {
        if s.contains(delim) {
            return FieldValue::Bullets(
                split_trimmed(s, delim, &[' ', '•', '\n', '\t', '\r'])
                    .map(Bullet::plain)
                    .collect(),
            );
        }
    }

    // Long comma lists are usually "city, state, country" triples.
    if s.contains(',') && s.chars().count() > 90 {
        let parts: Vec<&str> = s.split(',').map(str::trim).filter(|p| !p.is_empty()).collect();
        return FieldValue::Bullets(
            parts
                .chunks(3)
                .map(|chunk| Bullet::plain(chunk.join(" ")))
                .collect(),
        );
    }

    FieldValue::Text(s.to_string())
}

/// Split a scored cell such as `"⭐ High — steady growth."` into the bold score
/// (icons stripped) and its explanation. Cells without `—` are all score.
pub fn split_scored_cell(cell: &str) -> (String, Option<String>) {
    match cell.split_once('—') {
        Some((score, explanation)) => (
            strip_icons(score),
            Some(explanation.trim().to_string()),
        ),
        None => (strip_icons(cell), None),
    }
}

/// Drop leading status glyphs.
pub fn strip_icons(s: &str) -> String {
    s.trim().trim_start_matches(ICON_CHARS).trim().to_string()
}

fn labeled_bullet(part: &str) -> Bullet {
    match part.split_once(':') {
        Some((label, rest)) if !label.trim().is_empty() && !rest.starts_with("//") => {
            Bullet::labeled(label.trim(), rest.trim())
        }
        _ => Bullet::plain(part),
    }
}

/// `['AWS', "Azure"]` style literal; `None` when `s` is not bracketed.
fn parse_list_literal(s: &str) -> Option<Vec<String>> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?.trim();
    Some(
        inner
            .split(',')
            .map(|item| item.trim().trim_matches(|c| c == '\'' || c == '"').trim())
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

fn split_trimmed<'a>(
    s: &'a str,
    delim: char,
    trim: &'a [char],
) -> impl Iterator<Item = &'a str> + 'a {
    s.split(delim)
        .map(move |p| p.trim_matches(trim))
        .filter(|p| !p.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bullets(value: FieldValue) -> Vec<Bullet> {
        match value {
            FieldValue::Bullets(b) => b,
            other => panic!("expected bullets, got {other:?}"),
        }
    }

    #[test]
    fn pretty_label_title_cases() {
        assert_eq!(pretty_label("company_name"), "Company Name");
        assert_eq!(pretty_label("LinkedIn URL"), "Linkedin Url");
        assert_eq!(pretty_label("Company Revenue($)"), "Company Revenue($)");
        assert_eq!(pretty_label("3rd_party"), "3Rd Party");
    }

    #[test]
    fn text_treats_blank_as_missing() {
        assert_eq!(format_text(None), FieldValue::Missing);
        assert_eq!(format_text(Some("  ")), FieldValue::Missing);
        assert_eq!(format_text(Some(" 1995 ")), FieldValue::Text("1995".into()));
    }

    #[test]
    fn tech_install_list_literal() {
        let b = bullets(format_tech_install(Some("['AWS', \"Okta\", '']")));
        assert_eq!(b, vec![Bullet::plain("AWS"), Bullet::plain("Okta")]);
        assert_eq!(format_tech_install(Some("[]")), FieldValue::Missing);
    }

    #[test]
    fn tech_install_bullet_merged_with_labels() {
        let b = bullets(format_tech_install(Some(
            "• Cloud: AWS, Azure • Security: Okta • Misc",
        )));
        assert_eq!(b.len(), 3);
        assert_eq!(b[0], Bullet::labeled("Cloud", "AWS, Azure"));
        assert_eq!(b[2], Bullet::plain("Misc"));
    }

    #[test]
    fn tech_install_newlines_and_plain() {
        let b = bullets(format_tech_install(Some("AWS\n- Zoho: CRM\n")));
        assert_eq!(b, vec![Bullet::plain("AWS"), Bullet::labeled("Zoho", "CRM")]);
        assert_eq!(
            format_tech_install(Some("Interactio")),
            FieldValue::Text("Interactio".into())
        );
        assert_eq!(format_tech_install(None), FieldValue::Missing);
    }

    #[test]
    fn growth_signals_pair_sources_by_position() {
        let b = bullets(format_growth_signals(
            Some("• Acquisition: Bought X • Expansion: New hub • Award"),
            Some("https://a.example/1, https://a.example/2"),
        ));
        assert_eq!(b.len(), 3);
        assert_eq!(b[0].label.as_deref(), Some("Acquisition"));
        assert_eq!(b[0].source.as_deref(), Some("https://a.example/1"));
        assert_eq!(b[1].source.as_deref(), Some("https://a.example/2"));
        assert_eq!(b[2].source, None);
        assert_eq!(format_growth_signals(None, Some("x")), FieldValue::Missing);
    }

    #[test]
    fn locations_delimiters() {
        let b = bullets(format_locations(Some("Dulles, VA; Reston, VA")));
        assert_eq!(b, vec![Bullet::plain("Dulles, VA"), Bullet::plain("Reston, VA")]);

        let b = bullets(format_locations(Some("Houston, TX | Beaumont, TX")));
        assert_eq!(b.len(), 2);

        let b = bullets(format_locations(Some("['Las Vegas, NV']")));
        assert_eq!(b.len(), 2, "list literal splits on commas");
    }

    #[test]
    fn long_comma_locations_chunk_by_three() {
        let raw = "New York, NY, USA, Los Angeles, CA, USA, Toronto, ON, Canada, London, England, United Kingdom";
        let b = bullets(format_locations(Some(raw)));
        assert_eq!(b.len(), 4);
        assert_eq!(b[0].text, "New York NY USA");

        assert_eq!(
            format_locations(Some("Austin, TX")),
            FieldValue::Text("Austin, TX".into())
        );
    }

    #[test]
    fn scored_cells_strip_icons() {
        let (score, why) = split_scored_cell("⭐ High — strong cash flow.");
        assert_eq!(score, "High");
        assert_eq!(why.as_deref(), Some("strong cash flow."));

        let (score, why) = split_scored_cell("Highly digital workloads.");
        assert_eq!(score, "Highly digital workloads.");
        assert!(why.is_none());

        assert_eq!(strip_icons("🟢 High"), "High");
    }
}
