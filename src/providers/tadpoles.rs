//! Tadpoles daily report template
//!
//! Section titles are inline `<span>`/`<b>` tags styled bold, all siblings
//! inside one container, entries separated by `<br>`. The child name is the
//! element right before the `DAILY REPORT -` line.

use crate::ingest::LogSink;
use crate::report::dom::{siblings_to_lines, HtmlDocument, Node, Sibling};
use crate::report::grammar::{parse_activity_line, parse_bathroom_line, parse_meal_line, parse_nap_line};
use crate::report::{ParsedReport, Photo, DATE_MARKER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Naps,
    Meals,
    Bathroom,
    Activities,
    Photos,
    Notes,
}

/// Section title vocabulary, lowercased, without trailing colon
const SECTION_TITLES: &[(&str, Section)] = &[
    ("naps", Section::Naps),
    ("nap", Section::Naps),
    ("sleep", Section::Naps),
    ("meals", Section::Meals),
    ("meal", Section::Meals),
    ("food", Section::Meals),
    ("bathroom", Section::Bathroom),
    ("diapers", Section::Bathroom),
    ("diaper", Section::Bathroom),
    ("toileting", Section::Bathroom),
    ("activities", Section::Activities),
    ("activity", Section::Activities),
    ("photos", Section::Photos),
    ("teacher notes", Section::Notes),
    ("notes", Section::Notes),
];

fn section_of(title: &str) -> Option<Section> {
    let key = title.trim().trim_end_matches(':').trim().to_lowercase();
    SECTION_TITLES
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, section)| *section)
}

fn is_bold_inline(node: &Node<'_>) -> bool {
    match node.tag() {
        "b" | "strong" => true,
        "span" | "font" => node.has_style("font-weight:bold") || node.has_style("font-weight:700"),
        _ => false,
    }
}

fn is_section_heading(node: &Node<'_>) -> bool {
    is_bold_inline(node) && section_of(&node.text()).is_some()
}

/// A bold title ends the current section
fn is_section_stop(sibling: &Sibling<'_>) -> bool {
    matches!(sibling, Sibling::Element(node) if is_section_heading(node))
}

/// Section named by an unstyled keyword line, e.g. a plain `Bathroom<br>`
fn bare_keyword(sibling: &Sibling<'_>) -> Option<Section> {
    match sibling {
        Sibling::Element(node) if node.tag() == "br" => None,
        Sibling::Element(node) => section_of(&node.text()),
        Sibling::Text(text) => section_of(text),
    }
}

/// Split a section's siblings at bare keywords, each one opening its own section
fn split_at_keywords<'a>(section: Section, siblings: Vec<Sibling<'a>>, log: &dyn LogSink) -> Vec<(Section, Vec<Sibling<'a>>)> {
    let mut segments = vec![(section, Vec::new())];

    for sibling in siblings {
        match bare_keyword(&sibling) {
            Some(next) => {
                log.debug(&format!("Tadpoles: unstyled '{:?}' title opens a new section", next));
                segments.push((next, Vec::new()));
            }
            None => {
                if let Some((_, current)) = segments.last_mut() {
                    current.push(sibling);
                }
            }
        }
    }

    segments
}

/// Child name and raw date; `None` without a marker element
fn header(doc: &HtmlDocument) -> Option<(String, String)> {
    let marker = doc.find_innermost_containing(DATE_MARKER)?;
    let text = marker.text();
    let date = text.split_once(DATE_MARKER).map(|(_, date)| date.trim().to_string())?;
    let name = marker.prev_element_sibling().map(|n| n.text()).unwrap_or_default();
    Some((name, date))
}

/// Images among the siblings; alt text preferred, else the following text run
fn collect_photos(siblings: &[Sibling<'_>]) -> Vec<Photo> {
    let mut photos = Vec::new();

    for (index, sibling) in siblings.iter().enumerate() {
        let Some(node) = sibling.as_element() else {
            continue;
        };

        if node.tag() == "img" {
            let following = siblings.get(index + 1).and_then(|next| match next {
                Sibling::Text(text) => Some(text.clone()),
                Sibling::Element(el) if el.tag() != "img" && el.tag() != "br" => Some(el.text()),
                _ => None,
            });
            if let Some(photo) = photo_from(&node, following) {
                photos.push(photo);
            }
            continue;
        }

        let wrapper_text = Some(node.text()).filter(|t| !t.is_empty());
        for img in node.find_all(|n| n.tag() == "img") {
            if let Some(photo) = photo_from(&img, wrapper_text.clone()) {
                photos.push(photo);
            }
        }
    }

    photos
}

fn photo_from(img: &Node<'_>, fallback_caption: Option<String>) -> Option<Photo> {
    let src = img.attr("src").map(str::trim).filter(|s| !s.is_empty())?;
    let alt = img.attr("alt").map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
    let description = alt.or(fallback_caption.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()));

    Some(Photo {
        src: src.to_string(),
        description,
    })
}

fn fill_section(report: &mut ParsedReport, notes: &mut Vec<String>, section: Section, siblings: &[Sibling<'_>], log: &dyn LogSink) {
    let lines = siblings_to_lines(siblings);

    match section {
        Section::Naps => report.naps.extend(lines.iter().filter_map(|l| parse_nap_line(l))),
        Section::Meals => {
            for line in &lines {
                match parse_meal_line(line) {
                    Some(meal) => report.meals.push(meal),
                    None => log.debug(&format!("Tadpoles: meal line not understood: '{}'", line)),
                }
            }
        }
        Section::Bathroom => {
            for line in &lines {
                match parse_bathroom_line(line) {
                    Some(event) => report.bathroom_events.push(event),
                    None => log.debug(&format!("Tadpoles: bathroom line not understood: '{}'", line)),
                }
            }
        }
        Section::Activities => report.activities.extend(lines.iter().filter_map(|l| parse_activity_line(l))),
        Section::Photos => report.photos.extend(collect_photos(siblings)),
        Section::Notes => notes.extend(lines),
    }
}

pub fn parse(html: &str, log: &dyn LogSink) -> Option<ParsedReport> {
    let doc = HtmlDocument::parse(html);

    let Some((child_name_raw, report_date_raw)) = header(&doc) else {
        log.warn("Tadpoles template: no 'DAILY REPORT -' marker found");
        return None;
    };
    log.debug(&format!("Tadpoles header: child='{}' date='{}'", child_name_raw, report_date_raw));

    let mut report = ParsedReport {
        child_name_raw,
        report_date_raw,
        ..Default::default()
    };
    let mut notes = Vec::new();

    for heading in doc.find_all(is_section_heading) {
        let Some(section) = section_of(&heading.text()) else {
            continue;
        };
        let siblings = doc.collect_siblings_until(heading, is_section_stop);

        for (section, siblings) in split_at_keywords(section, siblings, log) {
            fill_section(&mut report, &mut notes, section, &siblings, log);
        }
    }

    report.teacher_notes = notes.join("\n");

    log.debug(&format!(
        "Tadpoles extraction: {} nap(s), {} meal(s), {} bathroom event(s), {} activit(ies), {} photo(s)",
        report.naps.len(),
        report.meals.len(),
        report.bathroom_events.len(),
        report.activities.len(),
        report.photos.len()
    ));

    let report = report.validated();
    if report.is_none() {
        log.warn("Tadpoles template: child name or report date missing");
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::NullLog;

    #[test]
    fn test_section_vocabulary() {
        assert_eq!(section_of("Naps:"), Some(Section::Naps));
        assert_eq!(section_of(" Teacher Notes "), Some(Section::Notes));
        assert_eq!(section_of("Lunch"), None);
    }

    #[test]
    fn test_sections_split_without_heading_markup() {
        let html = r#"<div>
            <p>Leo</p><p>DAILY REPORT - May 2, 2025</p>
            <span style="font-weight: bold">Meals</span><br>
            11:00 AM - Lunch: pasta<br>
            Bathroom<br>
            11:45 AM - Diaper: Dry
        </div>"#;

        let report = parse(html, &NullLog).unwrap();
        assert_eq!(report.child_name_raw, "Leo");
        assert_eq!(report.meals.len(), 1);
        assert_eq!(report.meals[0].food, "Lunch: pasta");
        // the bare "Bathroom" line closes meals and opens its own section
        assert_eq!(report.bathroom_events.len(), 1);
        assert_eq!(report.bathroom_events[0].kind, "Diaper");
        assert_eq!(report.bathroom_events[0].status.as_deref(), Some("Dry"));
    }

    #[test]
    fn test_missing_name_anchor_returns_none() {
        let html = "<div><p>DAILY REPORT - May 2, 2025</p></div>";
        assert!(parse(html, &NullLog).is_none());
    }
}
