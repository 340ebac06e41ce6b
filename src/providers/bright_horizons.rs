//! Bright Horizons variant of the Tadpoles report
//!
//! Layout tables throughout. The child name is the large `<h1>` banner, each
//! section is a colored `<h3>` placed directly in a content cell and is
//! followed by its own table, one row per entry.

use crate::ingest::LogSink;
use crate::report::dom::{siblings_to_lines, HtmlDocument, Node, Sibling};
use crate::report::grammar::{parse_activity_line, parse_initials, parse_nap_line, parse_timed_line};
use crate::report::{BathroomEvent, Meal, ParsedReport, Photo, DATE_MARKER};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
    Nap,
    Meals,
    Bathroom,
    Activities,
    Photos,
    Notes,
}

/// The fixed heading set of this template
const HEADINGS: &[(&str, Section)] = &[
    ("NAP", Section::Nap),
    ("NAPS", Section::Nap),
    ("MEALS", Section::Meals),
    ("BATHROOM", Section::Bathroom),
    ("DIAPERING", Section::Bathroom),
    ("ACTIVITIES", Section::Activities),
    ("PHOTOS", Section::Photos),
    ("TEACHER NOTES", Section::Notes),
];

/// Smallest inline font size taken as the name banner when there is no `<h1>`
const BANNER_MIN_FONT_PX: u32 = 24;

fn section_of(title: &str) -> Option<Section> {
    let key = title.trim().trim_end_matches(':').trim().to_uppercase();
    HEADINGS.iter().find(|(name, _)| *name == key).map(|(_, s)| *s)
}

fn is_section_heading(node: &Node<'_>) -> bool {
    node.tag() == "h3"
        && node.has_style("color:")
        && node.parent().map(|p| p.tag() == "td").unwrap_or(false)
        && section_of(&node.text()).is_some()
}

fn is_section_stop(sibling: &Sibling<'_>) -> bool {
    match sibling {
        Sibling::Element(node) => is_section_heading(node) || section_of(&node.text()).is_some(),
        Sibling::Text(text) => section_of(text).is_some(),
    }
}

fn child_name(doc: &HtmlDocument) -> String {
    doc.find_first(|n| n.tag() == "h1")
        .or_else(|| doc.find_first(|n| n.font_size_px().map(|px| px >= BANNER_MIN_FONT_PX).unwrap_or(false)))
        .map(|n| n.text())
        .unwrap_or_default()
}

fn report_date(doc: &HtmlDocument) -> Option<String> {
    let marker = doc.find_innermost_containing(DATE_MARKER)?;
    marker.text()
        .split_once(DATE_MARKER)
        .map(|(_, date)| date.trim().to_string())
}

/// Data rows of every table in the section: trimmed `<td>` texts, header rows skipped
fn section_rows<'a>(siblings: &[Sibling<'a>]) -> Vec<Vec<Node<'a>>> {
    siblings
        .iter()
        .filter_map(Sibling::as_element)
        .flat_map(|el| el.find_all(|n| n.tag() == "tr"))
        .map(|row| row.child_elements().into_iter().filter(|c| c.tag() == "td").collect::<Vec<_>>())
        .filter(|cells| !cells.is_empty())
        .collect()
}

fn cell_text(cells: &[Node<'_>], index: usize) -> String {
    cells.get(index).map(|c| c.text()).unwrap_or_default()
}

fn non_empty(text: String) -> Option<String> {
    let text = text.trim().to_string();
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}

/// Columns: time | food | amount eaten | staff initials
fn meal_from_row(cells: &[Node<'_>]) -> Option<Meal> {
    let food = cell_text(cells, 1);
    if food.is_empty() {
        return None;
    }
    Some(Meal {
        time: non_empty(cell_text(cells, 0)),
        food,
        details: non_empty(cell_text(cells, 2)),
        initials: parse_initials(&cell_text(cells, 3)),
    })
}

/// Columns: time | type | status | staff initials.
/// Single-cell rows fall back to the `"<time> - <type>"` line grammar.
fn bathroom_from_row(cells: &[Node<'_>]) -> Option<BathroomEvent> {
    if cells.len() == 1 {
        let (time, kind) = parse_timed_line(&cell_text(cells, 0))?;
        return Some(BathroomEvent {
            time: Some(time),
            kind,
            status: None,
            initials: Vec::new(),
        });
    }

    let kind = cell_text(cells, 1);
    if kind.is_empty() {
        return None;
    }
    Some(BathroomEvent {
        time: non_empty(cell_text(cells, 0)),
        kind,
        status: non_empty(cell_text(cells, 2)),
        initials: parse_initials(&cell_text(cells, 3)),
    })
}

/// Image cell plus caption cell; alt text preferred
fn photo_from_row(cells: &[Node<'_>]) -> Vec<Photo> {
    let caption = cells
        .iter()
        .filter(|c| c.find_first(|n| n.tag() == "img").is_none())
        .map(|c| c.text())
        .find(|t| !t.is_empty());

    cells
        .iter()
        .flat_map(|c| c.find_all(|n| n.tag() == "img"))
        .filter_map(|img| {
            let src = img.attr("src").map(str::trim).filter(|s| !s.is_empty())?;
            let alt = img.attr("alt").map(str::trim).filter(|s| !s.is_empty()).map(str::to_string);
            Some(Photo {
                src: src.to_string(),
                description: alt.or_else(|| caption.clone()),
            })
        })
        .collect()
}

pub fn parse(html: &str, log: &dyn LogSink) -> Option<ParsedReport> {
    let doc = HtmlDocument::parse(html);

    let Some(report_date_raw) = report_date(&doc) else {
        log.warn("Bright Horizons template: no 'DAILY REPORT -' marker found");
        return None;
    };
    let child_name_raw = child_name(&doc);
    log.debug(&format!("Bright Horizons header: child='{}' date='{}'", child_name_raw, report_date_raw));

    let mut report = ParsedReport {
        child_name_raw,
        report_date_raw,
        ..Default::default()
    };

    for heading in doc.find_all(is_section_heading) {
        let Some(section) = section_of(&heading.text()) else {
            continue;
        };
        let siblings = doc.collect_siblings_until(heading, is_section_stop);
        let rows = section_rows(&siblings);

        match section {
            Section::Nap => {
                for cells in &rows {
                    let line = cells.iter().map(|c| c.text()).collect::<Vec<_>>().join(" ");
                    report.naps.extend(parse_nap_line(&line));
                }
            }
            Section::Meals => report.meals.extend(rows.iter().filter_map(|cells| meal_from_row(cells))),
            Section::Bathroom => report.bathroom_events.extend(rows.iter().filter_map(|cells| bathroom_from_row(cells))),
            Section::Activities => {
                for cells in &rows {
                    report.activities.extend(parse_activity_line(&cell_text(cells, 0)));
                }
            }
            Section::Photos => report.photos.extend(rows.iter().flat_map(|cells| photo_from_row(cells))),
            Section::Notes => {
                let lines = siblings_to_lines(&siblings);
                if !report.teacher_notes.is_empty() {
                    report.teacher_notes.push('\n');
                }
                report.teacher_notes.push_str(&lines.join("\n"));
            }
        }
    }

    log.debug(&format!(
        "Bright Horizons extraction: {} nap(s), {} meal(s), {} bathroom event(s), {} activit(ies), {} photo(s)",
        report.naps.len(),
        report.meals.len(),
        report.bathroom_events.len(),
        report.activities.len(),
        report.photos.len()
    ));

    let report = report.validated();
    if report.is_none() {
        log.warn("Bright Horizons template: child name or report date missing");
    }
    report
}
