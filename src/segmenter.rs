//! Section segmentation for normalized filing text.
//!
//! The segmenter scans a filing line by line for canonical item headers ("Item 1A. Risk
//! Factors" and friends), tolerating the formatting drift seen across registrants. Matches
//! are only honored after the document's first real "Part I / Item 1" pair so that the table
//! of contents does not produce false boundaries. Segmentation never fails: a document with
//! no recognizable headers degrades to a single preamble section.

use regex::Regex;
use std::sync::OnceLock;

/// Name assigned to text preceding the first recognized header.
pub const PREAMBLE_SECTION: &str = "Preamble";

/// One contiguous named span of the filing.
#[derive(Debug, Clone)]
pub struct SegmentedSection {
    /// Canonical section name from the item taxonomy.
    pub name: String,
    /// The literal header line as found in the source.
    pub header: String,
    /// Full section text, header line excluded.
    pub text: String,
}

struct ItemPattern {
    canonical: &'static str,
    variants: &'static [&'static str],
}

/// Canonical 10-K item labels with regex variants per label. Variants match a whole
/// (trimmed) header line; page numbers and dotted leaders are stripped before matching.
const ITEM_TAXONOMY: &[ItemPattern] = &[
    ItemPattern {
        canonical: "Business",
        variants: &[
            r"(?i)^item\s+1\b[\s.:\-–—]*(business)?$",
            r"(?i)^business$",
        ],
    },
    ItemPattern {
        canonical: "Risk Factors",
        variants: &[
            r"(?i)^item\s+1a\b[\s.:\-–—]*(risk\s+factors)?$",
            r"(?i)^risk\s+factors$",
        ],
    },
    ItemPattern {
        canonical: "Unresolved Staff Comments",
        variants: &[r"(?i)^item\s+1b\b[\s.:\-–—]*(unresolved\s+staff\s+comments)?$"],
    },
    ItemPattern {
        canonical: "Properties",
        variants: &[r"(?i)^item\s+2\b[\s.:\-–—]*(properties)?$"],
    },
    ItemPattern {
        canonical: "Legal Proceedings",
        variants: &[
            r"(?i)^item\s+3\b[\s.:\-–—]*(legal\s+proceedings)?$",
            r"(?i)^legal\s+proceedings$",
        ],
    },
    ItemPattern {
        canonical: "Mine Safety Disclosures",
        variants: &[r"(?i)^item\s+4\b[\s.:\-–—]*(mine\s+safety\s+disclosures)?$"],
    },
    ItemPattern {
        canonical: "Market for Registrant's Common Equity",
        variants: &[r"(?i)^item\s+5\b[\s.:\-–—]*(market\s+for\s+(the\s+)?registrant.?s\s+common\s+equity.*)?$"],
    },
    ItemPattern {
        canonical: "Selected Financial Data",
        variants: &[r"(?i)^item\s+6\b[\s.:\-–—]*(selected\s+financial\s+data|\[reserved\])?$"],
    },
    ItemPattern {
        canonical: "MD&A",
        variants: &[
            r"(?i)^item\s+7\b[\s.:\-–—]*(management.?s\s+discussion\s+and\s+analysis.*)?$",
            r"(?i)^management.?s\s+discussion\s+and\s+analysis.*$",
        ],
    },
    ItemPattern {
        canonical: "Quantitative and Qualitative Disclosures About Market Risk",
        variants: &[r"(?i)^item\s+7a\b[\s.:\-–—]*(quantitative\s+and\s+qualitative\s+disclosures.*)?$"],
    },
    ItemPattern {
        canonical: "Financial Statements",
        variants: &[
            r"(?i)^item\s+8\b[\s.:\-–—]*(financial\s+statements(\s+and\s+supplementary\s+data)?)?$",
            r"(?i)^financial\s+statements\s+and\s+supplementary\s+data$",
        ],
    },
    ItemPattern {
        canonical: "Changes in and Disagreements with Accountants",
        variants: &[r"(?i)^item\s+9\b[\s.:\-–—]*(changes\s+in\s+and\s+disagreements\s+with\s+accountants.*)?$"],
    },
    ItemPattern {
        canonical: "Controls and Procedures",
        variants: &[
            r"(?i)^item\s+9a\b[\s.:\-–—]*(controls\s+and\s+procedures)?$",
            r"(?i)^controls\s+and\s+procedures$",
        ],
    },
    ItemPattern {
        canonical: "Exhibits",
        variants: &[r"(?i)^item\s+15\b[\s.:\-–—]*(exhibits.*)?$"],
    },
];

struct CompiledTaxonomy {
    items: Vec<(&'static str, Vec<Regex>)>,
    part_one: Regex,
    item_one: Regex,
}

fn taxonomy() -> &'static CompiledTaxonomy {
    static TAXONOMY: OnceLock<CompiledTaxonomy> = OnceLock::new();
    TAXONOMY.get_or_init(|| CompiledTaxonomy {
        items: ITEM_TAXONOMY
            .iter()
            .map(|item| {
                let variants = item
                    .variants
                    .iter()
                    .map(|pattern| Regex::new(pattern).expect("invalid taxonomy pattern"))
                    .collect();
                (item.canonical, variants)
            })
            .collect(),
        part_one: Regex::new(r"(?i)^part\s+i\b[\s.:\-–—]*$").expect("invalid part pattern"),
        item_one: Regex::new(r"(?i)^item\s+1\b").expect("invalid anchor pattern"),
    })
}

/// Number of lines after a "Part I" line within which "Item 1" must appear for the pair to
/// count as the table-of-contents anchor.
const ANCHOR_WINDOW: usize = 40;

/// Header lines longer than this are treated as body text even when a variant matches.
const MAX_HEADER_LEN: usize = 120;

/// Split normalized filing text into an ordered list of named sections.
///
/// Returns at least one section for non-empty input. Text before the first recognized
/// header becomes a synthetic [`PREAMBLE_SECTION`]; when a canonical name is detected more
/// than once the later occurrence wins its position and the earlier text is dropped rather
/// than merged.
pub fn segment_filing(text: &str) -> Vec<SegmentedSection> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let lines = collect_lines(text);
    let anchor = find_anchor(&lines);
    let boundaries = find_boundaries(&lines, anchor);

    if boundaries.is_empty() {
        tracing::warn!("No section headers recognized; emitting single preamble section");
        return vec![SegmentedSection {
            name: PREAMBLE_SECTION.to_string(),
            header: String::new(),
            text: text.to_string(),
        }];
    }

    let mut sections: Vec<SegmentedSection> = Vec::new();

    let first_start = boundaries[0].line_index;
    let preamble_text = slice_lines(&lines, text, 0, first_start);
    if !preamble_text.trim().is_empty() {
        sections.push(SegmentedSection {
            name: PREAMBLE_SECTION.to_string(),
            header: String::new(),
            text: preamble_text,
        });
    }

    for (position, boundary) in boundaries.iter().enumerate() {
        let body_start = boundary.line_index + 1;
        let body_end = boundaries
            .get(position + 1)
            .map(|next| next.line_index)
            .unwrap_or(lines.len());
        let body = slice_lines(&lines, text, body_start, body_end);

        // Last-detected wins: drop any earlier section under the same canonical name.
        sections.retain(|section| section.name != boundary.canonical);
        sections.push(SegmentedSection {
            name: boundary.canonical.to_string(),
            header: lines[boundary.line_index].text.trim().to_string(),
            text: body,
        });
    }

    tracing::debug!(
        sections = sections.len(),
        anchored = anchor.is_some(),
        "Segmented filing"
    );
    sections
}

struct Line<'a> {
    start: usize,
    end: usize,
    text: &'a str,
}

struct Boundary {
    line_index: usize,
    canonical: &'static str,
}

fn collect_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut offset = 0;
    for raw in text.split_inclusive('\n') {
        lines.push(Line {
            start: offset,
            end: offset + raw.len(),
            text: raw.trim_end_matches('\n'),
        });
        offset += raw.len();
    }
    lines
}

/// Locate the first "Part I" line that is followed shortly by an "Item 1" line. Header
/// matches before this point are table-of-contents rows and are ignored.
fn find_anchor(lines: &[Line<'_>]) -> Option<usize> {
    let taxonomy = taxonomy();
    for (index, line) in lines.iter().enumerate() {
        if !taxonomy.part_one.is_match(line.text.trim()) {
            continue;
        }
        let window_end = (index + 1 + ANCHOR_WINDOW).min(lines.len());
        for candidate in &lines[index + 1..window_end] {
            if taxonomy.item_one.is_match(candidate.text.trim()) {
                return Some(index);
            }
        }
    }
    None
}

fn find_boundaries(lines: &[Line<'_>], anchor: Option<usize>) -> Vec<Boundary> {
    let taxonomy = taxonomy();
    let scan_from = anchor.unwrap_or(0);
    let mut boundaries = Vec::new();

    for (index, line) in lines.iter().enumerate().skip(scan_from) {
        let candidate = normalize_header_line(line.text);
        if candidate.is_empty() || candidate.len() > MAX_HEADER_LEN {
            continue;
        }
        if let Some(canonical) = match_header(taxonomy, &candidate) {
            boundaries.push(Boundary {
                line_index: index,
                canonical,
            });
        }
    }

    boundaries
}

fn match_header(taxonomy: &CompiledTaxonomy, candidate: &str) -> Option<&'static str> {
    for (canonical, variants) in &taxonomy.items {
        if variants.iter().any(|variant| variant.is_match(candidate)) {
            return Some(canonical);
        }
    }
    None
}

/// Strip page numbers and dotted leaders so "Item 1A. Risk Factors.......12" still matches.
fn normalize_header_line(line: &str) -> String {
    static LEADER: OnceLock<Regex> = OnceLock::new();
    let leader =
        LEADER.get_or_init(|| Regex::new(r"[.\s]{2,}\d+\s*$").expect("invalid leader pattern"));
    leader.replace(line.trim(), "").trim_end().to_string()
}

fn slice_lines(lines: &[Line<'_>], text: &str, start_line: usize, end_line: usize) -> String {
    if start_line >= end_line || start_line >= lines.len() {
        return String::new();
    }
    let start = lines[start_line].start;
    let end = lines[end_line.min(lines.len()) - 1].end;
    text[start..end].to_string()
}
