//! Dual-profile structural chunking for filing sections.
//!
//! Each section is chunked twice with independent size profiles: large chunks feed the
//! map-reduce summarizer, small chunks feed the retrieval index. The two chunk sets are not
//! required to align; both must cover the section text. Priority order inside a section:
//!
//! 1. Table and footnote regions are isolated into dedicated chunks and only ever split at
//!    line boundaries, never inside a row.
//! 2. Subheadings detected by the pluggable [`SubheadingDetector`] tag the chunks that
//!    follow them.
//! 3. Paragraphs are grouped until the target size, overflowing up to the maximum.
//! 4. Oversized paragraphs fall back to sentence-boundary splitting, then to a hard split at
//!    the whitespace boundary nearest the maximum.

pub mod subheading;

pub use subheading::{HeuristicSubheadingDetector, SubheadingContext, SubheadingDetector};

/// Size parameters (in characters) for one chunking pass.
#[derive(Debug, Clone, Copy)]
pub struct ChunkProfile {
    /// Chunks below this size only appear at a section tail.
    pub min_chars: usize,
    /// Preferred chunk size; grouping stops once a chunk reaches it.
    pub target_chars: usize,
    /// Hard upper bound on chunk size.
    pub max_chars: usize,
}

impl ChunkProfile {
    /// Default profile for summarization chunks.
    pub const fn summarization() -> Self {
        Self {
            min_chars: 2_000,
            target_chars: 8_000,
            max_chars: 10_000,
        }
    }

    /// Default profile for retrieval/embedding chunks, roughly 8-10x smaller.
    pub const fn embedding() -> Self {
        Self {
            min_chars: 200,
            target_chars: 1_000,
            max_chars: 1_200,
        }
    }

    /// Derive a profile from an explicit maximum, keeping the default proportions.
    pub const fn scaled_to(max_chars: usize) -> Self {
        Self {
            min_chars: max_chars / 10,
            target_chars: max_chars * 4 / 5,
            max_chars,
        }
    }
}

/// One chunk cut from a section, carrying its structural flags and subheading context.
#[derive(Debug, Clone)]
pub struct ChunkPiece {
    /// Chunk text; never empty, never longer than the profile maximum.
    pub text: String,
    /// Subheading in effect when the chunk was cut, when one was detected.
    pub subheading: Option<String>,
    /// Whether the chunk is an isolated table region.
    pub is_table: bool,
    /// Whether the chunk is an isolated footnote region.
    pub is_footnote: bool,
}

/// Split one section's text into ordered chunks under the given profile.
pub fn chunk_section(
    text: &str,
    profile: ChunkProfile,
    detector: &dyn SubheadingDetector,
) -> Vec<ChunkPiece> {
    if text.trim().is_empty() {
        return Vec::new();
    }

    let blocks = parse_blocks(text, detector);
    let mut assembler = Assembler::new(profile);

    for block in blocks {
        match block {
            Block::Subheading(title) => assembler.set_subheading(title),
            Block::Paragraph(body) => assembler.push_paragraph(&body),
            Block::Table(body) => assembler.push_region(&body, true, false),
            Block::Footnote(body) => assembler.push_region(&body, false, true),
        }
    }

    let chunks = assembler.finish();
    tracing::trace!(
        chunks = chunks.len(),
        max = profile.max_chars,
        "Chunked section"
    );
    chunks
}

enum Block {
    Paragraph(String),
    Subheading(String),
    Table(String),
    Footnote(String),
}

/// First pass: classify the section into paragraphs, subheadings, and verbatim regions.
fn parse_blocks(text: &str, detector: &dyn SubheadingDetector) -> Vec<Block> {
    let lines: Vec<&str> = text.lines().collect();
    let mut blocks = Vec::new();
    let mut index = 0;

    while index < lines.len() {
        let line = lines[index];
        if line.trim().is_empty() {
            index += 1;
            continue;
        }

        if looks_like_table_row(line) && next_is_table_row(&lines, index) {
            let (body, consumed) = take_while(&lines, index, looks_like_table_row);
            blocks.push(Block::Table(body));
            index += consumed;
            continue;
        }

        if looks_like_footnote_start(line) {
            let (body, consumed) = take_while(&lines, index, |l| !l.trim().is_empty());
            blocks.push(Block::Footnote(body));
            index += consumed;
            continue;
        }

        // Gather one paragraph: consecutive non-blank narrative lines.
        let (body, consumed) = take_while(&lines, index, |l| {
            !l.trim().is_empty() && !looks_like_table_row(l)
        });
        let advance = consumed.max(1);
        let preceded_by_blank = index == 0 || lines[index - 1].trim().is_empty();
        let next_line = lines[index + advance..]
            .iter()
            .find(|l| !l.trim().is_empty())
            .copied();

        if consumed <= 1 {
            let context = SubheadingContext {
                preceded_by_blank,
                next_line,
            };
            if let Some(title) = detector.detect_subheading(line, context) {
                blocks.push(Block::Subheading(title));
                index += advance;
                continue;
            }
        }

        if consumed == 0 {
            // A lone columnar line with narrative neighbors still reads as tabular data.
            blocks.push(Block::Table(line.to_string()));
        } else {
            blocks.push(Block::Paragraph(body));
        }
        index += advance;
    }

    blocks
}

fn take_while(lines: &[&str], start: usize, keep: impl Fn(&str) -> bool) -> (String, usize) {
    let mut consumed = 0;
    while start + consumed < lines.len() && keep(lines[start + consumed]) {
        consumed += 1;
    }
    let body = lines[start..start + consumed].join("\n");
    (body, consumed)
}

fn next_is_table_row(lines: &[&str], index: usize) -> bool {
    lines
        .get(index + 1)
        .map(|l| looks_like_table_row(l))
        .unwrap_or(false)
}

/// A line reads as a table row when it uses pipes, tabs, or columnar runs of spaces.
fn looks_like_table_row(line: &str) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }
    if trimmed.contains('|') || trimmed.contains('\t') {
        return true;
    }
    let mut gaps = 0;
    let mut run = 0;
    for c in trimmed.chars() {
        if c == ' ' {
            run += 1;
        } else {
            if run >= 2 {
                gaps += 1;
            }
            run = 0;
        }
    }
    gaps >= 2
}

fn looks_like_footnote_start(line: &str) -> bool {
    let trimmed = line.trim_start();
    if let Some(rest) = trimmed.strip_prefix('(') {
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        if !digits.is_empty() && rest[digits.len()..].starts_with(')') {
            return true;
        }
    }
    trimmed.starts_with("Note ")
        && trimmed
            .chars()
            .nth(5)
            .map(|c| c.is_ascii_digit())
            .unwrap_or(false)
}

/// Second pass: group blocks into size-bounded chunks.
struct Assembler {
    profile: ChunkProfile,
    buffer: String,
    subheading: Option<String>,
    chunks: Vec<ChunkPiece>,
}

impl Assembler {
    fn new(profile: ChunkProfile) -> Self {
        Self {
            profile,
            buffer: String::new(),
            subheading: None,
            chunks: Vec::new(),
        }
    }

    fn set_subheading(&mut self, title: String) {
        self.flush();
        // The subheading line itself stays in the stream so chunk sets cover the section.
        self.buffer.push_str(&title);
        self.subheading = Some(title);
    }

    fn push_paragraph(&mut self, body: &str) {
        let body_len = char_len(body);
        if body_len > self.profile.max_chars {
            // A tiny buffered lead-in (typically a bare subheading line) rides along with
            // the oversized paragraph instead of becoming a sub-minimum chunk.
            let lead = if char_len(&self.buffer) < self.profile.min_chars {
                std::mem::take(&mut self.buffer)
            } else {
                self.flush();
                String::new()
            };
            let combined = if lead.trim().is_empty() {
                body.to_string()
            } else {
                format!("{lead}\n\n{body}")
            };
            for piece in split_oversized(&combined, self.profile.max_chars) {
                self.emit(piece, false, false);
            }
            return;
        }

        let buffered = char_len(&self.buffer);
        let separator = if self.buffer.is_empty() { 0 } else { 2 };
        if !self.buffer.is_empty()
            && (buffered >= self.profile.target_chars
                || buffered + separator + body_len > self.profile.max_chars)
        {
            self.flush();
        }
        if !self.buffer.is_empty() {
            self.buffer.push_str("\n\n");
        }
        self.buffer.push_str(body);
    }

    fn push_region(&mut self, body: &str, is_table: bool, is_footnote: bool) {
        self.flush();
        if char_len(body) <= self.profile.max_chars {
            self.emit(body.to_string(), is_table, is_footnote);
            return;
        }
        // Oversized regions are cut at line boundaries only; a single row longer than the
        // maximum falls back to a whitespace hard split.
        let mut piece = String::new();
        for line in body.lines() {
            let line_len = char_len(line);
            if line_len > self.profile.max_chars {
                self.emit_nonempty(&mut piece, is_table, is_footnote);
                for fragment in hard_split(line, self.profile.max_chars) {
                    self.emit(fragment, is_table, is_footnote);
                }
                continue;
            }
            if !piece.is_empty() && char_len(&piece) + 1 + line_len > self.profile.max_chars {
                self.emit_nonempty(&mut piece, is_table, is_footnote);
            }
            if !piece.is_empty() {
                piece.push('\n');
            }
            piece.push_str(line);
        }
        self.emit_nonempty(&mut piece, is_table, is_footnote);
    }

    fn emit_nonempty(&mut self, piece: &mut String, is_table: bool, is_footnote: bool) {
        if !piece.trim().is_empty() {
            let body = std::mem::take(piece);
            self.emit(body, is_table, is_footnote);
        } else {
            piece.clear();
        }
    }

    fn emit(&mut self, text: String, is_table: bool, is_footnote: bool) {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return;
        }
        debug_assert!(char_len(trimmed) <= self.profile.max_chars);
        self.chunks.push(ChunkPiece {
            text: trimmed.to_string(),
            subheading: self.subheading.clone(),
            is_table,
            is_footnote,
        });
    }

    fn flush(&mut self) {
        if !self.buffer.trim().is_empty() {
            let body = std::mem::take(&mut self.buffer);
            self.emit(body, false, false);
        } else {
            self.buffer.clear();
        }
    }

    fn finish(mut self) -> Vec<ChunkPiece> {
        self.flush();
        self.chunks
    }
}

/// Split an oversized paragraph at sentence boundaries, hard-splitting any sentence run
/// that alone exceeds the maximum.
fn split_oversized(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in split_sentences(text) {
        let sentence_len = char_len(sentence);
        if sentence_len > max_chars {
            if !current.trim().is_empty() {
                pieces.push(std::mem::take(&mut current));
            } else {
                current.clear();
            }
            pieces.extend(hard_split(sentence, max_chars));
            continue;
        }
        if !current.is_empty() && char_len(&current) + sentence_len > max_chars {
            pieces.push(std::mem::take(&mut current));
        }
        current.push_str(sentence);
    }
    if !current.trim().is_empty() {
        pieces.push(current);
    }
    pieces
}

/// Slice text after sentence terminators followed by whitespace, keeping the whitespace
/// attached so concatenation reproduces the input.
fn split_sentences(text: &str) -> Vec<&str> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((index, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') {
            if let Some(&(next_index, next)) = chars.peek() {
                if next.is_whitespace() {
                    let end = next_index + next.len_utf8();
                    sentences.push(&text[start..end]);
                    start = end;
                    chars.next();
                }
            } else {
                sentences.push(&text[start..index + c.len_utf8()]);
                start = index + c.len_utf8();
            }
        }
    }
    if start < text.len() {
        sentences.push(&text[start..]);
    }
    sentences
}

/// Last-resort split at the whitespace boundary nearest the maximum offset.
fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut remaining = text.trim();

    while char_len(remaining) > max_chars {
        let boundary = byte_index_of_char(remaining, max_chars);
        let cut = remaining[..boundary]
            .rfind(char::is_whitespace)
            .filter(|&ws| ws > 0)
            .unwrap_or(boundary);
        let (head, tail) = remaining.split_at(cut);
        if head.trim().is_empty() {
            break;
        }
        pieces.push(head.trim().to_string());
        remaining = tail.trim_start();
    }
    if !remaining.trim().is_empty() {
        pieces.push(remaining.trim().to_string());
    }
    pieces
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn byte_index_of_char(text: &str, n: usize) -> usize {
    text.char_indices()
        .nth(n)
        .map(|(index, _)| index)
        .unwrap_or(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(text: &str, profile: ChunkProfile) -> Vec<ChunkPiece> {
        chunk_section(text, profile, &HeuristicSubheadingDetector)
    }

    fn small_profile() -> ChunkProfile {
        ChunkProfile {
            min_chars: 20,
            target_chars: 100,
            max_chars: 140,
        }
    }

    #[test]
    fn empty_section_yields_no_chunks() {
        assert!(chunk("  \n\n ", small_profile()).is_empty());
    }

    #[test]
    fn chunks_respect_maximum_and_are_nonempty() {
        let text = "We make widgets. ".repeat(60);
        let chunks = chunk(&text, small_profile());
        assert!(chunks.len() > 1);
        for piece in &chunks {
            assert!(!piece.text.is_empty());
            assert!(char_len(&piece.text) <= 140, "chunk exceeded max");
        }
    }

    #[test]
    fn paragraphs_group_toward_target() {
        let text = "Alpha paragraph one.\n\nBeta paragraph two.\n\nGamma paragraph three.";
        let chunks = chunk(text, small_profile());
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].text.contains("Alpha"));
        assert!(chunks[0].text.contains("Gamma"));
    }

    #[test]
    fn table_region_is_isolated_and_flagged() {
        let text = "Narrative before the table.\n\
                    Revenue | 2024 | 2023\n\
                    Widgets | 900  | 800\n\
                    Total   | 900  | 800\n\
                    Narrative after the table.";
        let chunks = chunk(text, small_profile());
        let tables: Vec<_> = chunks.iter().filter(|c| c.is_table).collect();
        assert_eq!(tables.len(), 1);
        assert!(tables[0].text.contains("Widgets | 900"));
        assert!(chunks.iter().any(|c| c.text.contains("Narrative before")));
        assert!(chunks.iter().any(|c| c.text.contains("Narrative after")));
    }

    #[test]
    fn lone_columnar_line_between_narrative_is_kept_as_a_table() {
        let text = "Narrative paragraph before.\n\
                    per share amounts  2024  2023\n\
                    Narrative paragraph after.";
        let chunks = chunk(text, small_profile());
        let joined = chunks
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        assert!(joined.contains("per share amounts  2024  2023"));
        assert!(joined.contains("Narrative paragraph before."));
        assert!(joined.contains("Narrative paragraph after."));
        assert!(chunks.iter().any(|c| c.is_table && c.text.contains("2024")));
    }

    #[test]
    fn oversized_table_splits_at_line_boundaries() {
        let rows: Vec<String> = (0..30)
            .map(|i| format!("Row {i:02} | aaaaaaaaaaaaaaaa | bbbbbbbbbbbbbbbb"))
            .collect();
        let text = rows.join("\n");
        let chunks = chunk(&text, small_profile());
        assert!(chunks.len() > 1);
        for piece in &chunks {
            assert!(piece.is_table);
            assert!(char_len(&piece.text) <= 140);
            // No row may be cut mid-line.
            for line in piece.text.lines() {
                assert!(line.starts_with("Row "));
            }
        }
    }

    #[test]
    fn footnote_region_is_flagged() {
        let text = "Some narrative text here.\n\n(1) This footnote explains a detail.\nIt continues on a second line.\n\nMore narrative.";
        let chunks = chunk(text, small_profile());
        let footnotes: Vec<_> = chunks.iter().filter(|c| c.is_footnote).collect();
        assert_eq!(footnotes.len(), 1);
        assert!(footnotes[0].text.starts_with("(1)"));
        assert!(footnotes[0].text.contains("second line"));
    }

    #[test]
    fn subheading_tags_subsequent_chunks() {
        let text = "COMPETITION\n\nThe market for widgets is crowded and price sensitive.";
        let chunks = chunk(text, small_profile());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].subheading.as_deref(), Some("COMPETITION"));
        assert!(chunks[0].text.contains("COMPETITION"));
        assert!(chunks[0].text.contains("crowded"));
    }

    #[test]
    fn oversized_paragraph_splits_at_sentences() {
        let text = "This is sentence number one of the long paragraph. ".repeat(8);
        let chunks = chunk(text.trim(), small_profile());
        assert!(chunks.len() > 1);
        for piece in &chunks {
            assert!(char_len(&piece.text) <= 140);
            assert!(piece.text.ends_with('.'));
        }
    }

    #[test]
    fn unbroken_run_hard_splits_at_whitespace() {
        let text = "word ".repeat(100);
        let pieces = hard_split(text.trim(), 50);
        assert!(pieces.len() > 1);
        for piece in &pieces {
            assert!(char_len(piece) <= 50);
            assert!(!piece.starts_with(' ') && !piece.ends_with(' '));
        }
    }

    #[test]
    fn only_the_oversized_section_produces_extra_chunks() {
        let profile = small_profile();
        let short = "A compact section body well under the maximum size.";
        let long = "This sentence pads the oversized section body. ".repeat(30);

        assert_eq!(chunk(short, profile).len(), 1);
        assert_eq!(chunk(short, profile).len(), 1);
        let oversized = chunk(long.trim(), profile);
        assert!(oversized.len() > 1);
        for piece in &oversized {
            assert!(char_len(&piece.text) <= profile.max_chars);
        }
    }

    #[test]
    fn dual_profiles_both_cover_the_section() {
        let text = "INTRODUCTION\n\nWe make widgets and sell them in many markets. \
                    Demand varies by region and season.\n\nOur supply chain spans \
                    three continents and is exposed to currency risk.";
        let summary = chunk(text, ChunkProfile::summarization());
        let embed = chunk(
            text,
            ChunkProfile {
                min_chars: 10,
                target_chars: 60,
                max_chars: 90,
            },
        );
        assert!(embed.len() >= summary.len());
        for word in ["widgets", "season", "currency"] {
            assert!(summary.iter().any(|c| c.text.contains(word)));
            assert!(embed.iter().any(|c| c.text.contains(word)));
        }
    }
}
