//! Prompt construction for the map-reduce summarizer.

/// System instruction shared by the chunk and section passes.
pub(crate) const ANALYST_SYSTEM: &str = "You are a financial analyst summarizing SEC filings. \
Be factual and neutral. Preserve concrete figures, dates, and named risks. Do not speculate.";

/// Build the map-phase prompt for a single chunk of a section.
pub(crate) fn build_chunk_prompt(section: &str, chunk_text: &str) -> String {
    format!(
        "Summarize the following excerpt from the '{section}' section of an SEC filing in a \
single dense paragraph. Keep every figure and named entity that appears.\n\n{chunk_text}"
    )
}

/// Build the reduce-phase prompt combining chunk summaries into a section summary.
pub(crate) fn build_section_prompt(section: &str, chunk_summaries: &[String]) -> String {
    let mut prompt = format!(
        "Combine the following partial summaries of the '{section}' section of an SEC filing \
into one coherent summary of two to four paragraphs. Resolve overlaps, keep all figures.\n\n"
    );
    for (index, summary) in chunk_summaries.iter().enumerate() {
        prompt.push_str(&format!("Part {}:\n{}\n\n", index + 1, summary.trim()));
    }
    prompt
}

/// Build the final prompt synthesizing section summaries into the comprehensive report.
pub(crate) fn build_report_prompt(
    ticker: &str,
    form_type: &str,
    sections: &[(String, String)],
) -> String {
    let mut prompt = format!(
        "Write a comprehensive analyst report for the {form_type} filing of {ticker}. \
Structure the report as: a brief overview, a per-section analysis, and a closing synthesis \
connecting themes across sections. Base the report only on the section summaries below.\n\n"
    );
    for (name, summary) in sections {
        prompt.push_str(&format!("## {name}\n{}\n\n", summary.trim()));
    }
    prompt
}
