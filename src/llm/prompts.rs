//! LLM prompts for transcript labeling.

/// Collection of prompts used for segment labeling.
pub struct Prompts;

impl Prompts {
    /// Prompt asking for a short label of one transcript segment.
    ///
    /// Placeholders: `{max_words}`, `{excerpt}`.
    pub fn segment_label() -> &'static str {
        r#"Output ONLY a detailed label for this deposition segment, including names if relevant ({max_words} words max).

Segment:
{excerpt}

Avoid vague labels such as "Witness details regarding allegations" or "Legal deposition transcript of testimony".
Do not generate generic labels such as "Witness Testimony", "Questioning", "Discussion" or "Conclusion".
If the segment is a question, say what is asked and who asks or answers it, when the names are given.

Example labels:
John Doe testimony about email correspondence
Cross-examination regarding financial records - Jane Smith
Discussion of meeting on June 15th

Label:"#
    }

    /// System prompt for transcript analysis.
    pub fn system_transcript_analyst() -> &'static str {
        "You are an expert legal assistant who indexes deposition transcripts. You answer with a single short plain-text label and nothing else."
    }

    /// Fill the segment label prompt.
    pub fn render_segment_label(excerpt: &str, max_words: usize) -> String {
        Self::segment_label()
            .replace("{max_words}", &max_words.to_string())
            .replace("{excerpt}", excerpt)
    }
}
