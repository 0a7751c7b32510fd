//! Prompt templates for the completion model.
//!
//! Templates are kept compact; placeholders use the `<<<NAME>>>` form and
//! are filled by the builder functions below.

use serde::Serialize;

/// Token budget for goal-intent extraction.
pub const INTENT_MAX_TOKENS: u32 = 200;
/// Token budget for one eligibility judgment.
pub const JUDGE_MAX_TOKENS: u32 = 400;
/// Token budget for grant summarization.
pub const SUMMARY_MAX_TOKENS: u32 = 600;
/// Token budget for a grant question answer.
pub const ASK_MAX_TOKENS: u32 = 300;

/// Characters of grant text sent to the summarizer.
pub const SUMMARY_INPUT_CHARS: usize = 50_000;
/// Characters of each passage sent with a grant question.
pub const PASSAGE_CHARS: usize = 1000;

const GOAL_INTENT_PROMPT: &str = r#"
Extract intents from this SME goal as JSON: {"purposes": [...], "keywords": [...], "implied_sector": "..." or null}
Return valid JSON only.
Goal: <<<GOAL_TEXT>>>
"#;

const ELIGIBILITY_JUDGE_PROMPT: &str = r#"
You are an eligibility judge. Given a COMPANY JSON and a GRANT JSON, for each eligibility rule return PASS / FAIL / UNCERTAIN and a 1-sentence supporting quote (where possible).
Return JSON:
{
 "rule_results":[ {"rule":"...", "result":"PASS|FAIL|UNCERTAIN", "quote":"..."} ],
 "overall":"PASS|FAIL|POSSIBLE",
 "missing_docs": ["..."]
}
COMPANY: <<<COMPANY_JSON>>>
GRANT: <<<GRANT_JSON>>>
"#;

const GRANT_SUMMARIZER_PROMPT: &str = r#"
You are an information extraction assistant. Extract the following keys from the grant text:
- title: short title
- issuer
- purpose: short plain-English purpose
- sector_tags: list of sectors (e.g., manufacturing, agritech)
- eligibility_rules: list of simple rules (e.g., "company_age_years_min:2", "headcount_max:200", "jurisdiction:MY")
- required_documents: short list
- deadlines: dates if present

Return valid JSON only. Use direct quotes for purpose if present.
Grant text:
<<<GRANT_TEXT>>>
"#;

const RAG_PROMPT: &str = r#"
You are a helpful assistant answering a user question about a grant. Use the provided passages to answer and include citations.

Passages:
<<<PASSAGES>>>

Question: <<<QUESTION>>>

Answer concisely in plain language. Include 1-2 quoted passages and the source title if available.
"#;

pub fn goal_intent_prompt(goal_text: &str) -> String {
    GOAL_INTENT_PROMPT.replace("<<<GOAL_TEXT>>>", goal_text)
}

pub fn eligibility_judge_prompt<C: Serialize, G: Serialize>(
    company: &C,
    grant: &G,
) -> serde_json::Result<String> {
    let company_json = serde_json::to_string(company)?;
    let grant_json = serde_json::to_string(grant)?;
    Ok(ELIGIBILITY_JUDGE_PROMPT
        .replace("<<<COMPANY_JSON>>>", &company_json)
        .replace("<<<GRANT_JSON>>>", &grant_json))
}

pub fn grant_summarizer_prompt(grant_text: &str) -> String {
    GRANT_SUMMARIZER_PROMPT.replace(
        "<<<GRANT_TEXT>>>",
        truncate_chars(grant_text, SUMMARY_INPUT_CHARS),
    )
}

/// One passage as shown to the model: a title line and the passage text.
pub fn render_passage(title: Option<&str>, text: &str) -> String {
    format!(
        "Title: {}\n{}",
        title.unwrap_or("(untitled)"),
        truncate_chars(text, PASSAGE_CHARS)
    )
}

pub fn rag_prompt(passages: &[String], question: &str) -> String {
    RAG_PROMPT
        .replace("<<<PASSAGES>>>", &passages.join("\n\n---\n\n"))
        .replace("<<<QUESTION>>>", question)
}

/// Truncate at a char boundary after at most `max_chars` characters.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
