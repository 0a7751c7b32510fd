//! CLI command implementations.
//!
//! Each `run_*` function builds what it needs from the config, does its
//! work through the same library calls the HTTP server uses, and prints a
//! human-readable report (or JSON where requested).

use anyhow::{Context, Result};
use std::path::Path;

use crate::ask::{answer_question, AskRequest};
use crate::config::Config;
use crate::extract::{content_type_for_path, MIME_TEXT};
use crate::ingest::{ingest_document, ingest_url, IngestOutcome};
use crate::matcher::{run_match, MatchContext};
use crate::models::{CompanyProfile, MatchRequest};
use crate::store::{list_grants, load_matches};

/// `grantmatch ingest <path>`
pub async fn run_ingest(config: &Config, path: &Path, content_type: Option<&str>) -> Result<()> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("Failed to read grant document: {}", path.display()))?;
    let content_type = content_type
        .or_else(|| content_type_for_path(path))
        .unwrap_or(MIME_TEXT);

    let ctx = MatchContext::from_config(config).await?;
    let outcome = ingest_document(&ctx, &bytes, content_type, None)
        .await
        .with_context(|| format!("Failed to ingest {}", path.display()))?;

    print_outcome(&path.display().to_string(), &outcome);
    Ok(())
}

/// `grantmatch ingest --url <url>`
pub async fn run_ingest_url(config: &Config, url: &str) -> Result<()> {
    let ctx = MatchContext::from_config(config).await?;
    let outcome = ingest_url(&ctx, url, None)
        .await
        .with_context(|| format!("Failed to ingest {}", url))?;
    print_outcome(url, &outcome);
    Ok(())
}

fn print_outcome(source: &str, outcome: &IngestOutcome) {
    println!("ingest {}", source);
    println!("  grant_id: {}", outcome.grant_id);
    println!("  title: {}", outcome.title.as_deref().unwrap_or("(untitled)"));
    println!("{}", outcome.status);
}

/// `grantmatch match --company <file> --goal <text>`
pub async fn run_match_command(
    config: &Config,
    company_path: &Path,
    goal_text: &str,
    as_json: bool,
) -> Result<()> {
    let raw = std::fs::read_to_string(company_path)
        .with_context(|| format!("Failed to read company profile: {}", company_path.display()))?;
    let company: CompanyProfile = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid company profile JSON: {}", company_path.display()))?;

    let ctx = MatchContext::from_config(config).await?;
    let request = MatchRequest {
        company,
        goal_text: goal_text.to_string(),
    };
    let response = run_match(&ctx, &request).await?;

    if as_json {
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("No matching grants.");
        return Ok(());
    }

    for (i, r) in response.results.iter().enumerate() {
        println!(
            "{}. [{}] {} ({})",
            i + 1,
            r.score,
            r.title.as_deref().unwrap_or("(untitled)"),
            r.grant_id
        );
        println!("    overall: {}", r.why);
        if !r.missing_docs.is_empty() {
            println!("    missing: {}", r.missing_docs.join(", "));
        }
        if r.judgment_failed {
            println!("    note: eligibility could not be judged");
        }
    }
    Ok(())
}

/// `grantmatch ask <grant_id> <question>`
pub async fn run_ask(config: &Config, grant_id: &str, question: &str) -> Result<()> {
    let ctx = MatchContext::from_config(config).await?;
    let request = AskRequest {
        grant_id: grant_id.to_string(),
        question: question.to_string(),
    };
    let response = answer_question(&ctx, &request).await?;

    println!("{}", response.answer);
    if !response.citations.is_empty() {
        println!();
        for c in &response.citations {
            println!("  [{}] \"{}\"", c.section, c.quote);
        }
    }
    Ok(())
}

/// `grantmatch grants [--issuer <issuer>]`
pub async fn run_list_grants(config: &Config, issuer: Option<&str>) -> Result<()> {
    let ctx = MatchContext::from_config(config).await?;
    let grants = list_grants(ctx.store.as_ref(), issuer).await?;

    if grants.is_empty() {
        println!("No grants ingested.");
        return Ok(());
    }

    println!("{:<20} {:<40} {:<20} SECTORS", "GRANT", "TITLE", "ISSUER");
    for g in &grants {
        println!(
            "{:<20} {:<40} {:<20} {}",
            g.grant_id,
            g.title.as_deref().unwrap_or("-"),
            g.issuer.as_deref().unwrap_or("-"),
            g.sector_tags.join(",")
        );
    }
    Ok(())
}

/// `grantmatch matches <company_id>`
pub async fn run_list_matches(config: &Config, company_id: &str) -> Result<()> {
    let ctx = MatchContext::from_config(config).await?;
    let records = load_matches(ctx.store.as_ref(), company_id).await?;

    if records.is_empty() {
        println!("No matches for {}.", company_id);
        return Ok(());
    }

    for m in &records {
        println!("{}  {:>3}  {:<8} {}", m.created_at, m.score, m.rationale, m.grant_id);
        if !m.missing_docs.is_empty() {
            println!("    missing: {}", m.missing_docs.join(", "));
        }
    }
    Ok(())
}
