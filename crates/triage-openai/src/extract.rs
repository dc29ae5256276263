// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Turns a thread transcript into a to-do title and description.

use std::path::Path;

use tracing::{debug, info};
use triage_core::{truncate_chars, CompletionRequest, ExtractionService, TriageError};
use triage_resilience::{call_with_retry, RetryPolicy};

const TITLE_MARKER: &str = "TITLE:";
const DESCRIPTION_MARKER: &str = "DESCRIPTION:";

/// Title used when the model output has none.
pub const FALLBACK_TITLE: &str = "Issue from Slack";

/// Description used when the model output has none.
pub const FALLBACK_DESCRIPTION: &str = "No description extracted.";

/// Max characters of an unlabeled line promoted to title.
const IMPLICIT_TITLE_CHARS: usize = 200;

/// Max characters of the final title.
const TITLE_CHARS: usize = 255;

/// System prompt used when none is configured.
pub const DEFAULT_EXTRACTION_PROMPT: &str = r#"You are given a Slack thread where someone reported an issue. Your job is to extract only the core information about the problem and format it for a Basecamp to-do.

Rules:
- Ignore off-topic chatter, thanks, "following", "+1", and social filler.
- Output exactly two sections in plain text, no markdown headers:
  1. TITLE: A single short line (under ~80 chars) summarizing the issue for the to-do title.
  2. DESCRIPTION: Must follow this structure exactly. Use the display name of the person who posted the original (first) message for "Reported by ... in Slack". The word "Slack" will be turned into a link by the system; do not add a URL yourself.

DESCRIPTION structure (copy this structure and fill in; skip optional sections if information is insufficient):

Reported by [display name of person who reported] in Slack

[Main issue description - mandatory. One or more brief, clear paragraphs describing the issue.]

Steps:
1) [step one]
2) [step two]
...
[Optional: numbered list of steps to reproduce. Include only if clear from the thread; otherwise omit the entire Steps section.]

Expected result: [Optional: brief description of expected result. Omit if unavailable.]

Actual result: [Optional: brief description of actual result. Omit if unavailable.]

Important comments:
- [Optional: bullet list of important clues, follow-ups, or context from the thread. Omit section if none.]"#;

/// Title and description extracted from a thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueDraft {
    pub title: String,
    pub description: String,
}

/// Resolves the system prompt: a readable prompt file wins over the inline
/// prompt, which wins over [`DEFAULT_EXTRACTION_PROMPT`].
pub fn resolve_prompt(inline: Option<&str>, file: Option<&Path>) -> Result<String, TriageError> {
    if let Some(path) = file {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TriageError::Config(format!(
                "cannot read extraction prompt file {}: {e}",
                path.display()
            ))
        })?;
        let content = content.trim();
        if content.is_empty() {
            return Err(TriageError::Config(format!(
                "extraction prompt file {} is empty",
                path.display()
            )));
        }
        info!(path = %path.display(), "loaded extraction prompt from file");
        return Ok(content.to_string());
    }

    Ok(inline
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_EXTRACTION_PROMPT)
        .to_string())
}

/// Parses `TITLE:` / `DESCRIPTION:` sections out of model output.
///
/// Markers match case-insensitively at the start of a trimmed line. Before
/// any title, the first unlabeled non-empty line becomes the title.
pub fn parse_extraction_output(content: &str) -> IssueDraft {
    let mut title = String::new();
    let mut description_lines: Vec<&str> = Vec::new();
    let mut in_description = false;

    for line in content.lines() {
        let line = line.trim();
        if let Some(rest) = strip_marker(line, TITLE_MARKER) {
            title = rest.trim().to_string();
            in_description = false;
        } else if let Some(rest) = strip_marker(line, DESCRIPTION_MARKER) {
            let rest = rest.trim();
            if !rest.is_empty() {
                description_lines.push(rest);
            }
            in_description = true;
        } else if in_description && !line.is_empty() {
            description_lines.push(line);
        } else if title.is_empty() && !line.is_empty() {
            title = truncate_chars(line, IMPLICIT_TITLE_CHARS).to_string();
        }
    }

    let description = description_lines.join("\n").trim().to_string();
    let description = if description.is_empty() {
        FALLBACK_DESCRIPTION.to_string()
    } else {
        description
    };
    let title = if title.is_empty() {
        FALLBACK_TITLE
    } else {
        title.as_str()
    };

    IssueDraft {
        title: truncate_chars(title, TITLE_CHARS).to_string(),
        description,
    }
}

fn strip_marker<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let head = line.get(..marker.len())?;
    head.eq_ignore_ascii_case(marker)
        .then(|| &line[marker.len()..])
}

/// Sends the transcript to the extraction service (with retry) and parses the answer.
pub async fn extract_issue(
    service: &dyn ExtractionService,
    policy: &RetryPolicy,
    system_prompt: &str,
    transcript: &str,
) -> Result<IssueDraft, TriageError> {
    let request = CompletionRequest {
        system_prompt: system_prompt.to_string(),
        user_content: format!("Slack thread:\n\n{transcript}"),
    };
    let request = &request;

    let raw = call_with_retry(policy, move |attempt| {
        debug!(attempt, "requesting issue extraction");
        service.complete(request)
    })
    .await?;

    Ok(parse_extraction_output(&raw))
}
