// SPDX-FileCopyrightText: 2026 Triage Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rewrites of the extracted description before it is filed.
//!
//! The extraction prompt asks for a "Reported by NAME in Slack" line. When the
//! reporter is known to Basecamp the name becomes a mention, and the word
//! "Slack" becomes a link back to the thread.

const REPORTED_BY: &str = "Reported by ";
const IN_SLACK: &str = " in Slack";

/// Escapes text for inclusion in Basecamp rich text.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Replaces the name in the first "Reported by NAME in Slack" phrase with a
/// Basecamp mention. The name must be non-empty and on one line.
pub fn mention_reporter(description: &str, sgid: &str, name: &str) -> String {
    let Some(start) = description.find(REPORTED_BY) else {
        return description.to_string();
    };
    let name_start = start + REPORTED_BY.len();
    let rest = &description[name_start..];
    let line_end = rest.find('\n').unwrap_or(rest.len());
    let Some(name_len) = rest[..line_end].find(IN_SLACK) else {
        return description.to_string();
    };
    if name_len == 0 {
        return description.to_string();
    }

    format!(
        "{}<bc-mention sgid=\"{}\">{}</bc-mention>{}",
        &description[..name_start],
        escape_html(sgid),
        escape_html(name),
        &description[name_start + name_len..],
    )
}

/// Links the first " in Slack" to the thread permalink.
pub fn link_permalink(description: &str, permalink: &str) -> String {
    match description.find(IN_SLACK) {
        Some(idx) => format!(
            "{} in <a href=\"{}\">Slack</a>{}",
            &description[..idx],
            escape_html(permalink),
            &description[idx + IN_SLACK.len()..],
        ),
        None => description.to_string(),
    }
}
