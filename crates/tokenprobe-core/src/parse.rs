//! Free-text reply -> [`ProjectRecord`]s.
//!
//! A reply is a sequence of blocks, each opened by a header line such as
//! `#1. Project Name` and followed by `Label: value` lines. Headers always
//! separate blocks, even when one appears where a body line was expected.
//!
//! Label matching lives in [`LABELS`] only. Lines that match no label are
//! appended to the notes. The launch flag is passed through verbatim.

use std::sync::OnceLock;

use regex::Regex;

use crate::ProjectRecord;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    GithubUrl,
    TokenLaunched,
    TokenName,
    Notes,
}

/// Accepted label spellings. The first four are the ones the system prompt asks for.
///
/// Every entry names its field unambiguously; a bare `GitHub:` or `Token:` line
/// is ordinary note text.
pub const LABELS: &[(&str, Field)] = &[
    ("GitHub URL", Field::GithubUrl),
    ("Наявність запущеного токена", Field::TokenLaunched),
    ("Назва токена", Field::TokenName),
    ("Примітки", Field::Notes),
    ("Token launched", Field::TokenLaunched),
    ("Launched token", Field::TokenLaunched),
    ("Token name", Field::TokenName),
    ("Notes", Field::Notes),
];

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // `#1. Name`, also `### 1. Name` and `#1. **Name**`.
    RE.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*#+[ \t]*\d+\.[ \t]+(\S[^\n]*?)[ \t]*$").expect("header regex")
    })
}

/// Parse a model reply into records, in the order the blocks appear.
///
/// Text without any header yields an empty vector.
pub fn parse_response(text: &str) -> Vec<ProjectRecord> {
    let text = text.replace("\r\n", "\n");
    let re = header_re();

    let headers: Vec<(usize, usize, String)> = re
        .captures_iter(&text)
        .filter_map(|c| {
            let whole = c.get(0)?;
            let name = c.get(1)?.as_str();
            Some((whole.start(), whole.end(), clean_name(name)))
        })
        .collect();

    let mut out = Vec::with_capacity(headers.len());
    for (i, (_, body_start, name)) in headers.iter().enumerate() {
        let body_end = headers.get(i + 1).map(|h| h.0).unwrap_or(text.len());
        let body = &text[*body_start..body_end];
        out.push(parse_block(name, body));
    }
    out
}

fn clean_name(raw: &str) -> String {
    raw.trim().trim_matches('*').trim().to_string()
}

fn parse_block(name: &str, body: &str) -> ProjectRecord {
    let mut rec = ProjectRecord {
        project: name.to_string(),
        ..Default::default()
    };

    for line in body.trim().lines() {
        match match_label(line) {
            Some((field, value)) => {
                let value = value.to_string();
                match field {
                    Field::GithubUrl => rec.github_url = value,
                    Field::TokenLaunched => rec.token_launched = value,
                    Field::TokenName => rec.token_name = value,
                    Field::Notes => rec.notes = value,
                }
            }
            None => {
                rec.notes.push('\n');
                rec.notes.push_str(line.trim());
            }
        }
    }

    rec.notes = rec.notes.trim().to_string();
    rec
}

/// Returns the field and trimmed value when `line` starts with a known label.
///
/// Tolerates a list bullet, markdown bold around the label and a trailing `?`
/// before the colon. Only the first colon separates label from value.
fn match_label(line: &str) -> Option<(Field, &str)> {
    let s = line.trim_start();
    let s = s
        .strip_prefix("- ")
        .or_else(|| s.strip_prefix("* "))
        .unwrap_or(s);
    let s = s.trim_start_matches('*');

    for (label, field) in LABELS {
        let Some(rest) = strip_prefix_ci(s, label) else {
            continue;
        };
        let rest = rest.trim_start_matches(['?', '*', ' ']);
        let Some(value) = rest.strip_prefix(':') else {
            continue;
        };
        let value = value.trim_start_matches('*');
        return Some((*field, value.trim()));
    }
    None
}

fn strip_prefix_ci<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    if let Some(rest) = s.strip_prefix(prefix) {
        return Some(rest);
    }
    let n = prefix.len();
    if s.len() >= n && s.is_char_boundary(n) && s[..n].to_lowercase() == prefix.to_lowercase() {
        Some(&s[n..])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(n: usize, name: &str, url: &str, flag: &str, token: &str, notes: &str) -> String {
        format!(
            "#{n}. {name}\nGitHub URL: {url}\nНаявність запущеного токена: {flag}\nНазва токена: {token}\nПримітки: {notes}\n"
        )
    }

    #[test]
    fn parses_well_formed_blocks_verbatim() {
        let text = [
            block(1, "Alpha", "https://github.com/a/x", "Так", "ALP", "Launched 2023."),
            block(2, "Beta", "https://github.com/b/y", "Ні", "-", "No token found."),
            block(3, "Gamma", "https://github.com/c/z", "Так", "GMM", "See docs."),
        ]
        .join("\n");
        let rs = parse_response(&text);
        assert_eq!(rs.len(), 3);
        assert_eq!(rs[0].project, "Alpha");
        assert_eq!(rs[0].github_url, "https://github.com/a/x");
        assert_eq!(rs[0].token_launched, "Так");
        assert_eq!(rs[0].token_name, "ALP");
        assert_eq!(rs[0].notes, "Launched 2023.");
        assert_eq!(rs[1].project, "Beta");
        assert_eq!(rs[1].token_launched, "Ні");
        assert_eq!(rs[1].token_name, "-");
        assert_eq!(rs[2].github_url, "https://github.com/c/z");
    }

    #[test]
    fn missing_label_leaves_empty_string() {
        let text = "#1. Alpha\nGitHub URL: https://github.com/a/x\nПримітки: n\n";
        let rs = parse_response(text);
        assert_eq!(rs.len(), 1);
        assert_eq!(rs[0].token_launched, "");
        assert_eq!(rs[0].token_name, "");
        assert_eq!(rs[0].notes, "n");
    }

    #[test]
    fn no_header_yields_no_records() {
        assert!(parse_response("").is_empty());
        assert!(parse_response("I could not find anything.\nGitHub URL: x").is_empty());
        assert!(parse_response("1. Alpha\nGitHub URL: x").is_empty());
    }

    #[test]
    fn unlabeled_lines_continue_the_notes() {
        let text = "#1. Alpha\nGitHub URL: u\nПримітки: first\nsecond line\n  third line  \n";
        let rs = parse_response(text);
        assert_eq!(rs[0].notes, "first\nsecond line\nthird line");
    }

    #[test]
    fn flag_is_not_normalized() {
        let text = "#1. Alpha\nНаявність запущеного токена: Можливо, в тестнеті\n";
        let rs = parse_response(text);
        assert_eq!(rs[0].token_launched, "Можливо, в тестнеті");
        assert_eq!(rs[0].launch_status(), crate::LaunchStatus::Unknown);
    }

    #[test]
    fn value_splits_on_first_colon_only() {
        let text = "#1. Alpha\nGitHub URL:   https://github.com/a/x  \nПримітки: Date: 2024-01-01\n";
        let rs = parse_response(text);
        assert_eq!(rs[0].github_url, "https://github.com/a/x");
        assert_eq!(rs[0].notes, "Date: 2024-01-01");
    }

    #[test]
    fn tolerates_markdown_drift() {
        let text = "### 2. **Delta Protocol**\n- **GitHub URL:** https://github.com/d/w\n**Наявність запущеного токена?**: Так\n* Назва токена: DLT\n";
        let rs = parse_response(text);
        assert_eq!(rs.len(), 1);
        assert_eq!(rs[0].project, "Delta Protocol");
        assert_eq!(rs[0].github_url, "https://github.com/d/w");
        assert_eq!(rs[0].token_launched, "Так");
        assert_eq!(rs[0].token_name, "DLT");
    }

    #[test]
    fn english_labels_are_accepted() {
        let text = "#1. Alpha\nGitHub URL: u\nToken launched: Yes\nToken name: ALP\nNotes: ok\n";
        let rs = parse_response(text);
        assert_eq!(rs[0].token_launched, "Yes");
        assert_eq!(rs[0].token_name, "ALP");
        assert_eq!(rs[0].notes, "ok");
    }

    #[test]
    fn note_lines_that_resemble_labels_stay_in_notes() {
        let text = "#1. Alpha\nGitHub URL: https://github.com/a/x\nНаявність запущеного токена: Так\nНазва токена: ALP\nПримітки: Launched 2023.\nGitHub: repo archived, 40 stars\nToken: listed on MEXC\n";
        let rs = parse_response(text);
        assert_eq!(rs.len(), 1);
        assert_eq!(rs[0].github_url, "https://github.com/a/x");
        assert_eq!(rs[0].token_name, "ALP");
        assert_eq!(
            rs[0].notes,
            "Launched 2023.\nGitHub: repo archived, 40 stars\nToken: listed on MEXC"
        );
    }

    #[test]
    fn header_inside_body_starts_a_new_block() {
        // A notes line shaped like a header is treated as a separator.
        let text = "#1. Alpha\nGitHub URL: u1\nПримітки: see below\n#2. not a project\nmore\n";
        let rs = parse_response(text);
        assert_eq!(rs.len(), 2);
        assert_eq!(rs[0].notes, "see below");
        assert_eq!(rs[1].project, "not a project");
        assert_eq!(rs[1].notes, "more");
    }

    #[test]
    fn preamble_before_first_header_is_ignored() {
        let text = "Here is the analysis:\n\n#1. Alpha\nGitHub URL: u\n";
        let rs = parse_response(text);
        assert_eq!(rs.len(), 1);
        assert_eq!(rs[0].notes, "");
    }

    #[test]
    fn crlf_input_parses_like_lf() {
        let text = "#1. Alpha\r\nGitHub URL: u\r\nНазва токена: ALP\r\n";
        let rs = parse_response(text);
        assert_eq!(rs[0].project, "Alpha");
        assert_eq!(rs[0].token_name, "ALP");
    }
}
