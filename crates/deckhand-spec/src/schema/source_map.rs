//! Best-effort mapping from property paths back to source positions.
//!
//! The path's keys are located one after another, each inside the block
//! opened by the previous match. When a key appears several times in that
//! block, the occurrence with the smallest indentation wins, i.e. the one
//! closest to the document root.

use deckhand_common::error::{LineColumn, SourceSpan, ValidationErrors};

struct Line<'a> {
    indent: usize,
    text: &'a str,
}

impl<'a> Line<'a> {
    fn new(raw: &'a str) -> Self {
        let text = raw.trim_start();
        Self {
            indent: raw.len() - text.len(),
            text,
        }
    }

    fn is_content(&self) -> bool {
        !self.text.is_empty() && !self.text.starts_with('#')
    }

    fn declares(&self, key: &str) -> bool {
        let text = self.text.strip_prefix("- ").unwrap_or(self.text);
        [
            text.strip_prefix(key),
            text.strip_prefix('"')
                .and_then(|t| t.strip_prefix(key))
                .and_then(|t| t.strip_prefix('"')),
            text.strip_prefix('\'')
                .and_then(|t| t.strip_prefix(key))
                .and_then(|t| t.strip_prefix('\'')),
        ]
        .into_iter()
        .flatten()
        .any(|rest| rest.trim_start().starts_with(':'))
    }
}

fn is_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Locates the deepest key of `path` that can be found in `source`.
#[must_use]
pub fn locate(source: &str, path: &str) -> Option<SourceSpan> {
    let lines: Vec<Line<'_>> = source.lines().map(Line::new).collect();
    let mut start = 0;
    let mut end = lines.len();
    let mut parent_indent: Option<usize> = None;
    let mut found: Option<usize> = None;

    for key in path.split('.').filter(|s| !s.is_empty() && !is_index(s)) {
        let candidate = (start..end)
            .filter(|&i| {
                let line = &lines[i];
                parent_indent.is_none_or(|p| line.indent > p) && line.declares(key)
            })
            .min_by_key(|&i| lines[i].indent);
        let Some(idx) = candidate else {
            break;
        };
        let indent = lines[idx].indent;
        found = Some(idx);
        parent_indent = Some(indent);
        start = idx + 1;
        end = (start..lines.len())
            .find(|&i| lines[i].is_content() && lines[i].indent <= indent)
            .unwrap_or(lines.len());
    }

    found.map(|idx| {
        let line = &lines[idx];
        SourceSpan {
            start: LineColumn {
                line: idx + 1,
                column: line.indent + 1,
            },
            end: LineColumn {
                line: idx + 1,
                column: line.indent + line.text.chars().count(),
            },
        }
    })
}

/// Attaches positions to every error that does not have one yet.
pub fn annotate(source: &str, errors: &mut ValidationErrors) {
    for error in errors.iter_mut().filter(|e| e.position.is_none()) {
        error.position = locate(source, &error.path);
    }
}
