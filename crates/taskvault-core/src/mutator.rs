//! Line-addressed document surgery.
//!
//! Each mutation reads the current document text, rewrites only the task's
//! primary line or its trailing metadata block, and writes the whole
//! document back through the storage collaborator. Unchanged lines keep
//! their exact bytes, original line terminators included. An unknown
//! identifier, a vanished document, or a line that no longer has task shape
//! all degrade to a silent no-op; only real I/O failure propagates.
//!
//! Callers must not assume the catalog reflects a mutation synchronously:
//! the write triggers a change notification whose reindex closes the loop.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::LazyLock;

use regex::{NoExpand, Regex};
use tracing::debug;

use crate::catalog::TaskCatalog;
use crate::error::Result;
use crate::grammar::PROPERTY_LINE_RE;
use crate::models::{PropertyList, TaskPriority, TaskRecord, TaskState};
use crate::vault::VaultStore;

static STATE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<indent>\s*)(?P<bullet>(?:[-*]\s+)?)(?P<state>TODO|DOING|DONE|CANCELED|WAITING)")
        .expect("state prefix regex")
});

static PRIORITY_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[#[A-C]\]").expect("priority token regex"));

static PRIORITY_WITH_SPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\[#[A-C]\]").expect("spaced priority regex"));

/// Replace only the state token on the task's primary line; bullet, indent,
/// trailing priority, free text, and the metadata block are untouched.
pub fn set_state<S: VaultStore>(
    store: &S,
    catalog: &TaskCatalog,
    id: &str,
    next: TaskState,
) -> Result<()> {
    let Some((task, text)) = read_task_document(store, catalog, id)? else {
        return Ok(());
    };
    let mut splice = LineSplice::parse(&text);
    let index = task.line - 1;
    let Some(line) = splice.content(index) else {
        return Ok(());
    };

    let replaced = STATE_PREFIX_RE.replace(line, |caps: &regex::Captures<'_>| {
        format!("{}{}{}", &caps["indent"], &caps["bullet"], next.as_token())
    });
    let Cow::Owned(new_line) = replaced else {
        debug!(id, "line lost its task shape; skipping state write");
        return Ok(());
    };
    if new_line == line {
        return Ok(());
    }

    splice.set_content(index, new_line);
    store.write(&task.page, &splice.render())
}

/// Remove, replace, or insert the bracketed priority token on the task's
/// primary line. `None` removes the first token and its leading whitespace;
/// insertion places the new token directly after the state token.
pub fn set_priority<S: VaultStore>(
    store: &S,
    catalog: &TaskCatalog,
    id: &str,
    next: Option<TaskPriority>,
) -> Result<()> {
    let Some((task, text)) = read_task_document(store, catalog, id)? else {
        return Ok(());
    };
    let mut splice = LineSplice::parse(&text);
    let index = task.line - 1;
    let Some(line) = splice.content(index) else {
        return Ok(());
    };

    let new_line = match next {
        None => PRIORITY_WITH_SPACE_RE.replace(line, "").into_owned(),
        Some(priority) => {
            let token = format!("[#{}]", priority.as_letter());
            if PRIORITY_TOKEN_RE.is_match(line) {
                PRIORITY_TOKEN_RE.replace(line, NoExpand(&token)).into_owned()
            } else {
                let inserted = STATE_PREFIX_RE.replace(line, |caps: &regex::Captures<'_>| {
                    format!(
                        "{}{}{} {token}",
                        &caps["indent"], &caps["bullet"], &caps["state"]
                    )
                });
                match inserted {
                    Cow::Owned(updated) => updated,
                    Cow::Borrowed(_) => {
                        debug!(id, "line lost its task shape; skipping priority write");
                        return Ok(());
                    }
                }
            }
        }
    };
    if new_line == line {
        return Ok(());
    }

    splice.set_content(index, new_line);
    store.write(&task.page, &splice.render())
}

/// Wholesale replacement of the trailing metadata block: one `key:: value`
/// line per entry, entries with an empty value skipped, primary line
/// untouched. Callers that want to keep unspecified keys must pass the full
/// desired mapping (see [`set_property`] for the single-key convenience).
pub fn set_properties<S: VaultStore>(
    store: &S,
    catalog: &TaskCatalog,
    id: &str,
    properties: &PropertyList,
) -> Result<()> {
    let Some((task, text)) = read_task_document(store, catalog, id)? else {
        return Ok(());
    };
    let mut splice = LineSplice::parse(&text);
    if splice.content(task.line - 1).is_none() {
        return Ok(());
    }

    let start = task.line;
    let mut end = start;
    while let Some(line) = splice.content(end) {
        if !PROPERTY_LINE_RE.is_match(line) {
            break;
        }
        end += 1;
    }

    let block: Vec<String> = properties
        .iter()
        .filter(|(key, value)| !key.is_empty() && !value.is_empty())
        .map(|(key, value)| format!("{key}:: {value}"))
        .collect();
    splice.replace_range(start, end, block);

    let rendered = splice.render();
    if rendered == text {
        return Ok(());
    }
    store.write(&task.page, &rendered)
}

/// Single-key upsert/delete composing a read of the task's current
/// properties with [`set_properties`]. `None` or an empty value deletes.
pub fn set_property<S: VaultStore>(
    store: &S,
    catalog: &TaskCatalog,
    id: &str,
    key: &str,
    value: Option<&str>,
) -> Result<()> {
    let Some(task) = catalog.get(id) else {
        return Ok(());
    };
    let mut properties = task.properties.clone();
    match value {
        Some(value) if !value.is_empty() => properties.upsert(key, value),
        _ => {
            properties.remove(key);
        }
    }
    set_properties(store, catalog, id, &properties)
}

fn read_task_document<S: VaultStore>(
    store: &S,
    catalog: &TaskCatalog,
    id: &str,
) -> Result<Option<(Arc<TaskRecord>, String)>> {
    let Some(task) = catalog.get(id) else {
        debug!(id, "mutation target not in catalog");
        return Ok(None);
    };
    match store.read(&task.page) {
        Ok(text) => Ok(Some((task, text))),
        Err(err) if err.is_not_found() => {
            debug!(id, page = %task.page, "backing document vanished; skipping mutation");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Ordered sequence of lines with their original terminators, supporting
/// index-addressed replace. Reassembly copies untouched lines verbatim,
/// which keeps mixed LF/CRLF documents byte-stable outside the edit.
#[derive(Debug)]
struct LineSplice {
    segments: Vec<Segment>,
}

#[derive(Debug)]
struct Segment {
    content: String,
    terminator: &'static str,
}

impl LineSplice {
    fn parse(text: &str) -> Self {
        let segments = text
            .split_inclusive('\n')
            .map(|chunk| {
                if let Some(stripped) = chunk.strip_suffix("\r\n") {
                    Segment {
                        content: stripped.to_string(),
                        terminator: "\r\n",
                    }
                } else if let Some(stripped) = chunk.strip_suffix('\n') {
                    Segment {
                        content: stripped.to_string(),
                        terminator: "\n",
                    }
                } else {
                    Segment {
                        content: chunk.to_string(),
                        terminator: "",
                    }
                }
            })
            .collect();
        Self { segments }
    }

    fn content(&self, index: usize) -> Option<&str> {
        self.segments.get(index).map(|s| s.content.as_str())
    }

    fn set_content(&mut self, index: usize, content: String) {
        if let Some(segment) = self.segments.get_mut(index) {
            segment.content = content;
        }
    }

    /// Replace segments `start..end` with `contents`. New lines terminate
    /// with LF; an insertion at end-of-document inherits the terminator
    /// style the document's tail had, so a file without a trailing newline
    /// stays that way.
    fn replace_range(&mut self, start: usize, end: usize, contents: Vec<String>) {
        let end = end.min(self.segments.len());
        let start = start.min(end);
        let removed: Vec<Segment> = self.segments.drain(start..end).collect();
        let tail_insert = start == self.segments.len();

        let trailing: &'static str = if tail_insert {
            removed
                .last()
                .map(|s| s.terminator)
                .or_else(|| start.checked_sub(1).map(|i| self.segments[i].terminator))
                .unwrap_or("")
        } else {
            "\n"
        };

        if !contents.is_empty()
            && let Some(previous) = start.checked_sub(1)
            && self.segments[previous].terminator.is_empty()
        {
            self.segments[previous].terminator = "\n";
        }

        let count = contents.len();
        for (offset, content) in contents.into_iter().enumerate() {
            let terminator = if tail_insert && offset + 1 == count {
                trailing
            } else {
                "\n"
            };
            self.segments.insert(
                start + offset,
                Segment {
                    content,
                    terminator,
                },
            );
        }
    }

    fn render(&self) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            out.push_str(&segment.content);
            out.push_str(segment.terminator);
        }
        out
    }
}
