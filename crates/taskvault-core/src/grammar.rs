//! Task-line grammar: a pure, total scanner over raw document text.
//!
//! Unparsable lines simply produce no record, so parsing never fails. The
//! grammar recognizes exactly one shape: optional indent, optional list
//! bullet, a state vocabulary token, an optional bracketed priority directly
//! after the state token, and free text. A task line may be followed by a
//! maximal contiguous run of `key:: value` metadata lines; the first
//! non-matching line (a blank line included) terminates the run.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::{PropertyList, TaskPriority, TaskRecord, TaskState};

static TASK_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<indent>\s*)(?:[-*]\s+)?(?P<state>TODO|DOING|DONE|CANCELED|WAITING)\s*(?:\[#(?P<letter>[A-C])\])?\s*(?P<rest>.*)$",
    )
    .expect("task line regex")
});

pub(crate) static PROPERTY_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?P<key>[\w-]+)::\s*(?P<value>.*)$").expect("property line regex")
});

static TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)#(?P<tag>[^\s#]+)").expect("tag regex"));

/// Split on any line-ending style. Line numbers are 1-based over this split.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    text.split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .collect()
}

/// Scan `content` for task lines and their trailing metadata blocks.
///
/// Records come back in ascending line order with positional identifiers
/// (`"{path}:{line}"`). Lines consumed as metadata are skipped by the outer
/// scan, so a `key:: value` line can never itself become a task.
#[must_use]
pub fn parse_document(path: &str, content: &str) -> Vec<TaskRecord> {
    let lines = split_lines(content);
    let mut tasks = Vec::new();

    let mut i = 0;
    while i < lines.len() {
        let Some(caps) = TASK_LINE_RE.captures(lines[i]) else {
            i += 1;
            continue;
        };
        let Some(state) = TaskState::from_token(&caps["state"]) else {
            i += 1;
            continue;
        };
        let priority = caps
            .name("letter")
            .and_then(|m| TaskPriority::from_letter(m.as_str()));
        let text = caps["rest"].trim().to_string();
        let tags = extract_tags(&text);

        let line = i + 1;
        let (properties, next) = collect_properties(&lines, i + 1);

        tasks.push(TaskRecord {
            id: TaskRecord::make_id(path, line),
            page: path.to_string(),
            line,
            state,
            priority,
            text,
            tags,
            properties,
        });

        i = next;
    }

    tasks
}

/// Tags are `#` tokens preceded by start-of-text or whitespace; the `#` is
/// kept in the extracted tag. Duplicates are preserved in occurrence order.
fn extract_tags(text: &str) -> Vec<String> {
    TAG_RE
        .captures_iter(text)
        .map(|caps| format!("#{}", &caps["tag"]))
        .collect()
}

/// Consume the metadata block starting at `start`, returning the collected
/// properties and the index of the first line not consumed. Duplicate keys
/// overwrite in place.
fn collect_properties(lines: &[&str], start: usize) -> (PropertyList, usize) {
    let mut properties = PropertyList::new();
    let mut i = start;
    while i < lines.len() {
        let Some(caps) = PROPERTY_LINE_RE.captures(lines[i]) else {
            break;
        };
        properties.upsert(&caps["key"], caps["value"].trim());
        i += 1;
    }
    (properties, i)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_basic_task_lines_with_states_and_text() {
        let content = "TODO Write plugin\nDOING Implement parser\nDONE Initial skeleton";
        let tasks = parse_document("daily.md", content);

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[0].state, TaskState::Todo);
        assert_eq!(tasks[1].state, TaskState::Doing);
        assert_eq!(tasks[2].state, TaskState::Done);
        assert_eq!(tasks[0].text, "Write plugin");
        assert_eq!(tasks[0].id, "daily.md:1");
        assert_eq!(tasks[2].line, 3);
    }

    #[test]
    fn parses_priority_and_tags_after_the_state_token() {
        let tasks = parse_document("tasks.md", "TODO [#A] Critical task #work");

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].state, TaskState::Todo);
        assert_eq!(tasks[0].priority, Some(TaskPriority::A));
        assert_eq!(tasks[0].text, "Critical task #work");
        assert_eq!(tasks[0].tags, vec!["#work"]);
    }

    #[test]
    fn collects_following_properties_until_a_blank_line() {
        let content = "TODO Do something #tag\nproject:: Project X\ncontext:: @home\n\nTODO Another task";
        let tasks = parse_document("props.md", content);

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].properties.get("project"), Some("Project X"));
        assert_eq!(tasks[0].properties.get("context"), Some("@home"));
        assert!(tasks[1].properties.is_empty());
        assert_eq!(tasks[1].line, 5);
    }

    #[test]
    fn bullet_and_indent_prefixes_are_accepted() {
        let tasks = parse_document("list.md", "  - TODO buy milk\n* DOING churn butter");

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].text, "buy milk");
        assert_eq!(tasks[1].text, "churn butter");
    }

    #[test]
    fn state_token_must_lead_the_line() {
        let tasks = parse_document("page.md", "remember TODO call mom\nnote: DONE nothing");
        assert!(tasks.is_empty());
    }

    #[test]
    fn priority_elsewhere_in_the_text_is_ordinary_text() {
        let tasks = parse_document("page.md", "TODO ship the [#A] build");

        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].priority, None);
        assert_eq!(tasks[0].text, "ship the [#A] build");
    }

    #[test]
    fn crlf_line_endings_do_not_shift_line_numbers() {
        let tasks = parse_document("win.md", "intro\r\nTODO first\r\nDONE second\r\n");

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].line, 2);
        assert_eq!(tasks[1].line, 3);
        assert_eq!(tasks[1].text, "second");
    }

    #[test]
    fn metadata_lines_are_not_scanned_as_tasks() {
        // A property value may itself contain a state token; since the line
        // was consumed into the block, the outer scan never sees it.
        let content = "TODO head\nnote:: TODO not a task\nTODO tail";
        let tasks = parse_document("page.md", content);

        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[0].properties.get("note"), Some("TODO not a task"));
        assert_eq!(tasks[1].line, 3);
    }

    #[test]
    fn duplicate_property_keys_overwrite_in_place() {
        let content = "TODO t\nowner:: ann\nowner:: ben";
        let tasks = parse_document("page.md", content);

        assert_eq!(tasks[0].properties.len(), 1);
        assert_eq!(tasks[0].properties.get("owner"), Some("ben"));
    }

    #[test]
    fn hyphenated_property_keys_are_accepted() {
        let tasks = parse_document("page.md", "TODO t\ndue-date:: 2026-09-01");
        assert_eq!(tasks[0].properties.get("due-date"), Some("2026-09-01"));
    }

    #[test]
    fn tags_require_a_preceding_boundary_and_exclude_hashes() {
        let tasks = parse_document("page.md", "TODO plan #work mid#word ##double #a #a");

        assert_eq!(tasks[0].tags, vec!["#work", "#a", "#a"]);
    }

    #[test]
    fn waiting_state_is_recognized() {
        let tasks = parse_document("page.md", "WAITING on review");
        assert_eq!(tasks[0].state, TaskState::Waiting);
        assert_eq!(tasks[0].text, "on review");
    }

    #[test]
    fn empty_document_produces_no_tasks() {
        assert!(parse_document("page.md", "").is_empty());
    }
}
