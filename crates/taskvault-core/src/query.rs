//! Pure filter/group functions over catalog snapshots. No catalog access,
//! no persistent state; callers pass the task slice they want examined.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::VaultError;
use crate::models::{PropertyList, TaskPriority, TaskRecord, TaskState};

pub const DEFAULT_PROJECT_KEY: &str = "project";
pub const NO_PROJECT_GROUP: &str = "(no project)";

/// Priority criterion: either an exact letter or the explicit "task has no
/// priority" sentinel. Serialized as `"A"`/`"B"`/`"C"` or `"none"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum PriorityFilter {
    Unset,
    Exact(TaskPriority),
}

impl PriorityFilter {
    fn matches(self, priority: Option<TaskPriority>) -> bool {
        match self {
            Self::Unset => priority.is_none(),
            Self::Exact(letter) => priority == Some(letter),
        }
    }
}

impl From<PriorityFilter> for String {
    fn from(filter: PriorityFilter) -> Self {
        match filter {
            PriorityFilter::Unset => "none".to_string(),
            PriorityFilter::Exact(letter) => letter.to_string(),
        }
    }
}

impl TryFrom<String> for PriorityFilter {
    type Error = VaultError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        raw.parse()
    }
}

impl FromStr for PriorityFilter {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("none") {
            Ok(Self::Unset)
        } else {
            s.parse::<TaskPriority>().map(Self::Exact)
        }
    }
}

/// Immutable filter description; all supplied criteria are ANDed.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryDefinition {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub states: Option<Vec<TaskState>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<PriorityFilter>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<PropertyList>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GroupBy {
    Page,
    State,
    Property,
}

impl fmt::Display for GroupBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Page => "page",
            Self::State => "state",
            Self::Property => "property",
        })
    }
}

impl FromStr for GroupBy {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "page" => Ok(Self::Page),
            "state" => Ok(Self::State),
            "property" | "project" => Ok(Self::Property),
            other => Err(VaultError::Validation(format!("unknown grouping: {other}"))),
        }
    }
}

/// Stable filter: keeps the input's relative order.
#[must_use]
pub fn execute_query(tasks: &[Arc<TaskRecord>], query: &QueryDefinition) -> Vec<Arc<TaskRecord>> {
    tasks
        .iter()
        .filter(|task| matches_query(task, query))
        .cloned()
        .collect()
}

/// Group a task slice by page, state, or a named property value. Group keys
/// come back sorted (BTreeMap); within-group order is the input order.
#[must_use]
pub fn group_tasks(
    tasks: &[Arc<TaskRecord>],
    group_by: GroupBy,
    property_key: &str,
) -> BTreeMap<String, Vec<Arc<TaskRecord>>> {
    let mut groups: BTreeMap<String, Vec<Arc<TaskRecord>>> = BTreeMap::new();
    for task in tasks {
        let key = match group_by {
            GroupBy::Page => task.page.clone(),
            GroupBy::State => task.state.to_string(),
            GroupBy::Property => task
                .properties
                .get(property_key)
                .unwrap_or(NO_PROJECT_GROUP)
                .to_string(),
        };
        groups.entry(key).or_default().push(Arc::clone(task));
    }
    groups
}

fn matches_query(task: &TaskRecord, query: &QueryDefinition) -> bool {
    if let Some(states) = &query.states
        && !states.is_empty()
        && !states.contains(&task.state)
    {
        return false;
    }

    if let Some(priority) = query.priority
        && !priority.matches(task.priority)
    {
        return false;
    }

    if let Some(pattern) = &query.page
        && !page_matches(&task.page, pattern)
    {
        return false;
    }

    if let Some(tags) = &query.tags {
        for wanted in tags {
            let wanted = wanted.to_lowercase();
            let hit = task
                .tags
                .iter()
                .any(|tag| tag.to_lowercase().contains(&wanted));
            if !hit {
                return false;
            }
        }
    }

    if let Some(properties) = &query.properties {
        for (key, wanted) in properties.iter() {
            let value = task.properties.get(key).unwrap_or_default().to_lowercase();
            if !value.contains(&wanted.to_lowercase()) {
                return false;
            }
        }
    }

    true
}

/// Exact match unless the pattern contains `*`; then `*` is a greedy
/// wildcard, anchored at both ends, and every other character is literal.
fn page_matches(page: &str, pattern: &str) -> bool {
    if !pattern.contains('*') {
        return page == pattern;
    }
    let escaped: Vec<String> = pattern.split('*').map(|part| regex::escape(part)).collect();
    let translated = format!("^{}$", escaped.join(".*"));
    Regex::new(&translated).is_ok_and(|re| re.is_match(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::parse_document;

    fn fixture() -> Vec<Arc<TaskRecord>> {
        let mut tasks = Vec::new();
        tasks.extend(parse_document(
            "work/plan.md",
            "TODO [#A] Ship release #Work\nproject:: Apollo\nDOING review docs #work #docs",
        ));
        tasks.extend(parse_document(
            "home/chores.md",
            "TODO water plants #home\nDONE [#C] laundry",
        ));
        tasks.into_iter().map(Arc::new).collect()
    }

    #[test]
    fn states_and_tags_are_anded() {
        let query = QueryDefinition {
            states: Some(vec![TaskState::Todo]),
            tags: Some(vec!["#work".to_string()]),
            ..QueryDefinition::default()
        };

        let hits = execute_query(&fixture(), &query);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "Ship release #Work");
    }

    #[test]
    fn tag_matching_is_case_insensitive_substring() {
        let query = QueryDefinition {
            tags: Some(vec!["WORK".to_string()]),
            ..QueryDefinition::default()
        };

        let hits = execute_query(&fixture(), &query);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn priority_filter_supports_the_none_sentinel() {
        let tasks = fixture();

        let unset = QueryDefinition {
            priority: Some(PriorityFilter::Unset),
            ..QueryDefinition::default()
        };
        let hits = execute_query(&tasks, &unset);
        assert_eq!(hits.len(), 2);
        assert!(hits.iter().all(|t| t.priority.is_none()));

        let exact = QueryDefinition {
            priority: Some(PriorityFilter::Exact(TaskPriority::C)),
            ..QueryDefinition::default()
        };
        let hits = execute_query(&tasks, &exact);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "laundry");
    }

    #[test]
    fn page_pattern_is_exact_without_a_wildcard() {
        let query = QueryDefinition {
            page: Some("work/plan.md".to_string()),
            ..QueryDefinition::default()
        };
        assert_eq!(execute_query(&fixture(), &query).len(), 2);

        let miss = QueryDefinition {
            page: Some("work".to_string()),
            ..QueryDefinition::default()
        };
        assert!(execute_query(&fixture(), &miss).is_empty());
    }

    #[test]
    fn page_pattern_wildcard_escapes_other_metacharacters() {
        let query = QueryDefinition {
            page: Some("work/*.md".to_string()),
            ..QueryDefinition::default()
        };
        assert_eq!(execute_query(&fixture(), &query).len(), 2);

        // The dot must stay literal: "work/planXmd" would otherwise match.
        assert!(!super::page_matches("work/planXmd", "work/*.md"));
    }

    #[test]
    fn property_filter_matches_value_substring_case_insensitively() {
        let query = QueryDefinition {
            properties: Some(PropertyList::from_iter([(
                "project".to_string(),
                "apol".to_string(),
            )])),
            ..QueryDefinition::default()
        };

        let hits = execute_query(&fixture(), &query);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].properties.get("project"), Some("Apollo"));
    }

    #[test]
    fn missing_property_reads_as_empty_string() {
        // An empty wanted value matches everything, including tasks that
        // lack the key entirely.
        let query = QueryDefinition {
            properties: Some(PropertyList::from_iter([(
                "project".to_string(),
                String::new(),
            )])),
            ..QueryDefinition::default()
        };
        assert_eq!(execute_query(&fixture(), &query).len(), 4);
    }

    #[test]
    fn filter_preserves_input_order() {
        let tasks = fixture();
        let query = QueryDefinition::default();
        let hits = execute_query(&tasks, &query);
        let ids: Vec<&str> = hits.iter().map(|t| t.id.as_str()).collect();
        let expected: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, expected);
    }

    #[test]
    fn grouping_by_missing_project_uses_the_fallback_key() {
        let groups = group_tasks(&fixture(), GroupBy::Property, DEFAULT_PROJECT_KEY);

        assert_eq!(groups["Apollo"].len(), 1);
        assert_eq!(groups[NO_PROJECT_GROUP].len(), 3);
    }

    #[test]
    fn grouping_by_state_uses_vocabulary_tokens_as_keys() {
        let groups = group_tasks(&fixture(), GroupBy::State, DEFAULT_PROJECT_KEY);
        let keys: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["DOING", "DONE", "TODO"]);
        assert_eq!(groups["TODO"].len(), 2);
    }

    #[test]
    fn priority_filter_serializes_as_plain_strings() {
        let json = serde_json::to_string(&PriorityFilter::Unset).expect("serialize");
        assert_eq!(json, r#""none""#);
        let parsed: PriorityFilter = serde_json::from_str(r#""B""#).expect("deserialize");
        assert_eq!(parsed, PriorityFilter::Exact(TaskPriority::B));
    }
}
