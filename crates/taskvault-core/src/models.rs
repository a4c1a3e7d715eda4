use std::fmt;
use std::str::FromStr;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::VaultError;

/// Task lifecycle state, written in documents as the bare vocabulary token
/// (`TODO`, `DOING`, `DONE`, `CANCELED`, `WAITING`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskState {
    Todo,
    Doing,
    Done,
    Canceled,
    Waiting,
}

impl TaskState {
    pub const ALL: [Self; 5] = [
        Self::Todo,
        Self::Doing,
        Self::Done,
        Self::Canceled,
        Self::Waiting,
    ];

    #[must_use]
    pub const fn as_token(self) -> &'static str {
        match self {
            Self::Todo => "TODO",
            Self::Doing => "DOING",
            Self::Done => "DONE",
            Self::Canceled => "CANCELED",
            Self::Waiting => "WAITING",
        }
    }

    #[must_use]
    pub fn from_token(token: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|state| state.as_token() == token)
    }

    /// Advance one step through TODO -> DOING -> DONE -> CANCELED -> TODO.
    /// WAITING sits outside the cycle and re-enters at TODO.
    #[must_use]
    pub const fn cycle_next(self) -> Self {
        match self {
            Self::Todo => Self::Doing,
            Self::Doing => Self::Done,
            Self::Done => Self::Canceled,
            Self::Canceled | Self::Waiting => Self::Todo,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_token())
    }
}

impl FromStr for TaskState {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_token(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| VaultError::Validation(format!("unknown task state: {s}")))
    }
}

/// Bracketed single-letter priority marker (`[#A]`, `[#B]`, `[#C]`).
/// Absence of a priority is `Option::<TaskPriority>::None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskPriority {
    A,
    B,
    C,
}

impl TaskPriority {
    #[must_use]
    pub const fn as_letter(self) -> char {
        match self {
            Self::A => 'A',
            Self::B => 'B',
            Self::C => 'C',
        }
    }

    #[must_use]
    pub fn from_letter(letter: &str) -> Option<Self> {
        match letter {
            "A" => Some(Self::A),
            "B" => Some(Self::B),
            "C" => Some(Self::C),
            _ => None,
        }
    }

    /// Advance one step through none -> C -> B -> A -> none.
    #[must_use]
    pub const fn cycle_next(current: Option<Self>) -> Option<Self> {
        match current {
            None => Some(Self::C),
            Some(Self::C) => Some(Self::B),
            Some(Self::B) => Some(Self::A),
            Some(Self::A) => None,
        }
    }
}

impl fmt::Display for TaskPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_letter())
    }
}

impl FromStr for TaskPriority {
    type Err = VaultError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_letter(&s.trim().to_ascii_uppercase())
            .ok_or_else(|| VaultError::Validation(format!("unknown priority letter: {s}")))
    }
}

/// Ordered key/value list with unique, non-empty keys. Values are opaque
/// strings; no type coercion happens anywhere in the core.
///
/// Serializes as a JSON object whose member order is first-insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PropertyList {
    entries: Vec<(String, String)>,
}

impl PropertyList {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Insert or replace in place; empty keys are ignored. A replaced key
    /// keeps its original position in the list.
    pub fn upsert(&mut self, key: &str, value: &str) {
        if key.is_empty() {
            return;
        }
        if let Some(entry) = self.entries.iter_mut().find(|(k, _)| k == key) {
            entry.1 = value.to_string();
        } else {
            self.entries.push((key.to_string(), value.to_string()));
        }
    }

    pub fn remove(&mut self, key: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(k, _)| k != key);
        self.entries.len() != before
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for PropertyList {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        let mut list = Self::new();
        for (key, value) in iter {
            list.upsert(&key, &value);
        }
        list
    }
}

impl Serialize for PropertyList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for PropertyList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct PropertyListVisitor;

        impl<'de> Visitor<'de> for PropertyListVisitor {
            type Value = PropertyList;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("a map of string properties")
            }

            fn visit_map<M: MapAccess<'de>>(self, mut access: M) -> Result<Self::Value, M::Error> {
                let mut list = PropertyList::new();
                while let Some((key, value)) = access.next_entry::<String, String>()? {
                    list.upsert(&key, &value);
                }
                Ok(list)
            }
        }

        deserializer.deserialize_map(PropertyListVisitor)
    }
}

/// One indexed task line plus its trailing metadata block.
///
/// The identifier is positional (`"{page}:{line}"`): it is stable only while
/// the task's primary line keeps its line number. Records are never mutated
/// in place; every change rewrites document text and re-derives the record
/// through the next reindex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    pub id: String,
    pub page: String,
    pub line: usize,
    pub state: TaskState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<TaskPriority>,
    pub text: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "PropertyList::is_empty")]
    pub properties: PropertyList,
}

impl TaskRecord {
    #[must_use]
    pub fn make_id(page: &str, line: usize) -> String {
        format!("{page}:{line}")
    }
}

/// Storage-side change notification consumed by the dispatch loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum VaultEvent {
    Changed { path: String },
    Deleted { path: String },
    Renamed { from: String, to: String },
}
