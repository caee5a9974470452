//! Capture results and the per-session "last observed parameters" tracker.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Ignored by default: the tone curve changes every frame and is large.
pub const DEFAULT_IGNORED_PREFIX: &str = "tonemap.curve";

/// Upper bound on retained change records per session.
const MAX_CHANGE_LOG: usize = 1024;

/// One reported parameter value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    List(Vec<f64>),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(v) => write!(f, "{v}"),
            ParamValue::Int(v) => write!(f, "{v}"),
            ParamValue::Float(v) => write!(f, "{v}"),
            ParamValue::Text(v) => f.write_str(v),
            ParamValue::List(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<bool> for ParamValue {
    fn from(v: bool) -> Self {
        ParamValue::Bool(v)
    }
}

impl From<i64> for ParamValue {
    fn from(v: i64) -> Self {
        ParamValue::Int(v)
    }
}

impl From<f64> for ParamValue {
    fn from(v: f64) -> Self {
        ParamValue::Float(v)
    }
}

impl From<&str> for ParamValue {
    fn from(v: &str) -> Self {
        ParamValue::Text(v.to_string())
    }
}

/// Parameters the device reports for one completed frame, keyed by name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CaptureResult {
    values: BTreeMap<String, ParamValue>,
}

impl CaptureResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.values.get(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.values.iter()
    }
}

/// A parameter whose value differs from the previous frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultChange {
    pub frame_number: u64,
    pub key: String,
    pub previous: Option<ParamValue>,
    pub current: ParamValue,
}

/// Diffs successive capture results of one session.
///
/// Owned by the session manager and dropped with the session, so nothing
/// leaks from one session into the next.
#[derive(Debug, Clone)]
pub struct ResultTracker {
    ignored_prefixes: Vec<String>,
    initial: Option<CaptureResult>,
    last: Option<CaptureResult>,
    changes: Vec<ResultChange>,
    observed: u64,
}

impl Default for ResultTracker {
    fn default() -> Self {
        Self::new(vec![DEFAULT_IGNORED_PREFIX.to_string()])
    }
}

impl ResultTracker {
    pub fn new(ignored_prefixes: Vec<String>) -> Self {
        Self {
            ignored_prefixes,
            initial: None,
            last: None,
            changes: Vec::new(),
            observed: 0,
        }
    }

    fn is_ignored(&self, key: &str) -> bool {
        self.ignored_prefixes.iter().any(|p| key.starts_with(p.as_str()))
    }

    /// Fold in one result. The first result becomes the initial report;
    /// later ones yield the keys whose value changed.
    pub fn observe(&mut self, frame_number: u64, result: &CaptureResult) -> Vec<ResultChange> {
        self.observed += 1;

        let diff: Vec<ResultChange> = match &self.last {
            None => {
                let mut initial = CaptureResult::new();
                for (key, value) in result.iter().filter(|(k, _)| !self.is_ignored(k)) {
                    initial.insert(key.clone(), value.clone());
                }
                log::debug!(
                    "Initial capture result at frame {}: {} parameters",
                    frame_number,
                    initial.len()
                );
                self.initial = Some(initial);
                Vec::new()
            }
            Some(last) => result
                .iter()
                .filter(|(key, _)| !self.is_ignored(key))
                .filter(|(key, value)| last.get(key) != Some(*value))
                .map(|(key, value)| ResultChange {
                    frame_number,
                    key: key.clone(),
                    previous: last.get(key).cloned(),
                    current: value.clone(),
                })
                .collect(),
        };

        for change in &diff {
            log::debug!(
                "Frame {}: {} changed to {}",
                frame_number,
                change.key,
                change.current
            );
        }
        let room = MAX_CHANGE_LOG.saturating_sub(self.changes.len());
        self.changes.extend(diff.iter().take(room).cloned());
        self.last = Some(result.clone());
        diff
    }

    pub fn initial_report(&self) -> Option<&CaptureResult> {
        self.initial.as_ref()
    }

    /// Most recent result, the parameters a raw frame is stored with.
    pub fn last(&self) -> Option<&CaptureResult> {
        self.last.as_ref()
    }

    pub fn changes(&self) -> &[ResultChange] {
        &self.changes
    }

    pub fn observed(&self) -> u64 {
        self.observed
    }
}
