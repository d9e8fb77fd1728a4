//! Per-run variable map
//!
//! A `RunContext` is seeded with the caller's run inputs and grows by one
//! `<task_id>.output` entry after each successful task. Entries are never
//! overwritten or removed during a run.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Suffix appended to a task id to form its output variable name
pub const OUTPUT_SUFFIX: &str = ".output";

/// Variable name under which a task's output is recorded
pub fn output_key(task_id: &str) -> String {
    format!("{task_id}{OUTPUT_SUFFIX}")
}

/// Task id referenced by an output variable name, if it is one
pub fn task_id_of_output_key(name: &str) -> Option<&str> {
    name.strip_suffix(OUTPUT_SUFFIX)
        .filter(|task_id| !task_id.is_empty())
}

/// Append-only variable map owned by a single run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContext {
    variables: HashMap<String, String>,
}

impl RunContext {
    /// Seed a new context with caller-supplied inputs
    pub fn seeded(inputs: HashMap<String, String>) -> Self {
        Self { variables: inputs }
    }

    /// Record a completed task's output under `<task_id>.output`
    ///
    /// An existing entry is never replaced.
    pub(crate) fn record_output(&mut self, task_id: &str, output: &str) {
        self.variables
            .entry(output_key(task_id))
            .or_insert_with(|| output.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.variables.get(name).map(String::as_str)
    }

    /// Output recorded for `task_id`, if that task has completed
    pub fn output_of(&self, task_id: &str) -> Option<&str> {
        self.get(&output_key(task_id))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Borrow the underlying map for template resolution
    pub fn variables(&self) -> &HashMap<String, String> {
        &self.variables
    }

    pub fn into_variables(self) -> HashMap<String, String> {
        self.variables
    }
}
