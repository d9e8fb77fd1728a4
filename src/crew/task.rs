//! Pipeline stage descriptors

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One stage of the pipeline: a templated prompt bound to one agent
///
/// `description`, `expected_output` and `output_file` are templates resolved
/// against the run's variable map right before the task executes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskSpec {
    pub id: String,
    pub description: String,
    pub expected_output: String,
    /// Id of the [`AgentProfile`](crate::crew::AgentProfile) that executes this task
    pub agent: String,
    /// Tasks whose output must be available before this one runs
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub output_file: Option<String>,
    /// Upper bound on the agent call; `None` waits indefinitely
    #[serde(default, with = "optional_secs")]
    pub timeout: Option<Duration>,
}

impl TaskSpec {
    pub fn new(
        id: impl Into<String>,
        agent: impl Into<String>,
        description: impl Into<String>,
        expected_output: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            expected_output: expected_output.into(),
            agent: agent.into(),
            depends_on: Vec::new(),
            output_file: None,
            timeout: None,
        }
    }

    pub fn depends_on<I, S>(mut self, task_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on = task_ids.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_output_file(mut self, path: impl Into<String>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Serialize `Option<Duration>` as whole seconds
mod optional_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(duration) => serializer.serialize_some(&duration.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_secs))
    }
}
