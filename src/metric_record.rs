use crate::metric_submission::MetricSubmission;
use chrono::{DateTime, Utc};
use serde::Serialize;

/// Reference to an existing trace the storage layer must resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceLink {
    pub connect_id: String,
}

/// Reference to an existing observation the storage layer must resolve.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationLink {
    pub connect_id: String,
}

/// The create command handed to a [`crate::metric_store::MetricStore`].
///
/// `observation` is `None` when the submission carried no observation id, and
/// the serialized form then has no `observation` key at all.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricRecord {
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub value: i64,
    pub trace: TraceLink,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<ObservationLink>,
}

impl MetricRecord {
    pub fn from_submission(submission: MetricSubmission) -> Self {
        Self::from_submission_at(submission, Utc::now())
    }

    fn from_submission_at(submission: MetricSubmission, timestamp: DateTime<Utc>) -> Self {
        let MetricSubmission {
            name,
            value,
            trace_id,
            observation_id,
        } = submission;

        // An empty observation id links nothing.
        let observation = observation_id
            .filter(|id| !id.is_empty())
            .map(|connect_id| ObservationLink { connect_id });

        Self {
            timestamp,
            name,
            value,
            trace: TraceLink {
                connect_id: trace_id,
            },
            observation,
        }
    }

    pub fn trace_id(&self) -> &str {
        &self.trace.connect_id
    }

    pub fn observation_id(&self) -> Option<&str> {
        self.observation.as_ref().map(|link| link.connect_id.as_str())
    }
}

/// A metric row as persisted, returned to the caller on success.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMetric {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub name: String,
    pub value: i64,
    pub trace_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation_id: Option<String>,
}
