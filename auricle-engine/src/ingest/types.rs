//! Ingestion result type.

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq)]
pub enum IngestOutcome {
    Ingested {
        track_id: Uuid,
        title: Option<String>,
        artist: Option<String>,
    },
    Duplicate {
        track_id: Uuid,
        title: Option<String>,
        artist: Option<String>,
    },
    Skipped {
        reason: String,
    },
    Errored {
        message: String,
    },
}

impl IngestOutcome {
    pub fn status_str(&self) -> &'static str {
        match self {
            IngestOutcome::Ingested { .. } => "ingested",
            IngestOutcome::Duplicate { .. } => "duplicate",
            IngestOutcome::Skipped { .. } => "skipped",
            IngestOutcome::Errored { .. } => "error",
        }
    }
}
