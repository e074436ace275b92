//! Observation batches read from JSON documents.
//!
//! Two document shapes are accepted:
//! - a bare array of observation records: `[ {..}, {..} ]`
//! - the backend's results payload: `{ "price_trend": [ {..}, {..} ], .. }`
//!
//! Only the document shape can fail. A record with bad contents still
//! becomes an [`Observation`] and is dropped later by the aggregator.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::debug;

use crate::models::Observation;

#[derive(Deserialize)]
#[serde(untagged)]
enum InputDoc {
    Bare(Vec<Observation>),
    Payload { price_trend: Vec<Observation> },
}

/// Parse observations from a JSON document in either accepted shape.
pub fn parse_observations(json: &str) -> Result<Vec<Observation>, serde_json::Error> {
    let doc: InputDoc = serde_json::from_str(json)?;
    Ok(match doc {
        InputDoc::Bare(obs) | InputDoc::Payload { price_trend: obs } => obs,
    })
}

/// Read and parse an observation file.
pub fn read_observations(path: impl AsRef<Path>) -> anyhow::Result<Vec<Observation>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("read input file {}", path.display()))?;
    let observations = parse_observations(&text)
        .with_context(|| format!("parse observations from {}", path.display()))?;
    debug!(count = observations.len(), "read {}", path.display());
    Ok(observations)
}
