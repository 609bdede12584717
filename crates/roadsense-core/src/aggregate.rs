//! Session reduction: buffer of samples → one aggregate measurement.

use serde::{Deserialize, Serialize};

use crate::session::Sample;

/// The reduced summary of one completed recording session, persisted as a
/// single `measurements` row.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateRecord {
    /// Road the session was recorded against.
    pub road_id: String,
    /// Arithmetic mean of per-sample quality.
    pub avg_quality: f64,
    /// Sum of per-sample pothole counts.
    pub total_holes: u64,
    /// Most frequent condition label (first-occurrence tie-break).
    pub modal_condition: String,
    /// Mean latitude over all samples. Samples without a reported position
    /// contribute 0 and stay in the denominator.
    pub avg_latitude: f64,
    /// Mean longitude over all samples (same 0-contribution rule).
    pub avg_longitude: f64,
}

/// Reduce a session buffer into one [`AggregateRecord`].
///
/// Returns `None` for an empty buffer: a session that captured nothing
/// produces no measurement. The input is borrowed and never mutated, so the
/// same buffer reduces to bit-identical output on every call.
///
/// Modal condition tie-break: counts are accumulated in first-occurrence
/// order and scanned with a strictly-greater comparison, so among labels
/// tied at the maximal count the one seen earliest wins. Deterministic by
/// construction; callers and stored data rely on it.
pub fn reduce(road_id: &str, samples: &[Sample]) -> Option<AggregateRecord> {
    if samples.is_empty() {
        return None;
    }
    let count = samples.len() as f64;

    let mut quality_sum = 0.0;
    let mut total_holes: u64 = 0;
    let mut lat_sum = 0.0;
    let mut lng_sum = 0.0;
    // (label, occurrences) in first-occurrence order.
    let mut condition_counts: Vec<(&str, usize)> = Vec::new();

    for sample in samples {
        quality_sum += sample.quality;
        total_holes += u64::from(sample.holes_count);
        lat_sum += sample.latitude;
        lng_sum += sample.longitude;

        match condition_counts
            .iter_mut()
            .find(|(label, _)| *label == sample.condition)
        {
            Some((_, n)) => *n += 1,
            None => condition_counts.push((sample.condition.as_str(), 1)),
        }
    }

    let mut modal = condition_counts[0];
    for entry in &condition_counts[1..] {
        if entry.1 > modal.1 {
            modal = *entry;
        }
    }

    Some(AggregateRecord {
        road_id: road_id.to_string(),
        avg_quality: quality_sum / count,
        total_holes,
        modal_condition: modal.0.to_string(),
        avg_latitude: lat_sum / count,
        avg_longitude: lng_sum / count,
    })
}
