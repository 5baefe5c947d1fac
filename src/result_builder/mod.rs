//! ResultBuilder - DetectionOutcome → ResultRecord
//!
//! ## Responsibilities
//!
//! - Map exactly one outcome to exactly one canonical record
//! - Keep the record invariants (Error ⇒ count 0, Detected ⇒ first_label/all_detections)
//!
//! No I/O; the only input besides the outcome is the timestamp.

use crate::models::{DetectionItem, DetectionOutcome, DetectionStatus, ResultRecord};
use chrono::{DateTime, Local, TimeZone};

/// Timestamp format written into every record (local time, second precision)
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Build a record stamped with the current local time
pub fn build(outcome: DetectionOutcome) -> ResultRecord {
    build_at(outcome, Local::now())
}

/// Build a record with an explicit timestamp
pub fn build_at<Tz: TimeZone>(outcome: DetectionOutcome, at: DateTime<Tz>) -> ResultRecord
where
    Tz::Offset: std::fmt::Display,
{
    let timestamp = at.format(TIMESTAMP_FORMAT).to_string();

    match outcome {
        DetectionOutcome::Failed(reason) => ResultRecord {
            timestamp,
            status: DetectionStatus::Error,
            detections_count: 0,
            error: Some(reason),
            first_label: None,
            all_detections: None,
        },
        DetectionOutcome::Detected(items) if !items.is_empty() => {
            // Re-round in case the items were constructed by hand
            let items: Vec<DetectionItem> = items
                .into_iter()
                .map(|item| DetectionItem::new(item.label, item.confidence))
                .collect();

            ResultRecord {
                timestamp,
                status: DetectionStatus::Detected,
                detections_count: items.len(),
                error: None,
                first_label: Some(items[0].label.clone()),
                all_detections: Some(items),
            }
        }
        DetectionOutcome::Detected(_) | DetectionOutcome::Empty => ResultRecord {
            timestamp,
            status: DetectionStatus::NoObjectsDetected,
            detections_count: 0,
            error: None,
            first_label: None,
            all_detections: None,
        },
    }
}
