//! CSV serialization of the event history
//!
//! Fixed column order Timestamp, Signal, Confidence. The writer quotes any
//! field containing the delimiter. Confidence is emitted on the stored
//! wire scale (1-10): the export is a faithful dump of the event store.

use classpulse_common::signal::SignalEvent;
use classpulse_common::{Error, Result};

/// Serialize events to CSV bytes with a header row
pub fn to_csv(events: &[SignalEvent]) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["Timestamp", "Signal", "Confidence"])
        .map_err(csv_error)?;
    for event in events {
        writer
            .write_record([
                event.timestamp.to_rfc3339(),
                event.kind.wire_token().to_string(),
                event.confidence.to_string(),
            ])
            .map_err(csv_error)?;
    }
    writer
        .into_inner()
        .map_err(|e| Error::Internal(format!("CSV buffer error: {}", e)))
}

fn csv_error(e: csv::Error) -> Error {
    Error::Internal(format!("CSV serialization failed: {}", e))
}
