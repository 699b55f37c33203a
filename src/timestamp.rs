use std::time::SystemTime;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

const EPOCH_RFC3339: &str = "1970-01-01T00:00:00Z";

pub fn format_rfc3339(timestamp: SystemTime) -> Result<String, time::error::Format> {
    OffsetDateTime::from(timestamp).format(&Rfc3339)
}

/// Formats `timestamp`, substituting the epoch if formatting fails.
pub fn rfc3339_lossy(timestamp: SystemTime) -> String {
    format_rfc3339(timestamp).unwrap_or_else(|err| {
        tracing::error!(error = %err, "Failed to format timestamp");
        EPOCH_RFC3339.to_string()
    })
}
