//! Record normalizer: raw log batch → canonical text + dedup fields.
//!
//! Parses an ingestion batch (`{"logs": [...]}`), keeps only records whose
//! `occupancy_status` is `"occupied"`, flattens each into dot-addressed
//! fields, and renders a fixed-template summary.
//!
//! # Algorithm
//!
//! 1. Parse the batch as JSON; require a top-level `logs` array whose
//!    elements are all objects.
//! 2. Drop every record whose `occupancy_status` is not exactly `"occupied"`
//!    (including records with no status at all).
//! 3. Flatten the survivor and pull out each of [`DEDUP_FIELDS`], failing
//!    on a missing or wrongly-typed value.
//! 4. Canonicalize: timestamps are parsed and re-rendered as ISO-8601,
//!    numbers go through `f64` so `100` and `100.0` render identically.
//! 5. Render the summary with a fixed field order and fixed unit labels.
//!
//! # Example
//!
//! ```rust
//! use facility_rag_core::normalize::normalize_batch;
//!
//! let batch = r#"{"logs":[{"timestamp":"2024-01-01T10:00:00","occupancy_status":"occupied",
//!   "occupancy_count":5,"energy_consumption_kwh":2.1,
//!   "power_consumption_watts":{"lighting":100,"hvac_fan":300,"standby_misc":20,"total":420},
//!   "equipment_usage":{"lights_on_hours":1,"air_conditioner_on_hours":1,"projector_on_hours":0,"computer_on_hours":1},
//!   "environmental_data":{"temperature_celsius":22.5,"humidity_percent":40}}]}"#;
//! let out = normalize_batch(batch).unwrap();
//! assert_eq!(out.records.len(), 1);
//! assert!(out.records[0].text.starts_with("At 2024-01-01 10:00:00, the room was occupied with 5 people."));
//! ```

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike, Utc};
use serde_json::Value;

use crate::error::RagError;
use crate::models::{CanonicalFields, NormalizedRecord, RawLogRecord};

/// The only occupancy status that carries grounding signal.
pub const OCCUPIED: &str = "occupied";

/// Dedup-relevant fields in canonical order.
///
/// This order is load-bearing: the content hash is computed over it.
pub const DEDUP_FIELDS: [&str; 14] = [
    "timestamp",
    "occupancy_status",
    "occupancy_count",
    "energy_consumption_kwh",
    "power_consumption_watts.lighting",
    "power_consumption_watts.hvac_fan",
    "power_consumption_watts.standby_misc",
    "power_consumption_watts.total",
    "equipment_usage.lights_on_hours",
    "equipment_usage.air_conditioner_on_hours",
    "equipment_usage.projector_on_hours",
    "equipment_usage.computer_on_hours",
    "environmental_data.temperature_celsius",
    "environmental_data.humidity_percent",
];

const TIMESTAMP_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Result of normalizing one batch.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    /// Number of elements in the `logs` array.
    pub total: usize,
    /// Occupied records, in source order.
    pub records: Vec<NormalizedRecord>,
}

impl NormalizedBatch {
    /// Records dropped because they were not occupied.
    pub fn filtered(&self) -> usize {
        self.total - self.records.len()
    }
}

/// Parse a raw ingestion document into its `logs` records.
///
/// # Errors
///
/// [`RagError::InvalidInput`] if `input` is not JSON, has no `logs` array,
/// or `logs` contains a non-object element.
pub fn parse_batch(input: &str) -> Result<Vec<RawLogRecord>, RagError> {
    let root: Value = serde_json::from_str(input)
        .map_err(|e| RagError::InvalidInput(format!("ingestion batch is not valid JSON: {}", e)))?;

    let logs = root
        .get("logs")
        .ok_or_else(|| RagError::InvalidInput("ingestion batch has no `logs` collection".into()))?
        .as_array()
        .ok_or_else(|| RagError::InvalidInput("`logs` must be an array".into()))?;

    logs.iter()
        .enumerate()
        .map(|(i, item)| match item {
            Value::Object(map) => Ok(RawLogRecord::new(map.clone())),
            _ => Err(RagError::InvalidInput(format!(
                "logs[{}] is not an object",
                i
            ))),
        })
        .collect()
}

/// True when the record's status is exactly [`OCCUPIED`].
pub fn is_occupied(record: &RawLogRecord) -> bool {
    record.get("occupancy_status").and_then(Value::as_str) == Some(OCCUPIED)
}

/// Parse, filter, and normalize a whole batch.
pub fn normalize_batch(input: &str) -> Result<NormalizedBatch, RagError> {
    let raw = parse_batch(input)?;
    let total = raw.len();

    let mut records = Vec::new();
    for (i, record) in raw.iter().enumerate() {
        if !is_occupied(record) {
            continue;
        }
        records.push(normalize_record(i, record)?);
    }

    tracing::debug!(
        total,
        occupied = records.len(),
        "normalized ingestion batch"
    );

    Ok(NormalizedBatch { total, records })
}

/// Normalize a single occupied record.
///
/// `source_index` is only used for error messages and carried into the output.
pub fn normalize_record(
    source_index: usize,
    record: &RawLogRecord,
) -> Result<NormalizedRecord, RagError> {
    let flat = record.flatten();
    let lookup = |name: &str| -> Result<&Value, RagError> {
        flat.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v)
            .filter(|v| !v.is_null())
            .ok_or_else(|| {
                RagError::InvalidInput(format!("logs[{}] is missing `{}`", source_index, name))
            })
    };

    let raw_ts = lookup("timestamp")?.as_str().ok_or_else(|| {
        RagError::InvalidInput(format!("logs[{}].timestamp must be a string", source_index))
    })?;
    let timestamp = parse_timestamp(raw_ts).ok_or_else(|| {
        RagError::InvalidInput(format!(
            "logs[{}].timestamp is not a recognised date-time: {:?}",
            source_index, raw_ts
        ))
    })?;

    let count = lookup("occupancy_count").and_then(|v| {
        as_count(v).ok_or_else(|| {
            RagError::InvalidInput(format!(
                "logs[{}].occupancy_count must be a non-negative integer",
                source_index
            ))
        })
    })?;

    let mut values: Vec<(&'static str, String)> = Vec::with_capacity(DEDUP_FIELDS.len());
    values.push(("timestamp", format_iso(&timestamp)));
    values.push(("occupancy_status", OCCUPIED.to_string()));
    values.push(("occupancy_count", count.to_string()));

    for &name in &DEDUP_FIELDS[3..] {
        let n = lookup(name)?.as_f64().ok_or_else(|| {
            RagError::InvalidInput(format!("logs[{}].{} must be a number", source_index, name))
        })?;
        values.push((name, format_number(n)));
    }

    let fields = CanonicalFields::new(values);
    let text = render_summary(&timestamp, &fields);

    Ok(NormalizedRecord {
        source_index,
        fields,
        text,
    })
}

/// Render the fixed-template summary for one record.
///
/// Field order and unit labels never change; the content hash and the
/// generator's grounding context both depend on it.
pub fn render_summary(timestamp: &NaiveDateTime, fields: &CanonicalFields) -> String {
    let f = |name: &str| fields.get(name).unwrap_or_default();
    format!(
        "At {ts}, the room was occupied with {count} people. Energy: {kwh} kWh. \
         Lighting: {light}W, HVAC: {hvac}W, Standby: {standby}W, Total Power: {total}W. \
         Lights on: {lights_h}h, AC on: {ac_h}h, Projector: {proj_h}h, Computers: {comp_h}h. \
         Temp: {temp}°C, Humidity: {hum}%.",
        ts = format_display(timestamp),
        count = f("occupancy_count"),
        kwh = f("energy_consumption_kwh"),
        light = f("power_consumption_watts.lighting"),
        hvac = f("power_consumption_watts.hvac_fan"),
        standby = f("power_consumption_watts.standby_misc"),
        total = f("power_consumption_watts.total"),
        lights_h = f("equipment_usage.lights_on_hours"),
        ac_h = f("equipment_usage.air_conditioner_on_hours"),
        proj_h = f("equipment_usage.projector_on_hours"),
        comp_h = f("equipment_usage.computer_on_hours"),
        temp = f("environmental_data.temperature_celsius"),
        hum = f("environmental_data.humidity_percent"),
    )
}

/// Parse the timestamp spellings seen in facility exports.
///
/// Offsets are converted to UTC; bare dates mean midnight.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }
    for fmt in TIMESTAMP_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn format_iso(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%dT%H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
    }
}

fn format_display(ts: &NaiveDateTime) -> String {
    if ts.nanosecond() == 0 {
        ts.format("%Y-%m-%d %H:%M:%S").to_string()
    } else {
        ts.format("%Y-%m-%d %H:%M:%S%.6f").to_string()
    }
}

/// Shortest round-trip rendering; integral values print without a fraction.
fn format_number(n: f64) -> String {
    if n == 0.0 {
        // collapses -0.0
        return "0".to_string();
    }
    format!("{}", n)
}

fn as_count(v: &Value) -> Option<u64> {
    if let Some(n) = v.as_u64() {
        return Some(n);
    }
    let f = v.as_f64()?;
    if f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64 {
        Some(f as u64)
    } else {
        None
    }
}
