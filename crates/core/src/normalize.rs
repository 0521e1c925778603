//! Conversion of raw payloads into [`CanonicalReading`]s.
//!
//! Two input shapes are accepted:
//!
//! - structured JSON objects with named fields (network pushes, and device
//!   lines that start with `{`);
//! - delimited lines of numeric tokens in a configurable positional order
//!   (see [`DelimitedLayout`]).
//!
//! The normalizer holds no shared state; every call either yields a full
//! canonical reading or a [`NormalizeError`].

use std::fmt;
use std::str::FromStr;

use chrono::Utc;
use serde_json::{Map, Value};

use crate::error::{CoreError, NormalizeError};
use crate::reading::{Acceleration, CanonicalReading, Motion, Reading, ReadingSource};

/// Fields a network push must carry, checked in this order.
pub const REQUIRED_NETWORK_FIELDS: [&str; 3] = ["bvp", "temperature", "eda"];

/// Default positional order of delimited device lines.
pub const DEFAULT_LINE_LAYOUT: &str = "bvp,temperature,eda,accel_x,accel_y,accel_z";

// ---------------------------------------------------------------------------
// Delimited layout
// ---------------------------------------------------------------------------

/// One position in a delimited device line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineField {
    Bvp,
    Temperature,
    Eda,
    AccelX,
    AccelY,
    AccelZ,
    AccelMagnitude,
    /// A token that is present on the wire but not used.
    Skip,
}

impl LineField {
    fn name(&self) -> &'static str {
        match self {
            Self::Bvp => "bvp",
            Self::Temperature => "temperature",
            Self::Eda => "eda",
            Self::AccelX => "accel_x",
            Self::AccelY => "accel_y",
            Self::AccelZ => "accel_z",
            Self::AccelMagnitude => "accel_magnitude",
            Self::Skip => "skip",
        }
    }
}

impl FromStr for LineField {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bvp" => Ok(Self::Bvp),
            "temperature" | "temp" => Ok(Self::Temperature),
            "eda" => Ok(Self::Eda),
            "accel_x" | "x" => Ok(Self::AccelX),
            "accel_y" | "y" => Ok(Self::AccelY),
            "accel_z" | "z" => Ok(Self::AccelZ),
            "accel_magnitude" | "acceleration_magnitude" => Ok(Self::AccelMagnitude),
            "skip" | "_" => Ok(Self::Skip),
            other => Err(CoreError::Validation(format!(
                "Unknown line layout field '{other}'"
            ))),
        }
    }
}

/// Positional order and delimiter of a delimited device line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelimitedLayout {
    fields: Vec<LineField>,
    delimiter: char,
}

impl DelimitedLayout {
    /// Build a layout, rejecting orders that cannot yield a full reading.
    ///
    /// `bvp`, `temperature` and `eda` must each appear exactly once. Motion
    /// is either all three axes, a single magnitude, or nothing.
    pub fn new(fields: Vec<LineField>, delimiter: char) -> Result<Self, CoreError> {
        let count = |f: LineField| fields.iter().filter(|&&x| x == f).count();

        for required in [LineField::Bvp, LineField::Temperature, LineField::Eda] {
            if count(required) != 1 {
                return Err(CoreError::Validation(format!(
                    "Line layout must contain '{}' exactly once",
                    required.name()
                )));
            }
        }

        let axes = [LineField::AccelX, LineField::AccelY, LineField::AccelZ].map(count);
        let magnitude = count(LineField::AccelMagnitude);
        let all_axes = axes.iter().all(|&n| n == 1);
        let no_axes = axes.iter().all(|&n| n == 0);
        if !((all_axes && magnitude == 0) || (no_axes && magnitude <= 1)) {
            return Err(CoreError::Validation(
                "Line layout needs either all of accel_x/accel_y/accel_z or one accel_magnitude"
                    .to_string(),
            ));
        }

        Ok(Self { fields, delimiter })
    }

    pub fn fields(&self) -> &[LineField] {
        &self.fields
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }
}

impl Default for DelimitedLayout {
    fn default() -> Self {
        Self {
            fields: vec![
                LineField::Bvp,
                LineField::Temperature,
                LineField::Eda,
                LineField::AccelX,
                LineField::AccelY,
                LineField::AccelZ,
            ],
            delimiter: ',',
        }
    }
}

/// Parses a comma-separated list of field names, e.g.
/// `"bvp,temperature,eda,accel_x,accel_y,accel_z"`.
impl FromStr for DelimitedLayout {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields = s
            .split(',')
            .filter(|t| !t.trim().is_empty())
            .map(LineField::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(fields, ',')
    }
}

impl fmt::Display for DelimitedLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.fields.iter().map(LineField::name).collect();
        f.write_str(&names.join(","))
    }
}

// ---------------------------------------------------------------------------
// Normalizer
// ---------------------------------------------------------------------------

/// Converts raw payloads into canonical readings.
#[derive(Debug, Clone, Default)]
pub struct ReadingNormalizer {
    layout: DelimitedLayout,
}

impl ReadingNormalizer {
    pub fn new(layout: DelimitedLayout) -> Self {
        Self { layout }
    }

    pub fn layout(&self) -> &DelimitedLayout {
        &self.layout
    }

    /// Normalize a network push. `bvp`, `temperature` and `eda` are required.
    pub fn from_network(&self, payload: &Value) -> Result<CanonicalReading, NormalizeError> {
        let obj = as_object(payload)?;
        for field in REQUIRED_NETWORK_FIELDS {
            if matches!(obj.get(field), None | Some(Value::Null)) {
                return Err(NormalizeError::MissingField(field));
            }
        }
        Ok(structured(obj, ReadingSource::Network)?.canonicalize(Utc::now()))
    }

    /// Normalize a structured payload; missing numeric fields default to 0.
    pub fn from_structured(
        &self,
        payload: &Value,
        source: ReadingSource,
    ) -> Result<CanonicalReading, NormalizeError> {
        let obj = as_object(payload)?;
        Ok(structured(obj, source)?.canonicalize(Utc::now()))
    }

    /// Normalize a delimited line using the configured layout.
    ///
    /// Fewer tokens than the layout requires is a hard rejection; trailing
    /// extra tokens are ignored.
    pub fn from_delimited(
        &self,
        line: &str,
        source: ReadingSource,
    ) -> Result<CanonicalReading, NormalizeError> {
        let tokens: Vec<&str> = line
            .trim()
            .split(self.layout.delimiter)
            .map(str::trim)
            .collect();
        let expected = self.layout.fields.len();
        if tokens.len() < expected {
            return Err(NormalizeError::TooFewTokens {
                expected,
                actual: tokens.len(),
            });
        }

        let mut bvp = 0.0;
        let mut temperature = 0.0;
        let mut eda = 0.0;
        let mut axes = Acceleration::default();
        let mut magnitude = None;
        let mut has_axes = false;

        for (position, (field, token)) in self.layout.fields.iter().zip(&tokens).enumerate() {
            if *field == LineField::Skip {
                continue;
            }
            let value = token
                .parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .ok_or_else(|| NormalizeError::InvalidToken {
                    position,
                    token: (*token).to_string(),
                })?;
            match field {
                LineField::Bvp => bvp = value,
                LineField::Temperature => temperature = value,
                LineField::Eda => eda = value,
                LineField::AccelX => {
                    axes.x = value;
                    has_axes = true;
                }
                LineField::AccelY => axes.y = value,
                LineField::AccelZ => axes.z = value,
                LineField::AccelMagnitude => magnitude = Some(value),
                LineField::Skip => {}
            }
        }

        let motion = match (has_axes, magnitude) {
            (true, _) => Motion::Axes(axes),
            (false, Some(m)) if m < 0.0 => {
                return Err(NormalizeError::InvalidField("acceleration_magnitude"))
            }
            (false, Some(m)) => Motion::Magnitude(m),
            (false, None) => Motion::Absent,
        };

        Ok(Reading {
            bvp,
            temperature,
            eda,
            motion,
            source,
        }
        .canonicalize(Utc::now()))
    }

    /// Decode one line read from the device.
    ///
    /// Lines that look like JSON objects are decoded as structured payloads,
    /// anything else goes through the delimited layout.
    pub fn from_device_line(&self, line: &str) -> Result<CanonicalReading, NormalizeError> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Err(NormalizeError::EmptyPayload);
        }
        if trimmed.starts_with('{') {
            let value: Value = serde_json::from_str(trimmed)
                .map_err(|e| NormalizeError::Malformed(e.to_string()))?;
            return self.from_structured(&value, ReadingSource::Device);
        }
        self.from_delimited(trimmed, ReadingSource::Device)
    }
}

fn as_object(payload: &Value) -> Result<&Map<String, Value>, NormalizeError> {
    match payload {
        Value::Object(obj) if obj.is_empty() => Err(NormalizeError::EmptyPayload),
        Value::Object(obj) => Ok(obj),
        Value::Null => Err(NormalizeError::EmptyPayload),
        _ => Err(NormalizeError::NotAnObject),
    }
}

/// Read an optional numeric field. `null` counts as absent.
fn number(obj: &Map<String, Value>, name: &'static str) -> Result<Option<f64>, NormalizeError> {
    match obj.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or(NormalizeError::InvalidField(name)),
    }
}

fn structured(obj: &Map<String, Value>, source: ReadingSource) -> Result<Reading, NormalizeError> {
    let bvp = number(obj, "bvp")?.unwrap_or(0.0);
    let temperature = number(obj, "temperature")?.unwrap_or(0.0);
    let eda = number(obj, "eda")?.unwrap_or(0.0);

    let motion = match obj.get("acceleration") {
        Some(Value::Object(axes)) => Motion::Axes(Acceleration {
            x: number(axes, "x")?.unwrap_or(0.0),
            y: number(axes, "y")?.unwrap_or(0.0),
            z: number(axes, "z")?.unwrap_or(0.0),
        }),
        Some(Value::Null) | None => match number(obj, "acceleration_magnitude")? {
            Some(m) if m < 0.0 => return Err(NormalizeError::InvalidField("acceleration_magnitude")),
            Some(m) => Motion::Magnitude(m),
            None => Motion::Absent,
        },
        Some(_) => return Err(NormalizeError::InvalidField("acceleration")),
    };

    Ok(Reading {
        bvp,
        temperature,
        eda,
        motion,
        source,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
