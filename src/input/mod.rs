pub mod csv;
pub mod json;

pub use self::csv::parse_csv;
pub use self::json::parse_json;

use anyhow::Result;
use crate::core::VehicleData;

/// Route file format detection result
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputFormat {
    Json,
    Csv,
    Unknown,
}

/// Detect the format of a route file from its leading bytes
pub fn detect_format(data: &[u8]) -> InputFormat {
    let first = data.iter().find(|b| !b.is_ascii_whitespace());
    match first {
        Some(b'{') => InputFormat::Json,
        Some(_) if is_csv(data) => InputFormat::Csv,
        _ => InputFormat::Unknown,
    }
}

fn is_csv(data: &[u8]) -> bool {
    let sample = std::str::from_utf8(&data[..data.len().min(500)]);
    match sample {
        Ok(text) => text.lines().next().is_some_and(|line| line.contains(',')),
        Err(_) => false,
    }
}

/// Parse route data, auto-detecting the format
pub fn parse_route(data: &[u8]) -> Result<VehicleData> {
    match detect_format(data) {
        InputFormat::Json => parse_json(data),
        InputFormat::Csv => parse_csv(data),
        InputFormat::Unknown => anyhow::bail!("Unknown route file format"),
    }
}
