use anyhow::{Context, Result};
use crate::core::{VehicleData, Waypoint};

/// Parse a route from CSV
///
/// Header names are matched case-insensitively:
/// - latitude, lat
/// - longitude, lon, lng, long
///
/// Other columns are ignored. The first row doubles as the default location.
pub fn parse_csv(data: &[u8]) -> Result<VehicleData> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(data);

    let headers = rdr.headers()?.clone();
    let (lat_idx, lon_idx) = detect_columns(&headers)?;

    let mut route_data = Vec::new();
    for (row, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to read CSV row {}", row + 1))?;

        let latitude = parse_field(&record, lat_idx)
            .with_context(|| format!("Bad latitude on row {}", row + 1))?;
        let longitude = parse_field(&record, lon_idx)
            .with_context(|| format!("Bad longitude on row {}", row + 1))?;

        route_data.push(Waypoint::new(latitude, longitude));
    }

    let default_location = *route_data.first().context("CSV route has no rows")?;

    Ok(VehicleData {
        default_location,
        route_data,
    })
}

fn parse_field(record: &csv::StringRecord, idx: usize) -> Result<f64> {
    let raw = record.get(idx).context("Missing column")?;
    raw.parse::<f64>()
        .with_context(|| format!("Not a number: {:?}", raw))
}

/// Detect column indices from CSV headers
fn detect_columns(headers: &csv::StringRecord) -> Result<(usize, usize)> {
    let lat_idx = find_column(headers, &["latitude", "lat"])?;
    let lon_idx = find_column(headers, &["longitude", "lon", "lng", "long"])?;

    Ok((lat_idx, lon_idx))
}

/// Find a column by checking possible names
fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Result<usize> {
    for (idx, header) in headers.iter().enumerate() {
        let header_lower = header.to_lowercase();
        if names.iter().any(|&name| header_lower == name) {
            return Ok(idx);
        }
    }

    anyhow::bail!("Could not find column with names: {:?}", names)
}
