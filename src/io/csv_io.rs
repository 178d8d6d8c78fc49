extern crate csv;

use crate::error::{LimnoError, Result};
use crate::lakes::lake::Lake;
use crate::tid::utils::{date_string_to_u64_flexible, u64_to_auto_datetime_string};
use crate::timeseries::Timeseries;
use log::warn;
use serde_derive::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/*
One row of the lakes table, after header normalization. Volumes arrive in km3
and areas in km2; the conversion to m3/m2 happens when the Lake is built.
 */
#[derive(Debug, Deserialize)]
struct LakeRow {
    name: String,
    lat: f64,
    lon: f64,
    th_volume: Option<f64>,
    area: Option<f64>,
    klake: Option<f64>,
    obsfam: Option<f64>,
    outputts: Option<String>,
}

/*
Maps a header cell onto its canonical column name. Unknown columns keep their
name and are ignored by the row decoder.
 */
fn canonical_header(header: &str) -> String {
    let h = header.trim().trim_start_matches('\u{feff}').to_lowercase();
    match h.as_str() {
        "id" => "name".to_string(),
        "latitude" => "lat".to_string(),
        "longitude" => "lon".to_string(),
        "volume" | "thvolume" => "th_volume".to_string(),
        "retention_constant" => "klake".to_string(),
        "obs_fam" | "obsflowaccum" => "obsfam".to_string(),
        "output_ts" | "output_timeseries" => "outputts".to_string(),
        _ => h,
    }
}

pub fn truthy(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "y" | "yes" | "true" | "1")
}

/*
Reads the lakes table. Header names are case-insensitive and a small set of
synonyms is accepted; name, lat and lon are required columns.
 */
pub fn read_lakes_table(filename: &str) -> Result<Vec<Lake>> {
    let content = fs::read_to_string(Path::new(filename))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(canonical_header)
        .collect();
    for required in ["name", "lat", "lon"] {
        if !headers.iter().any(|h| h == required) {
            return Err(LimnoError::Config(format!(
                "Lakes table '{}' is missing the required column '{}'",
                filename, required
            )));
        }
    }
    let header_record = csv::StringRecord::from(headers);

    let mut lakes: Vec<Lake> = vec![];
    for record in reader.records() {
        let record = record?;
        let row: LakeRow = record.deserialize(Some(&header_record))?;

        let area_km2 = row.area.unwrap_or(0.0);
        if area_km2 <= 0.0 {
            return Err(LimnoError::Validation(format!(
                "Lake '{}' has no surface area", row.name
            )));
        }
        let th_volume_km3 = row.th_volume.unwrap_or(0.0);
        if th_volume_km3 < 0.0 {
            return Err(LimnoError::Validation(format!(
                "Lake '{}' has a negative threshold volume", row.name
            )));
        }
        let k_hours = row.klake.unwrap_or(24.0);
        if k_hours <= 0.0 {
            warn!("Lake '{}' has a non-positive retention constant; the recession regime will release nothing", row.name);
        }
        if lakes.iter().any(|l| l.name.eq_ignore_ascii_case(&row.name)) {
            return Err(LimnoError::Config(format!(
                "Duplicate lake '{}' in lakes table", row.name
            )));
        }

        let mut lake = Lake::new(&row.name, row.lat, row.lon);
        lake.area_m2 = area_km2 * 1e6;
        lake.th_volume_m3 = th_volume_km3 * 1e9;
        lake.k_hours = k_hours;
        lake.obs_fam = row.obsfam;
        lake.output_ts = row.outputts.as_deref().map(truthy).unwrap_or(false);
        lakes.push(lake);
    }
    Ok(lakes)
}

/*
Reads the engineered discharge table: a `time` column of YYYYMMDD_HHmm stamps
followed by one column per lake. Returns lakeName (lowercased) -> stamp -> Q.
Malformed numeric fields become 0 with a single warning per file.
 */
pub fn read_engineered_discharge(filename: &str)
        -> Result<HashMap<String, HashMap<String, f64>>> {
    let content = fs::read_to_string(Path::new(filename))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let lake_names: Vec<String> = reader
        .headers()?
        .iter()
        .skip(1)
        .map(|h| h.trim_start_matches('\u{feff}').to_lowercase())
        .collect();
    if lake_names.is_empty() {
        return Err(LimnoError::Config(format!(
            "Engineered discharge table '{}' has no lake columns", filename
        )));
    }

    let mut table: HashMap<String, HashMap<String, f64>> = HashMap::new();
    for name in &lake_names {
        table.insert(name.clone(), HashMap::new());
    }

    let mut warned_malformed = false;
    for record in reader.records() {
        let record = record?;
        let stamp = match record.get(0) {
            Some(s) if !s.is_empty() => s.to_string(),
            _ => continue,
        };
        for (i, name) in lake_names.iter().enumerate() {
            let q = match record.get(i + 1).map(|v| v.parse::<f64>()) {
                Some(Ok(v)) => v,
                _ => {
                    if !warned_malformed {
                        warn!("Malformed discharge value in '{}' at {}; using 0", filename, stamp);
                        warned_malformed = true;
                    }
                    0.0
                }
            };
            table.get_mut(name).unwrap().insert(stamp.clone(), q);
        }
    }
    Ok(table)
}

/*
Reads an observed discharge series: a two-column CSV of time and value. Values
that fail to parse become NaN so that lookups treat them as missing.
 */
pub fn read_observed_ts(filename: &str) -> Result<Timeseries> {
    let content = fs::read_to_string(Path::new(filename))?;
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(content.as_bytes());

    let mut ts = Timeseries::new_named(filename);
    let mut file_line = 1;
    for record in reader.records() {
        file_line += 1;
        let record = record?;
        let t_str = record.get(0).unwrap_or("");
        let t = match date_string_to_u64_flexible(t_str) {
            Ok((t, _format)) => t,
            Err(_) => {
                return Err(LimnoError::CsvError(format!(
                    "Error reading '{}' line {}: bad timestamp '{}'",
                    filename, file_line, t_str
                )));
            }
        };
        let value = record
            .get(1)
            .and_then(|v| v.parse::<f64>().ok())
            .unwrap_or(f64::NAN);
        ts.push(t, value);
    }
    Ok(ts)
}


/*
Writes a set of timeseries as one CSV table sharing a Time column. Every
series must cover the same timestamps; the first series provides the time
axis for all of them.
 */
pub fn write_ts(filename: &str, series: Vec<Timeseries>) -> Result<()> {
    let count_rows = series.first().map(|ts| ts.len()).unwrap_or(0);
    if series.iter().any(|ts| ts.len() != count_rows) {
        return Err(LimnoError::CsvError(
            "Cannot write timeseries with different lengths".to_string()));
    }

    let mut contents = String::from("Time");
    for ts in &series {
        contents.push(',');
        contents.push_str(&ts.name);
    }
    contents.push_str("\r\n");

    if let Some(first) = series.first() {
        for (row, timestamp) in first.timestamps.iter().enumerate() {
            contents.push_str(&u64_to_auto_datetime_string(*timestamp));
            for ts in &series {
                contents.push_str(&format!(",{}", ts.values[row]));
            }
            contents.push_str("\r\n");
        }
    }

    fs::write(Path::new(filename), contents)
        .map_err(|_| LimnoError::CsvError(format!("Error writing file {}", filename)))
}
