use crate::error::LimnoError;
use crate::io::csv_io::{read_engineered_discharge, read_lakes_table,
                        read_observed_ts, truthy, write_ts};
use crate::tid::utils::date_string_to_u64_flexible;
use crate::timeseries::Timeseries;
use std::fs;
use std::path::PathBuf;

fn temp_file(name: &str, contents: &str) -> String {
    let mut path = PathBuf::from(std::env::temp_dir());
    path.push(format!("limno_csv_{}_{}", std::process::id(), name));
    fs::write(&path, contents).unwrap();
    path.to_string_lossy().to_string()
}


/*
The lakes table accepts synonym headers in any case, converts km2/km3 to
m2/m3, and fills the retention constant default.
 */
#[test]
fn test_read_lakes_table() {
    let file = temp_file("lakes.csv", "\u{feff}ID,Latitude,Longitude,Volume,Area,Retention_Constant,ObsFAM,Output_TS,Comment\n\
                                       Tana,12.0,37.25,28.0,3050.0,36.0,3000.0,yes,largest\n\
                                       Ziway,7.9,38.75,1.1,440.0,,,no,shallow\n");
    let lakes = read_lakes_table(&file).unwrap();
    assert_eq!(lakes.len(), 2);

    let tana = &lakes[0];
    assert_eq!(tana.name, "Tana");
    assert_eq!(tana.lat, 12.0);
    assert_eq!(tana.lon, 37.25);
    assert!(((tana.th_volume_m3 - 28.0e9) / 28.0e9).abs() <= 1e-9);
    assert!(((tana.area_m2 - 3050.0e6) / 3050.0e6).abs() <= 1e-9);
    assert_eq!(tana.k_hours, 36.0);
    assert_eq!(tana.obs_fam, Some(3000.0));
    assert!(tana.output_ts);

    let ziway = &lakes[1];
    assert_eq!(ziway.k_hours, 24.0); //default when the cell is empty
    assert_eq!(ziway.obs_fam, None);
    assert!(!ziway.output_ts);
}


/*
Required columns must be present, lakes must have an area, and duplicate
names are rejected. All of these are fatal at load time.
 */
#[test]
fn test_lakes_table_errors() {
    let missing = temp_file("lakes_missing.csv", "name,lat\nTana,12.0\n");
    assert!(matches!(read_lakes_table(&missing), Err(LimnoError::Config(_))));

    let no_area = temp_file("lakes_no_area.csv",
                            "name,lat,lon,th_volume\nTana,12.0,37.25,28.0\n");
    assert!(matches!(read_lakes_table(&no_area), Err(LimnoError::Validation(_))));

    let duplicate = temp_file("lakes_dup.csv",
                              "name,lat,lon,th_volume,area\n\
                               Tana,12.0,37.25,28.0,3050.0\n\
                               TANA,12.1,37.35,28.0,3050.0\n");
    assert!(matches!(read_lakes_table(&duplicate), Err(LimnoError::Config(_))));
}


/*
The engineered discharge table maps lake name and stamp to a prescribed Q;
malformed fields become 0 rather than poisoning the run.
 */
#[test]
fn test_read_engineered_discharge() {
    let file = temp_file("damq.csv", "time,Tana,Koka\n\
                                      20200101_0000,500.0,120.5\n\
                                      20200101_0100,oops,121.5\n");
    let table = read_engineered_discharge(&file).unwrap();

    let tana = table.get("tana").unwrap();
    assert_eq!(tana.get("20200101_0000"), Some(&500.0));
    assert_eq!(tana.get("20200101_0100"), Some(&0.0)); //malformed value
    assert_eq!(tana.get("20200101_0200"), None);       //missing stamp

    let koka = table.get("koka").unwrap();
    assert_eq!(koka.get("20200101_0100"), Some(&121.5));
}


/*
Observed series parse timestamps flexibly and keep unparseable values as NaN.
 */
#[test]
fn test_read_observed_ts() {
    let file = temp_file("obs.csv", "time,q\n\
                                     2020-01-01,5.0\n\
                                     2020-01-02,\n\
                                     2020-01-03,7.5\n");
    let obs = read_observed_ts(&file).unwrap();
    assert_eq!(obs.len(), 3);

    let (t1, _) = date_string_to_u64_flexible("2020-01-01").unwrap();
    let (t2, _) = date_string_to_u64_flexible("2020-01-02").unwrap();
    let (t3, _) = date_string_to_u64_flexible("2020-01-03").unwrap();
    assert_eq!(obs.value_at(t1), 5.0);
    assert!(obs.value_at(t2).is_nan());
    assert_eq!(obs.value_at(t3), 7.5);
}


/*
Written series read back with the same timestamps and values.
 */
#[test]
fn test_write_ts_roundtrip() {
    let (t0, _) = date_string_to_u64_flexible("2020-06-01").unwrap();
    let mut ts = Timeseries::new_named("volume_tana");
    ts.push(t0, 1.0e9);
    ts.push(t0 + 86400, 9.5e8);

    let mut path = PathBuf::from(std::env::temp_dir());
    path.push(format!("limno_csv_{}_written.csv", std::process::id()));
    let file = path.to_string_lossy().to_string();
    write_ts(&file, vec![ts]).unwrap();

    let back = read_observed_ts(&file).unwrap();
    assert_eq!(back.len(), 2);
    assert_eq!(back.value_at(t0), 1.0e9);
    assert_eq!(back.value_at(t0 + 86400), 9.5e8);

    //Mismatched lengths are refused
    let short = Timeseries::new_named("short");
    let mut long = Timeseries::new_named("long");
    long.push(t0, 1.0);
    assert!(write_ts(&file, vec![short, long]).is_err());
}


#[test]
fn test_truthy() {
    assert!(truthy("y"));
    assert!(truthy("YES"));
    assert!(truthy("True"));
    assert!(truthy("1"));
    assert!(!truthy("no"));
    assert!(!truthy("0"));
    assert!(!truthy(""));
}
