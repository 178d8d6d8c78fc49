use crate::tid::utils::{date_string_to_u64_flexible, stamp_to_u64, stamped_name,
                        u64_to_auto_datetime_string, u64_to_stamp, wrap_to_i64,
                        wrap_to_u64};


/*
The wrapped u64 representation must invert cleanly.
 */
#[test]
fn test_wrap_roundtrip() {
    for x in [0i64, 1, -1, 1577836800, -62135596800] {
        assert_eq!(wrap_to_i64(wrap_to_u64(x)), x);
    }
}


/*
A date parses and formats back as a midnight stamp.
 */
#[test]
fn test_stamp_from_date() {
    let (t, format) = date_string_to_u64_flexible("2020-01-15").unwrap();
    assert_eq!(format, "%Y-%m-%d");
    assert_eq!(u64_to_stamp(t), "20200115_0000");
    assert_eq!(u64_to_auto_datetime_string(t), "2020-01-15");
}


/*
Stamps roundtrip exactly. This is the key format for the engineered discharge
table, so a locale-dependent rendering would corrupt every lookup.
 */
#[test]
fn test_stamp_roundtrip() {
    let t = stamp_to_u64("20200115_1430").unwrap();
    assert_eq!(u64_to_stamp(t), "20200115_1430");
    assert_eq!(u64_to_auto_datetime_string(t), "2020-01-15T14:30:00");

    //An hour of seconds moves the stamp by an hour
    assert_eq!(u64_to_stamp(t + 3600), "20200115_1530");
}


/*
Stamps parse as input dates too, so control files can use them for the
simulation window.
 */
#[test]
fn test_flexible_parses_stamp() {
    let (t, _format) = date_string_to_u64_flexible("20200115_1430").unwrap();
    assert_eq!(u64_to_stamp(t), "20200115_1430");
    assert!(date_string_to_u64_flexible("not a date").is_err());
}


/*
Forcing file patterns substitute each date token.
 */
#[test]
fn test_stamped_name() {
    let t = stamp_to_u64("20200115_1430").unwrap();
    assert_eq!(stamped_name("precip/precip.YYYYMMDD_HHUU.tif", t),
               "precip/precip.20200115_1430.tif");
    assert_eq!(stamped_name("pet.YYYY-MM.tif", t), "pet.2020-01.tif");
    assert_eq!(stamped_name("no_tokens.tif", t), "no_tokens.tif");
}
