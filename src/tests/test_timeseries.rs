use crate::timeseries::Timeseries;


/*
Create a timeseries and add values into it. Then check the sum() of the timeseries.
 */
#[test]
fn test_timeseries_constructor() {
    let mut t = Timeseries::new_named("test");
    for i in 0..5 {
        t.push(i, (1000 + i) as f64);
    }
    assert_eq!(t.len(), 5);
    assert_eq!(t.sum(), 5010.0);
    assert_eq!(t.mean(), 1002.0);
}


/*
Create a timeseries. Check that the counting functions are correct.
 */
#[test]
fn test_timeseries_count_finite() {
    let mut what = Timeseries::new();

    what.push(1, 1f64);
    what.push(2, f64::NAN);
    what.push(3, 2f64);
    what.push(4, f64::INFINITY);
    what.push(5, f64::NEG_INFINITY);
    what.push(6, 0f64);

    assert_eq!(what.len(), 6);               // Length of the timeseries including missing values.
    assert_eq!(what.count_not_missing(), 5); // Length of the timeseries excluding missing values.
    assert_eq!(what.count_finite(), 3);      // Missing values are ignored, and infinities are not finite.
    assert!(f64::is_nan(what.sum()));        // Missing values cause sum -> NaN
}


/*
Timestamp lookups hit exact times and miss everything else with NaN, which is
how observation series report a missing value.
 */
#[test]
fn test_timeseries_value_at() {
    let mut obs = Timeseries::new_named("obs");
    obs.push(100, 1.5);
    obs.push(200, 2.5);
    obs.push(300, f64::NAN);

    assert_eq!(obs.value_at(100), 1.5);
    assert_eq!(obs.value_at(200), 2.5);
    assert!(obs.value_at(150).is_nan());
    assert!(obs.value_at(300).is_nan());
    assert!(obs.value_at(400).is_nan());
}
