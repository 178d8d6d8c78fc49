// Design concepts:
// -----------------
// A timeseries is a pair of parallel vectors (timestamps, values) kept in
// ascending timestamp order. Observation series (gauges, inlets) are looked up
// by exact timestamp during the run; output series are appended step by step.

#[derive(Clone)]
#[derive(Default)]
pub struct Timeseries {
    pub name: String,              //The name of the timeseries
    pub timestamps: Vec<u64>,      //All the timestamps in Unix timestamps offset from i64 to u64
    pub values: Vec<f64>,          //All the values
}

impl Timeseries {
    pub fn new() -> Timeseries {
        Timeseries {
            name: "Unnamed timeseries".to_string(),
            timestamps: vec![],
            values: vec![],
        }
    }

    pub fn new_named(name: &str) -> Timeseries {
        Timeseries {
            name: name.to_string(),
            timestamps: vec![],
            values: vec![],
        }
    }


    /*
    Adds a new value to the end of the Timeseries. Useful for building a timeseries. Method accepts
    a timestamp u64.
    */
    pub fn push(&mut self, timestamp: u64, value: f64) {
        self.timestamps.push(timestamp);
        self.values.push(value)
    }


    /*
    Returns the value recorded at exactly the given timestamp, or NaN when the
    timestamp is not present. Missing observations are soft by contract.
     */
    pub fn value_at(&self, timestamp: u64) -> f64 {
        match self.timestamps.binary_search(&timestamp) {
            Ok(idx) => self.values[idx],
            Err(_) => f64::NAN,
        }
    }


    /*
    Returns the sum of all values in the timeseries, including any non-finite values.
     */
    pub fn sum(&self) -> f64 {
        self.values.iter().sum()
    }

    /*
    Returns the mean of all values in the timeseries, including any non-finite values.
     */
    pub fn mean(&self) -> f64 {
        self.sum() / (self.values.len() as f64)
    }

    /*
    Returns the number of values in the timeseries.
     */
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /*
    Counts the non-missing (non-NaN) values in a timeseries.
    */
    pub fn count_not_missing(&self) -> usize {
        self.values.iter().filter(|&x| !f64::is_nan(*x)).count()
    }

    /*
    Counts the finite values in a timeseries. This means all values that are not NaN, and not
    infinite.
    */
    pub fn count_finite(&self) -> usize {
        self.values.iter().filter(|&x| f64::is_finite(*x)).count()
    }
}
