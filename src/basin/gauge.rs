use crate::timeseries::Timeseries;

/*
An observation point on the channel network. Identity is by name,
case-insensitive. The cell is filled in when the gauge is snapped onto the
flow accumulation grid during the carve.
 */
#[derive(Clone, Default)]
pub struct Gauge {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub cell: Option<(usize, usize)>,
    pub obs_fam: Option<f64>,
    pub output_ts: bool,
    pub obs: Timeseries,
}

impl Gauge {
    pub fn new(name: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
            ..Default::default()
        }
    }
}
