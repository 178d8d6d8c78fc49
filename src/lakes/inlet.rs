use crate::error::Result;
use crate::io::control_io::InletSection;
use crate::io::csv_io::read_observed_ts;
use crate::timeseries::Timeseries;

/*
A boundary-condition point whose discharge is an observed time series. An
inlet binds to one lake by name and replaces the routed inflow at that lake
when bound.
 */
#[derive(Clone, Default)]
pub struct Inlet {
    pub name: String,
    pub lake_name: String,
    pub lat: Option<f64>,
    pub lon: Option<f64>,
    pub cell: Option<(usize, usize)>,
    pub obs_file: String,
    pub obs: Timeseries,
}

impl Inlet {
    pub fn from_section(section: &InletSection) -> Inlet {
        Inlet {
            name: section.name.clone(),
            lake_name: section.lake_name.clone(),
            lat: section.lat,
            lon: section.lon,
            cell: match (section.cell_x, section.cell_y) {
                (Some(x), Some(y)) => Some((x, y)),
                _ => None,
            },
            obs_file: section.obs_file.clone(),
            obs: Timeseries::new(),
        }
    }

    pub fn load_ts(&mut self) -> Result<()> {
        if !self.obs_file.is_empty() {
            self.obs = read_observed_ts(&self.obs_file)?;
        }
        Ok(())
    }

    /*
    Observed discharge at the given time, NaN when the inlet has no
    observations or none at that time. Callers treat NaN as zero inflow.
     */
    pub fn get_observed(&self, time: u64) -> f64 {
        if self.obs.is_empty() {
            return f64::NAN;
        }
        self.obs.value_at(time)
    }
}
