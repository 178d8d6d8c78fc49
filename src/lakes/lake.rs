use crate::basin::grid_node::GridNode;
use crate::hydrology::water_balance::{WaterBalanceModel, WbComponents};
use std::collections::HashMap;

/*
A lake or reservoir on the channel network. Configuration comes from the lakes
table; the snapped cell, node index and upstream neighbours are resolved once
during initialization, and storage/outflow mutate every step.

Unit conventions: storage in m3, discharges in m3/s, areas in m2, precip and
evaporation depths in mm over the step, K in hours.
 */
#[derive(Clone)]
pub struct Lake {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
    pub area_m2: f64,
    pub th_volume_m3: f64,
    pub k_hours: f64,
    pub obs_fam: Option<f64>,
    pub output_ts: bool,
    pub wm_flag: bool,

    //Resolved during initialization
    pub cell: Option<(usize, usize)>,
    pub node_idx: Option<usize>,
    pub enabled: bool,

    //Dynamic state
    pub storage_m3: f64,
    pub outflow_m3s: f64,
    pub inflow_m3s: f64,
    pub precip_mm: f64,
    pub evap_mm: f64,
}

impl Lake {
    pub fn new(name: &str, lat: f64, lon: f64) -> Self {
        Self {
            name: name.to_string(),
            lat,
            lon,
            area_m2: 0.0,
            th_volume_m3: 0.0,
            k_hours: 24.0,
            obs_fam: None,
            output_ts: false,
            wm_flag: false,
            cell: None,
            node_idx: None,
            enabled: true,
            storage_m3: 0.0,
            outflow_m3s: 0.0,
            inflow_m3s: 0.0,
            precip_mm: 0.0,
            evap_mm: 0.0,
        }
    }

    /*
    Default state when no saved state is available: full to the threshold,
    no release.
     */
    pub fn reset_state(&mut self) {
        self.storage_m3 = self.th_volume_m3;
        self.outflow_m3s = 0.0;
    }

    /*
    Vertical balance, run during the water-balance pass before routing.
    Atmospheric exchange only: storage gains the precipitation volume and
    loses the evaporation demand volume, floored at empty.
     */
    pub fn apply_vertical_balance(&mut self, precip_mm: f64, pet_mm: f64) {
        if !self.enabled {
            return;
        }
        self.precip_mm = precip_mm;
        self.evap_mm = pet_mm;
        let precip_vol = precip_mm * 1e-3 * self.area_m2;
        let evap_vol = pet_mm * 1e-3 * self.area_m2;
        self.storage_m3 += precip_vol - evap_vol;
        if self.storage_m3 < 0.0 {
            self.storage_m3 = 0.0;
        }
    }

    /*
    Horizontal balance, run after routing. Takes up the inflow, then releases
    through one of three regimes:

      - engineered discharge, when wm_flag is set and a discharge table is
        bound for this lake: the prescribed Q for the current stamp, 0 when
        the stamp is absent. Storage follows the prescription and may exceed
        the threshold volume.
      - overflow, when storage exceeds the threshold: the excess leaves
        within the step and storage is capped at the threshold.
      - linear-reservoir recession otherwise: O = S / K, decayed
        exponentially from the previous release while the recession lasts.
     */
    pub fn apply_horizontal_balance(&mut self, dt_s: f64, inflow_m3s: f64,
                                    stamp: &str,
                                    engineered: Option<&HashMap<String, f64>>) {
        if !self.enabled {
            return;
        }
        self.inflow_m3s = inflow_m3s;
        self.storage_m3 += inflow_m3s * dt_s;

        let outflow;
        if self.wm_flag && engineered.is_some() {
            outflow = engineered.unwrap().get(stamp).copied().unwrap_or(0.0);
            self.storage_m3 -= outflow * dt_s;
            if self.storage_m3 < 0.0 {
                self.storage_m3 = 0.0;
            }
        } else if self.storage_m3 > self.th_volume_m3 {
            // The excess leaves within the step; capping the storage at the
            // threshold is the corresponding volume removal.
            outflow = (self.storage_m3 - self.th_volume_m3) / dt_s;
            self.storage_m3 = self.th_volume_m3;
        } else if self.storage_m3 <= 0.0 || self.k_hours <= 0.0 {
            outflow = 0.0;
        } else {
            let k_s = self.k_hours * 3600.0;
            let mut recession = self.storage_m3 / k_s;
            if self.outflow_m3s > 0.0 {
                // Continue the previous recession rather than restarting it
                recession = self.outflow_m3s * libm::exp(-dt_s / k_s);
            }
            outflow = recession;
            self.storage_m3 -= outflow * dt_s;
            if self.storage_m3 < 0.0 {
                self.storage_m3 = 0.0;
            }
        }
        self.outflow_m3s = outflow;
    }

    /*
    Single-call balance with a caller-supplied inflow: the vertical phase
    followed immediately by the horizontal phase.
     */
    pub fn step(&mut self, stamp: &str, inflow_m3s: f64, precip_mm: f64,
                evap_mm: f64, dt_s: f64,
                engineered: Option<&HashMap<String, f64>>) {
        self.apply_vertical_balance(precip_mm, evap_mm);
        self.apply_horizontal_balance(dt_s, inflow_m3s, stamp, engineered);
    }
}

/*
A lake satisfies the water-balance capability for the cell it occupies: the
vertical phase runs off the cell-local forcings and the land-surface runoff
components at the cell are zeroed, since the lake replaces the surface
process there.
 */
impl WaterBalanceModel for Lake {
    fn get_name(&self) -> &str {
        "lake"
    }

    fn water_balance(&mut self, _step_hours: f64, _nodes: &[GridNode],
                     precip_mm: &[f64], pet_mm: &[f64],
                     components: &mut WbComponents) {
        if let Some(i) = self.node_idx {
            self.apply_vertical_balance(precip_mm[i], pet_mm[i]);
            components.zero_node(i);
        }
    }
}
