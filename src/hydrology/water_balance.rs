use crate::basin::grid_node::GridNode;
use dyn_clone::{clone_trait_object, DynClone};

/*
Per-node runoff components produced by the water balance each step. Runoff
depths are in mm over the step; routing converts them to discharge.
 */
#[derive(Clone, Default)]
pub struct WbComponents {
    pub fast_flow_mm: Vec<f64>,
    pub inter_flow_mm: Vec<f64>,
    pub base_flow_mm: Vec<f64>,
    pub soil_moisture_mm: Vec<f64>,
    pub groundwater_mm: Vec<f64>,
}

impl WbComponents {
    pub fn new(count_nodes: usize) -> WbComponents {
        WbComponents {
            fast_flow_mm: vec![0.0; count_nodes],
            inter_flow_mm: vec![0.0; count_nodes],
            base_flow_mm: vec![0.0; count_nodes],
            soil_moisture_mm: vec![0.0; count_nodes],
            groundwater_mm: vec![0.0; count_nodes],
        }
    }

    /*
    Removes every land-surface contribution at one node. Lake cells do this:
    the lake replaces the surface process.
     */
    pub fn zero_node(&mut self, i: usize) {
        self.fast_flow_mm[i] = 0.0;
        self.inter_flow_mm[i] = 0.0;
        self.base_flow_mm[i] = 0.0;
        self.soil_moisture_mm[i] = 0.0;
        self.groundwater_mm[i] = 0.0;
    }

    /*
    Total routable runoff depth at one node.
     */
    pub fn runoff_mm(&self, i: usize) -> f64 {
        self.fast_flow_mm[i] + self.inter_flow_mm[i] + self.base_flow_mm[i]
    }
}

pub trait WaterBalanceModel: DynClone + Send + Sync {
    fn get_name(&self) -> &str;
    fn water_balance(&mut self, step_hours: f64, nodes: &[GridNode],
                     precip_mm: &[f64], pet_mm: &[f64],
                     components: &mut WbComponents);
}

clone_trait_object!(WaterBalanceModel);

/*
A runoff-coefficient water balance: a fixed share of effective rainfall leaves
as fast flow, a smaller share percolates and returns as base flow, and the
remainder tops up a conceptual soil store drained by evaporation demand.
 */
#[derive(Clone)]
pub struct SimpleWaterBalance {
    pub runoff_coeff: f64,
    pub baseflow_coeff: f64,
}

impl SimpleWaterBalance {
    pub fn new() -> Self {
        Self {
            runoff_coeff: 0.4,
            baseflow_coeff: 0.1,
        }
    }
}

impl Default for SimpleWaterBalance {
    fn default() -> Self {
        Self::new()
    }
}

impl WaterBalanceModel for SimpleWaterBalance {
    fn get_name(&self) -> &str {
        "simple"
    }

    fn water_balance(&mut self, _step_hours: f64, nodes: &[GridNode],
                     precip_mm: &[f64], pet_mm: &[f64],
                     components: &mut WbComponents) {
        for i in 0..nodes.len() {
            let effective = (precip_mm[i] - pet_mm[i]).max(0.0);
            components.fast_flow_mm[i] = self.runoff_coeff * effective;
            components.inter_flow_mm[i] = 0.0;
            components.base_flow_mm[i] = self.baseflow_coeff * effective;

            let residual = effective * (1.0 - self.runoff_coeff - self.baseflow_coeff);
            let store = components.soil_moisture_mm[i] + residual;
            let unmet_pet = (pet_mm[i] - precip_mm[i]).max(0.0);
            components.soil_moisture_mm[i] = (store - unmet_pet).max(0.0);
        }
    }
}

/*
Tagged enum over the concrete water balance variants, dispatching the shared
capability. Lakes satisfy the same capability for the cells they occupy.
 */
#[derive(Clone)]
pub enum WaterBalanceEnum {
    Simple(SimpleWaterBalance),
}

impl WaterBalanceModel for WaterBalanceEnum {
    fn get_name(&self) -> &str {
        match self {
            WaterBalanceEnum::Simple(model) => model.get_name(),
        }
    }

    fn water_balance(&mut self, step_hours: f64, nodes: &[GridNode],
                     precip_mm: &[f64], pet_mm: &[f64],
                     components: &mut WbComponents) {
        match self {
            WaterBalanceEnum::Simple(model) => {
                model.water_balance(step_hours, nodes, precip_mm, pet_mm, components)
            }
        }
    }
}
