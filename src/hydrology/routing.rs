use crate::basin::grid_node::GridNode;
use crate::hydrology::water_balance::WbComponents;
use dyn_clone::{clone_trait_object, DynClone};

pub trait RoutingModel: DynClone + Send + Sync {
    fn get_name(&self) -> &str;
    fn route(&mut self, step_hours: f64, nodes: &[GridNode],
             down_index: &[Option<usize>], components: &WbComponents,
             q: &mut [f64]);
}

clone_trait_object!(RoutingModel);

/*
Lag routing: each step, the discharge at a cell is its own local runoff plus
the previous step's discharge of every cell draining into it, so water
advances one cell per step. The previous discharge is taken from the passed
vector as it stood at the end of the last step, which is what carries a
substituted reservoir release downstream.
 */
#[derive(Clone, Default)]
pub struct LagRouting;

impl RoutingModel for LagRouting {
    fn get_name(&self) -> &str {
        "lag"
    }

    fn route(&mut self, step_hours: f64, nodes: &[GridNode],
             down_index: &[Option<usize>], components: &WbComponents,
             q: &mut [f64]) {
        let dt = step_hours * 3600.0;
        let prev = q.to_vec();
        for i in 0..nodes.len() {
            q[i] = components.runoff_mm(i) * 1e-3 * nodes[i].area_m2 / dt;
        }
        for j in 0..nodes.len() {
            if let Some(d) = down_index[j] {
                q[d] += prev[j];
            }
        }
    }
}

#[derive(Clone)]
pub enum RoutingEnum {
    Lag(LagRouting),
}

impl RoutingModel for RoutingEnum {
    fn get_name(&self) -> &str {
        match self {
            RoutingEnum::Lag(model) => model.get_name(),
        }
    }

    fn route(&mut self, step_hours: f64, nodes: &[GridNode],
             down_index: &[Option<usize>], components: &WbComponents,
             q: &mut [f64]) {
        match self {
            RoutingEnum::Lag(model) => {
                model.route(step_hours, nodes, down_index, components, q)
            }
        }
    }
}
