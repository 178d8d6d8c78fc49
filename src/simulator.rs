use crate::basin::carve::carve_basin;
use crate::basin::{Gauge, GaugeMap, GridNode};
use crate::error::{LimnoError, Result};
use crate::grid::{FloatGrid, GeographicProjection, Grid, LongGrid};
use crate::hydrology::routing::{LagRouting, RoutingEnum, RoutingModel};
use crate::hydrology::water_balance::{SimpleWaterBalance, WaterBalanceEnum,
                                      WaterBalanceModel, WbComponents};
use crate::io::control_io::{ControlFile, TaskSection};
use crate::io::csv_io::{read_engineered_discharge, read_lakes_table,
                        read_observed_ts, write_ts};
use crate::io::tif_grid::{read_float_tif_grid, read_long_tif_grid,
                          write_float_tif_grid};
use crate::lakes::{Inlet, Lake, LakeMap};
use crate::tid::utils::{stamped_name, u64_to_stamp};
use crate::timeseries::Timeseries;
use log::{info, warn};
use rayon::prelude::*;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/*
Drives one task from begin to end at a fixed step. The stages of a step are
strictly ordered: forcings, the water balance (with each lake's vertical
phase replacing the surface process at its cell), routing, then each lake's
horizontal phase which overwrites the routed discharge at the lake outlet.
Each stage completes for all cells before the next begins, so routing never
observes a partially updated lake outflow.
 */
pub struct Simulator {
    task: TaskSection,

    dem: FloatGrid,
    ddm: LongGrid,
    fam: FloatGrid,
    proj: GeographicProjection,

    gauges: Vec<Gauge>,
    gauge_map: GaugeMap,
    nodes: Vec<GridNode>,
    node_index: HashMap<(usize, usize), usize>,
    down_index: Vec<Option<usize>>,

    lakes: Vec<Lake>,
    lake_map: LakeMap,
    inlets: Vec<Inlet>,
    engineered: Arc<HashMap<String, HashMap<String, f64>>>,

    wb_model: WaterBalanceEnum,
    routing_model: RoutingEnum,

    current_precip: Vec<f64>,
    current_pet: Vec<f64>,
    current_q: Vec<f64>,
    components: WbComponents,

    last_precip_file: String,
    last_pet_file: String,
    warned_missing_precip: bool,
    warned_missing_pet: bool,

    abort: Arc<AtomicBool>,
}

impl Simulator {
    pub fn initialize(control: &ControlFile, task: &TaskSection) -> Result<Simulator> {
        //Basic grids are loaded once and stay read-only for the run
        let dem = read_float_tif_grid(&control.basic.dem)?;
        let ddm = read_long_tif_grid(&control.basic.ddm)?;
        let fam = read_float_tif_grid(&control.basic.fam)?;
        if !dem.is_spatial_match(&ddm) || !dem.is_spatial_match(&fam) {
            return Err(LimnoError::Config(
                "The basic grids do not cover the same domain".to_string()));
        }
        let proj = GeographicProjection::new(dem.cell_size);

        let basin = control.basin(&task.basin).ok_or_else(|| {
            LimnoError::Config(format!("Unknown basin \"{}\" in task {}",
                                       task.basin, task.name))
        })?;

        //Gauges of the basin
        let mut gauges: Vec<Gauge> = vec![];
        for gauge_name in &basin.gauge_names {
            let section = control.gauge(gauge_name).ok_or_else(|| {
                LimnoError::Config(format!("Unknown gauge \"{}\" in basin!", gauge_name))
            })?;
            let mut gauge = Gauge::new(&section.name, section.lat, section.lon);
            gauge.obs_fam = section.obs_fam;
            gauge.output_ts = section.output_ts;
            if let Some(obs_file) = &section.obs_file {
                match read_observed_ts(obs_file) {
                    Ok(ts) => gauge.obs = ts,
                    Err(e) => warn!("Could not load observations for gauge {}: {}",
                                    gauge.name, e),
                }
            }
            gauges.push(gauge);
        }
        let mut gauge_map = GaugeMap::initialize(&gauges);

        //Carve the node set and build the gauge tree
        let carve = carve_basin(&mut gauges, &ddm, &fam, &proj, &mut gauge_map)?;
        if carve.nodes.is_empty() {
            return Err(LimnoError::Config(format!(
                "Basin {} carved no active cells", basin.name)));
        }
        info!("Basin {} carved {} nodes for {} gauges", basin.name,
              carve.nodes.len(), gauges.len());

        //A saved gauge tree supersedes the carved one when states are used
        if task.use_states {
            if let Some(state_path) = &task.state_path {
                gauge_map.load_relationships(task.begin, state_path);
            }
        }

        //Lakes and the engineered discharge table
        let mut lakes = match &basin.lake_list_file {
            Some(file) => read_lakes_table(file)?,
            None => vec![],
        };
        for lake in lakes.iter_mut() {
            lake.wm_flag = task.wm_flag;
        }
        let engineered = Arc::new(match &basin.dam_q_file {
            Some(file) => read_engineered_discharge(file)?,
            None => HashMap::new(),
        });

        let mut lake_map = LakeMap::initialize(lakes.len());
        lake_map.find_lake_locations(&mut lakes, &fam, &proj);
        let mut loaded_topology = false;
        if task.use_states {
            if let Some(state_path) = &task.state_path {
                loaded_topology = lake_map.load_relationships(&lakes, task.begin, state_path);
            }
        }
        if !loaded_topology {
            lake_map.find_upstream_neighbors(&lakes, &ddm);
        }
        lake_map.bind_node_indices(&mut lakes, &carve.node_index);

        //Inlets bind to lakes by name
        let mut inlets: Vec<Inlet> = control.inlets.iter().map(Inlet::from_section).collect();
        lake_map.initialize_inlets(&lakes, &mut inlets);

        //Initial lake state: saved rasters when available, defaults otherwise
        match (&task.state_path, task.use_states) {
            (Some(state_path), true) => {
                lake_map.load_states(&mut lakes, &dem, task.begin, state_path);
            }
            _ => {
                for lake in lakes.iter_mut() {
                    lake.reset_state();
                }
            }
        }

        let count_nodes = carve.nodes.len();
        Ok(Simulator {
            task: task.clone(),
            dem,
            ddm,
            fam,
            proj,
            gauges,
            gauge_map,
            nodes: carve.nodes,
            node_index: carve.node_index,
            down_index: carve.down_index,
            lakes,
            lake_map,
            inlets,
            engineered,
            wb_model: WaterBalanceEnum::Simple(SimpleWaterBalance::new()),
            routing_model: RoutingEnum::Lag(LagRouting),
            current_precip: vec![0.0; count_nodes],
            current_pet: vec![0.0; count_nodes],
            current_q: vec![0.0; count_nodes],
            components: WbComponents::new(count_nodes),
            last_precip_file: "".to_string(),
            last_pet_file: "".to_string(),
            warned_missing_precip: false,
            warned_missing_pet: false,
            abort: Arc::new(AtomicBool::new(false)),
        })
    }

    /*
    Shared flag for terminating a long run cleanly. Polled between steps; a
    raised flag ends the run at the step boundary with a final state save.
     */
    pub fn abort_flag(&self) -> Arc<AtomicBool> {
        self.abort.clone()
    }

    pub fn has_lakes_with_output_ts(&self) -> bool {
        self.lakes.iter().any(|l| l.output_ts)
    }

    pub fn nodes(&self) -> &[GridNode] {
        &self.nodes
    }

    pub fn dem(&self) -> &FloatGrid {
        &self.dem
    }

    pub fn ddm(&self) -> &LongGrid {
        &self.ddm
    }

    pub fn fam(&self) -> &FloatGrid {
        &self.fam
    }

    pub fn projection(&self) -> &GeographicProjection {
        &self.proj
    }

    pub fn lakes(&self) -> &[Lake] {
        &self.lakes
    }

    pub fn current_q(&self) -> &[f64] {
        &self.current_q
    }

    /*
    Runs the step loop and writes the collected outputs.
     */
    pub fn simulate(&mut self) -> Result<()> {
        let dt_seconds = (self.task.step_hours * 3600.0) as u64;

        //Per-gauge output accumulators: discharge at the gauge cell and the
        //area-weighted average precipitation over the drainage
        let output_gauges: Vec<usize> = (0..self.gauges.len())
            .filter(|&gi| self.gauges[gi].output_ts)
            .collect();
        let mut gauge_q: Vec<Timeseries> = output_gauges.iter()
            .map(|&gi| Timeseries::new_named(&format!("q_{}", self.gauges[gi].name)))
            .collect();
        let mut gauge_precip: Vec<Timeseries> = output_gauges.iter()
            .map(|&gi| Timeseries::new_named(&format!("precip_{}", self.gauges[gi].name)))
            .collect();

        //Lake volume series only open when a lake asked for them
        let output_lakes: Vec<usize> = if self.has_lakes_with_output_ts() {
            (0..self.lakes.len()).filter(|&li| self.lakes[li].output_ts).collect()
        } else {
            vec![]
        };
        let mut lake_volumes: Vec<Timeseries> = output_lakes.iter()
            .map(|&li| Timeseries::new_named(&format!("volume_{}", self.lakes[li].name)))
            .collect();

        let mut time = self.task.begin;
        while time < self.task.end {
            if self.abort.load(Ordering::Relaxed) {
                info!("Abort requested; stopping at {}", u64_to_stamp(time));
                self.save_states(time)?;
                break;
            }

            self.step(time)?;

            //Append outputs for this step
            let gauge_averages = self.gauge_map.gauge_average(&self.nodes, &self.current_precip);
            for (oi, &gi) in output_gauges.iter().enumerate() {
                let q = match self.gauges[gi].cell
                    .and_then(|cell| self.node_index.get(&cell)) {
                    Some(&ni) => self.current_q[ni],
                    None => f64::NAN,
                };
                gauge_q[oi].push(time, q);
                gauge_precip[oi].push(time, gauge_averages[gi]);
            }
            for (oi, &li) in output_lakes.iter().enumerate() {
                lake_volumes[oi].push(time, self.lakes[li].storage_m3);
            }

            if self.task.save_state_time == Some(time) {
                self.save_states(time)?;
            }

            time += dt_seconds;
        }

        //Write the collected series
        for (oi, &gi) in output_gauges.iter().enumerate() {
            let filename = format!("{}/ts_{}.csv", self.task.output_path,
                                   self.gauges[gi].name);
            write_ts(&filename, vec![gauge_q[oi].clone(), gauge_precip[oi].clone()])?;
        }
        if !lake_volumes.is_empty() {
            let filename = format!("{}/lake_volumes.csv", self.task.output_path);
            write_ts(&filename, lake_volumes)?;
        }
        if self.task.gridded_output {
            self.write_q_grid(self.task.end)?;
        }
        Ok(())
    }

    /*
    One timestep. The stage order is the correctness contract that makes the
    discharge substitution at lake outlets safe.
     */
    pub fn step(&mut self, time: u64) -> Result<()> {
        let stamp = u64_to_stamp(time);
        let dt_s = self.task.step_hours * 3600.0;

        //1. Forcings onto the node set
        self.load_forcings(time);

        //2. Water balance, then each lake's vertical phase. The lake replaces
        //   the surface process at its cell, so its runoff components are
        //   zeroed before routing can see them.
        self.wb_model.water_balance(self.task.step_hours, &self.nodes,
                                    &self.current_precip, &self.current_pet,
                                    &mut self.components);
        for lake in self.lakes.iter_mut() {
            lake.water_balance(self.task.step_hours, &self.nodes,
                               &self.current_precip, &self.current_pet,
                               &mut self.components);
        }

        //3. Routing produces the discharge at every node
        self.routing_model.route(self.task.step_hours, &self.nodes,
                                 &self.down_index, &self.components,
                                 &mut self.current_q);

        //4. Each lake's horizontal phase, then the substitution: downstream
        //   routing reads the overwritten value, so the reservoir effect
        //   propagates through the channel network
        let inflows: Vec<f64> = (0..self.lakes.len())
            .map(|li| {
                self.lake_map.calculate_inflow(li, &self.lakes, &self.inlets,
                                               &self.current_q, &self.node_index,
                                               time)
            })
            .collect();
        for (li, inflow) in inflows.into_iter().enumerate() {
            if !self.lakes[li].enabled {
                continue;
            }
            let engineered = self.engineered.get(&self.lakes[li].name.to_lowercase());
            self.lakes[li].apply_horizontal_balance(dt_s, inflow, &stamp, engineered);
            if let Some(ni) = self.lakes[li].node_idx {
                self.current_q[ni] = self.lakes[li].outflow_m3s;
            }
        }
        Ok(())
    }

    /*
    Reads the forcing rasters for this step and resamples them onto the node
    set. A missing raster contributes zeros and warns once; re-reads of the
    same file are skipped so coarse forcing steps stay cheap.
     */
    fn load_forcings(&mut self, time: u64) {
        if let Some(pattern) = self.task.precip_pattern.clone() {
            let file = stamped_name(&pattern, time);
            if file != self.last_precip_file {
                self.last_precip_file = file.clone();
                match read_float_tif_grid(&file) {
                    Ok(grid) => {
                        self.current_precip = resample_forcing(
                            &grid, &self.dem, &self.nodes, self.task.precip_convert);
                    }
                    Err(_) => {
                        if !self.warned_missing_precip {
                            warn!("Missing precip file {}; using zeros", file);
                            self.warned_missing_precip = true;
                        }
                        self.current_precip = vec![0.0; self.nodes.len()];
                    }
                }
            }
        }
        if let Some(pattern) = self.task.pet_pattern.clone() {
            let file = stamped_name(&pattern, time);
            if file != self.last_pet_file {
                self.last_pet_file = file.clone();
                match read_float_tif_grid(&file) {
                    Ok(grid) => {
                        self.current_pet = resample_forcing(
                            &grid, &self.dem, &self.nodes, self.task.pet_convert);
                    }
                    Err(_) => {
                        if !self.warned_missing_pet {
                            warn!("Missing pet file {}; using zeros", file);
                            self.warned_missing_pet = true;
                        }
                        self.current_pet = vec![0.0; self.nodes.len()];
                    }
                }
            }
        }
    }

    /*
    Saves the lake state rasters and the topology snapshots.
     */
    fn save_states(&self, time: u64) -> Result<()> {
        let state_path = match &self.task.state_path {
            Some(path) => path.clone(),
            None => {
                warn!("State save requested but no state path is configured");
                return Ok(());
            }
        };
        self.lake_map.save_states(&self.lakes, &self.dem, time, &state_path)?;
        self.gauge_map.save_relationships(time, &state_path)?;
        self.lake_map.save_relationships(&self.lakes, time, &state_path)?;
        Ok(())
    }

    fn write_q_grid(&self, time: u64) -> Result<()> {
        let mut q_grid: FloatGrid = Grid::new(
            self.dem.rows, self.dem.cols, self.dem.cell_size,
            self.dem.extent.left, self.dem.extent.top,
            self.dem.no_data, self.dem.no_data);
        for (i, node) in self.nodes.iter().enumerate() {
            q_grid.set(node.x, node.y, self.current_q[i] as f32);
        }
        let filename = format!("{}/q_{}.tif", self.task.output_path, u64_to_stamp(time));
        write_float_tif_grid(&filename, &q_grid)
    }

    /*
    The basin-average task: drainage areas and mean forcing depth per gauge
    over the whole window, written as one summary table.
     */
    pub fn basin_avg(&mut self) -> Result<()> {
        let dt_seconds = (self.task.step_hours * 3600.0) as u64;
        let areas = self.gauge_map.gauge_area(&self.nodes);

        let mut sums = vec![0.0; self.gauges.len()];
        let mut count_steps = 0usize;
        let mut time = self.task.begin;
        while time < self.task.end {
            self.load_forcings(time);
            let averages = self.gauge_map.gauge_average(&self.nodes, &self.current_precip);
            for (gi, avg) in averages.iter().enumerate() {
                if avg.is_finite() {
                    sums[gi] += avg;
                }
            }
            count_steps += 1;
            time += dt_seconds;
        }

        let mut contents = String::from("gauge,area_km2,mean_precip\r\n");
        for (gi, gauge) in self.gauges.iter().enumerate() {
            let mean = if count_steps > 0 { sums[gi] / count_steps as f64 } else { 0.0 };
            contents.push_str(&format!("{},{},{}\r\n", gauge.name,
                                       areas[gi] / 1e6, mean));
        }
        let filename = format!("{}/basin_avg_{}.csv", self.task.output_path,
                               self.task.basin);
        std::fs::write(std::path::Path::new(&filename), contents)?;
        Ok(())
    }
}

/*
Puts a forcing grid onto the node set. When the grids match spatially the
cell values map across directly; otherwise each node is looked up through
its geographic coordinates. Negative and noData cells contribute nothing.
 */
fn resample_forcing(grid: &FloatGrid, dem: &FloatGrid, nodes: &[GridNode],
                    convert: f64) -> Vec<f64> {
    if dem.is_spatial_match(grid) {
        nodes.par_iter()
            .map(|node| {
                let value = grid.get(node.x, node.y);
                if !grid.is_no_data(node.x, node.y) && value > 0.0 {
                    value as f64 * convert
                } else {
                    0.0
                }
            })
            .collect()
    } else {
        nodes.par_iter()
            .map(|node| {
                let (lon, lat) = dem.ref_loc(node.x, node.y);
                match grid.grid_loc(lon, lat) {
                    Some((x, y)) if !grid.is_no_data(x, y) && grid.get(x, y) > 0.0 => {
                        grid.get(x, y) as f64 * convert
                    }
                    _ => 0.0,
                }
            })
            .collect()
    }
}
