use crate::basin::carve::snap_to_fam;
use crate::error::Result;
use crate::grid::{FloatGrid, FlowDir, GeographicProjection, Grid, LongGrid};
use crate::io::tif_grid::{read_float_tif_grid, write_float_tif_grid};
use crate::lakes::inlet::Inlet;
use crate::lakes::lake::Lake;
use crate::tid::utils::{u64_to_iso_datetime_string, u64_to_stamp};
use log::{info, warn};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/*
Spatial registry for the lakes of a basin: snapped locations, the upstream
cells feeding each lake, and the inlets bound to each lake. Lakes are
addressed by their index in the lake vector throughout.
 */
#[derive(Clone, Default)]
pub struct LakeMap {
    neighbors: Vec<Vec<(usize, usize)>>,
    inlets_for: Vec<Vec<usize>>,
}

impl LakeMap {
    pub fn initialize(count_lakes: usize) -> LakeMap {
        LakeMap {
            neighbors: vec![vec![]; count_lakes],
            inlets_for: vec![vec![]; count_lakes],
        }
    }

    /*
    Snaps each lake onto the channel network, the same way gauges are
    snapped: by observed flow accumulation when the lake carries one, by the
    largest accumulation nearby otherwise. A lake outside the grid extent is
    disabled with a warning.
     */
    pub fn find_lake_locations(&self, lakes: &mut [Lake], fam: &FloatGrid,
                               proj: &GeographicProjection) {
        for lake in lakes.iter_mut() {
            match snap_to_fam(fam, proj, lake.lon, lake.lat, lake.obs_fam) {
                Some((x, y)) => {
                    lake.cell = Some((x, y));
                    info!("Lake {} ({}, {}; {}, {}): FAM {}", lake.name, lake.lat,
                          lake.lon, y, x, fam.get(x, y));
                }
                None => {
                    warn!("Lake {} is outside the basic grid domain!", lake.name);
                    lake.enabled = false;
                }
            }
        }
    }

    /*
    Enumerates, for each lake, the 8-neighbours whose drainage direction
    moves water onto the lake cell. The list may be empty.
     */
    pub fn find_upstream_neighbors(&mut self, lakes: &[Lake], ddm: &LongGrid) {
        for (li, lake) in lakes.iter().enumerate() {
            self.neighbors[li].clear();
            let (x, y) = match lake.cell {
                Some(cell) if lake.enabled => cell,
                _ => continue,
            };

            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    if dx == 0 && dy == 0 {
                        continue;
                    }
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if !ddm.contains(nx, ny) {
                        continue;
                    }
                    let (nx, ny) = (nx as usize, ny as usize);
                    let dir = FlowDir::from_code(ddm.get(nx, ny));
                    if dir.inflow_offset() == Some((dx, dy)) {
                        self.neighbors[li].push((nx, ny));
                    }
                }
            }
            info!("Lake {} has {} upstream neighbors", lake.name,
                  self.neighbors[li].len());
        }
    }

    pub fn upstream_neighbors(&self, lake_idx: usize) -> &[(usize, usize)] {
        &self.neighbors[lake_idx]
    }

    /*
    Resolves each lake's node index against the active node set. A lake whose
    snapped cell was not carved cannot exchange water with the network, so it
    is a configuration problem and the lake is disabled.
     */
    pub fn bind_node_indices(&self, lakes: &mut [Lake],
                             node_index: &HashMap<(usize, usize), usize>) {
        for lake in lakes.iter_mut() {
            if !lake.enabled {
                continue;
            }
            lake.node_idx = lake.cell.and_then(|cell| node_index.get(&cell).copied());
            if lake.node_idx.is_none() {
                warn!("Lake {} is not part of the active node set; disabling it",
                      lake.name);
                lake.enabled = false;
            }
        }
    }

    /*
    Binds inlets to lakes by lake name (case-insensitive) and loads their
    observation series. An inlet naming an unknown lake stays unbound.
     */
    pub fn initialize_inlets(&mut self, lakes: &[Lake], inlets: &mut [Inlet]) {
        for list in self.inlets_for.iter_mut() {
            list.clear();
        }

        for (ii, inlet) in inlets.iter().enumerate() {
            match lakes.iter().position(|l| l.name.eq_ignore_ascii_case(&inlet.lake_name)) {
                Some(li) => {
                    self.inlets_for[li].push(ii);
                    info!("Assigned inlet {} to lake {}", inlet.name, inlet.lake_name);
                }
                None => {
                    warn!("Inlet {} references unknown lake {}", inlet.name,
                          inlet.lake_name);
                }
            }
        }

        for (li, lake) in lakes.iter().enumerate() {
            info!("Lake {} has {} inlets configured", lake.name,
                  self.inlets_for[li].len());
        }

        for inlet in inlets.iter_mut() {
            if let Err(e) = inlet.load_ts() {
                warn!("Could not load observations for inlet {}: {}", inlet.name, e);
            }
        }
    }

    /*
    Inflow to a lake at the current time. Bound inlets take precedence and
    compose additively; a NaN observation contributes nothing. Without
    inlets, the routed discharge at the upstream neighbours is averaged (each
    neighbour already carries its full upstream accumulation, so a sum would
    double-count). A lake with no neighbours falls back to the discharge at
    its own cell.
     */
    pub fn calculate_inflow(&self, lake_idx: usize, lakes: &[Lake],
                            inlets: &[Inlet], q: &[f64],
                            node_index: &HashMap<(usize, usize), usize>,
                            time: u64) -> f64 {
        if !self.inlets_for[lake_idx].is_empty() {
            let mut total = 0.0;
            for &ii in &self.inlets_for[lake_idx] {
                let observed = inlets[ii].get_observed(time);
                if !observed.is_nan() {
                    total += observed;
                }
            }
            return total;
        }

        let neighbors = &self.neighbors[lake_idx];
        if !neighbors.is_empty() {
            let mut inflow = 0.0;
            let mut count = 0;
            for &(nx, ny) in neighbors {
                if let Some(&ni) = node_index.get(&(nx, ny)) {
                    inflow += q[ni];
                    count += 1;
                }
            }
            return if count > 0 { inflow / count as f64 } else { 0.0 };
        }

        match lakes[lake_idx].node_idx {
            Some(ni) => q[ni],
            None => 0.0,
        }
    }

    /*
    Writes the lake-to-neighbour topology snapshot for the given time.
     */
    pub fn save_relationships(&self, lakes: &[Lake], current_time: u64,
                              state_path: &str) -> Result<()> {
        let filename = format!("{}/lake_relationships_{}.txt",
                               state_path, u64_to_stamp(current_time));

        let mut contents = String::new();
        contents.push_str("# Lake Relationships State File\n");
        contents.push_str(&format!("# Generated: {}\n",
                                   u64_to_iso_datetime_string(current_time)));
        contents.push_str("# Format: LakeName,NeighborX,NeighborY\n");
        for (li, lake) in lakes.iter().enumerate() {
            for &(nx, ny) in &self.neighbors[li] {
                contents.push_str(&format!("{},{},{}\n", lake.name, nx, ny));
            }
        }

        fs::write(Path::new(&filename), contents)?;
        info!("Lake relationships saved to {}", filename);
        Ok(())
    }

    /*
    Restores the topology snapshot written at begin_time. Returns false when
    no snapshot exists; the neighbours are then rediscovered from the grids.
     */
    pub fn load_relationships(&mut self, lakes: &[Lake], begin_time: u64,
                              state_path: &str) -> bool {
        let filename = format!("{}/lake_relationships_{}.txt",
                               state_path, u64_to_stamp(begin_time));
        let contents = match fs::read_to_string(Path::new(&filename)) {
            Ok(c) => c,
            Err(_) => {
                info!("Lake relationships state file not found: {}", filename);
                return false;
            }
        };

        for list in self.neighbors.iter_mut() {
            list.clear();
        }

        for (line_num, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split(',').collect();
            if fields.len() != 3 {
                warn!("Invalid format in line {}: {}", line_num + 1, line);
                continue;
            }
            let lake_idx = lakes.iter()
                .position(|l| l.name.eq_ignore_ascii_case(fields[0].trim()));
            let x = fields[1].trim().parse::<usize>();
            let y = fields[2].trim().parse::<usize>();
            match (lake_idx, x, y) {
                (Some(li), Ok(x), Ok(y)) => {
                    self.neighbors[li].push((x, y));
                }
                _ => {
                    warn!("Could not find lake '{}' or invalid cell in line {}",
                          fields[0], line_num + 1);
                }
            }
        }
        info!("Lake relationships loaded from {}", filename);
        true
    }

    /*
    Writes the storage and outflow state rasters for the given time. Each
    enabled lake contributes one cell; everything else is noData.
     */
    pub fn save_states(&self, lakes: &[Lake], dem: &FloatGrid, current_time: u64,
                       state_path: &str) -> Result<()> {
        let stamp = u64_to_stamp(current_time);
        let mut storage_grid: FloatGrid = Grid::new(
            dem.rows, dem.cols, dem.cell_size, dem.extent.left, dem.extent.top,
            dem.no_data, dem.no_data);
        let mut outflow_grid = storage_grid.clone();

        for lake in lakes.iter() {
            let (x, y) = match lake.cell {
                Some(cell) if lake.enabled => cell,
                _ => continue,
            };
            storage_grid.set(x, y, lake.storage_m3 as f32);
            outflow_grid.set(x, y, lake.outflow_m3s as f32);
        }

        let storage_file = format!("{}/lake_storage_{}.tif", state_path, stamp);
        let outflow_file = format!("{}/lake_outflow_{}.tif", state_path, stamp);
        write_float_tif_grid(&storage_file, &storage_grid)?;
        write_float_tif_grid(&outflow_file, &outflow_grid)?;
        info!("Lake states saved to {} and {}", storage_file, outflow_file);
        Ok(())
    }

    /*
    Restores lake storage and outflow from the state rasters written at
    begin_time. Every lake first gets the default state (storage at the
    threshold volume, no release); a raster that is missing, unreadable or
    spatially incompatible with the basic grids leaves the defaults in place.
     */
    pub fn load_states(&self, lakes: &mut [Lake], dem: &FloatGrid, begin_time: u64,
                       state_path: &str) {
        for lake in lakes.iter_mut() {
            lake.reset_state();
        }

        let stamp = u64_to_stamp(begin_time);
        let storage_file = format!("{}/lake_storage_{}.tif", state_path, stamp);
        let outflow_file = format!("{}/lake_outflow_{}.tif", state_path, stamp);

        match read_float_tif_grid(&storage_file) {
            Ok(grid) if grid.is_spatial_match(dem) => {
                for lake in lakes.iter_mut() {
                    if let Some((x, y)) = lake.cell {
                        if lake.enabled && !grid.is_no_data(x, y) {
                            lake.storage_m3 = grid.get(x, y) as f64;
                        }
                    }
                }
            }
            Ok(_) => {
                warn!("Lake storage state {} does not match the basic grids; using defaults",
                      storage_file);
            }
            Err(_) => {
                warn!("Lake storage state {} not found; using defaults", storage_file);
            }
        }

        match read_float_tif_grid(&outflow_file) {
            Ok(grid) if grid.is_spatial_match(dem) => {
                for lake in lakes.iter_mut() {
                    if let Some((x, y)) = lake.cell {
                        if lake.enabled && !grid.is_no_data(x, y) {
                            lake.outflow_m3s = grid.get(x, y) as f64;
                        }
                    }
                }
            }
            Ok(_) => {
                warn!("Lake outflow state {} does not match the basic grids; using defaults",
                      outflow_file);
            }
            Err(_) => {
                warn!("Lake outflow state {} not found; using defaults", outflow_file);
            }
        }
    }
}
