use crate::basin::gauge::Gauge;
use crate::basin::gauge_map::GaugeMap;
use crate::basin::grid_node::GridNode;
use crate::error::Result;
use crate::grid::{FlowDir, FloatGrid, GeographicProjection, LongGrid};
use log::{info, warn};
use std::collections::HashMap;

// Ring sample positions, clockwise from east.
const RING: [(i64, i64); 8] = [
    (1, 0), (1, 1), (0, 1), (-1, 1), (-1, 0), (-1, -1), (0, -1), (1, -1),
];

/*
Snaps a geographic point onto the channel network using the flow accumulation
grid. With an observed accumulation the search minimizes the squared error
against obs_fam scaled to cells, within a 20 km radius; without one it takes
the largest accumulation within 50 cells. Returns None when the point is
outside the grid extent.
 */
pub fn snap_to_fam(fam: &FloatGrid, proj: &GeographicProjection, lon: f64, lat: f64,
                   obs_fam: Option<f64>) -> Option<(usize, usize)> {
    let (x0, y0) = fam.grid_loc(lon, lat)?;

    match obs_fam {
        Some(obs) => {
            let cell_area_km2 = proj.area_m2(lon, lat) / 1e6;
            let target = obs / cell_area_km2;
            let cell_len = proj.len_m(lon, lat, FlowDir::North);
            let mut max_dist = (20000.0 / cell_len).round() as i64;
            if max_dist < 2 {
                max_dist = 2;
            }

            let mut best = (x0, y0);
            let mut best_err = if fam.is_no_data(x0, y0) {
                f64::INFINITY
            } else {
                (fam.get(x0, y0) as f64 - target).powi(2)
            };
            for dist in 1..max_dist {
                for (dx, dy) in RING {
                    let tx = x0 as i64 + dx * dist;
                    let ty = y0 as i64 + dy * dist;
                    if !fam.contains(tx, ty) {
                        continue;
                    }
                    let (tx, ty) = (tx as usize, ty as usize);
                    if fam.is_no_data(tx, ty) {
                        continue;
                    }
                    let err = (fam.get(tx, ty) as f64 - target).powi(2);
                    if err < best_err {
                        best_err = err;
                        best = (tx, ty);
                    }
                }
            }
            Some(best)
        }
        None => {
            let max_dist = 50;
            let mut best = (x0, y0);
            let mut best_fam = if fam.is_no_data(x0, y0) {
                f64::NEG_INFINITY
            } else {
                fam.get(x0, y0) as f64
            };
            for dist in 1..max_dist {
                for (dx, dy) in RING {
                    let tx = x0 as i64 + dx * dist;
                    let ty = y0 as i64 + dy * dist;
                    if !fam.contains(tx, ty) {
                        continue;
                    }
                    let (tx, ty) = (tx as usize, ty as usize);
                    if fam.is_no_data(tx, ty) {
                        continue;
                    }
                    let value = fam.get(tx, ty) as f64;
                    if value > best_fam {
                        best_fam = value;
                        best = (tx, ty);
                    }
                }
            }
            Some(best)
        }
    }
}

pub struct CarveResult {
    pub nodes: Vec<GridNode>,
    pub node_index: HashMap<(usize, usize), usize>,
    pub down_index: Vec<Option<usize>>,
}

/*
Carves the active node set out of the basin. Each gauge is snapped onto the
channel network, then the drainage direction grid is walked upstream from its
cell. A walk stops at the outlet cell of another gauge; that cell and its
catchment belong to the upstream gauge, and the nesting is recorded in the
gauge tree. The resulting nodes are ordered upstream-before-downstream so
routing can accumulate in a single pass.
 */
pub fn carve_basin(gauges: &mut [Gauge], ddm: &LongGrid, fam: &FloatGrid,
                   proj: &GeographicProjection, gauge_map: &mut GaugeMap)
                   -> Result<CarveResult> {
    // Snap every gauge first so outlet cells are known before walking
    let mut outlet_cells: HashMap<(usize, usize), usize> = HashMap::new();
    for (gi, gauge) in gauges.iter_mut().enumerate() {
        gauge.cell = snap_to_fam(fam, proj, gauge.lon, gauge.lat, gauge.obs_fam);
        match gauge.cell {
            Some((x, y)) => {
                info!("Gauge {} ({}, {}; {}, {}): FAM {}", gauge.name, gauge.lat,
                      gauge.lon, y, x, fam.get(x, y));
                outlet_cells.insert((x, y), gi);
            }
            None => {
                warn!("Gauge {} is outside the basic grid domain!", gauge.name);
            }
        }
    }

    // Walk upstream from each outlet, claiming cells for the owning gauge
    let mut claimed: HashMap<(usize, usize), usize> = HashMap::new();
    let mut claim_order: Vec<(usize, usize)> = vec![];
    let mut edges: Vec<(usize, usize)> = vec![]; //(downstream gauge, upstream gauge)

    for (gi, gauge) in gauges.iter().enumerate() {
        let outlet = match gauge.cell {
            Some(cell) => cell,
            None => continue,
        };
        let mut stack = vec![outlet];
        while let Some((x, y)) = stack.pop() {
            if claimed.contains_key(&(x, y)) {
                continue;
            }
            claimed.insert((x, y), gi);
            claim_order.push((x, y));

            for (dx, dy) in RING {
                let nx = x as i64 + dx;
                let ny = y as i64 + dy;
                if !ddm.contains(nx, ny) {
                    continue;
                }
                let (nx, ny) = (nx as usize, ny as usize);
                if ddm.is_no_data(nx, ny) {
                    continue;
                }
                let dir = FlowDir::from_code(ddm.get(nx, ny));
                if dir.inflow_offset() != Some((dx, dy)) {
                    continue;
                }
                // Neighbour drains into (x, y)
                match outlet_cells.get(&(nx, ny)) {
                    Some(&other) if other != gi => {
                        edges.push((gi, other));
                    }
                    _ => {
                        stack.push((nx, ny));
                    }
                }
            }
        }
    }

    // Build nodes in topological order (upstream first) regardless of the
    // order gauges were listed in
    let order = topological_order(&claim_order, &claimed, ddm);
    if order.len() != claim_order.len() {
        warn!("Drainage directions contain a cycle; {} cells dropped",
              claim_order.len() - order.len());
    }
    let mut nodes: Vec<GridNode> = Vec::with_capacity(order.len());
    let mut node_index: HashMap<(usize, usize), usize> = HashMap::new();
    for &(x, y) in &order {
        let (lon, lat) = fam.ref_loc(x, y);
        node_index.insert((x, y), nodes.len());
        nodes.push(GridNode {
            x,
            y,
            area_m2: proj.area_m2(lon, lat),
            gauge_idx: claimed[&(x, y)],
        });
    }

    let mut down_index: Vec<Option<usize>> = Vec::with_capacity(nodes.len());
    for node in &nodes {
        down_index.push(downstream_cell(node.x, node.y, ddm)
            .and_then(|cell| node_index.get(&cell).copied()));
    }

    // Record the gauge nesting, most-downstream gauges first, so the
    // incremental closure in the gauge tree sees edges in a valid order
    for (d, u) in order_edges(edges, gauges.len()) {
        gauge_map.add_upstream(d, u)?;
    }

    Ok(CarveResult { nodes, node_index, down_index })
}

/*
The cell this cell drains to, if its direction code points anywhere.
 */
pub fn downstream_cell(x: usize, y: usize, ddm: &LongGrid) -> Option<(usize, usize)> {
    if ddm.is_no_data(x, y) {
        return None;
    }
    let (dx, dy) = FlowDir::from_code(ddm.get(x, y)).downstream_offset()?;
    let tx = x as i64 + dx;
    let ty = y as i64 + dy;
    if !ddm.contains(tx, ty) {
        return None;
    }
    Some((tx as usize, ty as usize))
}

/*
Kahn ordering over the claimed cells: sources (no claimed upstream neighbour)
come out first, so every cell appears after all cells draining into it.
 */
fn topological_order(claim_order: &[(usize, usize)],
                     claimed: &HashMap<(usize, usize), usize>,
                     ddm: &LongGrid) -> Vec<(usize, usize)> {
    let mut in_degree: HashMap<(usize, usize), usize> = HashMap::new();
    for &cell in claim_order {
        in_degree.entry(cell).or_insert(0);
        if let Some(down) = downstream_cell(cell.0, cell.1, ddm) {
            if claimed.contains_key(&down) {
                *in_degree.entry(down).or_insert(0) += 1;
            }
        }
    }

    let mut queue: std::collections::VecDeque<(usize, usize)> = claim_order
        .iter()
        .filter(|cell| in_degree[cell] == 0)
        .copied()
        .collect();
    let mut order = Vec::with_capacity(claim_order.len());
    while let Some(cell) = queue.pop_front() {
        order.push(cell);
        if let Some(down) = downstream_cell(cell.0, cell.1, ddm) {
            if let Some(degree) = in_degree.get_mut(&down) {
                *degree -= 1;
                if *degree == 0 {
                    queue.push_back(down);
                }
            }
        }
    }
    order
}

/*
Orders the direct gauge-nesting edges so that every edge whose upstream gauge
is itself a downstream gauge of another edge comes before that other edge.
 */
fn order_edges(mut edges: Vec<(usize, usize)>, count_gauges: usize) -> Vec<(usize, usize)> {
    // Depth from the outlet: gauges that are not upstream of anything sit at
    // depth 0, a gauge directly upstream of depth n sits at depth n + 1
    let mut depth = vec![0usize; count_gauges];
    let mut changed = true;
    let mut rounds = 0;
    while changed && rounds <= count_gauges {
        changed = false;
        rounds += 1;
        for &(d, u) in &edges {
            if depth[u] < depth[d] + 1 {
                depth[u] = depth[d] + 1;
                changed = true;
            }
        }
    }
    edges.sort_by_key(|&(d, _u)| depth[d]);
    edges
}
