use crate::basin::carve::{carve_basin, downstream_cell, snap_to_fam};
use crate::basin::{Gauge, GaugeMap};
use crate::grid::{FlowDir, GeographicProjection, Grid};

// A 5x5 domain with a single channel along row 2, draining west to the
// outlet at (0,2). Cells off the channel carry no direction data.
fn channel_grids() -> (Grid<i64>, Grid<f32>) {
    let mut ddm: Grid<i64> = Grid::new(5, 5, 1.0, 0.0, 5.0, -9999, -9999);
    for x in 1..5usize {
        ddm.set(x, 2, FlowDir::East.to_code()); //each cell drains to (x-1, 2)
    }
    ddm.set(0, 2, 0); //sink at the outlet

    let mut fam: Grid<f32> = Grid::new(5, 5, 1.0, 0.0, 5.0, -9999.0, 1.0);
    for x in 0..5usize {
        fam.set(x, 2, (5 - x) as f32); //accumulation grows downstream
    }
    (ddm, fam)
}


/*
Max-FAM snapping: a flat accumulation field with one channel cell nearby
pulls the point onto that cell.
 */
#[test]
fn test_snap_max_fam() {
    let proj = GeographicProjection::new(1.0);
    let mut fam: Grid<f32> = Grid::new(10, 10, 1.0, 0.0, 10.0, -9999.0, 1.0);
    fam.set(3, 4, 100.0);

    //A point in cell (3,3), one cell north of the channel
    let (lon, lat) = fam.ref_loc(3, 3);
    assert_eq!(snap_to_fam(&fam, &proj, lon, lat, None), Some((3, 4)));

    //Out of extent fails
    assert_eq!(snap_to_fam(&fam, &proj, -5.0, 5.0, None), None);
}


/*
Observed-FAM snapping minimizes the squared accumulation error, and the
snapped cell stays within the search radius of the initial cell.
 */
#[test]
fn test_snap_observed_fam() {
    let proj = GeographicProjection::new(1.0);
    let mut fam: Grid<f32> = Grid::new(10, 10, 1.0, 0.0, 10.0, -9999.0, 1.0);
    fam.set(4, 3, 50.0);
    fam.set(2, 3, 500.0);

    let (lon, lat) = fam.ref_loc(3, 3);
    //Observed accumulation worth 50 cells, given in km2
    let obs_fam = 50.0 * proj.area_m2(lon, lat) / 1e6;
    let snapped = snap_to_fam(&fam, &proj, lon, lat, Some(obs_fam)).unwrap();
    assert_eq!(snapped, (4, 3));

    //With one-degree cells the radius collapses to the minimum of 2 rings,
    //so the snapped cell is within Chebyshev distance 2 of the start
    let max_dist = 2i64;
    assert!((snapped.0 as i64 - 3).abs() <= max_dist);
    assert!((snapped.1 as i64 - 3).abs() <= max_dist);
}


/*
Carving a single-gauge channel claims the whole chain, orders it upstream
first, and chains the downstream indices to the outlet.
 */
#[test]
fn test_carve_single_gauge() {
    let (ddm, fam) = channel_grids();
    let proj = GeographicProjection::new(1.0);

    let (lon, lat) = fam.ref_loc(0, 2);
    let mut gauges = vec![Gauge::new("outlet", lat, lon)];
    let mut gauge_map = GaugeMap::initialize(&gauges);

    let carve = carve_basin(&mut gauges, &ddm, &fam, &proj, &mut gauge_map).unwrap();
    assert_eq!(gauges[0].cell, Some((0, 2)));
    assert_eq!(carve.nodes.len(), 5);

    //Upstream before downstream: the headwater comes first, the outlet last
    assert_eq!((carve.nodes[0].x, carve.nodes[0].y), (4, 2));
    assert_eq!((carve.nodes[4].x, carve.nodes[4].y), (0, 2));

    //Every node drains to the next one along the channel
    for i in 0..4 {
        let down = carve.down_index[i].unwrap();
        assert_eq!(carve.nodes[down].x, carve.nodes[i].x - 1);
    }
    assert_eq!(carve.down_index[4], None); //the outlet is a sink

    for node in &carve.nodes {
        assert!(node.area_m2 > 0.0);
        assert_eq!(node.gauge_idx, 0);
    }
}


/*
A nested gauge splits the chain: its catchment belongs to it, and the
nesting is recorded in the gauge tree regardless of declaration order.
 */
#[test]
fn test_carve_nested_gauges() {
    let (ddm, fam) = channel_grids();
    let proj = GeographicProjection::new(1.0);

    //The upstream gauge is declared first to exercise order independence
    let (lon_up, lat_up) = fam.ref_loc(2, 2);
    let (lon_out, lat_out) = fam.ref_loc(0, 2);
    let cell_area_km2 = proj.area_m2(lon_up, lat_up) / 1e6;
    let mut upstream = Gauge::new("upstream", lat_up, lon_up);
    //Pin the upstream gauge to its cell through its observed accumulation
    upstream.obs_fam = Some(3.0 * cell_area_km2);
    let mut outlet = Gauge::new("outlet", lat_out, lon_out);
    outlet.obs_fam = Some(5.0 * proj.area_m2(lon_out, lat_out) / 1e6);

    let mut gauges = vec![upstream, outlet];
    let mut gauge_map = GaugeMap::initialize(&gauges);
    let carve = carve_basin(&mut gauges, &ddm, &fam, &proj, &mut gauge_map).unwrap();

    assert_eq!(gauges[0].cell, Some((2, 2)));
    assert_eq!(gauges[1].cell, Some((0, 2)));
    assert_eq!(carve.nodes.len(), 5);

    //Cells at and above (2,2) belong to the upstream gauge
    for node in &carve.nodes {
        let expected = if node.x >= 2 { 0 } else { 1 };
        assert_eq!(node.gauge_idx, expected, "cell ({},{})", node.x, node.y);
    }

    //The nesting is in the tree
    assert_eq!(gauge_map.upstream_of(1), &[0]);
    assert!(gauge_map.upstream_of(0).is_empty());
}


#[test]
fn test_downstream_cell() {
    let (ddm, _fam) = channel_grids();
    assert_eq!(downstream_cell(3, 2, &ddm), Some((2, 2)));
    assert_eq!(downstream_cell(0, 2, &ddm), None); //sink
    assert_eq!(downstream_cell(0, 0, &ddm), None); //noData
}
