use crate::grid::flow::FlowDir;

// Authalic earth radius in metres.
const EARTH_RADIUS_M: f64 = 6_371_007.2;

/*
Cell geometry for grids in geographic (degree) coordinates. Distances between
adjacent cell centres shrink east-west with the cosine of latitude; these feed
the snapping search radius and the FAM-to-drainage-area scaling.
 */
#[derive(Clone, Debug)]
pub struct GeographicProjection {
    cell_size: f64, //degrees
}

impl GeographicProjection {
    pub fn new(cell_size: f64) -> GeographicProjection {
        GeographicProjection { cell_size }
    }

    /*
    Real-world distance in metres between the centres of two adjacent cells in
    the given compass direction, at the given location.
     */
    pub fn len_m(&self, _lon: f64, lat: f64, dir: FlowDir) -> f64 {
        let ns = self.cell_size.to_radians() * EARTH_RADIUS_M;
        let ew = ns * lat.to_radians().cos();
        match dir {
            FlowDir::North | FlowDir::South => ns,
            FlowDir::East | FlowDir::West => ew,
            FlowDir::Sink => 0.0,
            _ => (ns * ns + ew * ew).sqrt(),
        }
    }

    /*
    Cell area in square metres at the given location.
     */
    pub fn area_m2(&self, lon: f64, lat: f64) -> f64 {
        self.len_m(lon, lat, FlowDir::North) * self.len_m(lon, lat, FlowDir::East)
    }
}
