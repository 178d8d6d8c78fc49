/*
One active cell of the simulation. Nodes are kept in an arena vector in
topological carve order (upstream before downstream); the owning gauge is a
stable index into the gauge vector, never an owning handle.
 */
#[derive(Clone, Debug)]
pub struct GridNode {
    pub x: usize,
    pub y: usize,
    pub area_m2: f64,
    pub gauge_idx: usize,
}
