pub use gauge::Gauge;
pub use gauge_map::GaugeMap;
pub use grid_node::GridNode;

//List all the submodules here
pub mod carve;
pub mod gauge;
pub mod gauge_map;
pub mod grid_node;
