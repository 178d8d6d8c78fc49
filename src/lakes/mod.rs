pub use inlet::Inlet;
pub use lake::Lake;
pub use lake_map::LakeMap;

//List all the submodules here
pub mod inlet;
pub mod lake;
pub mod lake_map;
