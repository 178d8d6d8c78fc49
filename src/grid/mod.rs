pub use flow::FlowDir;
pub use grid::{Extent, FloatGrid, Grid, LongGrid};
pub use projection::GeographicProjection;

//List all the submodules here
pub mod flow;
pub mod grid;
pub mod projection;
