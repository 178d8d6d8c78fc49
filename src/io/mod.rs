//List all the submodules here
pub mod control_io;
pub mod csv_io;
pub mod tif_grid;
