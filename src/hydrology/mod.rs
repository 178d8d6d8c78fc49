//List all the submodules here
pub mod routing;
pub mod water_balance;
