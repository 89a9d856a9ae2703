pub mod escape;
pub mod params;
