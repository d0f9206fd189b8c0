pub mod config;
pub mod subtract;
pub mod tiles;
