pub mod update;
pub mod week;
