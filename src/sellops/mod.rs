pub mod autopsy;
pub mod controller;
pub mod trailing;

pub use controller::SellOpsController;
