pub mod bus;
pub mod focus;
pub mod listeners;
pub mod registry;
