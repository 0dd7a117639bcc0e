pub mod lcoe;
pub mod sensitivity;
