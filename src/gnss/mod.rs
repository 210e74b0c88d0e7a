/// Functionality shared by all systems: replica generation and the acquisition engine
pub mod common;

pub mod galileo_e1;
pub mod gps_l1_ca;
