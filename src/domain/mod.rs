pub mod audit;
pub mod boot;
pub mod clock;
pub mod cluster;
pub mod identity;
pub mod persistence;
pub mod reservation;
pub mod schedule;
pub mod scheduler;
pub mod utils;
pub mod vlan;
