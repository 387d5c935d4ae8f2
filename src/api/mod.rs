pub mod config_dto;
pub mod state_dto;
