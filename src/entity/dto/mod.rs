pub mod panel_values_dto;
pub mod panel_status_dto;
