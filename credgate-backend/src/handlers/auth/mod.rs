pub mod dto;
pub mod login;
pub mod update_login;
