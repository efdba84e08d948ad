pub mod connection;
pub mod error;
pub mod filters;
pub mod gateway;
pub mod info;
pub mod load;
pub mod player;
pub mod track;
