pub mod entities;
pub mod models;
pub mod services;
