pub mod controller;
pub mod error;
pub mod models;
pub mod state;
pub mod toast;
