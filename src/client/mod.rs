pub mod api_base;
pub mod models;
pub mod quiz_client;
pub mod quiz_client_error;
