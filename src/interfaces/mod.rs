// HTTP prediction endpoints
pub mod http;
