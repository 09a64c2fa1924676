pub mod analysis;
pub mod config;
pub mod locale;
pub mod model;
pub mod notify;
pub mod report;
pub mod routes;
