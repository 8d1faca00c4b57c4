// Library for tests to access modules

pub mod api_repo;
pub mod config;
pub mod drilldown;
pub mod error;
pub mod models;
pub mod poller;
pub mod routes;
pub mod store;
pub mod topology;
pub mod version;
