pub mod commit;
pub mod config;
pub mod draft;
pub mod fake_gateway;
pub mod gateway;
pub mod http_client;
pub mod lock;
pub mod model;
pub mod session;
pub mod standings;
