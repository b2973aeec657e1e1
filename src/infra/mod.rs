// Adapters for the ports in `app`
pub mod http_client;
