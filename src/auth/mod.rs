//! Account credentials for the ArcGIS server and portal

pub mod credentials;

pub use credentials::Credentials;
