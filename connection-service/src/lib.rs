//! Backend connection management for MySQL, Neo4j and MongoDB.

pub mod connector;
pub mod manager;

pub use connector::{BackendClient, Connector, DriverConnector};
pub use manager::{ConnectionHandle, ConnectionManager, HandleState};
