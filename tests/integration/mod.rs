//! Integration tests for meshfs

mod cli_client;
mod replication;
mod rmi_transport;
mod scenarios;
mod support;
