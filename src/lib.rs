//! PV power polling with day/year energy accounting.

pub mod accounting;
pub mod config;
pub mod controller;
pub mod domain;
pub mod emoncms;
pub mod hardware;
pub mod metering;
pub mod repo;
pub mod telemetry;
