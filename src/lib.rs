//! citygraph - cached OpenStreetMap road graphs, buildings and geocoding behind an HTTP API

pub mod api;
pub mod cache;
pub mod config;
pub mod domain;
pub mod geocode;
pub mod osm;
pub mod server;
pub mod service;
