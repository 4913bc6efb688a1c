pub mod actuator;
pub mod api;
pub mod config;
pub mod controller;
pub mod decision_log;
pub mod domain;
pub mod engine;
pub mod providers;
pub mod telemetry;
