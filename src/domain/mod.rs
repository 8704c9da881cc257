// Domain layer: table rows, ports (interfaces) and pure business rules.

pub mod model;
pub mod ports;

pub mod services;
