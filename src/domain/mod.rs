// Domain layer: documents and the ports the catalog talks to.

pub mod model;
pub mod ports;
