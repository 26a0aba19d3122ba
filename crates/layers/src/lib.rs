//! Presentation side of the atlas: the clustering pass for the flat map, the
//! render-surface seam and the two view adapters that draw through it.

pub mod cluster;
pub mod flat;
pub mod globe;
pub mod layer;
pub mod picking;
pub mod surface;
pub mod symbology;
pub mod viewport;

pub use cluster::*;
pub use flat::FlatAdapter;
pub use globe::GlobeAdapter;
pub use layer::*;
pub use surface::*;
pub use symbology::*;
pub use viewport::FlatViewport;
