pub mod pipeline;
pub mod transport;

pub use pipeline::{Emissions, Pipeline};
pub use transport::{ReqwestTransport, Transport, TransportError};
