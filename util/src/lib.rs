pub mod envelope;
pub mod error;
pub mod reply;
pub mod soap;
pub mod transport;
pub mod value;
pub mod xml;

pub use reply::{Object, Reply, Scalar};
pub use soap::{BoundPort, Client};
pub use transport::{HttpRequest, RawResponse, ReqwestTransport, Transport, TransportLoader};
pub use value::{Arguments, Value};
