pub mod config;
pub mod exception;
pub mod param;
pub mod reader;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod static_files;
pub mod util;

pub use config::Config;
pub use exception::Exception;
pub use request::Request;
pub use response::ResponseWriter;
pub use router::{Handler, Router};
pub use server::{ConnectionGauge, ConnectionOutcome, Server};
