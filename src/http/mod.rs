pub mod connection;
pub mod request;
pub mod response;

pub use connection::{HttpConn, ProcessOutcome, ReadStatus, SharedAuth};
pub use request::{HttpRequest, Method, ParseOutcome, ParseState};
pub use response::HttpResponse;
