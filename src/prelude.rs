//! Convenience re-exports for the binary and for tests.

pub use crate::auth::{AuthBackend, InMemoryAuthBackend};
pub use crate::config::{AppConfig, ConfigError, FromYaml, display_config, validate_config};
pub use crate::error::{Result, ServerError};
pub use crate::http::{HttpConn, HttpRequest, HttpResponse, Method};
pub use crate::log::{AsyncLog, Level};
pub use crate::reactor::Reactor;
pub use crate::{debug, error, info, trace, warn};
