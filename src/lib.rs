// Library surface for headless/integration tests and reuse.
// Keep this lean to avoid coupling to bin-only types in main.rs.
pub mod app_dirs;
pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod metric;
pub mod protocol;
pub mod recording;
pub mod recovery;
pub mod report;
pub mod runtime;
pub mod session;
pub mod timer;
pub mod view;
pub mod window;

pub use error::{SessionError, ValidationError};
pub use metric::MetricKey;
pub use protocol::{Preset, Protocol};
pub use session::Session;
pub use timer::{Notice, Phase};
