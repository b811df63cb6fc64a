mod lookup;
mod workspace;

pub use lookup::lookup_status;
pub use workspace::{resolve_data_path, resolve_logs_path, Error, Result};
