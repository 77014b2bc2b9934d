//! Layered configuration.
//!
//! Values are merged field by field from, lowest priority first:
//! 1. **Defaults** - compiled in
//! 2. **Project** - `./.rudo/config.yaml`
//! 3. **User** - `$XDG_DATA_HOME/rudo/config.yaml`
//! 4. **Environment** - `RUDO_DB_PATH`, `RUDO_LOG_LEVEL`
//!
//! `RUDO_CONFIG_PATH` (or `--config`) names a single file used instead of the
//! project and user tiers. `RUDO_USER_DIR` and `RUDO_PROJECT_DIR` move the
//! tier directories.

mod loader;
mod merge;
mod types;

pub use loader::{ConfigLoader, ConfigPaths, ConfigTier};
pub use merge::{deep_merge, deep_merge_all, lookup};
pub use types::*;
