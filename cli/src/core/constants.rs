// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "segcompose";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".segcompose";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "segcompose.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "SEGCOMPOSE_CONFIG";

// =============================================================================
// Environment Variables
// =============================================================================

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "SEGCOMPOSE_LOG";

/// Environment variable for the query backend
pub const ENV_BACKEND: &str = "SEGCOMPOSE_BACKEND";

/// Environment variable for the composed segment nesting limit
pub const ENV_MAX_DEPTH: &str = "SEGCOMPOSE_MAX_DEPTH";

// =============================================================================
// Input
// =============================================================================

/// Path argument meaning "read from stdin"
pub const STDIN_PATH: &str = "-";
