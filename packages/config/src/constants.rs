// ABOUTME: Environment variable name constants
// ABOUTME: Centralized definitions of all environment variable names used across Crowbox

// Sandbox Engine
pub const CROWBOX_BASE_ROOT: &str = "CROWBOX_BASE_ROOT";
pub const CROWBOX_NAMESPACE: &str = "CROWBOX_NAMESPACE";
pub const CROWBOX_PUBLIC_HOST: &str = "CROWBOX_PUBLIC_HOST";
pub const CROWBOX_BASE_IMAGE: &str = "CROWBOX_BASE_IMAGE";
pub const CROWBOX_BASELINE_IMAGE: &str = "CROWBOX_BASELINE_IMAGE";

// Deadlines
pub const CROWBOX_COMMAND_TIMEOUT_SECS: &str = "CROWBOX_COMMAND_TIMEOUT_SECS";
pub const CROWBOX_BUILD_TIMEOUT_SECS: &str = "CROWBOX_BUILD_TIMEOUT_SECS";
pub const CROWBOX_SCRIPT_TIMEOUT_SECS: &str = "CROWBOX_SCRIPT_TIMEOUT_SECS";

// Cleanup Scheduler
pub const CROWBOX_SWEEP_AT: &str = "CROWBOX_SWEEP_AT";

// API Server
pub const CROWBOX_API_HOST: &str = "CROWBOX_API_HOST";
pub const CROWBOX_API_PORT: &str = "CROWBOX_API_PORT";
pub const PORT: &str = "PORT"; // Legacy
pub const CROWBOX_CORS_ORIGIN: &str = "CROWBOX_CORS_ORIGIN";

// Persistence
pub const CROWBOX_DATABASE_URL: &str = "CROWBOX_DATABASE_URL";
