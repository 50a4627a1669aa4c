// src/constants.rs

/// The name of the directory whose presence marks a project root.
pub const OMEGA_DIR: &str = ".omega";

/// The name of the JSON configuration file (comments allowed).
pub const CONFIG_FILENAME: &str = "omega.json";

/// The name of the language/messages file.
pub const LANGUAGE_FILENAME: &str = "language.json";

/// The default name of the environment file, stored at the project root.
pub const ENV_FILENAME: &str = "env.js";

/// The assignment written in front of the serialized environment.
pub const ENV_FILE_PREAMBLE: &str = "module.exports = ";

/// Environment variable overriding the installation root.
pub const OMEGA_HOME_ENV: &str = "OMEGA_HOME";

/// Project templates live under `<installation root>/templates/projects/`.
pub const TEMPLATES_DIR: &str = "templates";
pub const PROJECT_TEMPLATES_DIR: &str = "projects";

/// Environment name used when no stage or profile is configured.
pub const DEFAULT_ENV_NAME: &str = "default";

/// Maximum nesting of deploy targets that reference other targets.
pub const MAX_SEQUENCE_DEPTH: u32 = 16;

// Markers in the `serverless deploy -v` console report. They are a text contract
// with that tool's output format; another backend tool needs its own markers.
pub const API_KEYS_MARKER: &str = "api keys:";
pub const ENDPOINTS_MARKER: &str = "endpoints:";
pub const FUNCTIONS_MARKER: &str = "functions:";
pub const SERVICE_ENDPOINT_MARKER: &str = "ServiceEndpoint:";
