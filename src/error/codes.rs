/// Error code registry for quixforge
///
/// Error codes are organized by category:
/// - 1000-1999: Configuration errors
/// - 2000-2999: Session errors
/// - 3000-3999: Storage (cache) errors
/// - 4000-4999: Execution errors
/// - 5000-5999: Workflow errors
/// - 6000-6999: Platform API errors
/// - 7000-7999: Validation errors
/// - 9000-9999: Other errors
pub struct ErrorCode;

impl ErrorCode {
    // Configuration errors (1000-1999)
    pub const CONFIG_GENERIC: u16 = 1000;
    pub const CONFIG_NOT_FOUND: u16 = 1001;
    pub const CONFIG_INVALID_YAML: u16 = 1002;
    pub const CONFIG_MISSING_REQUIRED: u16 = 1004;
    pub const CONFIG_INVALID_VALUE: u16 = 1005;
    pub const CONFIG_MANIFEST_INVALID: u16 = 1010;

    // Session errors (2000-2999)
    pub const SESSION_NOT_FOUND: u16 = 2001;
    pub const SESSION_START_FAILED: u16 = 2002;
    pub const SESSION_NOT_READY: u16 = 2003;

    // Storage errors (3000-3999)
    pub const STORAGE_IO_ERROR: u16 = 3001;
    pub const STORAGE_SERIALIZATION_ERROR: u16 = 3011;
    pub const STORAGE_DESERIALIZATION_ERROR: u16 = 3012;

    // Execution errors (4000-4999)
    pub const EXEC_GENERIC: u16 = 4000;
    pub const EXEC_COMMAND_NOT_FOUND: u16 = 4001;
    pub const EXEC_TIMEOUT: u16 = 4002;
    pub const EXEC_SUBPROCESS_FAILED: u16 = 4003;
    pub const EXEC_GENERATOR_OVERLOADED: u16 = 4011;
    pub const EXEC_GENERATOR_FAILED: u16 = 4012;

    // Workflow errors (5000-5999)
    pub const WORKFLOW_GENERIC: u16 = 5000;
    pub const WORKFLOW_CANCELLED: u16 = 5006;
    pub const WORKFLOW_NAVIGATE_BACK: u16 = 5013;

    // Platform API errors (6000-6999)
    pub const PLATFORM_GENERIC: u16 = 6000;
    pub const PLATFORM_UNAUTHORIZED: u16 = 6001;
    pub const PLATFORM_NOT_FOUND: u16 = 6002;
    pub const PLATFORM_RATE_LIMITED: u16 = 6003;
    pub const PLATFORM_UNAVAILABLE: u16 = 6004;
    pub const PLATFORM_BAD_RESPONSE: u16 = 6005;
    pub const PLATFORM_TRANSPORT: u16 = 6006;

    // Validation errors (7000-7999)
    pub const VALIDATION_REQUIRED_FIELD: u16 = 7001;

    // Other errors (9000-9999)
    pub const OTHER_GENERIC: u16 = 9000;
}

/// Get a human-readable description for an error code
pub fn describe_error_code(code: u16) -> &'static str {
    match code {
        // Configuration errors
        1000 => "Generic configuration error",
        1001 => "Configuration file not found",
        1002 => "Invalid YAML syntax in configuration",
        1004 => "Required configuration field is missing",
        1005 => "Invalid value in configuration",
        1010 => "Application manifest (app.yaml) is invalid",

        // Session errors
        2001 => "Remote IDE session not found",
        2002 => "Remote IDE session could not be started",
        2003 => "Remote IDE session did not become ready",

        // Storage errors
        3001 => "Cache I/O error",
        3011 => "Failed to serialize cache record",
        3012 => "Failed to deserialize cache record",

        // Execution errors
        4000 => "Generic execution error",
        4001 => "Command not found",
        4002 => "Execution timed out",
        4003 => "Subprocess failed",
        4011 => "Code generation service is overloaded",
        4012 => "Code generation failed",

        // Workflow errors
        5000 => "Generic workflow error",
        5006 => "Workflow was cancelled by the user",
        5013 => "User navigated back to the previous step",

        // Platform errors
        6000 => "Generic platform API error",
        6001 => "Platform token is missing or invalid",
        6002 => "Platform resource not found",
        6003 => "Platform API rate limit exceeded",
        6004 => "Platform API temporarily unavailable",
        6005 => "Platform API returned an unexpected response",
        6006 => "Could not reach the platform API",

        // Validation errors
        7001 => "Required field is missing",

        // Other errors
        9000 => "Generic error",

        _ => "Unknown error code",
    }
}
