//! exit codes for deskrules commands
//!
//! 0 is success, everything else an error. the specific codes let scripts
//! tell a dry-run without matches apart from a broken rule file

/// general or unknown error
pub const ERROR: i32 = 1;

/// `rules check`: no rule matched the window
pub const NO_MATCH: i32 = 2;

/// rule file unreadable, malformed or has problems
pub const RULES_ERROR: i32 = 3;

/// invalid command-line arguments
pub const INVALID_ARGS: i32 = 4;

/// configuration file error
pub const CONFIG_ERROR: i32 = 5;
