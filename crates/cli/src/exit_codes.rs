//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! | Code | Meaning                                                        |
//! |------|----------------------------------------------------------------|
//! | 0    | Success; no pole failed QC                                     |
//! | 1    | QC failed on at least one pole, or `--strict` found differences |
//! | 2    | CLI usage error (bad args)                                     |
//! | 3    | File could not be read or written                              |
//! | 4    | Input JSON or edit overlay could not be parsed                 |
//! | 5    | Invalid configuration                                          |
//! | 6    | Input parsed but holds no recognizable pole structure          |

/// Success - command completed, nothing failed.
pub const EXIT_SUCCESS: u8 = 0;

/// At least one pole has an overall FAIL status (`check`).
pub const EXIT_QC_FAILED: u8 = 1;

/// Span or fiber differences found and `--strict` was given.
/// Like `diff(1)`, exit 1 means "designs differ."
pub const EXIT_DIFFS: u8 = 1;

/// Usage error - bad arguments, missing required options.
pub const EXIT_USAGE: u8 = 2;

/// Reading an input file or writing an output file failed.
pub const EXIT_IO: u8 = 3;

/// Top-level JSON, fiber map or overlay is not parseable.
pub const EXIT_PARSE: u8 = 4;

/// Config TOML failed to parse or validate.
pub const EXIT_CONFIG: u8 = 5;

/// JSON parsed but none of the known pole data shapes matched.
pub const EXIT_UNRECOGNIZED: u8 = 6;
