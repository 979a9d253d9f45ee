// This is the main module file for the `utilities` directory.
// It declares the small host and filesystem helpers shared by the rest of `libs`.

// `~` expansion and the well-known application paths.
pub mod path_helpers;
// Line-oriented text file helpers (profiles, ignore files).
pub mod file_operations;
// Invoking user, root detection, host addresses.
pub mod platform;
