// Command-line surface: argument definitions and the value enums they use.
pub mod cmd_enums;
pub mod type_enums;
