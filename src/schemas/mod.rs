// Data shapes shared between the loaders, the installers and the commands.

// Descriptor of one managed service (install, configure, verify, teardown).
pub mod managed_service;
// Directories and names of a scaffolded project.
pub mod project_layout;
// Validated settings and their typed per-section views.
pub mod settings;
