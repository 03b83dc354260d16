// Config module
// Built-in profiles and YAML scenario files

pub mod profiles;
pub mod scenario_file;

pub use profiles::Profile;
pub use scenario_file::ScenarioFile;
