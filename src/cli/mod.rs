//! CLI command handling

pub mod check_config;
pub mod output;
pub mod render;
pub mod run;
pub mod script;
pub mod speaker;

pub use check_config::*;
pub use output::*;
pub use render::*;
pub use run::*;
pub use script::{parse_script, ScriptStep};
pub use speaker::{LoggingSpeech, PlaybackEvent};
