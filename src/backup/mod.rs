pub mod archive;
pub mod backup_config;
pub mod database;
pub mod delivery;
pub mod finish;
pub mod orchestrator;
pub mod redacted;
pub mod result_error;
pub mod rules;
pub mod validate;

macro_rules! function_path {
    () => {
        concat!(module_path!(), "::", function_name!(), " ", file!(), ":", line!())
    };
}

pub(crate) use function_path;
