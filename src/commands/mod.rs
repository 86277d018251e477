pub mod evaluate_cmd;
pub mod settings_cmd;
