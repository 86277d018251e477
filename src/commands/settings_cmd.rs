use crate::models::settings::EvaluatorSettings;
use crate::AppState;

pub fn get_settings(state: &AppState) -> Result<EvaluatorSettings, String> {
    state.db.load_settings().map_err(|e| e.to_string())
}

/// 保存后下次启动生效
pub fn save_settings(state: &AppState, settings: EvaluatorSettings) -> Result<(), String> {
    state.db.save_settings(&settings).map_err(|e| e.to_string())
}
