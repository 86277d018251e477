use crate::models::report::{DeepReport, EvaluationRun, ScreenReport, ScreenRequest};
use crate::models::sector::ConceptSummary;
use crate::AppState;

/// 单只股票详细报告
pub async fn evaluate_code(state: &AppState, code: String) -> Result<DeepReport, String> {
    state.evaluator.deep_report(&code).await.map_err(|e| format!("{:#}", e))
}

/// 批量筛选并记录历史
pub async fn screen(state: &AppState, request: ScreenRequest) -> Result<ScreenReport, String> {
    let report = state.evaluator.run_screen(&request).await.map_err(|e| format!("{:#}", e))?;
    if let Err(e) = state.db.save_run(&report) {
        log::warn!("评估记录保存失败: {}", e);
    }
    Ok(report)
}

pub async fn screen_by_board(
    state: &AppState,
    boards: Vec<String>,
    top_n: Option<usize>,
) -> Result<ScreenReport, String> {
    screen(state, ScreenRequest { boards, concepts: vec![], top_n }).await
}

pub async fn screen_by_concept(
    state: &AppState,
    concepts: Vec<String>,
    top_n: Option<usize>,
) -> Result<ScreenReport, String> {
    screen(state, ScreenRequest { boards: vec![], concepts, top_n }).await
}

/// 全部概念板块（按成分股数降序）
pub async fn list_concepts(state: &AppState) -> Result<Vec<ConceptSummary>, String> {
    let catalog = state.evaluator.catalog().await.map_err(|e| format!("{:#}", e))?;
    Ok(catalog.list_concepts())
}

pub fn recent_runs(state: &AppState, limit: usize) -> Result<Vec<EvaluationRun>, String> {
    state.db.recent_runs(limit).map_err(|e| e.to_string())
}
