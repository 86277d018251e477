use serde::{Deserialize, Serialize};

use super::flow::{CapitalFlowRecord, FlowMode, FlowWindowSummary};
use super::sector::SectorAssignment;
use super::score::ScoredInstrument;

/// 批量筛选请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScreenRequest {
    #[serde(default)]
    pub boards: Vec<String>,
    #[serde(default)]
    pub concepts: Vec<String>,
    #[serde(default)]
    pub top_n: Option<usize>,
}

/// 概念筛选排名行（龙头优选）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptRankRow {
    pub instrument: ScoredInstrument,
    pub matched_keywords: Vec<String>,
    pub keyword_bonus: i32,
    pub board_bonus: i32,
    pub density_bonus: i32,
    pub product_bonus: i32,
    pub alpha: i32,
}

/// 单个关键词的匹配统计
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordStat {
    pub keyword: String,
    pub matched: usize,
    pub avg_alpha: Option<f64>,
    pub best: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptRanking {
    pub keywords: Vec<String>,
    pub rows: Vec<ConceptRankRow>,
    pub keyword_stats: Vec<KeywordStat>,
}

/// 批量评估结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenReport {
    pub request: ScreenRequest,
    pub flow_mode: FlowMode,
    pub universe_size: usize,
    pub evaluated: usize,
    #[serde(default)]
    pub unknown_boards: Vec<String>,
    /// 按总分降序（截取 top_n）
    pub ranked: Vec<ScoredInstrument>,
    pub buy_list: Vec<ScoredInstrument>,
    pub sell_list: Vec<ScoredInstrument>,
    pub total_buy: usize,
    pub total_sell: usize,
    #[serde(default)]
    pub concept_ranking: Option<ConceptRanking>,
    pub as_of: Option<String>,
}

/// 单只股票详细报告
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeepReport {
    pub instrument: ScoredInstrument,
    pub assignments: Vec<SectorAssignment>,
    pub flow_rows: Vec<CapitalFlowRecord>,
    pub flow_windows: Vec<FlowWindowSummary>,
}

/// 历史评估记录
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRun {
    pub id: String,
    pub created_at: String,
    pub request: ScreenRequest,
    pub flow_mode: FlowMode,
    pub evaluated: usize,
    pub top: Vec<ScoredInstrument>,
}
