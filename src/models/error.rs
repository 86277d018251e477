/// 结构性错误：出现即终止本轮评估。逐只股票的数据缺失不走这里
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("{table} 缺少必需字段: {}", missing.join(", "))]
    MissingColumns { table: String, missing: Vec<String> },
    #[error("股票池规模在评估中途变化: {expected} -> {actual}")]
    UniverseSizeChanged { expected: usize, actual: usize },
    #[error("未找到股票: {0}")]
    InstrumentNotFound(String),
    #[error("无法识别的证券代码: {0}")]
    InvalidCode(String),
}
