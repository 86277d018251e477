use serde::{Deserialize, Serialize};

/// 评估参数（存于 settings 表，命令行参数可覆盖）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatorSettings {
    /// 股票池不超过该数量时逐只获取主力资金明细，否则使用量价代理
    #[serde(default = "default_detailed_flow_limit")]
    pub detailed_flow_limit: usize,
    /// 资金流向回看天数
    #[serde(default = "default_flow_days")]
    pub flow_days: usize,
    /// 资金流向并发请求数
    #[serde(default = "default_fetch_concurrency")]
    pub fetch_concurrency: usize,
    #[serde(default = "default_top_n")]
    pub top_n: usize,
    /// 技术面评分最少K线数
    #[serde(default = "default_min_rows")]
    pub min_rows: usize,
    /// 日K线拉取条数
    #[serde(default = "default_kline_days")]
    pub kline_days: usize,
    /// 板块归属表单页条数
    #[serde(default = "default_sector_page_size")]
    pub sector_page_size: usize,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_detailed_flow_limit() -> usize { 500 }
fn default_flow_days() -> usize { 10 }
fn default_fetch_concurrency() -> usize { 8 }
fn default_top_n() -> usize { 30 }
fn default_min_rows() -> usize { 60 }
fn default_kline_days() -> usize { 120 }
fn default_sector_page_size() -> usize { 5000 }
fn default_max_retries() -> u32 { 2 }

impl Default for EvaluatorSettings {
    fn default() -> Self {
        Self {
            detailed_flow_limit: 500,
            flow_days: 10,
            fetch_concurrency: 8,
            top_n: 30,
            min_rows: 60,
            kline_days: 120,
            sector_page_size: 5000,
            max_retries: 2,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_fields_take_defaults() {
        let s: EvaluatorSettings = serde_json::from_str(r#"{"top_n": 50}"#).unwrap();
        assert_eq!(s.top_n, 50);
        assert_eq!(s.detailed_flow_limit, 500);
        assert_eq!(s.min_rows, 60);
    }
}
