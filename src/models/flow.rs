use serde::{Deserialize, Serialize};

/// 个股单日主力资金流向（金额单位：元）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapitalFlowRecord {
    pub date: String,
    pub main_net: f64,        // 主力净流入
    pub large_net: f64,       // 大单净流入
    pub super_large_net: f64, // 超大单净流入
    #[serde(default)]
    pub turnover: Option<f64>, // 成交额
    #[serde(default)]
    pub main_pct: Option<f64>, // 主力净占比 %
}

impl CapitalFlowRecord {
    /// 主力净流入占成交额比例 %，优先使用数据源给出的占比
    pub fn inflow_ratio_pct(&self) -> Option<f64> {
        if let Some(pct) = self.main_pct {
            return Some(pct);
        }
        match self.turnover {
            Some(t) if t > 0.0 => Some(self.main_net / t * 100.0),
            _ => None,
        }
    }
}

/// 近 N 日资金汇总（金额单位：万元）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowWindowSummary {
    pub days: usize,
    pub inflow_wan: f64,
    pub outflow_wan: f64,
    pub net_wan: f64,
}

/// 资金面评分模式：每轮评估按股票池规模选定一次
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowMode {
    /// 逐只获取主力资金明细
    #[serde(rename = "detailed")]
    Detailed,
    /// 量价行为代理，不发起网络请求
    #[serde(rename = "proxy")]
    Proxy,
}

impl FlowMode {
    pub fn select(universe_size: usize, detailed_limit: usize) -> Self {
        if universe_size <= detailed_limit {
            FlowMode::Detailed
        } else {
            FlowMode::Proxy
        }
    }
}
