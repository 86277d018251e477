use crate::models::error::EvalError;
use crate::models::flow::{CapitalFlowRecord, FlowMode, FlowWindowSummary};
use crate::models::score::{Dimension, DimensionScore};
use crate::models::stock::InstrumentData;

/// 明细模式至少需要的资金流向记录数
const MIN_FLOW_RECORDS: usize = 3;
/// 代理模式至少需要的K线数
const MIN_PROXY_BARS: usize = 20;
/// 汇总窗口（交易日）
pub const FLOW_WINDOWS: [usize; 3] = [3, 5, 10];

/// 资金面评分器。模式在构造时按股票池规模确定，整轮评估不变
#[derive(Debug, Clone)]
pub struct CapitalFlowAnalyzer {
    mode: FlowMode,
    universe_size: usize,
}

impl CapitalFlowAnalyzer {
    pub fn new(universe_size: usize, detailed_limit: usize) -> Self {
        let mode = FlowMode::select(universe_size, detailed_limit);
        log::info!("资金面模式: {:?} (股票池 {} 只, 阈值 {})", mode, universe_size, detailed_limit);
        Self { mode, universe_size }
    }

    pub fn mode(&self) -> FlowMode {
        self.mode
    }

    pub fn universe_size(&self) -> usize {
        self.universe_size
    }

    /// 资金面得分。None 表示该维度缺失（记 0 分）
    ///
    /// universe_size 与构造时不一致说明调用方在评估中途换了股票池，直接报错
    pub fn flow_score(
        &self,
        universe_size: usize,
        data: &InstrumentData,
        records: Option<&[CapitalFlowRecord]>,
    ) -> Result<Option<DimensionScore>, EvalError> {
        if universe_size != self.universe_size {
            return Err(EvalError::UniverseSizeChanged { expected: self.universe_size, actual: universe_size });
        }
        let score = match self.mode {
            // 明细模式下拿不到记录就缺失，不退回代理
            FlowMode::Detailed => records.and_then(score_detailed),
            FlowMode::Proxy => score_proxy(data),
        };
        Ok(score.map(|s| s.clamped(Dimension::CapitalFlow)))
    }
}

fn to_wan(yuan: f64) -> f64 {
    yuan / 10_000.0
}

/// 主力资金明细评分
pub fn score_detailed(records: &[CapitalFlowRecord]) -> Option<DimensionScore> {
    if records.len() < MIN_FLOW_RECORDS {
        return None;
    }
    let mut dim = DimensionScore::new();

    // 区间主力累计净额 (±6)
    let total_wan = to_wan(records.iter().map(|r| r.main_net).sum());
    if total_wan > 5000.0 {
        dim.add(6, format!("主力累计流入{:+.0}万", total_wan));
    } else if total_wan > 1000.0 {
        dim.add(3, format!("主力累计流入{:+.0}万", total_wan));
    } else if total_wan < -5000.0 {
        dim.add(-6, format!("主力累计流出{:+.0}万", total_wan));
    } else if total_wan < -1000.0 {
        dim.add(-3, format!("主力累计流出{:+.0}万", total_wan));
    }

    // 连续流入/流出 (±4)
    let consec_in = records.iter().rev().take_while(|r| r.main_net > 0.0).count();
    let consec_out = records.iter().rev().take_while(|r| r.main_net < 0.0).count();
    if consec_in >= 3 {
        dim.add(4, format!("主力连续流入{}天", consec_in));
    } else if consec_in >= 2 {
        dim.add(2, format!("主力连续流入{}天", consec_in));
    } else if consec_out >= 3 {
        dim.add(-4, format!("主力连续流出{}天", consec_out));
    } else if consec_out >= 2 {
        dim.add(-2, format!("主力连续流出{}天", consec_out));
    }

    // 最新一日主力占比 (±5)
    if let Some(pct) = records.last().and_then(|r| r.inflow_ratio_pct()) {
        if pct > 15.0 {
            dim.add(5, format!("今日主力占比{:+.1}%", pct));
        } else if pct > 5.0 {
            dim.add(3, format!("今日主力占比{:+.1}%", pct));
        } else if pct < -15.0 {
            dim.add(-5, format!("今日主力占比{:+.1}%", pct));
        } else if pct < -5.0 {
            dim.add(-3, format!("今日主力占比{:+.1}%", pct));
        }
    }

    for w in summarize_windows(records) {
        dim.note(format!(
            "近{}日 流入{:+.0}万 流出{:+.0}万 净额{:+.0}万",
            w.days, w.inflow_wan, w.outflow_wan, w.net_wan
        ));
    }

    Some(dim)
}

/// 近 3/5/10 日流入、流出、净额（万元）。记录不足的窗口不输出
pub fn summarize_windows(records: &[CapitalFlowRecord]) -> Vec<FlowWindowSummary> {
    FLOW_WINDOWS
        .iter()
        .filter(|&&days| records.len() >= days)
        .map(|&days| {
            let subset = &records[records.len() - days..];
            let inflow = to_wan(subset.iter().map(|r| r.main_net).filter(|v| *v > 0.0).sum());
            let outflow = to_wan(subset.iter().map(|r| r.main_net).filter(|v| *v < 0.0).sum());
            FlowWindowSummary { days, inflow_wan: inflow, outflow_wan: outflow, net_wan: inflow + outflow }
        })
        .collect()
}

fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}

/// 量价行为代理评分，不需要任何网络请求
pub fn score_proxy(data: &InstrumentData) -> Option<DimensionScore> {
    let bars = &data.bars;
    let n = bars.len();
    if n < MIN_PROXY_BARS {
        return None;
    }
    let pcts = data.pct_changes();
    let vols: Vec<f64> = bars.iter().map(|b| b.volume).collect();
    let vol_ma20 = mean(&vols[n - 20..])?;
    if vol_ma20 <= 0.0 {
        return None;
    }

    let mut dim = DimensionScore::new();

    // 近5日放量上涨天数
    let vol_up_days = (n - 5..n)
        .filter(|&i| vols[i] > vol_ma20 * 1.5 && pcts[i] > 0.0)
        .count();
    if vol_up_days >= 3 {
        dim.add(5, format!("5日内{}天放量上涨", vol_up_days));
    } else if vol_up_days >= 2 {
        dim.add(3, format!("5日内{}天放量上涨", vol_up_days));
    }

    // 缩量企稳：此前5日走弱，近3日缩量且跌势止住
    let last3 = &pcts[n - 3..];
    let prev5_mean = mean(&pcts[n - 8..n - 3]).unwrap_or(0.0);
    let vol_shrink = vols[n - 3..].iter().all(|v| *v < vol_ma20 * 0.8);
    let stabilizing = last3[2].abs() < 2.0 && (last3[2] > last3[0] || last3[2] > 0.0);
    if prev5_mean < -1.0 && vol_shrink && stabilizing {
        dim.add(3, "缩量企稳");
    }

    // 换手率加速：近5日均值 / 前15日均值
    let turns: Vec<Option<f64>> = bars[n - 20..].iter().map(|b| b.turnover_rate).collect();
    if turns.iter().all(|t| t.is_some()) {
        let turns: Vec<f64> = turns.into_iter().flatten().collect();
        if let (Some(turn5), Some(prev15)) = (mean(&turns[15..]), mean(&turns[..15])) {
            if prev15 > 0.0 {
                let ratio = turn5 / prev15;
                if ratio > 2.0 {
                    dim.add(4, format!("换手加速{:.1}x", ratio));
                } else if ratio > 1.5 {
                    dim.add(2, format!("换手升温{:.1}x", ratio));
                }
            }
        }
    }

    // 天量天价
    if vols[n - 1] > vol_ma20 * 3.0 && pcts[n - 1] > 5.0 {
        dim.add(-5, "天量天价风险");
    }

    // 无放量且多数下跌
    if vol_up_days == 0 {
        let down_days = pcts[n - 5..].iter().filter(|p| **p < 0.0).count();
        if down_days >= 4 {
            dim.add(-3, "持续缩量下跌");
        }
    }

    Some(dim)
}
