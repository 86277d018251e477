use crate::models::board::Board;
use crate::models::error::EvalError;
use crate::models::flow::{CapitalFlowRecord, FlowMode};
use crate::models::score::{Action, Dimension, DimensionScore, ScoreBreakdown, ScoredInstrument};
use crate::models::settings::EvaluatorSettings;
use crate::models::stock::{Fundamentals, InstrumentData, Valuation};
use crate::services::capital_flow::CapitalFlowAnalyzer;
use crate::services::indicators::{compute_indicators, IndicatorPoint, IndicatorSeries};

/// 动量面至少需要的K线数
const MIN_MOMENTUM_BARS: usize = 20;

/// 六维度逐只评分（热度面由后处理写入）
pub struct ScoringEngine {
    min_rows: usize,
    flow: CapitalFlowAnalyzer,
}

impl ScoringEngine {
    pub fn new(settings: &EvaluatorSettings, universe_size: usize) -> Self {
        Self {
            min_rows: settings.min_rows,
            flow: CapitalFlowAnalyzer::new(universe_size, settings.detailed_flow_limit),
        }
    }

    pub fn flow_mode(&self) -> FlowMode {
        self.flow.mode()
    }

    pub fn universe_size(&self) -> usize {
        self.flow.universe_size()
    }

    /// 单只股票评分。缺少输入的维度留空，只有结构性错误才返回 Err
    pub fn score(
        &self,
        data: &InstrumentData,
        universe_size: usize,
        flow_records: Option<&[CapitalFlowRecord]>,
    ) -> Result<ScoreBreakdown, EvalError> {
        let series = compute_indicators(&data.bars);
        let mut breakdown = ScoreBreakdown::default();

        let parts = [
            (Dimension::Technical, score_technical(&series, self.min_rows)),
            (Dimension::Valuation, score_valuation(&data.valuation)),
            (Dimension::Fundamental, score_fundamental(&data.fundamentals)),
            (Dimension::Risk, Some(score_risk(data, series.latest().as_ref()))),
            (Dimension::Momentum, score_momentum(data)),
            (Dimension::CapitalFlow, self.flow.flow_score(universe_size, data, flow_records)?),
        ];
        for (dimension, score) in parts {
            if let Some(score) = score {
                breakdown.set(dimension, score);
            }
        }
        Ok(breakdown)
    }

    /// 评分并组装结果行，建议为热度前的初步建议
    pub fn evaluate(
        &self,
        data: &InstrumentData,
        universe_size: usize,
        flow_records: Option<&[CapitalFlowRecord]>,
    ) -> Result<ScoredInstrument, EvalError> {
        let breakdown = self.score(data, universe_size, flow_records)?;
        let total_score = breakdown.total_score();
        Ok(ScoredInstrument {
            id: data.id.clone(),
            name: data.name.clone(),
            board: Board::of(&data.id),
            date: data.latest_date().map(|d| d.to_string()),
            close: data.latest_close(),
            pct_chg: data.latest_pct_change(),
            breakdown,
            total_score,
            action: Action::preliminary(total_score),
            top_sectors: Vec::new(),
        })
    }
}

fn crossed_up(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> bool {
    prev_fast <= prev_slow && fast > slow
}

fn crossed_down(prev_fast: f64, prev_slow: f64, fast: f64, slow: f64) -> bool {
    prev_fast >= prev_slow && fast < slow
}

/// 技术面 (±40)
pub fn score_technical(series: &IndicatorSeries, min_rows: usize) -> Option<DimensionScore> {
    if series.len() < min_rows.max(2) {
        return None;
    }
    let latest = series.latest()?;
    let prev = series.previous()?;
    let mut dim = DimensionScore::new();

    // 均线 (±8)
    if let (Some(ma5), Some(ma10), Some(ma20), Some(ma60)) = (latest.ma5, latest.ma10, latest.ma20, latest.ma60) {
        if ma5 > ma10 && ma10 > ma20 && ma20 > ma60 {
            dim.add(8, "均线多头排列");
        } else if ma5 < ma10 && ma10 < ma20 && ma20 < ma60 {
            dim.add(-8, "均线空头排列");
        } else if let (Some(p5), Some(p10)) = (prev.ma5, prev.ma10) {
            if crossed_up(p5, p10, ma5, ma10) {
                dim.add(5, "MA5/10金叉");
            } else if crossed_down(p5, p10, ma5, ma10) {
                dim.add(-5, "MA5/10死叉");
            }
        }
    }

    // MACD (±7)
    if let (Some(dif), Some(dea), Some(pdif), Some(pdea)) = (latest.macd_dif, latest.macd_dea, prev.macd_dif, prev.macd_dea) {
        if crossed_up(pdif, pdea, dif, dea) {
            dim.add(6, "MACD金叉");
        } else if crossed_down(pdif, pdea, dif, dea) {
            dim.add(-6, "MACD死叉");
        }
        if let (Some(hist), Some(phist)) = (latest.macd_hist, prev.macd_hist) {
            if hist > 0.0 && hist > phist {
                dim.add(1, "MACD柱放大");
            } else if hist < 0.0 && hist < phist {
                dim.add(-1, "MACD柱缩小");
            }
        }
    }

    // RSI (±5)
    if let Some(rsi) = latest.rsi14 {
        if rsi < 30.0 {
            dim.add(5, format!("RSI超卖{:.0}", rsi));
        } else if rsi < 40.0 {
            dim.add(2, format!("RSI偏低{:.0}", rsi));
        } else if rsi > 70.0 {
            dim.add(-5, format!("RSI超买{:.0}", rsi));
        } else if rsi > 60.0 {
            dim.add(-2, format!("RSI偏高{:.0}", rsi));
        }
    }

    // KDJ (±5)
    if let (Some(k), Some(d), Some(j)) = (latest.kdj_k, latest.kdj_d, latest.kdj_j) {
        if j < 20.0 {
            dim.add(3, format!("KDJ超卖J={:.0}", j));
        } else if j > 80.0 {
            dim.add(-3, format!("KDJ超买J={:.0}", j));
        }
        if let (Some(pk), Some(pd)) = (prev.kdj_k, prev.kdj_d) {
            if crossed_up(pk, pd, k, d) {
                dim.add(2, "KDJ金叉");
            } else if crossed_down(pk, pd, k, d) {
                dim.add(-2, "KDJ死叉");
            }
        }
    }

    // 布林带 (±3)
    if let (Some(up), Some(dn)) = (latest.boll_upper, latest.boll_lower) {
        if latest.close <= dn {
            dim.add(3, "触及布林下轨");
        } else if latest.close >= up {
            dim.add(-3, "触及布林上轨");
        }
    }

    // 量比 (±3)
    if let Some(vr) = latest.vol_ratio {
        if vr > 2.0 && latest.close > prev.close {
            dim.add(3, format!("放量上涨{:.1}", vr));
        } else if vr > 2.0 && latest.close < prev.close {
            dim.add(-3, format!("放量下跌{:.1}", vr));
        }
    }

    // DMI/ADX (±3)
    if let (Some(adx), Some(pdi), Some(mdi)) = (latest.adx, latest.plus_di, latest.minus_di) {
        if adx > 25.0 && pdi > mdi {
            dim.add(3, format!("ADX强势上升{:.0}", adx));
        } else if adx > 25.0 && pdi < mdi {
            dim.add(-3, format!("ADX强势下跌{:.0}", adx));
        }
    }

    // WR (±2)
    if let Some(wr) = latest.wr14 {
        if wr < -80.0 {
            dim.add(2, format!("WR超卖{:.0}", wr));
        } else if wr > -20.0 {
            dim.add(-2, format!("WR超买{:.0}", wr));
        }
    }

    // CCI (±2)
    if let Some(cci) = latest.cci14 {
        if cci < -100.0 {
            dim.add(2, format!("CCI超卖{:.0}", cci));
        } else if cci > 100.0 {
            dim.add(-2, format!("CCI超买{:.0}", cci));
        }
    }

    // OBV (±1)
    if let (Some(obv), Some(obv_ma5)) = (latest.obv, latest.obv_ma5) {
        if obv > obv_ma5 && latest.close > prev.close {
            dim.add(1, "OBV量价齐升");
        } else if obv < obv_ma5 && latest.close < prev.close {
            dim.add(-1, "OBV量价齐跌");
        }
    }

    // 低波动 (+1)
    if let Some(atr_pct) = latest.atr_pct {
        if atr_pct < 2.0 {
            dim.add(1, format!("低波动{:.1}%", atr_pct));
        }
    }

    // 仅展示
    if let Some(vwap) = latest.vwap20 {
        let side = if latest.close >= vwap { "上方" } else { "下方" };
        dim.note(format!("位于20日VWAP{:.2}{}", vwap, side));
    }

    Some(dim.clamped(Dimension::Technical))
}

/// 估值面 (±25)。三项都缺失时该维度缺失
pub fn score_valuation(v: &Valuation) -> Option<DimensionScore> {
    if v.pe_ttm.is_none() && v.pb.is_none() && v.ps_ttm.is_none() {
        return None;
    }
    let mut dim = DimensionScore::new();

    match v.pe_ttm {
        Some(pe) if pe > 0.0 => {
            if pe <= 15.0 {
                dim.add(10, format!("PE低估{:.1}", pe));
            } else if pe <= 25.0 {
                dim.add(5, format!("PE合理{:.1}", pe));
            } else if pe <= 50.0 {
                dim.add(-3, format!("PE偏高{:.1}", pe));
            } else {
                dim.add(-10, format!("PE高估{:.1}", pe));
            }
        }
        Some(pe) if pe < 0.0 => dim.add(-10, "PE为负(亏损)"),
        _ => {}
    }

    if let Some(pb) = v.pb.filter(|pb| *pb > 0.0) {
        if pb <= 1.0 {
            dim.add(8, format!("PB破净{:.2}", pb));
        } else if pb <= 2.0 {
            dim.add(4, format!("PB低估{:.2}", pb));
        } else if pb <= 5.0 {
            dim.add(-2, format!("PB偏高{:.2}", pb));
        } else {
            dim.add(-8, format!("PB高估{:.2}", pb));
        }
    }

    if let Some(ps) = v.ps_ttm.filter(|ps| *ps > 0.0) {
        if ps <= 2.0 {
            dim.add(7, format!("PS低估{:.2}", ps));
        } else if ps <= 5.0 {
            dim.add(3, format!("PS合理{:.2}", ps));
        } else if ps > 10.0 {
            dim.add(-7, format!("PS高估{:.2}", ps));
        }
    }

    Some(dim.clamped(Dimension::Valuation))
}

/// 基本面 (±25)
pub fn score_fundamental(f: &Fundamentals) -> Option<DimensionScore> {
    if f.roe.is_none() && f.revenue_yoy.is_none() && f.profit_yoy.is_none() && f.gross_margin.is_none() {
        return None;
    }
    let mut dim = DimensionScore::new();

    if let Some(roe) = f.roe {
        if roe >= 15.0 {
            dim.add(8, format!("ROE优秀{:.1}%", roe));
        } else if roe >= 10.0 {
            dim.add(4, format!("ROE良好{:.1}%", roe));
        } else if roe < 0.0 {
            dim.add(-8, format!("ROE为负{:.1}%", roe));
        }
    }

    if let Some(g) = f.revenue_yoy {
        if g >= 30.0 {
            dim.add(7, format!("营收高增长{:.1}%", g));
        } else if g >= 10.0 {
            dim.add(3, format!("营收稳增长{:.1}%", g));
        } else if g < -10.0 {
            dim.add(-7, format!("营收下滑{:.1}%", g));
        }
    }

    if let Some(g) = f.profit_yoy {
        if g >= 30.0 {
            dim.add(5, format!("净利高增长{:.1}%", g));
        } else if g >= 10.0 {
            dim.add(2, format!("净利稳增长{:.1}%", g));
        } else if g < -20.0 {
            dim.add(-5, format!("净利大幅下滑{:.1}%", g));
        }
    }

    if let Some(gm) = f.gross_margin {
        if gm >= 50.0 {
            dim.add(5, format!("高毛利率{:.1}%", gm));
        } else if gm >= 30.0 {
            dim.add(2, format!("毛利率良好{:.1}%", gm));
        } else if gm < 10.0 {
            dim.add(-5, format!("毛利率过低{:.1}%", gm));
        }
    }

    Some(dim.clamped(Dimension::Fundamental))
}

/// 风险扣分 (0~10)，从总分中扣除
pub fn score_risk(data: &InstrumentData, latest: Option<&IndicatorPoint>) -> DimensionScore {
    let mut dim = DimensionScore::new();
    if data.risk.is_st {
        dim.deduct(10, "ST股票");
    }
    if data.risk.suspended {
        dim.deduct(5, "停牌中");
    }
    if let Some(p) = latest {
        if let Some(atr_pct) = p.atr_pct.filter(|v| *v > 5.0) {
            dim.deduct(3, format!("高波动{:.1}%", atr_pct));
        }
        if let Some(vr) = p.vol_ratio.filter(|v| *v < 0.3) {
            dim.deduct(2, format!("极低量比{:.2}", vr));
        }
    }
    dim.clamped(Dimension::Risk)
}

/// 动量面 (±15)：超跌反弹加分，短期暴涨扣分
pub fn score_momentum(data: &InstrumentData) -> Option<DimensionScore> {
    let closes: Vec<f64> = data.bars.iter().map(|b| b.close).collect();
    let n = closes.len();
    if n < MIN_MOMENTUM_BARS {
        return None;
    }
    let mut dim = DimensionScore::new();

    // 近5日涨跌 (±5)
    if closes[n - 6] > 0.0 {
        let ret5 = (closes[n - 1] / closes[n - 6] - 1.0) * 100.0;
        if ret5 < -15.0 {
            dim.add(5, format!("5日深跌{:.1}%反弹机会", ret5));
        } else if ret5 < -5.0 {
            dim.add(2, format!("5日回调{:.1}%", ret5));
        } else if (5.0..=15.0).contains(&ret5) {
            dim.add(3, format!("5日上涨动量{:+.1}%", ret5));
        } else if ret5 > 15.0 {
            dim.add(-5, format!("5日暴涨{:+.1}%追高风险", ret5));
        }
    }

    // 近20日涨跌 (±3)
    if n >= 21 && closes[n - 21] > 0.0 {
        let ret20 = (closes[n - 1] / closes[n - 21] - 1.0) * 100.0;
        if ret20 < -20.0 {
            dim.add(3, format!("20日深跌{:.1}%", ret20));
        } else if ret20 > 30.0 {
            dim.add(-3, format!("20日大涨{:+.1}%", ret20));
        }
    }

    // 连续下跌天数
    let consec_down = data.pct_changes().iter().rev().take_while(|p| **p < 0.0).count();
    if consec_down >= 5 {
        dim.add(3, format!("连跌{}天", consec_down));
    } else if consec_down >= 3 {
        dim.add(1, format!("连跌{}天", consec_down));
    }

    // 20日区间位置 (±2)
    let recent = &closes[n - 20..];
    let low20 = recent.iter().cloned().fold(f64::INFINITY, f64::min);
    let high20 = recent.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if high20 > low20 {
        let pos = (closes[n - 1] - low20) / (high20 - low20);
        if pos < 0.1 {
            dim.add(2, "接近20日低点");
        } else if pos > 0.9 {
            dim.add(-2, "接近20日高点");
        }
    }

    Some(dim.clamped(Dimension::Momentum))
}
