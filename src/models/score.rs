use serde::{Deserialize, Serialize};

use super::board::Board;
use super::sector::SectorAssignment;
use super::stock::InstrumentId;

/// 评分维度
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Dimension {
    #[serde(rename = "technical")]
    Technical,
    #[serde(rename = "valuation")]
    Valuation,
    #[serde(rename = "fundamental")]
    Fundamental,
    #[serde(rename = "risk")]
    Risk,
    #[serde(rename = "momentum")]
    Momentum,
    #[serde(rename = "capital_flow")]
    CapitalFlow,
    #[serde(rename = "sector_heat")]
    SectorHeat,
}

impl Dimension {
    pub const ALL: [Dimension; 7] = [
        Dimension::Technical,
        Dimension::Valuation,
        Dimension::Fundamental,
        Dimension::Risk,
        Dimension::Momentum,
        Dimension::CapitalFlow,
        Dimension::SectorHeat,
    ];

    /// 分值区间（含端点）。风险面为扣分项，取值 0~10
    pub fn band(&self) -> (i32, i32) {
        match self {
            Dimension::Technical => (-40, 40),
            Dimension::Valuation => (-25, 25),
            Dimension::Fundamental => (-25, 25),
            Dimension::Risk => (0, 10),
            Dimension::Momentum => (-15, 15),
            Dimension::CapitalFlow => (-15, 15),
            Dimension::SectorHeat => (-10, 10),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Dimension::Technical => "技术面",
            Dimension::Valuation => "估值面",
            Dimension::Fundamental => "基本面",
            Dimension::Risk => "风险面",
            Dimension::Momentum => "动量面",
            Dimension::CapitalFlow => "资金面",
            Dimension::SectorHeat => "热度面",
        }
    }

    /// 对总分的贡献方向
    fn sign(&self) -> i32 {
        if *self == Dimension::Risk { -1 } else { 1 }
    }
}

/// 单维度得分 + 触发信号
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DimensionScore {
    pub score: i32,
    pub signals: Vec<String>,
}

impl DimensionScore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记一条信号，signal 会自动附上分值，如 "MACD金叉(+6)"
    pub fn add(&mut self, points: i32, signal: impl Into<String>) {
        self.score += points;
        self.signals.push(format!("{}({:+})", signal.into(), points));
    }

    /// 扣分项（风险面）：score 累加扣分值，信号显示为负
    pub fn deduct(&mut self, points: i32, signal: impl Into<String>) {
        self.score += points;
        self.signals.push(format!("{}(-{})", signal.into(), points));
    }

    /// 仅展示用的信号（不计分）
    pub fn note(&mut self, signal: impl Into<String>) {
        self.signals.push(signal.into());
    }

    pub fn clamped(mut self, dimension: Dimension) -> Self {
        let (lo, hi) = dimension.band();
        self.score = self.score.clamp(lo, hi);
        self
    }
}

/// 七维度评分明细。缺失维度按 0 计，不影响排名资格
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    #[serde(default)]
    pub technical: Option<DimensionScore>,
    #[serde(default)]
    pub valuation: Option<DimensionScore>,
    #[serde(default)]
    pub fundamental: Option<DimensionScore>,
    #[serde(default)]
    pub risk: Option<DimensionScore>,
    #[serde(default)]
    pub momentum: Option<DimensionScore>,
    #[serde(default)]
    pub capital_flow: Option<DimensionScore>,
    /// 仅由热度后处理写入
    #[serde(default)]
    pub sector_heat: Option<DimensionScore>,
}

impl ScoreBreakdown {
    fn slot(&mut self, dimension: Dimension) -> &mut Option<DimensionScore> {
        match dimension {
            Dimension::Technical => &mut self.technical,
            Dimension::Valuation => &mut self.valuation,
            Dimension::Fundamental => &mut self.fundamental,
            Dimension::Risk => &mut self.risk,
            Dimension::Momentum => &mut self.momentum,
            Dimension::CapitalFlow => &mut self.capital_flow,
            Dimension::SectorHeat => &mut self.sector_heat,
        }
    }

    pub fn get(&self, dimension: Dimension) -> Option<&DimensionScore> {
        match dimension {
            Dimension::Technical => self.technical.as_ref(),
            Dimension::Valuation => self.valuation.as_ref(),
            Dimension::Fundamental => self.fundamental.as_ref(),
            Dimension::Risk => self.risk.as_ref(),
            Dimension::Momentum => self.momentum.as_ref(),
            Dimension::CapitalFlow => self.capital_flow.as_ref(),
            Dimension::SectorHeat => self.sector_heat.as_ref(),
        }
    }

    /// 写入维度得分，按区间截断
    pub fn set(&mut self, dimension: Dimension, score: DimensionScore) {
        *self.slot(dimension) = Some(score.clamped(dimension));
    }

    pub fn value(&self, dimension: Dimension) -> i32 {
        self.get(dimension).map(|d| d.score).unwrap_or(0)
    }

    pub fn total_score(&self) -> i32 {
        Dimension::ALL
            .iter()
            .map(|d| d.sign() * self.value(*d))
            .sum()
    }
}

/// 操作建议
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "strong_buy")]
    StrongBuy,
    #[serde(rename = "buy")]
    Buy,
    #[serde(rename = "hold")]
    Hold,
    #[serde(rename = "sell")]
    Sell,
    #[serde(rename = "strong_sell")]
    StrongSell,
}

impl Action {
    /// 逐只评分后的初步建议（尚未计入热度）
    pub fn preliminary(total: i32) -> Self {
        Self::by_thresholds(total, 65, -45)
    }

    /// 热度后处理之后的最终建议
    pub fn from_total(total: i32) -> Self {
        Self::by_thresholds(total, 60, -40)
    }

    fn by_thresholds(total: i32, strong_buy: i32, strong_sell: i32) -> Self {
        if total >= strong_buy {
            Action::StrongBuy
        } else if total >= 30 {
            Action::Buy
        } else if total <= strong_sell {
            Action::StrongSell
        } else if total <= -15 {
            Action::Sell
        } else {
            Action::Hold
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Action::StrongBuy => "强烈买入",
            Action::Buy => "建议买入",
            Action::Hold => "观望",
            Action::Sell => "建议卖出",
            Action::StrongSell => "强烈卖出",
        }
    }
}

/// 完成评分的股票
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredInstrument {
    pub id: InstrumentId,
    pub name: String,
    pub board: Board,
    pub date: Option<String>,
    pub close: Option<f64>,
    pub pct_chg: Option<f64>,
    pub breakdown: ScoreBreakdown,
    pub total_score: i32,
    pub action: Action,
    #[serde(default)]
    pub top_sectors: Vec<SectorAssignment>,
}

impl ScoredInstrument {
    /// 重新汇总总分与建议（热度后处理调用）
    pub fn refresh_total(&mut self) {
        self.total_score = self.breakdown.total_score();
        self.action = Action::from_total(self.total_score);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dim(score: i32) -> DimensionScore {
        DimensionScore { score, signals: vec![] }
    }

    #[test]
    fn test_absent_dimensions_count_as_zero() {
        let mut b = ScoreBreakdown::default();
        b.set(Dimension::Technical, dim(12));
        assert_eq!(b.total_score(), 12);
        assert_eq!(b.value(Dimension::CapitalFlow), 0);
    }

    #[test]
    fn test_risk_is_deducted() {
        let mut b = ScoreBreakdown::default();
        b.set(Dimension::Valuation, dim(10));
        b.set(Dimension::Risk, dim(7));
        assert_eq!(b.total_score(), 3);
    }

    #[test]
    fn test_set_clamps_to_band() {
        let mut b = ScoreBreakdown::default();
        b.set(Dimension::Momentum, dim(40));
        b.set(Dimension::Risk, dim(-3));
        b.set(Dimension::SectorHeat, dim(-30));
        assert_eq!(b.value(Dimension::Momentum), 15);
        assert_eq!(b.value(Dimension::Risk), 0);
        assert_eq!(b.value(Dimension::SectorHeat), -10);
    }

    #[test]
    fn test_total_bounds() {
        let mut best = ScoreBreakdown::default();
        let mut worst = ScoreBreakdown::default();
        for d in Dimension::ALL {
            best.set(d, dim(if d == Dimension::Risk { 0 } else { 1000 }));
            worst.set(d, dim(if d == Dimension::Risk { 1000 } else { -1000 }));
        }
        assert_eq!(best.total_score(), 130);
        assert_eq!(worst.total_score(), -140);
    }

    #[test]
    fn test_signal_format() {
        let mut d = DimensionScore::new();
        d.add(6, "MACD金叉");
        d.add(-2, "RSI偏高62");
        assert_eq!(d.score, 4);
        assert_eq!(d.signals, vec!["MACD金叉(+6)", "RSI偏高62(-2)"]);
    }

    #[test]
    fn test_action_thresholds() {
        assert_eq!(Action::from_total(60), Action::StrongBuy);
        assert_eq!(Action::preliminary(60), Action::Buy);
        assert_eq!(Action::from_total(0), Action::Hold);
        assert_eq!(Action::from_total(-15), Action::Sell);
        assert_eq!(Action::from_total(-40), Action::StrongSell);
    }
}
