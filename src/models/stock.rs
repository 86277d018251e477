use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// 交易所
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Exchange {
    #[serde(rename = "sh")]
    Shanghai,
    #[serde(rename = "sz")]
    Shenzhen,
    #[serde(rename = "bj")]
    Beijing,
}

impl Exchange {
    pub fn tag(&self) -> &'static str {
        match self {
            Exchange::Shanghai => "sh",
            Exchange::Shenzhen => "sz",
            Exchange::Beijing => "bj",
        }
    }

    fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sh" | "ss" => Some(Exchange::Shanghai),
            "sz" => Some(Exchange::Shenzhen),
            "bj" => Some(Exchange::Beijing),
            _ => None,
        }
    }

    /// 纯数字代码推断交易所：92/4/8 北交所，6/9 沪市，其余深市
    fn infer(digits: &str) -> Self {
        if digits.starts_with("92") {
            return Exchange::Beijing;
        }
        match digits.as_bytes().first() {
            Some(b'6') | Some(b'9') => Exchange::Shanghai,
            Some(b'4') | Some(b'8') => Exchange::Beijing,
            _ => Exchange::Shenzhen,
        }
    }

    /// 东方财富 secid 市场编号（1=沪，0=深/北）
    pub fn secid_market(&self) -> u8 {
        match self {
            Exchange::Shanghai => 1,
            _ => 0,
        }
    }
}

/// 规范化证券代码，统一显示为 "sh.600000"
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct InstrumentId {
    exchange: Exchange,
    code: String,
}

fn code_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:(sh|sz|bj)\.?([0-9]{6})|([0-9]{6})(?:\.(sh|ss|sz|bj))?)$")
            .expect("static code pattern")
    })
}

impl InstrumentId {
    /// 支持三种写法：
    ///   "600000" / "sh600000" / "sh.600000" / "600000.SH"
    /// 无法识别返回 None，不会 panic
    pub fn parse(raw: &str) -> Option<Self> {
        let cleaned = raw.trim().to_lowercase();
        let caps = code_pattern().captures(&cleaned)?;

        if let (Some(tag), Some(digits)) = (caps.get(1), caps.get(2)) {
            let exchange = Exchange::from_tag(tag.as_str())?;
            return Some(Self { exchange, code: digits.as_str().to_string() });
        }

        let digits = caps.get(3)?.as_str();
        let exchange = match caps.get(4) {
            Some(tag) => Exchange::from_tag(tag.as_str())?,
            None => Exchange::infer(digits),
        };
        Some(Self { exchange, code: digits.to_string() })
    }

    pub fn new(exchange: Exchange, code: &str) -> Option<Self> {
        if code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit()) {
            Some(Self { exchange, code: code.to_string() })
        } else {
            None
        }
    }

    pub fn exchange(&self) -> Exchange {
        self.exchange
    }

    /// 6位数字代码
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn secid(&self) -> String {
        format!("{}.{}", self.exchange.secid_market(), self.code)
    }
}

/// 字符串形式的规范化，失败返回 None
pub fn normalize_code(raw: &str) -> Option<String> {
    InstrumentId::parse(raw).map(|id| id.to_string())
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.exchange.tag(), self.code)
    }
}

impl TryFrom<String> for InstrumentId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        InstrumentId::parse(&value).ok_or_else(|| format!("无法识别的证券代码: {}", value))
    }
}

impl From<InstrumentId> for String {
    fn from(id: InstrumentId) -> Self {
        id.to_string()
    }
}

/// 日K线
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DailyBar {
    pub date: String,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
    pub amount: f64,
    #[serde(default)]
    pub turnover_rate: Option<f64>, // 换手率 %
    #[serde(default)]
    pub pct_chg: Option<f64>,       // 涨跌幅 %
}

/// 估值指标（缺失为 None）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Valuation {
    pub pe_ttm: Option<f64>,
    pub pb: Option<f64>,
    pub ps_ttm: Option<f64>,
}

/// 财务指标（最新一期）
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fundamentals {
    pub roe: Option<f64>,          // %
    pub revenue_yoy: Option<f64>,  // 营收同比 %
    pub profit_yoy: Option<f64>,   // 净利润同比 %
    pub gross_margin: Option<f64>, // 毛利率 %
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RiskFlags {
    pub is_st: bool,
    pub suspended: bool,
}

/// 单只股票评估所需的全部输入
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentData {
    pub id: InstrumentId,
    pub name: String,
    /// 按日期升序
    #[serde(default)]
    pub bars: Vec<DailyBar>,
    #[serde(default)]
    pub valuation: Valuation,
    #[serde(default)]
    pub fundamentals: Fundamentals,
    #[serde(default)]
    pub risk: RiskFlags,
}

impl InstrumentData {
    pub fn latest_bar(&self) -> Option<&DailyBar> {
        self.bars.last()
    }

    /// 最新涨跌幅：优先取K线字段，否则用最近两根收盘价推算
    pub fn latest_pct_change(&self) -> Option<f64> {
        let n = self.bars.len();
        let last = self.bars.last()?;
        if let Some(pct) = last.pct_chg {
            return Some(pct);
        }
        if n < 2 {
            return None;
        }
        let prev = self.bars[n - 2].close;
        if prev <= 0.0 {
            return None;
        }
        Some((last.close - prev) / prev * 100.0)
    }

    pub fn latest_close(&self) -> Option<f64> {
        self.bars.last().map(|b| b.close)
    }

    pub fn latest_date(&self) -> Option<&str> {
        self.bars.last().map(|b| b.date.as_str())
    }

    /// 各K线涨跌幅序列（缺失时由收盘价推算，首根无前收盘则为 0）
    pub fn pct_changes(&self) -> Vec<f64> {
        self.bars
            .iter()
            .enumerate()
            .map(|(i, bar)| match bar.pct_chg {
                Some(p) => p,
                None if i > 0 && self.bars[i - 1].close > 0.0 => {
                    (bar.close - self.bars[i - 1].close) / self.bars[i - 1].close * 100.0
                }
                None => 0.0,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_three_spellings_same_key() {
        let bare = InstrumentId::parse("300285").unwrap();
        let prefix = InstrumentId::parse("sz300285").unwrap();
        let dotted = InstrumentId::parse("SZ.300285").unwrap();
        let suffix = InstrumentId::parse("300285.SZ").unwrap();
        assert_eq!(bare, prefix);
        assert_eq!(bare, dotted);
        assert_eq!(bare, suffix);
        assert_eq!(bare.to_string(), "sz.300285");
    }

    #[test]
    fn test_exchange_inference() {
        assert_eq!(normalize_code("600000").as_deref(), Some("sh.600000"));
        assert_eq!(normalize_code("000636").as_deref(), Some("sz.000636"));
        assert_eq!(normalize_code("830799").as_deref(), Some("bj.830799"));
        assert_eq!(normalize_code("600000.SS").as_deref(), Some("sh.600000"));
        // 北交所新代码段 92，B股 900 仍属沪市
        let bj = InstrumentId::parse("920118").unwrap();
        assert_eq!(bj.to_string(), "bj.920118");
        assert_eq!(bj.secid(), "0.920118");
        assert_eq!(crate::models::board::Board::of(&bj), crate::models::board::Board::Beijing);
        assert_eq!(normalize_code("900901").as_deref(), Some("sh.900901"));
    }

    #[test]
    fn test_invalid_codes_rejected() {
        assert!(InstrumentId::parse("").is_none());
        assert!(InstrumentId::parse("60000").is_none());
        assert!(InstrumentId::parse("hk.00700").is_none());
        assert!(InstrumentId::parse("abcdef").is_none());
    }

    #[test]
    fn test_serde_uses_canonical_form() {
        let id: InstrumentId = serde_json::from_str("\"600519.SH\"").unwrap();
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"sh.600519\"");
    }

    #[test]
    fn test_pct_change_fallback_to_closes() {
        let bar = |close: f64| DailyBar {
            date: "2024-01-02".into(),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1.0,
            amount: 1.0,
            turnover_rate: None,
            pct_chg: None,
        };
        let data = InstrumentData {
            id: InstrumentId::parse("600000").unwrap(),
            name: "浦发银行".into(),
            bars: vec![bar(10.0), bar(11.0)],
            valuation: Valuation::default(),
            fundamentals: Fundamentals::default(),
            risk: RiskFlags::default(),
        };
        let pct = data.latest_pct_change().unwrap();
        assert!((pct - 10.0).abs() < 1e-9);
    }
}
