use serde::{Deserialize, Serialize};

use super::stock::InstrumentId;

/// 上市板块（由代码前缀决定）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Board {
    #[serde(rename = "沪主板")]
    ShanghaiMain,
    #[serde(rename = "深主板")]
    ShenzhenMain,
    #[serde(rename = "中小板")]
    Sme,
    #[serde(rename = "创业板")]
    ChiNext,
    #[serde(rename = "科创板")]
    Star,
    #[serde(rename = "北交所")]
    Beijing,
    #[serde(rename = "其他")]
    Other,
}

impl Board {
    pub fn of(id: &InstrumentId) -> Self {
        let code = id.code();
        if code.starts_with("688") || code.starts_with("689") {
            Board::Star
        } else if code.starts_with("60") {
            Board::ShanghaiMain
        } else if code.starts_with("000") || code.starts_with("001") {
            Board::ShenzhenMain
        } else if code.starts_with("002") || code.starts_with("003") {
            Board::Sme
        } else if code.starts_with("30") {
            Board::ChiNext
        } else if code.starts_with('4') || code.starts_with('8') || code.starts_with("92") {
            Board::Beijing
        } else {
            Board::Other
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Board::ShanghaiMain => "沪主板",
            Board::ShenzhenMain => "深主板",
            Board::Sme => "中小板",
            Board::ChiNext => "创业板",
            Board::Star => "科创板",
            Board::Beijing => "北交所",
            Board::Other => "其他",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "沪主板" => Some(Board::ShanghaiMain),
            "深主板" => Some(Board::ShenzhenMain),
            "中小板" => Some(Board::Sme),
            "创业板" => Some(Board::ChiNext),
            "科创板" => Some(Board::Star),
            "北交所" => Some(Board::Beijing),
            _ => None,
        }
    }

    /// 成长板（创业板/科创板）
    pub fn is_growth(&self) -> bool {
        matches!(self, Board::ChiNext | Board::Star)
    }
}
