use serde::{Deserialize, Serialize};

use super::stock::InstrumentId;

/// 板块类型
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SectorType {
    #[serde(rename = "industry")]
    Industry,
    #[serde(rename = "concept")]
    Concept,
    #[serde(rename = "region")]
    Region,
    #[serde(rename = "style")]
    Style,
}

impl SectorType {
    pub const ALL: [SectorType; 4] = [
        SectorType::Industry,
        SectorType::Concept,
        SectorType::Region,
        SectorType::Style,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SectorType::Industry => "行业",
            SectorType::Concept => "概念",
            SectorType::Region => "地区",
            SectorType::Style => "风格",
        }
    }
}

/// 数据源原始板块归属行（东方财富 RPT_F10_CORETHEME_BOARDTYPE / 证监会行业表）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSectorRow {
    pub security_code: String,
    #[serde(default)]
    pub security_name: String,
    #[serde(default)]
    pub sector_code: String,
    pub sector_name: String,
    #[serde(default)]
    pub rank_weight: f64,
    /// 数据源标记为官方行业分类
    #[serde(default)]
    pub official_industry: bool,
}

/// 规范化后的板块归属
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SectorAssignment {
    pub instrument: InstrumentId,
    pub sector_type: SectorType,
    pub sector_code: String,
    pub sector_name: String,
    pub rank_weight: f64,
}

/// 概念板块及成分股数量（列出可用概念）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConceptSummary {
    pub name: String,
    pub member_count: usize,
}
