use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::Result;

use crate::models::error::EvalError;
use crate::models::sector::{ConceptSummary, RawSectorRow, SectorAssignment, SectorType};
use crate::models::stock::InstrumentId;
use crate::services::data_source::MarketDataSource;

/// 地区板块名称后缀
const REGION_SUFFIX: &str = "板块";

/// 省级行政区
const GAZETTEER: &[&str] = &[
    "北京", "上海", "天津", "重庆", "广东", "浙江", "江苏", "山东", "四川",
    "福建", "湖南", "湖北", "河南", "河北", "安徽", "辽宁", "陕西", "云南",
    "贵州", "广西", "吉林", "黑龙江", "内蒙古", "新疆", "甘肃", "海南", "宁夏",
    "青海", "西藏", "山西", "江西",
];

/// 风格板块关键词（市值/估值分层）
const STYLE_KEYWORDS: &[&str] = &[
    "大盘", "中盘", "小盘", "微盘", "低价股", "高价股", "破净股", "绩优股",
    "亏损股", "价值股", "成长股", "次新股", "高股息",
];

/// 板块归属表必需字段
pub const SECTOR_TABLE_COLUMNS: &[&str] = &["SECURITY_CODE", "BOARD_NAME"];

/// 板块类型判定。名称为空时无法归类，返回 None
pub fn classify(row: &RawSectorRow) -> Option<SectorType> {
    let name = row.sector_name.trim();
    if name.is_empty() {
        return None;
    }

    // 地区优先于概念
    if name.ends_with(REGION_SUFFIX) && GAZETTEER.iter().any(|p| name.contains(p)) {
        return Some(SectorType::Region);
    }
    if row.official_industry {
        return Some(SectorType::Industry);
    }
    if STYLE_KEYWORDS.iter().any(|k| name.contains(k)) {
        return Some(SectorType::Style);
    }
    Some(SectorType::Concept)
}

/// 检查原始表是否含必需字段，缺字段属于结构性错误
pub fn validate_columns(table: &str, present: &[&str], required: &[&str]) -> Result<(), EvalError> {
    let missing: Vec<String> = required
        .iter()
        .filter(|c| !present.contains(c))
        .map(|c| c.to_string())
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(EvalError::MissingColumns { table: table.to_string(), missing })
    }
}

/// 股票 ↔ 板块双向映射，构建后只读
#[derive(Debug, Default)]
pub struct Catalog {
    members: HashMap<SectorType, HashMap<String, BTreeSet<InstrumentId>>>,
    assignments: HashMap<InstrumentId, Vec<SectorAssignment>>,
    names: HashMap<InstrumentId, String>,
}

impl Catalog {
    pub fn build(rows: &[RawSectorRow]) -> Self {
        let mut catalog = Catalog::default();
        let mut dropped_codes = 0usize;
        let mut dropped_untyped = 0usize;

        for row in rows {
            let Some(id) = InstrumentId::parse(&row.security_code) else {
                log::warn!("板块归属行代码无法识别，已跳过: {:?} ({})", row.security_code, row.sector_name);
                dropped_codes += 1;
                continue;
            };
            let Some(sector_type) = classify(row) else {
                log::warn!("板块归属行无法归类，已跳过: {} {:?}", id, row.sector_code);
                dropped_untyped += 1;
                continue;
            };

            let name = row.sector_name.trim().to_string();
            let list = catalog.assignments.entry(id.clone()).or_default();
            if list.iter().any(|a| a.sector_type == sector_type && a.sector_name == name) {
                continue;
            }
            list.push(SectorAssignment {
                instrument: id.clone(),
                sector_type,
                sector_code: row.sector_code.clone(),
                sector_name: name.clone(),
                rank_weight: row.rank_weight,
            });

            catalog
                .members
                .entry(sector_type)
                .or_default()
                .entry(name)
                .or_default()
                .insert(id.clone());

            let stock_name = row.security_name.trim();
            if !stock_name.is_empty() {
                catalog.names.entry(id).or_insert_with(|| stock_name.to_string());
            }
        }

        log::info!(
            "板块目录构建完成: {} 只股票, {} 个概念, 丢弃 {} 行(代码) / {} 行(类型)",
            catalog.assignments.len(),
            catalog.members.get(&SectorType::Concept).map(|m| m.len()).unwrap_or(0),
            dropped_codes,
            dropped_untyped,
        );
        catalog
    }

    pub fn assignments_for(&self, id: &InstrumentId) -> &[SectorAssignment] {
        self.assignments.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn members_of(&self, sector_type: SectorType, sector_name: &str) -> Option<&BTreeSet<InstrumentId>> {
        self.members.get(&sector_type)?.get(sector_name)
    }

    pub fn sector_names(&self, id: &InstrumentId, sector_type: SectorType) -> Vec<&str> {
        self.assignments_for(id)
            .iter()
            .filter(|a| a.sector_type == sector_type)
            .map(|a| a.sector_name.as_str())
            .collect()
    }

    pub fn concepts_of(&self, id: &InstrumentId) -> Vec<&str> {
        self.sector_names(id, SectorType::Concept)
    }

    pub fn industries_of(&self, id: &InstrumentId) -> Vec<&str> {
        self.sector_names(id, SectorType::Industry)
    }

    pub fn name_of(&self, id: &InstrumentId) -> Option<&str> {
        self.names.get(id).map(|s| s.as_str())
    }

    /// 报告展示用：行业优先，其余按 rank_weight 升序（1 为最相关）
    pub fn top_assignments(&self, id: &InstrumentId, n: usize) -> Vec<SectorAssignment> {
        let mut list: Vec<SectorAssignment> = self.assignments_for(id).to_vec();
        list.sort_by(|a, b| {
            let a_ind = a.sector_type != SectorType::Industry;
            let b_ind = b.sector_type != SectorType::Industry;
            a_ind
                .cmp(&b_ind)
                .then(a.rank_weight.partial_cmp(&b.rank_weight).unwrap_or(std::cmp::Ordering::Equal))
        });
        list.truncate(n);
        list
    }

    /// 所有概念板块，按成分股数量降序
    pub fn list_concepts(&self) -> Vec<ConceptSummary> {
        let mut list: Vec<ConceptSummary> = self
            .members
            .get(&SectorType::Concept)
            .map(|m| {
                m.iter()
                    .map(|(name, ids)| ConceptSummary { name: name.clone(), member_count: ids.len() })
                    .collect()
            })
            .unwrap_or_default();
        list.sort_by(|a, b| b.member_count.cmp(&a.member_count).then_with(|| a.name.cmp(&b.name)));
        list
    }

    pub fn instruments(&self) -> impl Iterator<Item = &InstrumentId> {
        self.assignments.keys()
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }
}

/// 进程内的目录缓存。只有显式 refresh 才会重建
#[derive(Default)]
pub struct CatalogStore {
    current: RwLock<Option<Arc<Catalog>>>,
}

impl CatalogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<Arc<Catalog>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn install(&self, catalog: Catalog) -> Arc<Catalog> {
        let catalog = Arc::new(catalog);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(catalog.clone());
        catalog
    }

    pub async fn refresh(&self, source: &dyn MarketDataSource) -> Result<Arc<Catalog>> {
        let rows = source.fetch_sector_rows().await?;
        Ok(self.install(Catalog::build(&rows)))
    }

    /// 已有目录直接返回，否则构建一次
    pub async fn get_or_refresh(&self, source: &dyn MarketDataSource) -> Result<Arc<Catalog>> {
        match self.current() {
            Some(c) => Ok(c),
            None => self.refresh(source).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(code: &str, sector: &str) -> RawSectorRow {
        RawSectorRow {
            security_code: code.to_string(),
            security_name: "测试".to_string(),
            sector_code: "BK0001".to_string(),
            sector_name: sector.to_string(),
            rank_weight: 1.0,
            official_industry: false,
        }
    }

    fn id(code: &str) -> InstrumentId {
        InstrumentId::parse(code).unwrap()
    }

    #[test]
    fn test_region_beats_concept() {
        assert_eq!(classify(&row("600000", "上海板块")), Some(SectorType::Region));
        assert_eq!(classify(&row("600000", "黑龙江板块")), Some(SectorType::Region));
        // 含省名但无后缀 → 概念
        assert_eq!(classify(&row("600000", "海南自贸")), Some(SectorType::Concept));
        // 有后缀但无省名 → 概念
        assert_eq!(classify(&row("600000", "AI板块")), Some(SectorType::Concept));
    }

    #[test]
    fn test_industry_and_style() {
        let mut r = row("600000", "C39计算机、通信和其他电子设备制造业");
        r.official_industry = true;
        assert_eq!(classify(&r), Some(SectorType::Industry));
        assert_eq!(classify(&row("600000", "大盘价值")), Some(SectorType::Style));
        assert_eq!(classify(&row("600000", "人工智能")), Some(SectorType::Concept));
        assert_eq!(classify(&row("600000", "  ")), None);
    }

    #[test]
    fn test_build_drops_bad_rows_and_dedups() {
        let rows = vec![
            row("300285", "人工智能"),
            row("300285.SZ", "人工智能"),
            row("sz300285", "山东板块"),
            row("HK0700", "人工智能"),
            row("600000", ""),
        ];
        let catalog = Catalog::build(&rows);
        assert_eq!(catalog.len(), 1);
        let a = catalog.assignments_for(&id("300285"));
        assert_eq!(a.len(), 2);
        assert_eq!(catalog.concepts_of(&id("300285")), vec!["人工智能"]);
        assert!(catalog.members_of(SectorType::Region, "山东板块").unwrap().contains(&id("300285")));
        assert!(catalog.assignments_for(&id("600000")).is_empty());
    }

    #[test]
    fn test_list_concepts_sorted_by_members() {
        let rows = vec![
            row("300001", "机器人"),
            row("300002", "机器人"),
            row("300003", "算力"),
        ];
        let concepts = Catalog::build(&rows).list_concepts();
        assert_eq!(concepts[0].name, "机器人");
        assert_eq!(concepts[0].member_count, 2);
        assert_eq!(concepts[1].name, "算力");
    }

    #[test]
    fn test_missing_columns_is_structural_error() {
        let err = validate_columns("板块归属", &["SECURITY_CODE"], SECTOR_TABLE_COLUMNS).unwrap_err();
        assert_eq!(
            err,
            EvalError::MissingColumns { table: "板块归属".into(), missing: vec!["BOARD_NAME".into()] }
        );
        assert!(validate_columns("板块归属", &["SECURITY_CODE", "BOARD_NAME", "X"], SECTOR_TABLE_COLUMNS).is_ok());
    }

    #[test]
    fn test_store_only_rebuilds_on_install() {
        let store = CatalogStore::new();
        assert!(store.current().is_none());
        let first = store.install(Catalog::build(&[row("600000", "银行")]));
        let again = store.current().unwrap();
        assert!(Arc::ptr_eq(&first, &again));
    }
}
