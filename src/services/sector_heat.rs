use std::collections::HashMap;

use crate::models::score::{Dimension, DimensionScore, ScoredInstrument};
use crate::services::sector_catalog::Catalog;

/// 概念至少需要的有效成分股数
const MIN_CONCEPT_MEMBERS: usize = 3;
/// 热门/冷门阈值（概念平均涨跌幅 %）
const HOT_THRESHOLD: f64 = 1.0;
const COLD_THRESHOLD: f64 = -1.0;
const HEAT_BONUS: i32 = 6;
const MULTI_HOT_BONUS: i32 = 2;

/// 按已评分股票的当日涨跌幅计算各概念热度（均值）
pub fn concept_heat(catalog: &Catalog, cohort: &[ScoredInstrument]) -> HashMap<String, f64> {
    let mut pcts: HashMap<&str, Vec<f64>> = HashMap::new();
    for item in cohort {
        let Some(pct) = item.pct_chg.filter(|p| p.is_finite()) else {
            continue;
        };
        for concept in catalog.concepts_of(&item.id) {
            pcts.entry(concept).or_default().push(pct);
        }
    }
    pcts.into_iter()
        .filter(|(_, v)| v.len() >= MIN_CONCEPT_MEMBERS)
        .map(|(name, v)| (name.to_string(), v.iter().sum::<f64>() / v.len() as f64))
        .collect()
}

/// 单只股票的热度分。所属概念都没有热度数据时返回 None
pub fn heat_score(concepts: &[&str], heat: &HashMap<String, f64>) -> Option<DimensionScore> {
    if !concepts.iter().any(|c| heat.contains_key(*c)) {
        return None;
    }
    // 样本不足的概念按 0 计
    let heats: Vec<(&str, f64)> = concepts
        .iter()
        .map(|c| (*c, heat.get(*c).copied().unwrap_or(0.0)))
        .collect();
    let (hottest, max_heat) = heats
        .iter()
        .copied()
        .fold(("", f64::NEG_INFINITY), |best, cur| if cur.1 > best.1 { cur } else { best });
    let hot_count = heats.iter().filter(|(_, h)| *h > HOT_THRESHOLD).count();

    let mut dim = DimensionScore::new();
    if max_heat > HOT_THRESHOLD {
        dim.add(HEAT_BONUS, format!("热门板块{}{:+.1}%", hottest, max_heat));
    } else if max_heat < COLD_THRESHOLD {
        dim.add(-HEAT_BONUS, format!("板块偏冷{}{:+.1}%", hottest, max_heat));
    }
    // 多个热门概念只加一次
    if hot_count >= 2 {
        dim.add(MULTI_HOT_BONUS, format!("{}个热门概念叠加", hot_count));
    }
    Some(dim.clamped(Dimension::SectorHeat))
}

/// 热度后处理：必须在整批评分完成后调用，写入热度面并重算总分与建议
pub struct SectorHeatPostProcessor;

impl SectorHeatPostProcessor {
    pub fn apply(catalog: &Catalog, cohort: &mut [ScoredInstrument]) {
        let heat = concept_heat(catalog, cohort);
        log::info!("板块热度: {} 个概念参与统计 (成分股≥{})", heat.len(), MIN_CONCEPT_MEMBERS);

        for item in cohort.iter_mut() {
            let concepts = catalog.concepts_of(&item.id);
            if let Some(score) = heat_score(&concepts, &heat) {
                item.breakdown.set(Dimension::SectorHeat, score);
            }
            item.refresh_total();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::board::Board;
    use crate::models::score::{Action, ScoreBreakdown};
    use crate::models::sector::RawSectorRow;
    use crate::models::stock::InstrumentId;

    fn scored(code: &str, pct: f64) -> ScoredInstrument {
        let id = InstrumentId::parse(code).unwrap();
        ScoredInstrument {
            board: Board::of(&id),
            id,
            name: code.to_string(),
            date: Some("2024-06-03".into()),
            close: Some(10.0),
            pct_chg: Some(pct),
            breakdown: ScoreBreakdown::default(),
            total_score: 0,
            action: Action::Hold,
            top_sectors: vec![],
        }
    }

    fn row(code: &str, concept: &str) -> RawSectorRow {
        RawSectorRow {
            security_code: code.into(),
            security_name: String::new(),
            sector_code: String::new(),
            sector_name: concept.into(),
            rank_weight: 1.0,
            official_industry: false,
        }
    }

    #[test]
    fn test_single_hot_concept_gets_fixed_bonus() {
        let catalog = Catalog::build(&[row("300001", "X"), row("300002", "X"), row("300003", "X")]);
        let mut cohort = vec![scored("300001", 5.0), scored("300002", 3.0), scored("300003", -1.0)];

        let heat = concept_heat(&catalog, &cohort);
        assert!((heat["X"] - 7.0 / 3.0).abs() < 1e-9);

        SectorHeatPostProcessor::apply(&catalog, &mut cohort);
        for item in &cohort {
            assert_eq!(item.breakdown.value(Dimension::SectorHeat), HEAT_BONUS);
            assert_eq!(item.total_score, HEAT_BONUS);
        }
    }

    #[test]
    fn test_small_concepts_are_ignored() {
        let catalog = Catalog::build(&[row("300001", "Y"), row("300002", "Y")]);
        let mut cohort = vec![scored("300001", 9.0), scored("300002", 9.0)];
        SectorHeatPostProcessor::apply(&catalog, &mut cohort);
        assert!(cohort[0].breakdown.sector_heat.is_none());
    }

    #[test]
    fn test_multi_hot_bonus_applied_once() {
        let mut heat = HashMap::new();
        heat.insert("A".to_string(), 2.0);
        heat.insert("B".to_string(), 1.5);
        heat.insert("C".to_string(), 4.0);
        let dim = heat_score(&["A", "B", "C"], &heat).unwrap();
        assert_eq!(dim.score, HEAT_BONUS + MULTI_HOT_BONUS);
    }

    #[test]
    fn test_cold_concept_penalty() {
        let mut heat = HashMap::new();
        heat.insert("A".to_string(), -2.5);
        let dim = heat_score(&["A"], &heat).unwrap();
        assert_eq!(dim.score, -HEAT_BONUS);
        // 另有一个样本不足的概念按 0 计，最热为 0，不扣分
        let dim = heat_score(&["A", "Z"], &heat).unwrap();
        assert_eq!(dim.score, 0);
    }

    #[test]
    fn test_heat_refreshes_action() {
        let catalog = Catalog::build(&[row("300001", "X"), row("300002", "X"), row("300003", "X")]);
        let mut cohort = vec![scored("300001", 5.0), scored("300002", 3.0), scored("300003", -1.0)];
        let mut tech = DimensionScore::new();
        tech.add(25, "测试");
        cohort[0].breakdown.set(Dimension::Technical, tech);
        SectorHeatPostProcessor::apply(&catalog, &mut cohort);
        assert_eq!(cohort[0].total_score, 31);
        assert_eq!(cohort[0].action, Action::Buy);
    }
}
