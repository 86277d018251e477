use std::collections::BTreeMap;

use crate::models::report::{ConceptRankRow, ConceptRanking, KeywordStat};
use crate::models::score::ScoredInstrument;
use crate::models::stock::InstrumentId;
use crate::services::filter_pipeline::keyword_bonus;
use crate::services::sector_catalog::Catalog;

/// 大盘价值行业（龙头优选时降权）
const VALUE_SECTORS: &[&str] = &["银行", "保险", "货币金融", "证券", "信托", "电力、热力"];
const GROWTH_BOARD_BONUS: i32 = 5;
const VALUE_SECTOR_PENALTY: i32 = -10;
const PRODUCT_BONUS: i32 = 3;

fn density_bonus(concept_count: usize) -> i32 {
    2 * (concept_count / 5).min(3) as i32
}

/// 概念筛选的龙头排名：基础总分 + 关键词叠加 + 成长板 + 概念密度 + 产品端
pub fn rank_concepts(
    catalog: &Catalog,
    scored: &[ScoredInstrument],
    keywords: &[String],
    keyword_hits: &BTreeMap<InstrumentId, Vec<String>>,
) -> ConceptRanking {
    let mut rows: Vec<ConceptRankRow> = scored
        .iter()
        .filter_map(|item| {
            let matched = keyword_hits.get(&item.id).filter(|m| !m.is_empty())?;
            let industries = catalog.industries_of(&item.id);

            let board_bonus = if industries.iter().any(|ind| VALUE_SECTORS.iter().any(|v| ind.contains(v))) {
                VALUE_SECTOR_PENALTY
            } else if item.board.is_growth() {
                GROWTH_BOARD_BONUS
            } else {
                0
            };
            let density = density_bonus(catalog.concepts_of(&item.id).len());
            let product = if matched.iter().any(|kw| {
                let kw = kw.to_lowercase();
                industries.iter().any(|ind| ind.to_lowercase().contains(&kw))
            }) {
                PRODUCT_BONUS
            } else {
                0
            };
            let stacking = keyword_bonus(matched.len());

            Some(ConceptRankRow {
                alpha: item.total_score + stacking + board_bonus + density + product,
                instrument: item.clone(),
                matched_keywords: matched.clone(),
                keyword_bonus: stacking,
                board_bonus,
                density_bonus: density,
                product_bonus: product,
            })
        })
        .collect();
    rows.sort_by(|a, b| b.alpha.cmp(&a.alpha).then_with(|| a.instrument.id.cmp(&b.instrument.id)));

    let keyword_stats = keywords
        .iter()
        .map(|kw| {
            let needle = kw.trim().to_lowercase();
            let hits: Vec<&ConceptRankRow> = rows
                .iter()
                .filter(|r| r.matched_keywords.iter().any(|m| m.to_lowercase() == needle))
                .collect();
            let avg_alpha = if hits.is_empty() {
                None
            } else {
                Some(hits.iter().map(|r| r.alpha as f64).sum::<f64>() / hits.len() as f64)
            };
            // rows 已按 alpha 降序，首个即最优
            let best = hits.first().map(|r| format!("{}({:+})", r.instrument.name, r.alpha));
            KeywordStat { keyword: kw.clone(), matched: hits.len(), avg_alpha, best }
        })
        .collect();

    ConceptRanking { keywords: keywords.to_vec(), rows, keyword_stats }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::board::Board;
    use crate::models::score::{Action, ScoreBreakdown};
    use crate::models::sector::RawSectorRow;

    fn id(code: &str) -> InstrumentId {
        InstrumentId::parse(code).unwrap()
    }

    fn scored(code: &str, name: &str, total: i32) -> ScoredInstrument {
        ScoredInstrument {
            id: id(code),
            name: name.into(),
            board: Board::of(&id(code)),
            date: None,
            close: None,
            pct_chg: None,
            breakdown: ScoreBreakdown::default(),
            total_score: total,
            action: Action::Hold,
            top_sectors: vec![],
        }
    }

    fn row(code: &str, sector: &str, industry: bool) -> RawSectorRow {
        RawSectorRow {
            security_code: code.into(),
            security_name: String::new(),
            sector_code: String::new(),
            sector_name: sector.into(),
            rank_weight: 1.0,
            official_industry: industry,
        }
    }

    #[test]
    fn test_alpha_components() {
        let mut rows = vec![row("300285", "半导体芯片", true)];
        for i in 0..10 {
            rows.push(row("300285", &format!("概念{}", i), false));
        }
        rows.push(row("600000", "货币金融服务", true));
        rows.push(row("600000", "芯片国产化", false));
        let catalog = Catalog::build(&rows);

        let mut hits = BTreeMap::new();
        hits.insert(id("300285"), vec!["芯片".to_string()]);
        hits.insert(id("600000"), vec!["芯片".to_string()]);
        let scored = vec![scored("300285", "国瓷材料", 20), scored("600000", "浦发银行", 20)];
        let kws = vec!["芯片".to_string(), "量子".to_string()];

        let ranking = rank_concepts(&catalog, &scored, &kws, &hits);
        let top = &ranking.rows[0];
        assert_eq!(top.instrument.id, id("300285"));
        assert_eq!(top.board_bonus, GROWTH_BOARD_BONUS);
        assert_eq!(top.density_bonus, 4);
        assert_eq!(top.product_bonus, PRODUCT_BONUS);
        assert_eq!(top.alpha, 20 + 8 + 5 + 4 + 3);

        let bank = &ranking.rows[1];
        assert_eq!(bank.board_bonus, VALUE_SECTOR_PENALTY);
        assert_eq!(bank.alpha, 20 + 8 - 10);

        assert_eq!(ranking.keyword_stats[0].matched, 2);
        assert_eq!(ranking.keyword_stats[0].best.as_deref(), Some("国瓷材料(+40)"));
        assert_eq!(ranking.keyword_stats[1].matched, 0);
        assert!(ranking.keyword_stats[1].avg_alpha.is_none());
    }

    #[test]
    fn test_unmatched_instruments_excluded() {
        let catalog = Catalog::default();
        let ranking = rank_concepts(&catalog, &[scored("300285", "x", 10)], &["AI".to_string()], &BTreeMap::new());
        assert!(ranking.rows.is_empty());
    }
}
