use std::collections::{BTreeMap, BTreeSet};

use crate::models::board::Board;
use crate::models::stock::InstrumentId;
use crate::services::sector_catalog::Catalog;

/// 每个命中关键词的叠加加分
pub const KEYWORD_BONUS: i32 = 8;

/// 板块快捷键展开
fn expand_shortcut(token: &str) -> Option<&'static [Board]> {
    match token {
        "主板" => Some(&[Board::ShanghaiMain, Board::ShenzhenMain, Board::Sme]),
        "沪市" => Some(&[Board::ShanghaiMain, Board::Star]),
        "深市" => Some(&[Board::ShenzhenMain, Board::Sme, Board::ChiNext]),
        _ => None,
    }
}

#[derive(Debug, Clone, Default)]
pub struct BoardFilterOutcome {
    pub matched: Vec<InstrumentId>,
    /// 无法识别的板块参数（不报错，按无匹配处理）
    pub unknown_tokens: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ConceptFilterOutcome {
    pub matched: Vec<InstrumentId>,
    /// 每只股票命中的关键词（按输入顺序）
    pub keyword_hits: BTreeMap<InstrumentId, Vec<String>>,
}

impl ConceptFilterOutcome {
    pub fn hit_count(&self, id: &InstrumentId) -> usize {
        self.keyword_hits.get(id).map(|v| v.len()).unwrap_or(0)
    }
}

/// 关键词叠加加分：命中 1 个得基础分，命中越多越高
pub fn keyword_bonus(hit_count: usize) -> i32 {
    KEYWORD_BONUS * hit_count as i32
}

/// 把板块参数解析成目标板块集合，返回 (目标, 未识别参数)
pub fn resolve_board_tokens(tokens: &[String]) -> (BTreeSet<Board>, Vec<String>) {
    let mut targets = BTreeSet::new();
    let mut unknown = Vec::new();
    for token in tokens {
        let token = token.trim();
        if let Some(boards) = expand_shortcut(token) {
            targets.extend(boards.iter().copied());
        } else if let Some(board) = Board::from_name(token) {
            targets.insert(board);
        } else {
            log::warn!("未知板块参数: {}", token);
            unknown.push(token.to_string());
        }
    }
    (targets, unknown)
}

/// 按代码前缀过滤，不需要板块目录
pub fn filter_by_board(universe: &[InstrumentId], tokens: &[String]) -> BoardFilterOutcome {
    if tokens.is_empty() {
        return BoardFilterOutcome { matched: universe.to_vec(), unknown_tokens: vec![] };
    }
    let (targets, unknown_tokens) = resolve_board_tokens(tokens);
    let matched = universe
        .iter()
        .filter(|id| targets.contains(&Board::of(id)))
        .cloned()
        .collect();
    BoardFilterOutcome { matched, unknown_tokens }
}

/// 关键词（不区分大小写）命中该股任一概念/行业名称即保留
pub fn filter_by_concept(catalog: &Catalog, universe: &[InstrumentId], keywords: &[String]) -> ConceptFilterOutcome {
    // 大小写不同的重复关键词只保留首次出现的写法
    let mut keywords: Vec<&str> = keywords.iter().map(|k| k.trim()).filter(|k| !k.is_empty()).collect();
    let mut seen = BTreeSet::new();
    keywords.retain(|k| seen.insert(k.to_lowercase()));
    if keywords.is_empty() {
        return ConceptFilterOutcome { matched: universe.to_vec(), keyword_hits: BTreeMap::new() };
    }

    let mut outcome = ConceptFilterOutcome::default();
    for id in universe {
        let names: Vec<String> = catalog
            .concepts_of(id)
            .into_iter()
            .chain(catalog.industries_of(id))
            .map(|n| n.to_lowercase())
            .collect();
        if names.is_empty() {
            continue;
        }

        let mut hits: Vec<String> = Vec::new();
        for kw in &keywords {
            let needle = kw.to_lowercase();
            if names.iter().any(|n| n.contains(&needle)) {
                hits.push(kw.to_string());
            }
        }
        if !hits.is_empty() {
            outcome.matched.push(id.clone());
            outcome.keyword_hits.insert(id.clone(), hits);
        }
    }
    outcome
}

#[derive(Debug, Clone, Default)]
pub struct PipelineOutcome {
    pub universe: Vec<InstrumentId>,
    pub unknown_boards: Vec<String>,
    pub keyword_hits: BTreeMap<InstrumentId, Vec<String>>,
}

/// 先跑便宜的板块前缀过滤，再跑概念匹配
pub fn run(catalog: &Catalog, universe: &[InstrumentId], boards: &[String], keywords: &[String]) -> PipelineOutcome {
    let total = universe.len();
    let by_board = filter_by_board(universe, boards);
    if !boards.is_empty() {
        log::info!("板块筛选: {} → {}/{} 只", boards.join(" "), by_board.matched.len(), total);
    }

    let by_concept = filter_by_concept(catalog, &by_board.matched, keywords);
    if !keywords.is_empty() {
        log::info!(
            "概念预筛选: {} → {}/{} 只",
            keywords.join(" "),
            by_concept.matched.len(),
            by_board.matched.len()
        );
    }

    PipelineOutcome {
        universe: by_concept.matched,
        unknown_boards: by_board.unknown_tokens,
        keyword_hits: by_concept.keyword_hits,
    }
}
