use std::collections::BTreeSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};

use crate::models::error::EvalError;
use crate::models::flow::{CapitalFlowRecord, FlowMode};
use crate::models::report::{DeepReport, ScreenReport, ScreenRequest};
use crate::models::score::ScoredInstrument;
use crate::models::settings::EvaluatorSettings;
use crate::models::stock::{Fundamentals, InstrumentData, InstrumentId, RiskFlags, Valuation};
use crate::services::capital_flow::summarize_windows;
use crate::services::concept_rank::rank_concepts;
use crate::services::data_source::MarketDataSource;
use crate::services::filter_pipeline;
use crate::services::scoring::ScoringEngine;
use crate::services::sector_catalog::{Catalog, CatalogStore};
use crate::services::sector_heat::SectorHeatPostProcessor;

/// 买入/卖出清单阈值
const BUY_LIST_MIN: i32 = 25;
const SELL_LIST_MAX: i32 = -15;
/// 结果行附带的板块数
const TOP_SECTORS: usize = 3;

/// 评估入口：持有数据源与板块目录缓存
pub struct Evaluator {
    source: Arc<dyn MarketDataSource>,
    catalog: Arc<CatalogStore>,
    settings: EvaluatorSettings,
}

impl Evaluator {
    pub fn new(source: Arc<dyn MarketDataSource>, catalog: Arc<CatalogStore>, settings: EvaluatorSettings) -> Self {
        Self { source, catalog, settings }
    }

    pub fn settings(&self) -> &EvaluatorSettings {
        &self.settings
    }

    pub async fn catalog(&self) -> Result<Arc<Catalog>> {
        self.catalog
            .get_or_refresh(self.source.as_ref())
            .await
            .context("板块目录构建失败")
    }

    /// 显式重建板块目录
    pub async fn refresh_catalog(&self) -> Result<Arc<Catalog>> {
        self.catalog.refresh(self.source.as_ref()).await.context("板块目录构建失败")
    }

    /// 股票池：优先取数据源列表，为空时退回板块目录中的全部股票
    async fn universe(&self, catalog: &Catalog) -> Result<Vec<InstrumentId>> {
        let listed = self.source.list_instruments().await.context("获取股票列表失败")?;
        let ids: BTreeSet<InstrumentId> = if listed.is_empty() {
            catalog.instruments().cloned().collect()
        } else {
            listed.into_iter().collect()
        };
        Ok(ids.into_iter().collect())
    }

    /// 单只股票：拉数据 → (明细模式)拉资金流 → 评分。
    /// 行情拉取失败时以空数据评分（各维度缺失，总分 0）仍进入排名，只有结构性错误才返回 Err
    async fn score_one(
        &self,
        engine: &ScoringEngine,
        catalog: &Catalog,
        universe_size: usize,
        id: &InstrumentId,
    ) -> Result<ScoredInstrument, EvalError> {
        let data = match self.source.fetch_instrument(id).await {
            Ok(d) => d,
            Err(e) => {
                log::warn!("[{}] 行情获取失败，按缺失数据评分: {}", id, e);
                let placeholder = placeholder_data(catalog, id);
                return engine.evaluate(&placeholder, universe_size, None);
            }
        };

        let flow: Option<Vec<CapitalFlowRecord>> = match engine.flow_mode() {
            FlowMode::Detailed => match self.source.fetch_capital_flow(id, self.settings.flow_days).await {
                Ok(rows) => Some(rows),
                Err(e) => {
                    log::warn!("[{}] 资金流向获取失败，资金面记 0: {}", id, e);
                    None
                }
            },
            FlowMode::Proxy => None,
        };

        engine.evaluate(&data, universe_size, flow.as_deref())
    }

    /// 批量筛选：过滤 → 并发评分 → 屏障 → 热度 → 排名
    pub async fn run_screen(&self, request: &ScreenRequest) -> Result<ScreenReport> {
        let catalog = self.catalog().await?;
        let universe = self.universe(&catalog).await?;
        log::info!("股票池 {} 只, 板块目录 {} 只", universe.len(), catalog.len());

        let filtered = filter_pipeline::run(&catalog, &universe, &request.boards, &request.concepts);
        let universe_size = filtered.universe.len();
        let engine = ScoringEngine::new(&self.settings, universe_size);
        let concurrency = self.settings.fetch_concurrency.max(1);

        let outcomes: Vec<Result<ScoredInstrument, EvalError>> = stream::iter(filtered.universe.iter())
            .map(|id| self.score_one(&engine, &catalog, universe_size, id))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        // 屏障：全部评分完成后才能算热度
        let mut scored = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            scored.push(outcome?);
        }
        scored.sort_by(|a, b| a.id.cmp(&b.id));
        log::info!("评分完成 {}/{} 只 (资金面: {:?})", scored.len(), universe_size, engine.flow_mode());

        SectorHeatPostProcessor::apply(&catalog, &mut scored);
        annotate(&catalog, &mut scored);
        scored.sort_by(|a, b| b.total_score.cmp(&a.total_score).then_with(|| a.id.cmp(&b.id)));

        let top_n = request.top_n.unwrap_or(self.settings.top_n);
        let concept_ranking = if request.concepts.iter().any(|k| !k.trim().is_empty()) {
            let mut ranking = rank_concepts(&catalog, &scored, &request.concepts, &filtered.keyword_hits);
            ranking.rows.truncate(top_n);
            Some(ranking)
        } else {
            None
        };

        let buy_all: Vec<ScoredInstrument> = scored.iter().filter(|s| s.total_score >= BUY_LIST_MIN).cloned().collect();
        let mut sell_all: Vec<ScoredInstrument> = scored.iter().filter(|s| s.total_score <= SELL_LIST_MAX).cloned().collect();
        sell_all.sort_by(|a, b| a.total_score.cmp(&b.total_score).then_with(|| a.id.cmp(&b.id)));
        let (total_buy, total_sell) = (buy_all.len(), sell_all.len());
        let as_of = scored.iter().filter_map(|s| s.date.clone()).max();
        let evaluated = scored.len();

        Ok(ScreenReport {
            request: request.clone(),
            flow_mode: engine.flow_mode(),
            universe_size,
            evaluated,
            unknown_boards: filtered.unknown_boards,
            ranked: scored.into_iter().take(top_n).collect(),
            buy_list: buy_all.into_iter().take(top_n).collect(),
            sell_list: sell_all.into_iter().take(top_n).collect(),
            total_buy,
            total_sell,
            concept_ranking,
            as_of,
        })
    }

    /// 单只股票详细报告，资金面固定使用明细模式
    pub async fn deep_report(&self, code: &str) -> Result<DeepReport> {
        let id = InstrumentId::parse(code).ok_or_else(|| EvalError::InvalidCode(code.to_string()))?;
        let catalog = self.catalog().await?;

        let data = self
            .source
            .fetch_instrument(&id)
            .await
            .map_err(|e| {
                log::warn!("[{}] 行情获取失败: {}", id, e);
                EvalError::InstrumentNotFound(id.to_string())
            })?;
        let flow_rows = match self.source.fetch_capital_flow(&id, self.settings.flow_days).await {
            Ok(rows) => rows,
            Err(e) => {
                log::warn!("[{}] 资金流向获取失败: {}", id, e);
                Vec::new()
            }
        };

        let settings = EvaluatorSettings { detailed_flow_limit: self.settings.detailed_flow_limit.max(1), ..self.settings.clone() };
        let engine = ScoringEngine::new(&settings, 1);
        let mut cohort = vec![engine.evaluate(&data, 1, Some(flow_rows.as_slice()))?];
        SectorHeatPostProcessor::apply(&catalog, &mut cohort);
        annotate(&catalog, &mut cohort);

        let instrument = cohort.remove(0);
        Ok(DeepReport {
            assignments: catalog.assignments_for(&id).to_vec(),
            flow_windows: summarize_windows(&flow_rows),
            flow_rows,
            instrument,
        })
    }
}

/// 行情缺失时的空数据：无K线、无估值财务、无风险标记
fn placeholder_data(catalog: &Catalog, id: &InstrumentId) -> InstrumentData {
    InstrumentData {
        id: id.clone(),
        name: catalog.name_of(id).unwrap_or_default().to_string(),
        bars: Vec::new(),
        valuation: Valuation::default(),
        fundamentals: Fundamentals::default(),
        risk: RiskFlags::default(),
    }
}

/// 补全名称与展示用板块
fn annotate(catalog: &Catalog, scored: &mut [ScoredInstrument]) {
    for item in scored.iter_mut() {
        if item.name.trim().is_empty() {
            item.name = catalog.name_of(&item.id).unwrap_or_default().to_string();
        }
        item.top_sectors = catalog.top_assignments(&item.id, TOP_SECTORS);
    }
}
