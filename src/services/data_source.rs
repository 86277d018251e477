use anyhow::Result;
use async_trait::async_trait;

use crate::models::flow::CapitalFlowRecord;
use crate::models::sector::RawSectorRow;
use crate::models::stock::{InstrumentData, InstrumentId};

/// 行情/板块/资金流原始表的提供方。评估核心只依赖这个接口，不直接发请求
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    /// 全量板块归属表
    async fn fetch_sector_rows(&self) -> Result<Vec<RawSectorRow>>;

    /// 可评估的股票列表
    async fn list_instruments(&self) -> Result<Vec<InstrumentId>>;

    /// 日K线 + 估值 + 财务 + 风险标记
    async fn fetch_instrument(&self, id: &InstrumentId) -> Result<InstrumentData>;

    /// 近 days 个交易日主力资金流向（按日期升序）
    async fn fetch_capital_flow(&self, id: &InstrumentId, days: usize) -> Result<Vec<CapitalFlowRecord>>;
}
