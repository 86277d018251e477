//! 内存数据源：按代码预置行情与资金流，统计资金流请求次数
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use app_lib::models::flow::CapitalFlowRecord;
use app_lib::models::sector::RawSectorRow;
use app_lib::models::stock::{DailyBar, Fundamentals, InstrumentData, InstrumentId, RiskFlags, Valuation};
use app_lib::services::data_source::MarketDataSource;

#[derive(Default)]
pub struct MemorySource {
    pub rows: Vec<RawSectorRow>,
    pub listed: Vec<InstrumentId>,
    pub instruments: HashMap<InstrumentId, InstrumentData>,
    pub flows: HashMap<InstrumentId, Vec<CapitalFlowRecord>>,
    pub flow_calls: AtomicUsize,
}

impl MemorySource {
    pub fn add_row(&mut self, code: &str, sector: &str, industry: bool) {
        self.rows.push(RawSectorRow {
            security_code: code.to_string(),
            security_name: String::new(),
            sector_code: String::new(),
            sector_name: sector.to_string(),
            rank_weight: 1.0,
            official_industry: industry,
        });
    }

    pub fn add_instrument(&mut self, data: InstrumentData) {
        self.listed.push(data.id.clone());
        self.instruments.insert(data.id.clone(), data);
    }

    pub fn add_flow(&mut self, code: &str, records: Vec<CapitalFlowRecord>) {
        self.flows.insert(id(code), records);
    }

    pub fn flow_calls(&self) -> usize {
        self.flow_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MarketDataSource for MemorySource {
    async fn fetch_sector_rows(&self) -> Result<Vec<RawSectorRow>> {
        Ok(self.rows.clone())
    }

    async fn list_instruments(&self) -> Result<Vec<InstrumentId>> {
        Ok(self.listed.clone())
    }

    async fn fetch_instrument(&self, id: &InstrumentId) -> Result<InstrumentData> {
        self.instruments.get(id).cloned().ok_or_else(|| anyhow!("no quote for {}", id))
    }

    async fn fetch_capital_flow(&self, id: &InstrumentId, days: usize) -> Result<Vec<CapitalFlowRecord>> {
        self.flow_calls.fetch_add(1, Ordering::SeqCst);
        let rows = self.flows.get(id).ok_or_else(|| anyhow!("flow endpoint timeout for {}", id))?;
        let skip = rows.len().saturating_sub(days);
        Ok(rows[skip..].to_vec())
    }
}

pub fn id(code: &str) -> InstrumentId {
    InstrumentId::parse(code).unwrap()
}

/// n 根日K线，收盘价从 start 起每日变动 step，最后一根涨跌幅为 last_pct
pub fn bars(n: usize, start: f64, step: f64, last_pct: f64) -> Vec<DailyBar> {
    (0..n)
        .map(|i| {
            let close = start + step * i as f64;
            DailyBar {
                date: format!("2024-{:02}-{:02}", 1 + i / 28, 1 + i % 28),
                open: close - step / 2.0,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000_000.0 + (i % 7) as f64 * 50_000.0,
                amount: close * 1_000_000.0,
                turnover_rate: Some(2.0),
                pct_chg: if i + 1 == n { Some(last_pct) } else { None },
            }
        })
        .collect()
}

pub fn instrument(code: &str, name: &str, last_pct: f64) -> InstrumentData {
    InstrumentData {
        id: id(code),
        name: name.to_string(),
        bars: bars(120, 10.0, 0.05, last_pct),
        valuation: Valuation { pe_ttm: Some(25.0), pb: Some(2.5), ps_ttm: None },
        fundamentals: Fundamentals { roe: Some(15.0), revenue_yoy: Some(20.0), profit_yoy: None, gross_margin: None },
        risk: RiskFlags::default(),
    }
}

pub fn flow_rows(n: usize, main_net: f64) -> Vec<CapitalFlowRecord> {
    (0..n)
        .map(|i| CapitalFlowRecord {
            date: format!("2024-05-{:02}", i + 1),
            main_net,
            large_net: main_net / 2.0,
            super_large_net: main_net / 2.0,
            turnover: Some(500_000_000.0),
            main_pct: None,
        })
        .collect()
}
