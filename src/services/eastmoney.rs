use anyhow::{anyhow, Result};
use async_trait::async_trait;

use crate::models::flow::CapitalFlowRecord;
use crate::models::sector::RawSectorRow;
use crate::models::settings::EvaluatorSettings;
use crate::models::stock::{DailyBar, Exchange, Fundamentals, InstrumentData, InstrumentId, RiskFlags, Valuation};
use crate::services::data_source::MarketDataSource;
use crate::services::sector_catalog::{validate_columns, SECTOR_TABLE_COLUMNS};
use crate::utils::http::build_stock_client;
use crate::utils::retry::retry_with_backoff;

/// 沪深京A股：深主板、创业板、沪主板、科创板、北交所
const A_SHARE_FS: &str = "m:0+t:6,m:0+t:80,m:1+t:2,m:1+t:23,m:0+t:81+s:2048";

/// 东方财富公开接口实现。每个请求单页拉取，失败按指数退避重试
pub struct EastMoneySource {
    client: reqwest::Client,
    max_retries: u32,
    kline_days: usize,
    page_size: usize,
}

impl EastMoneySource {
    pub fn new(settings: &EvaluatorSettings) -> Result<Self> {
        Ok(Self {
            client: build_stock_client(15)?,
            max_retries: settings.max_retries,
            kline_days: settings.kline_days,
            page_size: settings.sector_page_size,
        })
    }

    async fn get_json(&self, url: &str) -> Result<serde_json::Value> {
        let resp = self.client.get(url).send().await?.error_for_status()?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| anyhow!("东方财富数据解析失败: {}", e))
    }

    async fn fetch(&self, label: &str, url: &str) -> Result<serde_json::Value> {
        retry_with_backoff(label, self.max_retries, || self.get_json(url)).await
    }

    /// 全A股列表（f100 为所属行业）
    async fn fetch_stock_list(&self) -> Result<Vec<serde_json::Value>> {
        let url = format!(
            "https://push2.eastmoney.com/api/qt/clist/get?pn=1&pz={}&po=1&np=1&fltt=2&invt=2&fid=f12&fs={}&fields=f12,f13,f14,f100",
            self.page_size, A_SHARE_FS
        );
        let json = self.fetch("股票列表", &url).await?;
        Ok(json
            .get("data")
            .and_then(|d| d.get("diff"))
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default())
    }

    /// 概念/地区/风格板块归属（数据中心核心题材表）
    async fn fetch_theme_rows(&self) -> Result<Vec<RawSectorRow>> {
        let url = format!(
            "https://datacenter.eastmoney.com/securities/api/data/v1/get?reportName=RPT_F10_CORETHEME_BOARDTYPE\
             &columns=SECUCODE,SECURITY_CODE,SECURITY_NAME_ABBR,NEW_BOARD_CODE,BOARD_NAME,IS_PRECISE,BOARD_RANK\
             &pageNumber=1&pageSize={}&sortTypes=1&sortColumns=BOARD_RANK&source=HSF10&client=PC",
            self.page_size
        );
        let json = self.fetch("板块归属", &url).await?;
        if !json.get("success").and_then(|v| v.as_bool()).unwrap_or(false) {
            let msg = json.get("message").and_then(|v| v.as_str()).unwrap_or("unknown");
            return Err(anyhow!("板块归属接口返回失败: {}", msg));
        }
        let items = json
            .get("result")
            .and_then(|r| r.get("data"))
            .and_then(|d| d.as_array())
            .cloned()
            .unwrap_or_default();

        if let Some(total) = truncated_total(&json, items.len()) {
            log::warn!(
                "板块归属表仅取到 {}/{} 条（单页上限 {}），板块目录不完整",
                items.len(),
                total,
                self.page_size
            );
        }

        if let Some(first) = items.first().and_then(|i| i.as_object()) {
            let present: Vec<&str> = first.keys().map(|k| k.as_str()).collect();
            validate_columns("RPT_F10_CORETHEME_BOARDTYPE", &present, SECTOR_TABLE_COLUMNS)?;
        }

        Ok(items.iter().map(parse_theme_row).collect())
    }
}

/// 数据中心 result.count 超过本页条数时返回总数
fn truncated_total(json: &serde_json::Value, returned: usize) -> Option<u64> {
    json.get("result")
        .and_then(|r| r.get("count"))
        .and_then(|c| c.as_u64())
        .filter(|&total| total > returned as u64)
}

fn get_str(item: &serde_json::Value, key: &str) -> String {
    item.get(key).and_then(|v| v.as_str()).unwrap_or("").trim().to_string()
}

/// 数值字段，"-" 或缺失返回 None
fn get_f64(item: &serde_json::Value, key: &str) -> Option<f64> {
    item.get(key).and_then(|v| {
        if v.is_f64() {
            v.as_f64()
        } else if v.is_i64() {
            v.as_i64().map(|i| i as f64)
        } else if v.is_string() {
            v.as_str().and_then(|s| s.parse::<f64>().ok())
        } else {
            None
        }
    })
}

fn parse_theme_row(item: &serde_json::Value) -> RawSectorRow {
    RawSectorRow {
        security_code: get_str(item, "SECURITY_CODE"),
        security_name: get_str(item, "SECURITY_NAME_ABBR"),
        sector_code: get_str(item, "NEW_BOARD_CODE"),
        sector_name: get_str(item, "BOARD_NAME"),
        rank_weight: get_f64(item, "BOARD_RANK").unwrap_or(f64::MAX),
        official_industry: false,
    }
}

/// clist 行 → 代码（f13 市场：1 沪，0 深/北）
fn list_item_id(item: &serde_json::Value) -> Option<InstrumentId> {
    let code = item.get("f12")?.as_str()?;
    match item.get("f13")?.as_i64()? {
        1 => InstrumentId::new(Exchange::Shanghai, code),
        _ => InstrumentId::parse(code),
    }
}

/// 日K行: "日期,开,收,高,低,成交量,成交额,振幅,涨跌幅,涨跌额,换手率"
fn parse_kline_line(line: &str) -> Option<DailyBar> {
    let p: Vec<&str> = line.split(',').collect();
    if p.len() < 7 {
        return None;
    }
    let num = |i: usize| p.get(i).and_then(|s| s.parse::<f64>().ok());
    Some(DailyBar {
        date: p[0].to_string(),
        open: num(1)?,
        close: num(2)?,
        high: num(3)?,
        low: num(4)?,
        volume: num(5)?,
        amount: num(6)?,
        pct_chg: num(8),
        turnover_rate: num(10),
    })
}

/// 资金流向行: "日期,主力净额,小单净额,中单净额,大单净额,超大单净额,主力净占比,..."
fn parse_flow_line(line: &str) -> Option<CapitalFlowRecord> {
    let p: Vec<&str> = line.split(',').collect();
    if p.len() < 7 {
        return None;
    }
    let num = |i: usize| p.get(i).and_then(|s| s.parse::<f64>().ok());
    Some(CapitalFlowRecord {
        date: p[0].to_string(),
        main_net: num(1)?,
        large_net: num(4).unwrap_or(0.0),
        super_large_net: num(5).unwrap_or(0.0),
        turnover: None,
        main_pct: num(6),
    })
}

#[async_trait]
impl MarketDataSource for EastMoneySource {
    async fn fetch_sector_rows(&self) -> Result<Vec<RawSectorRow>> {
        let mut rows = self.fetch_theme_rows().await?;

        // 行业取行情列表里的所属行业字段
        let list = self.fetch_stock_list().await?;
        let industry_rows = list.iter().filter_map(|item| {
            let industry = get_str(item, "f100");
            if industry.is_empty() || industry == "-" {
                return None;
            }
            Some(RawSectorRow {
                security_code: list_item_id(item)?.to_string(),
                security_name: get_str(item, "f14"),
                sector_code: String::new(),
                sector_name: industry,
                rank_weight: 0.0,
                official_industry: true,
            })
        });
        rows.extend(industry_rows);
        log::info!("板块归属原始记录 {} 条", rows.len());
        Ok(rows)
    }

    async fn list_instruments(&self) -> Result<Vec<InstrumentId>> {
        let list = self.fetch_stock_list().await?;
        Ok(list.iter().filter_map(list_item_id).collect())
    }

    async fn fetch_instrument(&self, id: &InstrumentId) -> Result<InstrumentData> {
        let kline_url = format!(
            "https://push2his.eastmoney.com/api/qt/stock/kline/get?secid={}&fields1=f1,f2,f3\
             &fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61&klt=101&fqt=1&end=20500101&lmt={}",
            id.secid(),
            self.kline_days
        );
        let json = self.fetch("日K线", &kline_url).await?;
        let data = json.get("data").filter(|d| !d.is_null()).ok_or_else(|| anyhow!("{} 无K线数据", id))?;
        let bars: Vec<DailyBar> = data
            .get("klines")
            .and_then(|k| k.as_array())
            .map(|lines| lines.iter().filter_map(|l| l.as_str()).filter_map(parse_kline_line).collect())
            .unwrap_or_default();
        let kline_name = get_str(data, "name");

        // 估值/财务快照：f2 最新价, f9 市盈率TTM, f23 市净率, f37 ROE, f115 营收同比
        let quote_url = format!(
            "https://push2.eastmoney.com/api/qt/ulist.np/get?fltt=2&invt=2&fields=f2,f9,f12,f14,f23,f37,f115&secids={}",
            id.secid()
        );
        let quote = self.fetch("行情快照", &quote_url).await?;
        let item = quote
            .get("data")
            .and_then(|d| d.get("diff"))
            .and_then(|d| d.as_array())
            .and_then(|a| a.first())
            .cloned()
            .unwrap_or(serde_json::Value::Null);

        let name = Some(get_str(&item, "f14")).filter(|n| !n.is_empty()).unwrap_or(kline_name);
        let price = get_f64(&item, "f2");
        Ok(InstrumentData {
            id: id.clone(),
            risk: RiskFlags {
                is_st: name.to_uppercase().contains("ST"),
                suspended: !item.is_null() && price.map_or(true, |p| p <= 0.0),
            },
            name,
            bars,
            valuation: Valuation {
                pe_ttm: get_f64(&item, "f9"),
                pb: get_f64(&item, "f23"),
                ps_ttm: None,
            },
            fundamentals: Fundamentals {
                roe: get_f64(&item, "f37"),
                revenue_yoy: get_f64(&item, "f115"),
                profit_yoy: None,
                gross_margin: None,
            },
        })
    }

    async fn fetch_capital_flow(&self, id: &InstrumentId, days: usize) -> Result<Vec<CapitalFlowRecord>> {
        let url = format!(
            "https://push2his.eastmoney.com/api/qt/stock/fflow/daykline/get?secid={}&fields1=f1,f2,f3\
             &fields2=f51,f52,f53,f54,f55,f56,f57,f58,f59,f60,f61,f62,f63,f64,f65&klt=101&lmt={}",
            id.secid(),
            days
        );
        let json = self.fetch("资金流向", &url).await?;
        Ok(json
            .get("data")
            .and_then(|d| d.get("klines"))
            .and_then(|k| k.as_array())
            .map(|lines| lines.iter().filter_map(|l| l.as_str()).filter_map(parse_flow_line).collect())
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_kline_line() {
        let bar = parse_kline_line("2024-06-03,10.10,10.50,10.60,10.00,123456,1.3e8,5.9,3.96,0.40,2.15").unwrap();
        assert_eq!(bar.date, "2024-06-03");
        assert_eq!(bar.close, 10.5);
        assert_eq!(bar.high, 10.6);
        assert_eq!(bar.pct_chg, Some(3.96));
        assert_eq!(bar.turnover_rate, Some(2.15));
        assert!(parse_kline_line("2024-06-03,-,-").is_none());
    }

    #[test]
    fn test_parse_flow_line() {
        let r = parse_flow_line("2024-06-03,-12345678.0,100.0,200.0,-3000000.0,-9345678.0,-8.12,0,0").unwrap();
        assert_eq!(r.main_net, -12345678.0);
        assert_eq!(r.super_large_net, -9345678.0);
        assert_eq!(r.main_pct, Some(-8.12));
    }

    #[test]
    fn test_theme_row_and_list_item() {
        let row = parse_theme_row(&json!({
            "SECURITY_CODE": "300285",
            "SECURITY_NAME_ABBR": "国瓷材料",
            "NEW_BOARD_CODE": "BK1184",
            "BOARD_NAME": "AI语料",
            "BOARD_RANK": 3
        }));
        assert_eq!(row.sector_name, "AI语料");
        assert_eq!(row.rank_weight, 3.0);

        let sh = list_item_id(&json!({"f12": "900901", "f13": 1})).unwrap();
        assert_eq!(sh.to_string(), "sh.900901");
        let bj = list_item_id(&json!({"f12": "830799", "f13": 0})).unwrap();
        assert_eq!(bj.to_string(), "bj.830799");
        let bj92 = list_item_id(&json!({"f12": "920118", "f13": 0})).unwrap();
        assert_eq!(bj92.to_string(), "bj.920118");
        assert_eq!(bj92.secid(), "0.920118");
    }

    #[test]
    fn test_truncated_theme_table_detected() {
        let full = json!({"result": {"count": 3, "data": [{}, {}, {}]}});
        assert_eq!(truncated_total(&full, 3), None);
        let partial = json!({"result": {"count": 12000, "data": []}});
        assert_eq!(truncated_total(&partial, 5000), Some(12000));
        assert_eq!(truncated_total(&json!({"result": {}}), 10), None);
    }

    #[test]
    fn test_dash_is_missing() {
        let item = json!({"f9": "-", "f23": 1.25, "f37": 8});
        assert_eq!(get_f64(&item, "f9"), None);
        assert_eq!(get_f64(&item, "f23"), Some(1.25));
        assert_eq!(get_f64(&item, "f37"), Some(8.0));
    }
}
