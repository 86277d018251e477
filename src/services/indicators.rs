use crate::models::stock::DailyBar;

/// 全部技术指标序列，与K线逐根对齐，数据不足处为 None
#[derive(Debug, Clone, Default)]
pub struct IndicatorSeries {
    pub close: Vec<f64>,
    pub ma5: Vec<Option<f64>>,
    pub ma10: Vec<Option<f64>>,
    pub ma20: Vec<Option<f64>>,
    pub ma60: Vec<Option<f64>>,
    pub macd_dif: Vec<Option<f64>>,
    pub macd_dea: Vec<Option<f64>>,
    pub macd_hist: Vec<Option<f64>>,
    pub rsi14: Vec<Option<f64>>,
    pub kdj_k: Vec<Option<f64>>,
    pub kdj_d: Vec<Option<f64>>,
    pub kdj_j: Vec<Option<f64>>,
    pub boll_upper: Vec<Option<f64>>,
    pub boll_middle: Vec<Option<f64>>,
    pub boll_lower: Vec<Option<f64>>,
    pub vol_ma5: Vec<Option<f64>>,
    pub vol_ratio: Vec<Option<f64>>,
    pub adx: Vec<Option<f64>>,
    pub plus_di: Vec<Option<f64>>,
    pub minus_di: Vec<Option<f64>>,
    pub wr14: Vec<Option<f64>>,
    pub cci14: Vec<Option<f64>>,
    pub obv: Vec<Option<f64>>,
    pub obv_ma5: Vec<Option<f64>>,
    pub atr14: Vec<Option<f64>>,
    pub atr_pct: Vec<Option<f64>>,
    pub vwap20: Vec<Option<f64>>,
}

/// 某一根K线上的指标取值
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IndicatorPoint {
    pub close: f64,
    pub ma5: Option<f64>,
    pub ma10: Option<f64>,
    pub ma20: Option<f64>,
    pub ma60: Option<f64>,
    pub macd_dif: Option<f64>,
    pub macd_dea: Option<f64>,
    pub macd_hist: Option<f64>,
    pub rsi14: Option<f64>,
    pub kdj_k: Option<f64>,
    pub kdj_d: Option<f64>,
    pub kdj_j: Option<f64>,
    pub boll_upper: Option<f64>,
    pub boll_lower: Option<f64>,
    pub vol_ratio: Option<f64>,
    pub adx: Option<f64>,
    pub plus_di: Option<f64>,
    pub minus_di: Option<f64>,
    pub wr14: Option<f64>,
    pub cci14: Option<f64>,
    pub obv: Option<f64>,
    pub obv_ma5: Option<f64>,
    pub atr_pct: Option<f64>,
    pub vwap20: Option<f64>,
}

impl IndicatorSeries {
    pub fn len(&self) -> usize {
        self.close.len()
    }

    pub fn is_empty(&self) -> bool {
        self.close.is_empty()
    }

    pub fn at(&self, i: usize) -> Option<IndicatorPoint> {
        let close = *self.close.get(i)?;
        Some(IndicatorPoint {
            close,
            ma5: self.ma5[i],
            ma10: self.ma10[i],
            ma20: self.ma20[i],
            ma60: self.ma60[i],
            macd_dif: self.macd_dif[i],
            macd_dea: self.macd_dea[i],
            macd_hist: self.macd_hist[i],
            rsi14: self.rsi14[i],
            kdj_k: self.kdj_k[i],
            kdj_d: self.kdj_d[i],
            kdj_j: self.kdj_j[i],
            boll_upper: self.boll_upper[i],
            boll_lower: self.boll_lower[i],
            vol_ratio: self.vol_ratio[i],
            adx: self.adx[i],
            plus_di: self.plus_di[i],
            minus_di: self.minus_di[i],
            wr14: self.wr14[i],
            cci14: self.cci14[i],
            obv: self.obv[i],
            obv_ma5: self.obv_ma5[i],
            atr_pct: self.atr_pct[i],
            vwap20: self.vwap20[i],
        })
    }

    pub fn latest(&self) -> Option<IndicatorPoint> {
        self.len().checked_sub(1).and_then(|i| self.at(i))
    }

    pub fn previous(&self) -> Option<IndicatorPoint> {
        self.len().checked_sub(2).and_then(|i| self.at(i))
    }
}

/// 计算所有技术指标
pub fn compute_indicators(bars: &[DailyBar]) -> IndicatorSeries {
    let closes: Vec<f64> = bars.iter().map(|k| k.close).collect();
    let highs: Vec<f64> = bars.iter().map(|k| k.high).collect();
    let lows: Vec<f64> = bars.iter().map(|k| k.low).collect();
    let volumes: Vec<f64> = bars.iter().map(|k| k.volume).collect();

    let (macd_dif, macd_dea, macd_hist) = calc_macd(&closes, 12, 26, 9);
    let (kdj_k, kdj_d, kdj_j) = calc_kdj(&highs, &lows, &closes, 9, 3, 3);
    let (boll_upper, boll_middle, boll_lower) = calc_boll(&closes, 20, 2.0);
    let (adx, plus_di, minus_di) = calc_dmi(&highs, &lows, &closes, 14);
    let obv = calc_obv(&closes, &volumes);
    let obv_ma5 = calc_ma_opt(&obv, 5);
    let atr14 = calc_atr(&highs, &lows, &closes, 14);
    let atr_pct = atr14
        .iter()
        .zip(&closes)
        .map(|(atr, c)| atr.filter(|_| *c > 0.0).map(|a| a / c * 100.0))
        .collect();
    let vol_ma5 = calc_ma(&volumes, 5);
    let vol_ratio = vol_ma5
        .iter()
        .zip(&volumes)
        .map(|(ma, v)| ma.filter(|m| *m > 0.0).map(|m| v / m))
        .collect();

    IndicatorSeries {
        ma5: calc_ma(&closes, 5),
        ma10: calc_ma(&closes, 10),
        ma20: calc_ma(&closes, 20),
        ma60: calc_ma(&closes, 60),
        macd_dif,
        macd_dea,
        macd_hist,
        rsi14: calc_rsi(&closes, 14),
        kdj_k,
        kdj_d,
        kdj_j,
        boll_upper,
        boll_middle,
        boll_lower,
        vol_ma5,
        vol_ratio,
        adx,
        plus_di,
        minus_di,
        wr14: calc_wr(&highs, &lows, &closes, 14),
        cci14: calc_cci(&highs, &lows, &closes, 14),
        obv,
        obv_ma5,
        atr14,
        atr_pct,
        vwap20: calc_vwap(&closes, &volumes, 20),
        close: closes,
    }
}

// ====== 指标计算函数 ======

fn calc_ma(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period { return result; }

    let mut sum: f64 = data[..period].iter().sum();
    result[period - 1] = Some(sum / period as f64);

    for i in period..data.len() {
        sum += data[i] - data[i - period];
        result[i] = Some(sum / period as f64);
    }
    result
}

/// 带缺口序列的均线：窗口内任一值缺失则结果缺失
fn calc_ma_opt(data: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 { return result; }
    for i in (period.saturating_sub(1))..data.len() {
        let window = &data[i + 1 - period..=i];
        if window.iter().all(|v| v.is_some()) {
            result[i] = Some(window.iter().flatten().sum::<f64>() / period as f64);
        }
    }
    result
}

/// 指数平滑（首值作为种子）
fn ema_values(data: &[f64], period: usize) -> Vec<f64> {
    let mut result = Vec::with_capacity(data.len());
    if data.is_empty() || period == 0 { return result; }

    let multiplier = 2.0 / (period as f64 + 1.0);
    result.push(data[0]);
    for i in 1..data.len() {
        let prev = result[i - 1];
        result.push(data[i] * multiplier + prev * (1.0 - multiplier));
    }
    result
}

fn calc_macd(data: &[f64], fast: usize, slow: usize, signal: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let ema_fast = ema_values(data, fast);
    let ema_slow = ema_values(data, slow);
    let dif: Vec<f64> = ema_fast.iter().zip(&ema_slow).map(|(f, s)| f - s).collect();
    // DEA = EMA(DIF, signal)
    let dea = ema_values(&dif, signal);
    let hist: Vec<f64> = dif.iter().zip(&dea).map(|(d, e)| (d - e) * 2.0).collect();

    let wrap = |v: Vec<f64>| v.into_iter().map(Some).collect::<Vec<_>>();
    (wrap(dif), wrap(dea), wrap(hist))
}

fn calc_kdj(highs: &[f64], lows: &[f64], closes: &[f64], n: usize, m1: usize, m2: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let len = closes.len();
    let mut k_vals = vec![None; len];
    let mut d_vals = vec![None; len];
    let mut j_vals = vec![None; len];

    if n == 0 || len < n { return (k_vals, d_vals, j_vals); }

    let mut prev_k = 50.0_f64;
    let mut prev_d = 50.0_f64;

    for i in (n - 1)..len {
        let start = i + 1 - n;
        let highest = highs[start..=i].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lowest = lows[start..=i].iter().cloned().fold(f64::INFINITY, f64::min);

        let rsv = if (highest - lowest).abs() < 1e-10 {
            50.0
        } else {
            (closes[i] - lowest) / (highest - lowest) * 100.0
        };

        let k = prev_k * (m1 as f64 - 1.0) / m1 as f64 + rsv / m1 as f64;
        let d = prev_d * (m2 as f64 - 1.0) / m2 as f64 + k / m2 as f64;
        let j = 3.0 * k - 2.0 * d;

        k_vals[i] = Some(k);
        d_vals[i] = Some(d);
        j_vals[i] = Some(j);

        prev_k = k;
        prev_d = d;
    }

    (k_vals, d_vals, j_vals)
}

/// Wilder 平滑 RSI
fn calc_rsi(data: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut result = vec![None; data.len()];
    if period == 0 || data.len() < period + 1 { return result; }

    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..=period {
        let change = data[i] - data[i - 1];
        if change > 0.0 { avg_gain += change; }
        else { avg_loss += change.abs(); }
    }

    avg_gain /= period as f64;
    avg_loss /= period as f64;
    result[period] = Some(rsi_from(avg_gain, avg_loss));

    for i in (period + 1)..data.len() {
        let change = data[i] - data[i - 1];
        let (gain, loss) = if change > 0.0 { (change, 0.0) } else { (0.0, change.abs()) };

        avg_gain = (avg_gain * (period as f64 - 1.0) + gain) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + loss) / period as f64;
        result[i] = Some(rsi_from(avg_gain, avg_loss));
    }

    result
}

fn rsi_from(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss.abs() < 1e-10 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

/// 布林带，标准差取样本标准差
fn calc_boll(data: &[f64], period: usize, multiplier: f64) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = data.len();
    let mut upper = vec![None; n];
    let mut middle = vec![None; n];
    let mut lower = vec![None; n];

    if period < 2 || n < period { return (upper, middle, lower); }

    for i in (period - 1)..n {
        let start = i + 1 - period;
        let slice = &data[start..=i];
        let mean: f64 = slice.iter().sum::<f64>() / period as f64;
        let variance: f64 = slice.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / (period - 1) as f64;
        let std_dev = variance.sqrt();

        middle[i] = Some(mean);
        upper[i] = Some(mean + multiplier * std_dev);
        lower[i] = Some(mean - multiplier * std_dev);
    }

    (upper, middle, lower)
}

fn true_ranges(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..closes.len())
        .map(|i| {
            let hl = highs[i] - lows[i];
            if i == 0 {
                hl
            } else {
                let pc = closes[i - 1];
                hl.max((highs[i] - pc).abs()).max((lows[i] - pc).abs())
            }
        })
        .collect()
}

fn calc_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    ema_values(&true_ranges(highs, lows, closes), period)
        .into_iter()
        .map(Some)
        .collect()
}

/// DMI/ADX 趋势强度，返回 (ADX, +DI, -DI)
fn calc_dmi(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> (Vec<Option<f64>>, Vec<Option<f64>>, Vec<Option<f64>>) {
    let n = closes.len();
    let mut plus_dm = vec![0.0; n];
    let mut minus_dm = vec![0.0; n];
    for i in 1..n {
        let up = highs[i] - highs[i - 1];
        let down = lows[i - 1] - lows[i];
        if up > down && up > 0.0 { plus_dm[i] = up; }
        if down > up && down > 0.0 { minus_dm[i] = down; }
    }

    let atr = ema_values(&true_ranges(highs, lows, closes), period);
    let plus_sm = ema_values(&plus_dm, period);
    let minus_sm = ema_values(&minus_dm, period);

    let mut plus_di = vec![None; n];
    let mut minus_di = vec![None; n];
    let mut dx = vec![0.0; n];
    for i in 0..n {
        if atr[i] <= 0.0 { continue; }
        let p = 100.0 * plus_sm[i] / atr[i];
        let m = 100.0 * minus_sm[i] / atr[i];
        plus_di[i] = Some(p);
        minus_di[i] = Some(m);
        if p + m > 0.0 {
            dx[i] = 100.0 * (p - m).abs() / (p + m);
        }
    }

    let adx = ema_values(&dx, period).into_iter().map(Some).collect();
    (adx, plus_di, minus_di)
}

/// 威廉指标，取值 -100 ~ 0
fn calc_wr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if period == 0 || n < period { return result; }
    for i in (period - 1)..n {
        let start = i + 1 - period;
        let highest = highs[start..=i].iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let lowest = lows[start..=i].iter().cloned().fold(f64::INFINITY, f64::min);
        if highest - lowest > 1e-10 {
            result[i] = Some(-100.0 * (highest - closes[i]) / (highest - lowest));
        }
    }
    result
}

fn calc_cci(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if period == 0 || n < period { return result; }
    let tp: Vec<f64> = (0..n).map(|i| (highs[i] + lows[i] + closes[i]) / 3.0).collect();
    for i in (period - 1)..n {
        let window = &tp[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let md = window.iter().map(|x| (x - mean).abs()).sum::<f64>() / period as f64;
        if md > 1e-10 {
            result[i] = Some((tp[i] - mean) / (0.015 * md));
        }
    }
    result
}

/// 能量潮：首根为 0，之后按涨跌方向累加成交量
fn calc_obv(closes: &[f64], volumes: &[f64]) -> Vec<Option<f64>> {
    let mut result = Vec::with_capacity(closes.len());
    let mut acc = 0.0;
    for i in 0..closes.len() {
        if i > 0 {
            let diff = closes[i] - closes[i - 1];
            if diff > 0.0 {
                acc += volumes[i];
            } else if diff < 0.0 {
                acc -= volumes[i];
            }
        }
        result.push(Some(acc));
    }
    result
}

/// 滚动成交量加权均价
fn calc_vwap(closes: &[f64], volumes: &[f64], period: usize) -> Vec<Option<f64>> {
    let n = closes.len();
    let mut result = vec![None; n];
    if period == 0 || n < period { return result; }
    for i in (period - 1)..n {
        let start = i + 1 - period;
        let vol: f64 = volumes[start..=i].iter().sum();
        if vol > 0.0 {
            let tp: f64 = (start..=i).map(|j| closes[j] * volumes[j]).sum();
            result[i] = Some(tp / vol);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bars(closes: &[f64]) -> Vec<DailyBar> {
        closes
            .iter()
            .enumerate()
            .map(|(i, c)| DailyBar {
                date: format!("2024-01-{:02}", i + 1),
                open: *c,
                high: c + 0.5,
                low: c - 0.5,
                close: *c,
                volume: 1000.0,
                amount: c * 1000.0,
                turnover_rate: None,
                pct_chg: None,
            })
            .collect()
    }

    #[test]
    fn test_ma_window_alignment() {
        let ma = calc_ma(&[1.0, 2.0, 3.0, 4.0, 5.0], 3);
        assert_eq!(ma, vec![None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_rsi_all_up_is_100() {
        let data: Vec<f64> = (1..=20).map(|x| x as f64).collect();
        let rsi = calc_rsi(&data, 14);
        assert!(rsi[13].is_none());
        assert_eq!(rsi[19], Some(100.0));
    }

    #[test]
    fn test_flat_series_has_no_wr_or_cci() {
        let series = compute_indicators(&bars(&[10.0; 30]));
        let latest = series.latest().unwrap();
        // 高低点固定相差 1，WR 有定义；典型价恒定，CCI 无定义
        assert_eq!(latest.wr14, Some(-50.0));
        assert_eq!(latest.cci14, None);
        assert_eq!(latest.vol_ratio, Some(1.0));
        assert_eq!(latest.obv, Some(0.0));
    }

    #[test]
    fn test_uptrend_aligns_moving_averages() {
        let closes: Vec<f64> = (0..80).map(|i| 10.0 + i as f64 * 0.2).collect();
        let series = compute_indicators(&bars(&closes));
        let p = series.latest().unwrap();
        let (ma5, ma10, ma20, ma60) = (p.ma5.unwrap(), p.ma10.unwrap(), p.ma20.unwrap(), p.ma60.unwrap());
        assert!(ma5 > ma10 && ma10 > ma20 && ma20 > ma60);
        assert!(p.plus_di.unwrap() > p.minus_di.unwrap());
        assert!(p.macd_dif.unwrap() > 0.0);
        assert!(series.previous().is_some());
    }

    #[test]
    fn test_short_series_leaves_long_windows_empty() {
        let series = compute_indicators(&bars(&[10.0, 10.5, 11.0]));
        let p = series.latest().unwrap();
        assert!(p.ma5.is_none());
        assert!(p.rsi14.is_none());
        assert!(p.boll_upper.is_none());
        assert!(p.atr_pct.is_some());
    }

    #[test]
    fn test_vwap_weights_by_volume() {
        let v = calc_vwap(&[10.0, 20.0], &[3.0, 1.0], 2);
        assert_eq!(v, vec![None, Some(12.5)]);
    }
}
