use chrono::NaiveDateTime;
use watch_core::{BarUnit, HistoryBar};

/// Simple Moving Average
pub fn sma(data: &[f64], period: usize) -> Vec<f64> {
    if period == 0 || data.len() < period {
        return vec![];
    }

    let mut result = Vec::with_capacity(data.len() - period + 1);
    for i in period - 1..data.len() {
        let sum: f64 = data[i + 1 - period..=i].iter().sum();
        result.push(sum / period as f64);
    }
    result
}

/// Round to 2 decimal places, the precision indicators are stored and compared at
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Mean of the last `period` closes, rounded to 2 decimals.
/// `None` when fewer than `period` closes are available.
pub fn moving_average(closes: &[f64], period: usize) -> Option<f64> {
    if period == 0 || closes.len() < period {
        return None;
    }
    sma(&closes[closes.len() - period..], period)
        .last()
        .copied()
        .map(round2)
}

/// Whether the newest bar is still forming.
///
/// Daily bars are partial while the session that produced them is open today.
/// Intraday bars are stamped with their closing time, so a stamp later than now
/// is still forming.
pub fn is_partial_bar(bar: &HistoryBar, unit: BarUnit, now_local: NaiveDateTime) -> bool {
    match unit {
        BarUnit::Daily => bar.timestamp.date() == now_local.date(),
        BarUnit::Minutes(_) => bar.timestamp > now_local,
    }
}

/// Close prices with the last bar dropped when the market is open and it is still forming
pub fn completed_closes(
    bars: &[HistoryBar],
    unit: BarUnit,
    market_open: bool,
    now_local: NaiveDateTime,
) -> Vec<f64> {
    let bars = match bars.split_last() {
        Some((last, rest)) if market_open && is_partial_bar(last, unit, now_local) => rest,
        _ => bars,
    };
    bars.iter().map(|b| b.close).collect()
}
