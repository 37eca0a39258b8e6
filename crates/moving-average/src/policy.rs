use serde::{Deserialize, Serialize};
use std::str::FromStr;
use watch_core::{BarUnit, HistoryRequest, WatchError};

/// One indicator column: average `period` closes of `bar`-sized bars
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeframeSpec {
    pub label: String,
    pub bar: BarUnit,
    pub period: usize,
    /// Bars requested from the history source
    pub lookback: usize,
}

impl TimeframeSpec {
    /// Requests one bar more than the period so a stripped partial bar
    /// still leaves a full window.
    pub fn new(label: impl Into<String>, bar: BarUnit, period: usize) -> Self {
        Self {
            label: label.into(),
            bar,
            period,
            lookback: period + 1,
        }
    }

    pub fn request(&self) -> HistoryRequest {
        HistoryRequest {
            bar: self.bar,
            length: self.lookback,
        }
    }
}

/// The set of timeframes the engine computes for every symbol
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeframePolicy {
    name: String,
    timeframes: Vec<TimeframeSpec>,
}

impl TimeframePolicy {
    /// 10/20/60-period averages of daily closes
    pub fn daily() -> Self {
        Self {
            name: "daily".to_string(),
            timeframes: [10, 20, 60]
                .into_iter()
                .map(|period| TimeframeSpec::new(format!("MA{}", period), BarUnit::Daily, period))
                .collect(),
        }
    }

    /// A 20-bar average over 30, 60 and 120 minute bars
    pub fn intraday() -> Self {
        Self::intraday_with_period(20)
    }

    pub fn intraday_with_period(period: usize) -> Self {
        Self {
            name: "intraday".to_string(),
            timeframes: [30, 60, 120]
                .into_iter()
                .map(|minutes| {
                    TimeframeSpec::new(
                        format!("MA{}-{}m", period, minutes),
                        BarUnit::Minutes(minutes),
                        period,
                    )
                })
                .collect(),
        }
    }

    pub fn custom(name: impl Into<String>, timeframes: Vec<TimeframeSpec>) -> Self {
        Self {
            name: name.into(),
            timeframes,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn timeframes(&self) -> &[TimeframeSpec] {
        &self.timeframes
    }

    pub fn labels(&self) -> Vec<&str> {
        self.timeframes.iter().map(|t| t.label.as_str()).collect()
    }
}

impl FromStr for TimeframePolicy {
    type Err = WatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "daily" => Ok(Self::daily()),
            "intraday" => Ok(Self::intraday()),
            other => Err(WatchError::Config(format!(
                "unknown moving-average policy '{}' (expected daily or intraday)",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_policy() {
        let policy = TimeframePolicy::daily();
        assert_eq!(policy.labels(), vec!["MA10", "MA20", "MA60"]);
        let ma60 = &policy.timeframes()[2];
        assert_eq!(ma60.bar, BarUnit::Daily);
        assert_eq!(ma60.request().length, 61);
    }

    #[test]
    fn test_intraday_policy() {
        let policy = TimeframePolicy::intraday();
        assert_eq!(policy.labels(), vec!["MA20-30m", "MA20-60m", "MA20-120m"]);
        assert!(policy.timeframes().iter().all(|t| t.period == 20));
        assert_eq!(policy.timeframes()[1].bar, BarUnit::Minutes(60));
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!("Daily".parse::<TimeframePolicy>().unwrap().name(), "daily");
        assert_eq!("intraday".parse::<TimeframePolicy>().unwrap().name(), "intraday");
        assert!("weekly".parse::<TimeframePolicy>().is_err());
    }
}
