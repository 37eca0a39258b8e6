use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// One row of the watchlist
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEntry {
    pub symbol: String,
    pub name: String,
    #[serde(default)]
    pub held: bool,
    #[serde(default)]
    pub alert_price: Option<f64>,
    #[serde(default)]
    pub alert_fired: bool,
    #[serde(skip)]
    pub last_price: Option<f64>,
    /// Assigned by the store on insertion; changes when a symbol is removed and re-added.
    #[serde(skip)]
    pub generation: u64,
}

impl WatchEntry {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            held: false,
            alert_price: None,
            alert_fired: false,
            last_price: None,
            generation: 0,
        }
    }

    pub fn with_alert(mut self, price: f64) -> Self {
        self.alert_price = Some(price);
        self.alert_fired = false;
        self
    }

    pub fn held(mut self, held: bool) -> Self {
        self.held = held;
        self
    }
}

/// Real-time quote, discarded after each poll cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub current: f64,
    pub percent: f64,
}

/// Historical close, timestamped in exchange-local time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryBar {
    pub timestamp: NaiveDateTime,
    pub close: f64,
}

/// Sampling unit of a historical series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BarUnit {
    Daily,
    Minutes(u32),
}

impl BarUnit {
    pub fn to_minutes(&self) -> u32 {
        match self {
            BarUnit::Daily => 240,
            BarUnit::Minutes(m) => *m,
        }
    }

    pub fn name(&self) -> String {
        match self {
            BarUnit::Daily => "daily".to_string(),
            BarUnit::Minutes(m) => format!("{}min", m),
        }
    }
}

/// What a history source is asked for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub bar: BarUnit,
    pub length: usize,
}

/// Latest moving-average values for one symbol, keyed by timeframe label.
/// `None` means not enough history for that timeframe.
pub type IndicatorSet = BTreeMap<String, Option<f64>>;

/// Cell a sink update targets
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Field {
    Price,
    Percent,
    Indicator(String),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Price => write!(f, "current"),
            Field::Percent => write!(f, "percent"),
            Field::Indicator(label) => write!(f, "{}", label),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub symbol: String,
    pub field: Field,
    pub value: Option<f64>,
}

impl FieldUpdate {
    pub fn new(symbol: impl Into<String>, field: Field, value: Option<f64>) -> Self {
        Self {
            symbol: symbol.into(),
            field,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CrossDirection {
    Up,
    Down,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AlertKind {
    BandTouch { timeframe: String, value: f64 },
    ThresholdCross { target: f64, direction: CrossDirection },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub symbol: String,
    pub name: String,
    pub kind: AlertKind,
    pub price: f64,
    pub detail: String,
    pub timestamp: DateTime<Utc>,
}

impl Alert {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, kind: AlertKind, price: f64) -> Self {
        let symbol = symbol.into();
        let name = name.into();
        let detail = match &kind {
            AlertKind::BandTouch { timeframe, value } => {
                format!("{} ({}) at {:.2} is within band of {} {:.2}", name, symbol, price, timeframe, value)
            }
            AlertKind::ThresholdCross { target, direction } => {
                let verb = match direction {
                    CrossDirection::Up => "rose through",
                    CrossDirection::Down => "fell through",
                };
                format!("{} ({}) {} {:.2}, now {:.2}", name, symbol, verb, target, price)
            }
        };
        Self {
            symbol,
            name,
            kind,
            price,
            detail,
            timestamp: Utc::now(),
        }
    }
}
