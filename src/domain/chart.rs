//! Downsampled NAV projection for charting.

use chrono::Duration;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

use super::backtest::NavPoint;
use super::portfolio::Holding;

/// Upper bound on projected points.
pub const MAX_CHART_POINTS: usize = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartPeriod {
    Week,
    #[default]
    Month,
    Half,
    Year,
    All,
}

impl ChartPeriod {
    pub const ALL: [ChartPeriod; 5] = [
        ChartPeriod::Week,
        ChartPeriod::Month,
        ChartPeriod::Half,
        ChartPeriod::Year,
        ChartPeriod::All,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ChartPeriod::Week => "week",
            ChartPeriod::Month => "month",
            ChartPeriod::Half => "half",
            ChartPeriod::Year => "year",
            ChartPeriod::All => "all",
        }
    }

    /// Calendar days covered, measured back from the last NAV date.
    pub fn lookback_days(self) -> Option<i64> {
        match self {
            ChartPeriod::Week => Some(7),
            ChartPeriod::Month => Some(30),
            ChartPeriod::Half => Some(180),
            ChartPeriod::Year => Some(365),
            ChartPeriod::All => None,
        }
    }

    fn label_format(self) -> &'static str {
        match self {
            ChartPeriod::Week | ChartPeriod::Month => "%m-%d",
            _ => "%Y-%m",
        }
    }
}

impl fmt::Display for ChartPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ChartPeriod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        ChartPeriod::ALL
            .into_iter()
            .find(|p| p.name() == wanted)
            .ok_or_else(|| {
                format!(
                    "unknown chart period '{}' (expected week, month, half, year or all)",
                    s.trim()
                )
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
    pub return_pct: f64,
    pub holding: Holding,
    pub is_cash: bool,
}

/// Projects `nav_history` onto `period`, keeping every `ceil(n / 60)`-th
/// point of the window so at most [`MAX_CHART_POINTS`] remain.
pub fn project(nav_history: &[NavPoint], period: ChartPeriod) -> Vec<ChartPoint> {
    let Some(last) = nav_history.last() else {
        return Vec::new();
    };

    let window: &[NavPoint] = match period.lookback_days() {
        Some(days) => {
            let from = last.date - Duration::days(days);
            let begin = nav_history.partition_point(|p| p.date < from);
            &nav_history[begin..]
        }
        None => nav_history,
    };

    let stride = window.len().div_ceil(MAX_CHART_POINTS).max(1);
    let format = period.label_format();

    window
        .iter()
        .step_by(stride)
        .map(|p| ChartPoint {
            label: p.date.format(format).to_string(),
            value: p.nav,
            return_pct: p.return_pct,
            holding: p.holding.clone(),
            is_cash: p.holding.is_flat(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn history(n: usize) -> Vec<NavPoint> {
        let start = NaiveDate::from_ymd_opt(2023, 1, 1).unwrap();
        (0..n)
            .map(|i| NavPoint {
                date: start + Duration::days(i as i64),
                nav: 100_000.0 + i as f64,
                holding: if i % 2 == 0 {
                    Holding::Cash
                } else {
                    Holding::Instrument("510300".into())
                },
                return_pct: i as f64 / 1000.0,
            })
            .collect()
    }

    #[test]
    fn empty_history_projects_nothing() {
        assert!(project(&[], ChartPeriod::All).is_empty());
    }

    #[test]
    fn week_window_is_inclusive() {
        let points = project(&history(100), ChartPeriod::Week);
        assert_eq!(points.len(), 8);
        assert_eq!(points[0].value, 100_092.0);
    }

    #[test]
    fn labels_follow_period() {
        let h = history(40);
        assert_eq!(project(&h, ChartPeriod::Month)[0].label, "01-10");
        assert_eq!(project(&h, ChartPeriod::Year)[0].label, "2023-01");
    }

    #[test]
    fn never_more_than_sixty_points() {
        for n in [59, 60, 61, 119, 120, 121, 365, 1000] {
            let points = project(&history(n), ChartPeriod::All);
            assert!(points.len() <= MAX_CHART_POINTS, "n = {}", n);
            assert!(!points.is_empty());
        }
        assert_eq!(project(&history(60), ChartPeriod::All).len(), 60);
        assert_eq!(project(&history(121), ChartPeriod::All).len(), 41);
    }

    #[test]
    fn cash_flag_follows_holding() {
        let points = project(&history(4), ChartPeriod::All);
        assert!(points[0].is_cash);
        assert_eq!(points[0].holding.label(), "CASH");
        assert!(!points[1].is_cash);
        assert_eq!(points[1].holding.label(), "510300");
    }

    #[test]
    fn period_parsing() {
        assert_eq!("HALF".parse::<ChartPeriod>(), Ok(ChartPeriod::Half));
        assert!("decade".parse::<ChartPeriod>().is_err());
        assert_eq!(ChartPeriod::default(), ChartPeriod::Month);
    }
}
