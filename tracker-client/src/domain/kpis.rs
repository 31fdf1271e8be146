use time::Date;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Kpis {
    pub total: usize,
    pub installed: usize,
    pub open: usize,
    pub progress_pct: f64,
    /// Sites per day over the installation span.
    pub daily_rate: f64,
}

/// Installed sites per calendar day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TrendPoint {
    pub date: Date,
    pub installed: usize,
}
