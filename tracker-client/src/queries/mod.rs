mod site_queries;

pub use site_queries::{aggregate, daily_trend, filter_sites, status_distribution, SiteFilter};
