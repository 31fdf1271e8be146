pub mod domain;
pub mod queries;

pub use domain::{InstallationEvent, Kpis, RegistrySite, SiteRecord, SiteStatus, TrendPoint};
