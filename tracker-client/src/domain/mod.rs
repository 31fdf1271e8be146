mod installation_event;
mod kpis;
mod registry_site;
mod site_record;

pub use installation_event::InstallationEvent;
pub use kpis::{Kpis, TrendPoint};
pub use registry_site::RegistrySite;
pub use site_record::{normalize_site_id, ParseSiteStatusError, SiteRecord, SiteStatus};
