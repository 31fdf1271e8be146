pub mod cached;
pub mod file;
pub mod http;
pub mod records;
pub mod table;

pub use cached::CachedSource;
pub use file::FileSource;
pub use http::HttpSource;
pub use table::{Table, TableFormat};

use std::time::Duration;

use time::{macros::format_description, OffsetDateTime};

use crate::{
    config::{SourceConfig, SourceKind},
    pipeline::{PipelineError, Source},
};

pub type DynSource = Box<dyn Source>;

/// Build the file or HTTP source described by one config section.
pub fn from_config(cfg: &SourceConfig) -> Result<DynSource, PipelineError> {
    let format = cfg.format.unwrap_or_else(|| TableFormat::infer(&cfg.location));
    let source: DynSource = match cfg.kind {
        SourceKind::File => Box::new(FileSource::new(&cfg.location, format, cfg.sheet.clone())),
        SourceKind::Url => Box::new(HttpSource::new(
            &cfg.location,
            format,
            cfg.sheet.clone(),
            cfg.auth_bearer_token.clone(),
            Duration::from_secs(cfg.timeout_secs),
        )?),
    };
    Ok(source)
}

/// `YYYY-MM-DD HH:MM:SS`, the form used in exports and popups.
pub fn format_timestamp(ts: OffsetDateTime) -> String {
    ts.format(format_description!("[year]-[month]-[day] [hour]:[minute]:[second]"))
        .unwrap_or_else(|_| ts.to_string())
}
