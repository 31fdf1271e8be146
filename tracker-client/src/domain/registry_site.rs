/// One row of the project registry, before reconciliation.
///
/// Coordinates are kept as the raw cell text; coercion to numbers happens
/// during reconciliation so that fallback can be applied first.
#[derive(Debug, Clone, PartialEq)]
pub struct RegistrySite {
    pub site_id: String,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
    /// Every other registry column, in header order.
    pub attributes: Vec<(String, String)>,
}

impl RegistrySite {
    pub fn new(site_id: impl Into<String>, latitude: Option<&str>, longitude: Option<&str>) -> Self {
        Self {
            site_id: site_id.into(),
            latitude: latitude.map(str::to_string),
            longitude: longitude.map(str::to_string),
            attributes: Vec::new(),
        }
    }
}
