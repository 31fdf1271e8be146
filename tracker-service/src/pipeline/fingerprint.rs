use tracker_client::domain::SiteRecord;

fn hash_str(hasher: &mut blake3::Hasher, s: &str) {
    let len = s.len() as u32;
    hasher.update(&len.to_le_bytes());
    hasher.update(s.as_bytes());
}

fn hash_f64(hasher: &mut blake3::Hasher, v: f64) {
    hasher.update(&v.to_bits().to_le_bytes());
}

fn hash_record(h: &mut blake3::Hasher, r: &SiteRecord) {
    hash_str(h, &r.site_id);
    hash_f64(h, r.latitude);
    hash_f64(h, r.longitude);
    hash_str(h, r.status.as_str());
    match r.installation_date {
        Some(ts) => {
            h.update(&[1]);
            h.update(&ts.unix_timestamp_nanos().to_le_bytes());
        }
        None => {
            h.update(&[0]);
        }
    }
    h.update(&(r.attributes.len() as u32).to_le_bytes());
    for (k, v) in &r.attributes {
        hash_str(h, k);
        hash_str(h, v);
    }
}

/// Content hash of a reconciled table, row order included.
pub fn fingerprint_records(records: &[SiteRecord]) -> String {
    let mut h = blake3::Hasher::new();
    h.update(&(records.len() as u64).to_le_bytes());
    for r in records {
        hash_record(&mut h, r);
    }
    h.finalize().to_hex().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;
    use tracker_client::domain::SiteStatus;

    fn record(id: &str) -> SiteRecord {
        SiteRecord {
            site_id: id.to_string(),
            latitude: 24.1,
            longitude: 46.2,
            status: SiteStatus::Installed,
            installation_date: Some(datetime!(2025-01-10 00:00:00 UTC)),
            attributes: vec![("Region".to_string(), "Riyadh".to_string())],
        }
    }

    #[test]
    fn fingerprint_is_deterministic() {
        let a = fingerprint_records(&[record("RIY0001"), record("RIY0002")]);
        let b = fingerprint_records(&[record("RIY0001"), record("RIY0002")]);
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
    }

    #[test]
    fn fingerprint_depends_on_order_and_content() {
        let base = fingerprint_records(&[record("RIY0001"), record("RIY0002")]);
        let swapped = fingerprint_records(&[record("RIY0002"), record("RIY0001")]);
        assert_ne!(base, swapped);

        let mut open = record("RIY0002");
        open.status = SiteStatus::Open;
        open.installation_date = None;
        let changed = fingerprint_records(&[record("RIY0001"), open]);
        assert_ne!(base, changed);
    }
}
