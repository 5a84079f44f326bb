use sha2::{Digest, Sha256};

/// Found-or-missing status for one expected template or font, with a digest
/// of the bytes actually loaded so deployments can be compared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceStatus {
    pub name: String,
    pub found: bool,
    pub sha256: Option<String>,
}

/// Startup inventory consumed by an external health surface. Missing
/// templates block generation and clear `ready`; missing fonts only degrade
/// rendering to the fallback font and are reported without failing readiness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReadinessReport {
    pub templates: Vec<ResourceStatus>,
    pub fonts: Vec<ResourceStatus>,
}

impl ReadinessReport {
    pub fn ready(&self) -> bool {
        self.templates.iter().all(|status| status.found)
    }

    pub fn missing(&self) -> impl Iterator<Item = &ResourceStatus> {
        self.templates
            .iter()
            .chain(self.fonts.iter())
            .filter(|status| !status.found)
    }

    pub(crate) fn record_template(&mut self, name: &str, data: Option<&[u8]>) {
        self.templates.push(status_for(name, data));
    }

    pub(crate) fn record_font(&mut self, name: &str, data: Option<&[u8]>) {
        self.fonts.push(status_for(name, data));
    }
}

fn status_for(name: &str, data: Option<&[u8]>) -> ResourceStatus {
    ResourceStatus {
        name: name.to_string(),
        found: data.is_some(),
        sha256: data.map(hex_digest),
    }
}

fn hex_digest(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{:02x}", byte))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_template_clears_ready() {
        let mut report = ReadinessReport::default();
        report.record_template("staff", Some(b"%PDF-1.5"));
        report.record_template("tent", None);
        assert!(!report.ready());
        let missing: Vec<&str> = report.missing().map(|s| s.name.as_str()).collect();
        assert_eq!(missing, vec!["tent"]);
    }

    #[test]
    fn missing_font_degrades_without_failing_readiness() {
        let mut report = ReadinessReport::default();
        report.record_template("staff", Some(b"%PDF-1.5"));
        report.record_font("MuseoSlab-700", Some(b"font-bytes"));
        report.record_font("MuseoSans-700", None);
        assert!(report.ready());
        assert_eq!(report.missing().count(), 1);
        assert!(report.fonts[0].sha256.is_some());
        assert!(report.fonts[1].sha256.is_none());
    }

    #[test]
    fn digests_are_stable_hex_sha256() {
        let mut report = ReadinessReport::default();
        report.record_font("f", Some(b"abc"));
        assert_eq!(
            report.fonts[0].sha256.as_deref(),
            Some("ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad")
        );
    }
}
