mod appearance;
mod assemble;
mod content;
mod error;
mod fit;
mod flatten;
mod font_table;
mod readiness;
mod template;
mod types;
mod widget;

pub use appearance::patch_appearance;
pub use error::FormSealError;
pub use fit::{Fit, FitPolicy, WidthTable, fit_text};
pub use font_table::{FontProgram, FontProgramKind, FontTable};
pub use readiness::{ReadinessReport, ResourceStatus};
pub use template::{FieldDef, Template};
pub use types::{Pt, Rect};
pub use widget::synthesize_appearance;

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// One record to render: the template it targets and the field values for
/// its page. Keys with no matching template field are ignored.
#[derive(Debug, Clone)]
pub struct Record {
    pub template: String,
    pub values: BTreeMap<String, String>,
}

impl Record {
    pub fn new(template: impl Into<String>) -> Record {
        Record {
            template: template.into(),
            values: BTreeMap::new(),
        }
    }

    pub fn value(mut self, name: impl Into<String>, value: impl Into<String>) -> Record {
        self.values.insert(name.into(), value.into());
        self
    }
}

/// The fill-and-flatten engine. Templates and fonts are loaded once at build
/// time and read-only afterwards; independent batches can run concurrently
/// against one engine.
#[derive(Debug)]
pub struct FormSeal {
    templates: BTreeMap<String, Template>,
    missing_templates: BTreeSet<String>,
    fonts: Arc<FontTable>,
    policy: FitPolicy,
    readiness: ReadinessReport,
}

#[derive(Default)]
pub struct FormSealBuilder {
    template_bytes: Vec<(String, Vec<u8>)>,
    template_files: Vec<(String, std::path::PathBuf)>,
    font_bytes: Vec<(String, Vec<u8>)>,
    font_files: Vec<(String, std::path::PathBuf)>,
    expected_fonts: Vec<String>,
    policy: FitPolicy,
}

impl FormSeal {
    pub fn builder() -> FormSealBuilder {
        FormSealBuilder::new()
    }

    /// Startup inventory: per expected template/font, found or missing.
    pub fn readiness(&self) -> &ReadinessReport {
        &self.readiness
    }

    pub fn template(&self, id: &str) -> Option<&Template> {
        self.templates.get(id)
    }

    /// Fill one template from a value map and return the flattened page as
    /// PDF bytes.
    pub fn fill_page(
        &self,
        template_id: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<Vec<u8>, FormSealError> {
        let mut doc = self.fill_page_doc(template_id, values)?;
        let mut out = Vec::new();
        doc.save_to(&mut out)
            .map_err(|err| FormSealError::Compose(format!("pdf serialize error: {err}")))?;
        Ok(out)
    }

    /// Render every record to a page and concatenate the pages, in input
    /// order, into one multi-page document. A failure on any record aborts
    /// the whole batch; no partial output is returned.
    pub fn assemble(&self, records: &[Record]) -> Result<Vec<u8>, FormSealError> {
        if records.is_empty() {
            return Err(FormSealError::EmptyBatch);
        }
        let mut pages = Vec::with_capacity(records.len());
        for record in records {
            pages.push(self.fill_page_doc(&record.template, &record.values)?);
        }
        let mut merged = assemble::concat_pages(pages)?;
        let mut out = Vec::new();
        merged
            .save_to(&mut out)
            .map_err(|err| FormSealError::Compose(format!("pdf serialize error: {err}")))?;
        Ok(out)
    }

    fn fill_page_doc(
        &self,
        template_id: &str,
        values: &BTreeMap<String, String>,
    ) -> Result<lopdf::Document, FormSealError> {
        let Some(template) = self.templates.get(template_id) else {
            if self.missing_templates.contains(template_id) {
                return Err(FormSealError::MissingTemplate(template_id.to_string()));
            }
            return Err(FormSealError::UnknownTemplate(template_id.to_string()));
        };
        flatten::fill_and_flatten(template, values, &self.fonts, &self.policy)
    }
}

impl FormSealBuilder {
    pub fn new() -> FormSealBuilder {
        FormSealBuilder {
            template_bytes: Vec::new(),
            template_files: Vec::new(),
            font_bytes: Vec::new(),
            font_files: Vec::new(),
            expected_fonts: Vec::new(),
            policy: FitPolicy::default(),
        }
    }

    pub fn template_bytes(mut self, id: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.template_bytes.push((id.into(), bytes));
        self
    }

    pub fn template_file(
        mut self,
        id: impl Into<String>,
        path: impl Into<std::path::PathBuf>,
    ) -> Self {
        self.template_files.push((id.into(), path.into()));
        self
    }

    pub fn font_bytes(mut self, name: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.font_bytes.push((name.into(), bytes));
        self
    }

    pub fn font_file(
        mut self,
        name: impl Into<String>,
        path: impl Into<std::path::PathBuf>,
    ) -> Self {
        self.font_files.push((name.into(), path.into()));
        self
    }

    /// Declare a font the templates reference, so the readiness report can
    /// mark it missing when nothing registers it.
    pub fn expect_font(mut self, name: impl Into<String>) -> Self {
        self.expected_fonts.push(name.into());
        self
    }

    pub fn fit_policy(mut self, policy: FitPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Load and type-resolve everything once. Template bytes that fail to
    /// parse are a hard error; a template file that is absent on disk is
    /// recorded missing and only fails the batch that tries to use it.
    /// Missing fonts degrade to the fallback and never fail the build.
    pub fn build(self) -> Result<FormSeal, FormSealError> {
        let mut readiness = ReadinessReport::default();
        let mut templates = BTreeMap::new();
        let mut missing_templates = BTreeSet::new();

        for (id, bytes) in self.template_bytes {
            let template = Template::from_bytes(&bytes)?;
            readiness.record_template(&id, Some(&bytes));
            templates.insert(id, template);
        }
        for (id, path) in self.template_files {
            match std::fs::read(&path) {
                Ok(bytes) => {
                    let template = Template::from_bytes(&bytes)?;
                    readiness.record_template(&id, Some(&bytes));
                    templates.insert(id, template);
                }
                Err(err) => {
                    log::warn!("template '{}' missing: {} ({})", id, path.display(), err);
                    readiness.record_template(&id, None);
                    missing_templates.insert(id);
                }
            }
        }

        let mut fonts = FontTable::new();
        let mut registered: Vec<String> = Vec::new();
        for (name, bytes) in self.font_bytes {
            fonts.register_bytes(&name, bytes)?;
            registered.push(name);
        }
        for (name, path) in self.font_files {
            match std::fs::read(&path) {
                Ok(bytes) => {
                    fonts.register_bytes(&name, bytes)?;
                    registered.push(name);
                }
                Err(err) => {
                    log::warn!("font '{}' missing: {} ({})", name, path.display(), err);
                }
            }
        }

        let mut reported: BTreeSet<String> = BTreeSet::new();
        for name in self
            .expected_fonts
            .iter()
            .chain(registered.iter())
        {
            if !reported.insert(name.clone()) {
                continue;
            }
            let data = fonts.resolve(name).map(|font| font.data.as_slice());
            readiness.record_font(name, data);
        }

        Ok(FormSeal {
            templates,
            missing_templates,
            fonts: Arc::new(fonts),
            policy: self.policy,
            readiness,
        })
    }
}
