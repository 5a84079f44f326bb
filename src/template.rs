use crate::content::{self, Op, Operand};
use crate::error::FormSealError;
use crate::fit::WidthTable;
use crate::types::Rect;
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject, ObjectId as LoObjectId};
use std::collections::BTreeMap;

/// Fallback font selection used when a field declares no usable `/DA`.
pub(crate) const FALLBACK_FONT: &str = "Helv";
pub(crate) const FALLBACK_SIZE: f32 = 12.0;

/// A single-page form template, parsed once into a typed graph. The document
/// itself stays read-only; each fill run clones it.
#[derive(Debug)]
pub struct Template {
    pub(crate) doc: LoDocument,
    pub(crate) page_id: LoObjectId,
    pub(crate) fields: Vec<FieldDef>,
    width_tables: BTreeMap<String, WidthTable>,
}

/// One named text field: target rectangle, declared font selection, and the
/// object id of its reusable appearance stream when the template carries one.
#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub rect: Rect,
    pub font_name: String,
    pub font_size: f32,
    pub(crate) annot_id: LoObjectId,
    pub(crate) appearance: Option<LoObjectId>,
}

impl Template {
    pub fn from_bytes(bytes: &[u8]) -> Result<Template, FormSealError> {
        let doc = LoDocument::load_mem(bytes)
            .map_err(|err| FormSealError::Template(format!("failed to parse template: {err}")))?;
        if doc.is_encrypted() {
            return Err(FormSealError::Template(
                "template PDF is encrypted".to_string(),
            ));
        }
        let pages = doc.get_pages();
        if pages.len() != 1 {
            return Err(FormSealError::Template(format!(
                "template must have exactly one page, found {}",
                pages.len()
            )));
        }
        let Some(page_id) = pages.values().next().copied() else {
            return Err(FormSealError::Template("template has no pages".to_string()));
        };
        let fields = collect_fields(&doc, page_id);
        let width_tables = collect_width_tables(&doc);
        Ok(Template {
            doc,
            page_id,
            fields,
            width_tables,
        })
    }

    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Template, FormSealError> {
        let data = std::fs::read(path.as_ref())?;
        Template::from_bytes(&data)
    }

    /// Capability check selecting the patch path over the synthesize path:
    /// true when at least one field carries a reusable appearance stream.
    pub fn has_appearances(&self) -> bool {
        self.fields.iter().any(|field| field.appearance.is_some())
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|field| field.name.as_str())
    }

    /// Width table declared for a font in the template's own `/DR` resources.
    pub(crate) fn width_table_for(&self, font_name: &str) -> Option<&WidthTable> {
        self.width_tables.get(font_name)
    }
}

fn collect_fields(doc: &LoDocument, page_id: LoObjectId) -> Vec<FieldDef> {
    let Ok(page) = doc.get_object(page_id).and_then(LoObject::as_dict) else {
        return Vec::new();
    };
    let Some(annots) = page.get(b"Annots").ok().and_then(|obj| resolve_array(doc, obj)) else {
        return Vec::new();
    };

    let default_da = acroform_dict(doc)
        .and_then(|acro| acro.get(b"DA").ok())
        .and_then(string_bytes)
        .map(|bytes| bytes.to_vec());

    let mut fields = Vec::new();
    for entry in annots {
        let LoObject::Reference(annot_id) = entry else {
            // Widget annotations are indirect objects in practice; anything
            // inline cannot be rewritten in place and is left alone.
            log::debug!("skipping inline annotation on page object");
            continue;
        };
        let Ok(annot) = doc.get_object(*annot_id).and_then(LoObject::as_dict) else {
            continue;
        };
        let Some(name) = annot
            .get(b"T")
            .ok()
            .and_then(string_bytes)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
        else {
            continue;
        };
        let Some(rect) = annot
            .get(b"Rect")
            .ok()
            .and_then(|obj| resolve_array(doc, obj))
            .and_then(|array| rect_from_array(array))
        else {
            log::debug!("field '{name}' has no usable /Rect, skipping");
            continue;
        };

        let da = annot
            .get(b"DA")
            .ok()
            .and_then(string_bytes)
            .map(|bytes| bytes.to_vec())
            .or_else(|| default_da.clone());
        let (font_name, font_size) = da
            .as_deref()
            .and_then(parse_da)
            .unwrap_or_else(|| (FALLBACK_FONT.to_string(), FALLBACK_SIZE));

        let appearance = appearance_stream_id(doc, annot);

        fields.push(FieldDef {
            name,
            rect,
            font_name,
            font_size,
            annot_id: *annot_id,
            appearance,
        });
    }
    fields
}

/// Extract the font name and size from a `/DA` default-appearance string by
/// tokenizing it with the content grammar and taking the first font-select.
fn parse_da(da: &[u8]) -> Option<(String, f32)> {
    for instr in content::tokenize(da) {
        if instr.op != Op::SelectFont || instr.operands.len() < 2 {
            continue;
        }
        let Operand::Name(name) = &instr.operands[0].value else {
            continue;
        };
        let Operand::Number(size) = instr.operands[1].value else {
            continue;
        };
        return Some((name.clone(), size as f32));
    }
    None
}

fn appearance_stream_id(doc: &LoDocument, annot: &Dictionary) -> Option<LoObjectId> {
    let ap = annot.get(b"AP").ok().and_then(|obj| resolve_dict(doc, obj))?;
    let LoObject::Reference(id) = ap.get(b"N").ok()? else {
        // A state subdictionary means there is no single normal stream.
        return None;
    };
    match doc.get_object(*id) {
        Ok(LoObject::Stream(_)) => Some(*id),
        _ => None,
    }
}

fn rect_from_array(array: &[LoObject]) -> Option<Rect> {
    if array.len() != 4 {
        return None;
    }
    let mut coords = [0.0f32; 4];
    for (slot, obj) in coords.iter_mut().zip(array) {
        *slot = number(obj)?;
    }
    Some(Rect::from_corners(coords[0], coords[1], coords[2], coords[3]))
}

fn collect_width_tables(doc: &LoDocument) -> BTreeMap<String, WidthTable> {
    let mut tables = BTreeMap::new();
    let Some(acro) = acroform_dict(doc) else {
        return tables;
    };
    let Some(dr) = acro.get(b"DR").ok().and_then(|obj| resolve_dict(doc, obj)) else {
        return tables;
    };
    let Some(dr_fonts) = dr.get(b"Font").ok().and_then(|obj| resolve_dict(doc, obj)) else {
        return tables;
    };
    for (key, value) in dr_fonts.iter() {
        let Some(font) = resolve_dict(doc, value) else {
            continue;
        };
        let first_char = font
            .get(b"FirstChar")
            .ok()
            .and_then(|obj| obj.as_i64().ok())
            .unwrap_or(0) as u32;
        let Some(widths) = font.get(b"Widths").ok().and_then(|obj| resolve_array(doc, obj))
        else {
            continue;
        };
        let widths: Vec<u16> = widths
            .iter()
            .map(|obj| number(obj).unwrap_or(0.0).round().clamp(0.0, u16::MAX as f32) as u16)
            .collect();
        let name = String::from_utf8_lossy(key).into_owned();
        tables.insert(name, WidthTable::new(first_char, widths));
    }
    tables
}

pub(crate) fn acroform_dict(doc: &LoDocument) -> Option<&Dictionary> {
    let root_id = doc.trailer.get(b"Root").ok()?.as_reference().ok()?;
    let catalog = doc.get_object(root_id).and_then(LoObject::as_dict).ok()?;
    catalog.get(b"AcroForm").ok().and_then(|obj| resolve_dict(doc, obj))
}

pub(crate) fn resolve_dict<'a>(doc: &'a LoDocument, obj: &'a LoObject) -> Option<&'a Dictionary> {
    match obj {
        LoObject::Dictionary(dict) => Some(dict),
        LoObject::Reference(id) => doc
            .get_object(*id)
            .ok()
            .and_then(|resolved| resolved.as_dict().ok()),
        _ => None,
    }
}

pub(crate) fn resolve_array<'a>(doc: &'a LoDocument, obj: &'a LoObject) -> Option<&'a Vec<LoObject>> {
    match obj {
        LoObject::Array(array) => Some(array),
        LoObject::Reference(id) => doc
            .get_object(*id)
            .ok()
            .and_then(|resolved| resolved.as_array().ok()),
        _ => None,
    }
}

pub(crate) fn number(obj: &LoObject) -> Option<f32> {
    match obj {
        LoObject::Integer(value) => Some(*value as f32),
        LoObject::Real(value) => Some(*value),
        _ => None,
    }
}

fn string_bytes(obj: &LoObject) -> Option<&[u8]> {
    match obj {
        LoObject::String(bytes, _) => Some(bytes),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Pt;
    use lopdf::{Stream as LoStream, dictionary};

    fn make_template_bytes(with_appearance: bool, with_dr: bool) -> Vec<u8> {
        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let content_id = doc.add_object(LoStream::new(
            dictionary! {},
            b"0.9 0.9 0.9 rg 0 0 612 792 re f".to_vec(),
        ));
        let ap_stream = b"q\n1 1 198.0 38.0 re W n\nBT\n/MuseoSlab-700 24.0 Tf\n0 g\n27.562 8.0 Td\n(Sample Name) Tj\nET\nQ\n"
            .to_vec();
        let ap_id = doc.add_object(LoStream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Form",
                "BBox" => vec![0.into(), 0.into(), 200.into(), 40.into()],
            },
            ap_stream,
        ));
        let mut annot = dictionary! {
            "Type" => "Annot",
            "Subtype" => "Widget",
            "FT" => "Tx",
            "T" => LoObject::string_literal("Name"),
            "Rect" => vec![100.into(), 500.into(), 300.into(), 540.into()],
            "DA" => LoObject::string_literal("/MuseoSlab-700 24 Tf 0 g"),
        };
        if with_appearance {
            annot.set("AP", LoObject::Dictionary(dictionary! { "N" => ap_id }));
        }
        let annot_id = doc.add_object(annot);
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => dictionary! {},
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Annots" => vec![annot_id.into()],
        });
        doc.objects.insert(
            pages_id,
            LoObject::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let mut acro = dictionary! {
            "Fields" => vec![annot_id.into()],
        };
        if with_dr {
            let dr_font_id = doc.add_object(dictionary! {
                "Type" => "Font",
                "Subtype" => "Type1",
                "BaseFont" => "MuseoSlab-700",
                "FirstChar" => 32,
                "Widths" => (0..224).map(|_| 500.into()).collect::<Vec<LoObject>>(),
            });
            acro.set(
                "DR",
                LoObject::Dictionary(dictionary! {
                    "Font" => dictionary! { "MuseoSlab-700" => dr_font_id },
                }),
            );
        }
        let acro_id = doc.add_object(acro);
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
            "AcroForm" => acro_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut out = Vec::new();
        doc.save_to(&mut out).expect("save");
        out
    }

    #[test]
    fn loads_fields_with_rect_and_da_selection() {
        let bytes = make_template_bytes(true, true);
        let template = Template::from_bytes(&bytes).expect("load");
        assert_eq!(template.fields.len(), 1);
        let field = &template.fields[0];
        assert_eq!(field.name, "Name");
        assert_eq!(field.font_name, "MuseoSlab-700");
        assert_eq!(field.font_size, 24.0);
        assert_eq!(field.rect.x, Pt::from_i32(100));
        assert_eq!(field.rect.width, Pt::from_i32(200));
        assert_eq!(field.rect.height, Pt::from_i32(40));
        assert!(field.appearance.is_some());
        assert!(template.has_appearances());
    }

    #[test]
    fn capability_check_is_false_without_appearance_streams() {
        let bytes = make_template_bytes(false, false);
        let template = Template::from_bytes(&bytes).expect("load");
        assert_eq!(template.fields.len(), 1);
        assert!(template.fields[0].appearance.is_none());
        assert!(!template.has_appearances());
    }

    #[test]
    fn width_tables_come_from_acroform_dr() {
        let bytes = make_template_bytes(true, true);
        let template = Template::from_bytes(&bytes).expect("load");
        let table = template
            .width_table_for("MuseoSlab-700")
            .expect("width table");
        // Uniform 500-unit glyphs: "AA" at 10pt measures 10pt.
        assert_eq!(table.measure("AA", Pt::from_i32(10)), Pt::from_i32(10));
        assert!(template.width_table_for("MuseoSans-700").is_none());
    }

    #[test]
    fn da_parser_reads_first_font_select() {
        assert_eq!(
            parse_da(b"/Helv 12 Tf 0 g"),
            Some(("Helv".to_string(), 12.0))
        );
        assert_eq!(
            parse_da(b"0 g /MuseoSans-700 18.5 Tf"),
            Some(("MuseoSans-700".to_string(), 18.5))
        );
        assert_eq!(parse_da(b"0 g"), None);
        assert_eq!(parse_da(b""), None);
    }

    #[test]
    fn malformed_template_bytes_are_a_hard_error() {
        let err = Template::from_bytes(b"not a pdf").expect_err("must fail");
        assert!(err.to_string().contains("failed to parse template"));
    }
}
