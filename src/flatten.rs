use crate::appearance::patch_appearance;
use crate::error::FormSealError;
use crate::fit::FitPolicy;
use crate::font_table::{FontProgram, FontProgramKind, FontTable};
use crate::template::{self, Template, FALLBACK_FONT};
use crate::types::{Pt, Rect};
use crate::widget::synthesize_appearance;
use lopdf::{Dictionary, Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, Stream as LoStream, dictionary};
use std::collections::{BTreeMap, BTreeSet};

fn compose_err(err: lopdf::Error) -> FormSealError {
    FormSealError::Compose(format!("pdf flatten error: {err}"))
}

/// Fill a template's fields from `values` and flatten the result into a
/// static single-page document: patched or synthesized appearances stamped
/// into the page content, fonts resolved in page resources, annotations and
/// the form definition removed. Keys with no matching field are ignored;
/// fields with no matching key are left out of the output.
pub fn fill_and_flatten(
    template: &Template,
    values: &BTreeMap<String, String>,
    fonts: &FontTable,
    policy: &FitPolicy,
) -> Result<LoDocument, FormSealError> {
    let mut doc = template.doc.clone();
    let mut stamped: Vec<(Rect, LoObjectId)> = Vec::new();
    let mut used_fonts: BTreeSet<String> = BTreeSet::new();
    let mut fallback_used = false;

    for field in &template.fields {
        let Some(value) = values.get(&field.name) else {
            continue;
        };
        let ap_id = if let Some(ap_id) = field.appearance {
            patch_field(&mut doc, template, field, value, fonts, policy, ap_id)?;
            used_fonts.insert(field.font_name.clone());
            ap_id
        } else {
            let font_name = if fonts.contains(&field.font_name) || field.font_name == FALLBACK_FONT
            {
                field.font_name.clone()
            } else {
                log::warn!(
                    "font '{}' unavailable for field '{}', falling back to {}",
                    field.font_name,
                    field.name,
                    FALLBACK_FONT
                );
                FALLBACK_FONT.to_string()
            };
            let table = fonts.width_table(&font_name);
            let stream = synthesize_appearance(
                value,
                field.rect,
                &font_name,
                Pt::from_f32(field.font_size),
                table.as_ref(),
                policy,
            );
            if font_name == FALLBACK_FONT {
                fallback_used = true;
            }
            used_fonts.insert(font_name);
            let ap_id = doc.add_object(LoStream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Form",
                    "BBox" => vec![
                        0.into(),
                        0.into(),
                        LoObject::Real(field.rect.width.to_f32()),
                        LoObject::Real(field.rect.height.to_f32()),
                    ],
                },
                stream,
            ));
            let annot = doc
                .get_object_mut(field.annot_id)
                .and_then(LoObject::as_dict_mut)
                .map_err(compose_err)?;
            annot.set("AP", LoObject::Dictionary(dictionary! { "N" => ap_id }));
            ap_id
        };

        let annot = doc
            .get_object_mut(field.annot_id)
            .and_then(LoObject::as_dict_mut)
            .map_err(compose_err)?;
        annot.set("V", LoObject::string_literal(value.as_str()));
        stamped.push((field.rect, ap_id));
    }

    install_page_fonts(&mut doc, template, fonts, &used_fonts, fallback_used)?;
    stamp_appearances(&mut doc, template.page_id, &stamped)?;
    strip_interactivity(&mut doc, template.page_id)?;

    doc.prune_objects();
    doc.renumber_objects();
    doc.compress();
    Ok(doc)
}

fn patch_field(
    doc: &mut LoDocument,
    template: &Template,
    field: &template::FieldDef,
    value: &str,
    fonts: &FontTable,
    policy: &FitPolicy,
    ap_id: LoObjectId,
) -> Result<(), FormSealError> {
    // Template /DR widths are the measurement ground truth; a registered
    // program's own table is the fallback.
    let width_table = template
        .width_table_for(&field.font_name)
        .cloned()
        .or_else(|| fonts.width_table(&field.font_name));
    let stream = doc
        .get_object_mut(ap_id)
        .and_then(LoObject::as_stream_mut)
        .map_err(compose_err)?;
    let content = stream
        .decompressed_content()
        .unwrap_or_else(|_| stream.content.clone());
    let patched = patch_appearance(
        &content,
        value,
        field.rect.width,
        Pt::from_f32(field.font_size),
        width_table.as_ref(),
        policy,
    );
    stream.dict.remove(b"Filter");
    stream.dict.remove(b"DecodeParms");
    stream.set_content(patched);
    Ok(())
}

// Every font name the stamped content references must resolve in page
// resources: embed registered programs, link remaining /DR entries by
// reference, install the base-14 fallback when used. Names already present
// are left untouched.
fn install_page_fonts(
    doc: &mut LoDocument,
    template: &Template,
    fonts: &FontTable,
    used_fonts: &BTreeSet<String>,
    fallback_used: bool,
) -> Result<(), FormSealError> {
    let page_dict = doc
        .get_object(template.page_id)
        .and_then(LoObject::as_dict)
        .map_err(compose_err)?
        .clone();
    let mut resources = page_resources_dict(doc, &page_dict);
    let mut page_fonts = nested_font_dict(doc, &resources);

    let dr_fonts: Vec<(Vec<u8>, LoObject)> = template::acroform_dict(doc)
        .and_then(|acro| acro.get(b"DR").ok().and_then(|obj| template::resolve_dict(doc, obj)))
        .and_then(|dr| dr.get(b"Font").ok().and_then(|obj| template::resolve_dict(doc, obj)))
        .map(|dict| {
            dict.iter()
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect()
        })
        .unwrap_or_default();

    for name in used_fonts {
        if name == FALLBACK_FONT || page_fonts.has(name.as_bytes()) {
            continue;
        }
        if let Some(font) = fonts.resolve(name) {
            let font_id = embedded_font_object(doc, font);
            page_fonts.set(name.as_bytes().to_vec(), LoObject::Reference(font_id));
        }
    }

    // Link whatever /DR declares and nothing embedded yet, so template
    // appearances keep resolving after the form dictionary is removed.
    for (name, entry) in dr_fonts {
        if !page_fonts.has(&name) {
            page_fonts.set(name, entry);
        }
    }

    if fallback_used && !page_fonts.has(FALLBACK_FONT.as_bytes()) {
        let helv_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        page_fonts.set(FALLBACK_FONT, LoObject::Reference(helv_id));
    }

    resources.set("Font", LoObject::Dictionary(page_fonts));
    let page = doc
        .get_object_mut(template.page_id)
        .and_then(LoObject::as_dict_mut)
        .map_err(compose_err)?;
    page.set("Resources", LoObject::Dictionary(resources));
    Ok(())
}

// Descriptor metrics from the parsed face, the program embedded as
// FontFile2 (TrueType) or FontFile3 (CFF), and a simple-font width array.
fn embedded_font_object(doc: &mut LoDocument, font: &FontProgram) -> LoObjectId {
    let metrics = &font.metrics;
    let (file_key, subtype) = match font.kind {
        FontProgramKind::TrueType => ("FontFile2", "TrueType"),
        FontProgramKind::OpenTypeCff => ("FontFile3", "Type1"),
    };

    let mut file_dict = dictionary! {
        "Length1" => font.data.len() as i64,
    };
    if font.kind == FontProgramKind::OpenTypeCff {
        file_dict.set("Subtype", LoObject::Name(b"OpenType".to_vec()));
    }
    let file_id = doc.add_object(LoStream::new(file_dict, font.data.clone()));

    let mut flags = if metrics.is_symbolic() { 4 } else { 32 };
    if metrics.is_fixed_pitch {
        flags |= 1;
    }
    let mut descriptor = dictionary! {
        "Type" => "FontDescriptor",
        "FontName" => LoObject::Name(font.name.clone().into_bytes()),
        "Flags" => flags,
        "FontBBox" => vec![
            (metrics.bbox.0 as i64).into(),
            (metrics.bbox.1 as i64).into(),
            (metrics.bbox.2 as i64).into(),
            (metrics.bbox.3 as i64).into(),
        ],
        "ItalicAngle" => metrics.italic_angle as i64,
        "Ascent" => metrics.ascent as i64,
        "Descent" => metrics.descent as i64,
        "CapHeight" => metrics.cap_height as i64,
        "StemV" => metrics.stem_v as i64,
        "MissingWidth" => metrics.missing_width as i64,
    };
    descriptor.set(file_key, LoObject::Reference(file_id));
    let descriptor_id = doc.add_object(descriptor);

    let widths: Vec<LoObject> = metrics
        .widths
        .iter()
        .map(|width| (*width as i64).into())
        .collect();
    let mut font_dict = dictionary! {
        "Type" => "Font",
        "Subtype" => subtype,
        "BaseFont" => LoObject::Name(font.name.clone().into_bytes()),
        "FirstChar" => metrics.first_char as i64,
        "LastChar" => metrics.last_char as i64,
        "Widths" => widths,
        "FontDescriptor" => descriptor_id,
    };
    if !metrics.is_symbolic() {
        font_dict.set("Encoding", LoObject::Name(b"WinAnsiEncoding".to_vec()));
    }
    doc.add_object(font_dict)
}

// A coordinate shift to the field rectangle's origin, the appearance bytes
// verbatim, and a state restore, appended after any existing page content.
fn stamp_appearances(
    doc: &mut LoDocument,
    page_id: LoObjectId,
    stamped: &[(Rect, LoObjectId)],
) -> Result<(), FormSealError> {
    if stamped.is_empty() {
        return Ok(());
    }
    let mut parts: Vec<u8> = Vec::new();
    for (rect, ap_id) in stamped {
        let content = match doc.get_object(*ap_id) {
            Ok(LoObject::Stream(stream)) => stream
                .decompressed_content()
                .unwrap_or_else(|_| stream.content.clone()),
            _ => {
                return Err(FormSealError::Compose(
                    "appearance stream object disappeared during flatten".to_string(),
                ));
            }
        };
        parts.extend_from_slice(
            format!(
                "q 1 0 0 1 {} {} cm\n",
                rect.x.fmt_coord(),
                rect.y.fmt_coord()
            )
            .as_bytes(),
        );
        parts.extend_from_slice(&content);
        parts.extend_from_slice(b"\nQ\n");
    }
    doc.add_page_contents(page_id, parts).map_err(compose_err)
}

fn strip_interactivity(doc: &mut LoDocument, page_id: LoObjectId) -> Result<(), FormSealError> {
    let page = doc
        .get_object_mut(page_id)
        .and_then(LoObject::as_dict_mut)
        .map_err(compose_err)?;
    page.set("Annots", LoObject::Array(Vec::new()));

    let root_id = doc
        .trailer
        .get(b"Root")
        .and_then(LoObject::as_reference)
        .map_err(compose_err)?;
    let catalog = doc
        .get_object_mut(root_id)
        .and_then(LoObject::as_dict_mut)
        .map_err(compose_err)?;
    catalog.remove(b"AcroForm");
    Ok(())
}

fn page_resources_dict(doc: &LoDocument, page: &Dictionary) -> Dictionary {
    match page.get(b"Resources") {
        Ok(LoObject::Dictionary(dict)) => dict.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    }
}

fn nested_font_dict(doc: &LoDocument, resources: &Dictionary) -> Dictionary {
    match resources.get(b"Font") {
        Ok(LoObject::Dictionary(dict)) => dict.clone(),
        Ok(LoObject::Reference(id)) => doc
            .get_object(*id)
            .ok()
            .and_then(|obj| obj.as_dict().ok())
            .cloned()
            .unwrap_or_default(),
        _ => Dictionary::new(),
    }
}
