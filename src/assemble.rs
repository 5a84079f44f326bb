use crate::error::FormSealError;
use lopdf::{Document as LoDocument, Object as LoObject, ObjectId as LoObjectId, dictionary};

fn compose_err(err: lopdf::Error) -> FormSealError {
    FormSealError::Compose(format!("pdf assemble error: {err}"))
}

/// Concatenate finished single-record pages into one document, preserving
/// input order. All-or-nothing: any structural failure aborts the batch.
pub fn concat_pages(pages: Vec<LoDocument>) -> Result<LoDocument, FormSealError> {
    if pages.is_empty() {
        return Err(FormSealError::EmptyBatch);
    }

    let mut merged = LoDocument::with_version("1.7");
    let pages_id = merged.new_object_id();
    let mut kids: Vec<LoObject> = Vec::new();

    for src in pages {
        let page_ids = import_document_objects(&mut merged, src)?;
        for page_id in page_ids {
            let page = merged
                .get_object_mut(page_id)
                .and_then(LoObject::as_dict_mut)
                .map_err(compose_err)?;
            page.set("Parent", LoObject::Reference(pages_id));
            kids.push(LoObject::Reference(page_id));
        }
    }

    let count = kids.len() as i64;
    merged.objects.insert(
        pages_id,
        LoObject::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();
    Ok(merged)
}

fn import_document_objects(
    dst: &mut LoDocument,
    mut src: LoDocument,
) -> Result<Vec<LoObjectId>, FormSealError> {
    if src.is_encrypted() {
        return Err(FormSealError::Compose(
            "cannot merge an encrypted document".to_string(),
        ));
    }
    let start_id = dst.max_id + 1;
    src.renumber_objects_with(start_id);
    let page_ids: Vec<LoObjectId> = src.get_pages().values().copied().collect();
    if src.max_id > dst.max_id {
        dst.max_id = src.max_id;
    }
    dst.objects.extend(src.objects);
    Ok(page_ids)
}
