//! PDF merge engine
//!
//! Concatenates PDFs page by page, preserving the order the documents are
//! given in.

use crate::error::PdfMergeError;
use lopdf::{Dictionary, Document, Object, ObjectId};
use std::collections::BTreeMap;

/// Page attributes a page may inherit from its ancestors in the page tree
const INHERITABLE_KEYS: [&[u8]; 4] = [b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Give up walking `Parent` links past this depth (guards against cycles)
const MAX_TREE_DEPTH: usize = 64;

/// Something that can concatenate whole PDF documents
///
/// Implementations must keep page order: every page of document `n` comes
/// before every page of document `n + 1`.
pub trait MergeEngine: Send + Sync {
    fn merge(&self, documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfMergeError>;
}

/// Merge engine backed by lopdf
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfMerger;

impl MergeEngine for LopdfMerger {
    fn merge(&self, documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfMergeError> {
        merge_documents(documents)
    }
}

/// Merge multiple PDFs into one
///
/// The algorithm:
/// 1. If empty, return error
/// 2. Load every document, failing on the first one lopdf cannot parse,
///    and copy inherited page attributes onto each page
/// 3. Use the first document as the destination
/// 4. For each remaining document:
///    a. Offset its object IDs past the destination's highest ID
///    b. Import all objects with remapped references
///    c. Append its pages to the destination page list
/// 5. Rewrite the destination page tree, compress and serialize
pub fn merge_documents(documents: Vec<Vec<u8>>) -> Result<Vec<u8>, PdfMergeError> {
    if documents.is_empty() {
        return Err(PdfMergeError::OperationError("No documents to merge".into()));
    }

    let mut loaded_docs = Vec::with_capacity(documents.len());
    for (i, doc_bytes) in documents.iter().enumerate() {
        let mut doc = Document::load_mem(doc_bytes).map_err(|e| {
            PdfMergeError::ParseError(format!("Failed to load document {}: {}", i + 1, e))
        })?;
        inline_inherited_attributes(&mut doc);
        loaded_docs.push(doc);
    }

    let mut dest = loaded_docs.remove(0);
    let mut dest_max_id = dest.max_id;
    let mut dest_page_refs = get_page_references(&dest);

    for source in loaded_docs.into_iter() {
        let source_pages = get_page_references(&source);
        let id_offset = dest_max_id;

        let remapped_objects: BTreeMap<ObjectId, Object> = source
            .objects
            .into_iter()
            .map(|(old_id, object)| {
                (
                    (old_id.0 + id_offset, old_id.1),
                    remap_object_refs(object, id_offset),
                )
            })
            .collect();
        dest.objects.extend(remapped_objects);

        dest_page_refs.extend(
            source_pages
                .into_iter()
                .map(|old_page_ref| (old_page_ref.0 + id_offset, old_page_ref.1)),
        );

        dest_max_id = (source.max_id + id_offset).max(dest_max_id);
    }

    update_page_tree(&mut dest, &dest_page_refs)?;
    dest.max_id = dest_max_id;

    dest.compress();

    let mut buffer = Vec::new();
    dest.save_to(&mut buffer)
        .map_err(|e| PdfMergeError::OperationError(format!("Failed to save merged PDF: {}", e)))?;

    Ok(buffer)
}

/// Number of pages in a PDF
pub fn page_count(bytes: &[u8]) -> Result<usize, PdfMergeError> {
    let doc = Document::load_mem(bytes).map_err(|e| PdfMergeError::ParseError(e.to_string()))?;
    Ok(doc.get_pages().len())
}

/// Page object references in page order
fn get_page_references(doc: &Document) -> Vec<ObjectId> {
    doc.get_pages().values().copied().collect()
}

/// Copy `Resources`, `MediaBox`, `CropBox` and `Rotate` down onto every page
/// that only inherits them
///
/// The merged page tree is flat, so intermediate nodes stop contributing.
fn inline_inherited_attributes(doc: &mut Document) {
    for page_id in get_page_references(doc) {
        let inherited: Vec<(&[u8], Object)> = match doc.get_dictionary(page_id) {
            Ok(page) => INHERITABLE_KEYS
                .iter()
                .filter(|key| !page.has(key))
                .filter_map(|key| find_inherited(doc, page, key).map(|value| (*key, value)))
                .collect(),
            Err(_) => continue,
        };

        if inherited.is_empty() {
            continue;
        }
        if let Ok(page) = doc.get_dictionary_mut(page_id) {
            for (key, value) in inherited {
                page.set(key.to_vec(), value);
            }
        }
    }
}

/// Nearest ancestor value for `key`
fn find_inherited(doc: &Document, page: &Dictionary, key: &[u8]) -> Option<Object> {
    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    for _ in 0..MAX_TREE_DEPTH {
        let node = doc.get_dictionary(parent?).ok()?;
        if let Ok(value) = node.get(key) {
            return Some(value.clone());
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

/// Recursively remap object references in an object
fn remap_object_refs(obj: Object, offset: u32) -> Object {
    match obj {
        Object::Reference(id) => Object::Reference((id.0 + offset, id.1)),
        Object::Array(arr) => Object::Array(
            arr.into_iter()
                .map(|o| remap_object_refs(o, offset))
                .collect(),
        ),
        Object::Dictionary(mut dict) => {
            for (_, value) in dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Dictionary(dict)
        }
        Object::Stream(mut stream) => {
            for (_, value) in stream.dict.iter_mut() {
                *value = remap_object_refs(value.clone(), offset);
            }
            Object::Stream(stream)
        }
        other => other,
    }
}

/// Point the destination's root page node at `page_refs`, flattened
fn update_page_tree(doc: &mut Document, page_refs: &[ObjectId]) -> Result<(), PdfMergeError> {
    let catalog_id = doc
        .trailer
        .get(b"Root")
        .and_then(Object::as_reference)
        .map_err(|_| PdfMergeError::OperationError("No Root reference in trailer".into()))?;

    let pages_id = doc
        .objects
        .get(&catalog_id)
        .ok_or_else(|| PdfMergeError::OperationError("Catalog not found".into()))?
        .as_dict()
        .and_then(|catalog| catalog.get(b"Pages"))
        .and_then(Object::as_reference)
        .map_err(|_| PdfMergeError::OperationError("No Pages reference in catalog".into()))?;

    match doc.objects.get_mut(&pages_id) {
        Some(Object::Dictionary(pages_dict)) => {
            let kids = page_refs
                .iter()
                .map(|&id| Object::Reference(id))
                .collect::<Vec<_>>();
            pages_dict.set("Kids", Object::Array(kids));
            pages_dict.set("Count", Object::Integer(page_refs.len() as i64));
        }
        _ => {
            return Err(PdfMergeError::OperationError(
                "Invalid pages dictionary".into(),
            ))
        }
    }

    // Imported pages still point at their old parent node
    for page_id in page_refs {
        if let Some(Object::Dictionary(page)) = doc.objects.get_mut(page_id) {
            page.set("Parent", Object::Reference(pages_id));
        }
    }

    Ok(())
}
