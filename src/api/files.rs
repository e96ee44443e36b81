//! Inline base64 file fields and their addressable `/file/...` form.
//!
//! A field `<base>_type` holding `data:<family>/<subtype>;base64` marks its sibling
//! `<base>` as file content. Outbound documents replace the content with a
//! `<base>_linked` URL served by the file retrieval route.

use base64::Engine as _;
use url::Url;

use crate::error::ApiError;
use crate::identifier::Identifier;
use crate::value::{Document, Value};

const TYPE_SUFFIX: &str = "_type";
const LINKED_SUFFIX: &str = "_linked";

/// `data:image/png;base64` → `("image", "png")`.
pub fn parse_data_type(tag: &str) -> Option<(&str, &str)> {
    let media = tag.strip_prefix("data:")?.strip_suffix(";base64")?;
    let (family, subtype) = media.split_once('/')?;
    if family.is_empty() || subtype.is_empty() {
        return None;
    }
    Some((family, subtype))
}

/// Rewrites file fields of a document read from `collection`.
pub fn virtualize(collection: &str, doc: &mut Document) {
    let Some(id_segment) = doc.id().and_then(Identifier::from_value).map(|id| id.to_path_segment()) else {
        return;
    };
    let owner = [collection, id_segment.as_str()];

    link_fields(doc, &owner, None);

    let array_fields: Vec<String> = doc
        .iter()
        .filter(|(_, v)| matches!(v, Value::Array(_)))
        .map(|(k, _)| k.clone())
        .collect();
    for field in array_fields {
        if let Some(Value::Array(items)) = doc.get_mut(&field) {
            for (index, item) in items.iter_mut().enumerate() {
                if let Value::Document(element) = item {
                    link_fields(element, &owner, Some(&format!("{}.{}", field, index)));
                }
            }
        }
    }
}

fn link_fields(target: &mut Document, owner: &[&str; 2], prefix: Option<&str>) {
    let type_fields: Vec<String> = target.keys().filter(|k| k.ends_with(TYPE_SUFFIX)).cloned().collect();
    for type_field in type_fields {
        let base = &type_field[..type_field.len() - TYPE_SUFFIX.len()];
        if base.is_empty() || !target.contains_key(base) {
            continue;
        }
        let Some((family, subtype)) = target.get(&type_field).and_then(Value::as_str).and_then(parse_data_type) else {
            continue;
        };
        let prop = match prefix {
            Some(prefix) => format!("{}.{}", prefix, base),
            None => base.to_string(),
        };
        let Some(link) = file_link(&[owner[0], owner[1], family, subtype, &prop]) else {
            continue;
        };
        target.remove(base);
        target.insert(format!("{}{}", base, LINKED_SUFFIX), link);
    }
}

/// `/file/<segments...>` with every segment percent-encoded.
fn file_link(segments: &[&str]) -> Option<String> {
    let mut url = Url::parse("http://localhost/").ok()?;
    url.path_segments_mut().ok()?.push("file").extend(segments);
    Some(url.path().to_string())
}

/// Raw bytes of a stored file field.
pub fn file_bytes(value: &Value) -> Result<Vec<u8>, ApiError> {
    match value {
        Value::Binary { bytes, .. } => Ok(bytes.clone()),
        Value::String(text) => {
            // Tolerate a full data URL
            let payload = match text.split_once(',') {
                Some((head, rest)) if head.starts_with("data:") => rest,
                _ => text.as_str(),
            };
            base64::engine::general_purpose::STANDARD
                .decode(payload.trim())
                .map_err(|e| ApiError::malformed_input(format!("File content is not valid base64: {}", e)))
        }
        other => Err(ApiError::malformed_input(format!(
            "Field of type {} does not hold file content",
            other.type_name()
        ))),
    }
}
