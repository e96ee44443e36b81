use indexmap::IndexMap;

use super::Value;

/// Field holding the primary key of every stored document.
pub const ID_FIELD: &str = "_id";

/// An open, insertion-ordered mapping of field name to [Value].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    fields: IndexMap<String, Value>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut Value> {
        self.fields.get_mut(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Inserts or overwrites `key`, keeping the original position when it already existed.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.fields.insert(key.into(), value.into())
    }

    /// Removes `key` while preserving the order of the remaining fields.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.shift_remove(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.fields.keys()
    }

    pub fn id(&self) -> Option<&Value> {
        self.get(ID_FIELD).filter(|v| !v.is_null())
    }

    /// Puts `_id` in front of every other field.
    pub fn set_id(&mut self, id: Value) {
        self.fields.shift_remove(ID_FIELD);
        self.fields.shift_insert(0, ID_FIELD.to_string(), id);
    }

    /// Resolves a dotted path such as `a.b.0.c` through nested documents and array indices.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.get(parts.next()?)?;
        for part in parts {
            current = match current {
                Value::Document(doc) => doc.get(part)?,
                Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Sets a dotted path, creating intermediate documents as needed. Fails when an
    /// intermediate value is a scalar that cannot hold the next segment.
    pub fn set_path(&mut self, path: &str, value: Value) -> Result<(), String> {
        match path.split_once('.') {
            None => {
                self.insert(path, value);
                Ok(())
            }
            Some((head, rest)) => {
                let slot = self
                    .fields
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Document(Document::new()));
                set_in_value(slot, rest, value).map_err(|_| {
                    format!("cannot create field '{}' in element {{{}: {}}}", rest, head, slot)
                })
            }
        }
    }
}

fn set_in_value(slot: &mut Value, path: &str, value: Value) -> Result<(), ()> {
    let (head, rest) = match path.split_once('.') {
        Some((h, r)) => (h, Some(r)),
        None => (path, None),
    };
    match slot {
        Value::Document(doc) => match rest {
            None => {
                doc.insert(head, value);
                Ok(())
            }
            Some(rest) => {
                let next = doc
                    .fields
                    .entry(head.to_string())
                    .or_insert_with(|| Value::Document(Document::new()));
                set_in_value(next, rest, value)
            }
        },
        Value::Array(items) => {
            let index = head.parse::<usize>().map_err(|_| ())?;
            // Writes may append one element, never open a gap
            if index > items.len() {
                return Err(());
            }
            if index == items.len() {
                items.push(Value::Null);
            }
            match rest {
                None => {
                    items[index] = value;
                    Ok(())
                }
                Some(rest) => {
                    if items[index].is_null() {
                        items[index] = Value::Document(Document::new());
                    }
                    set_in_value(&mut items[index], rest, value)
                }
            }
        }
        _ => Err(()),
    }
}

impl IntoIterator for Document {
    type Item = (String, Value);
    type IntoIter = indexmap::map::IntoIter<String, Value>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Document {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

/// Builds a [Document] from `key => value` pairs.
#[macro_export]
macro_rules! doc {
    () => { $crate::value::Document::new() };
    ($($key:expr => $value:expr),+ $(,)?) => {{
        let mut doc = $crate::value::Document::new();
        $( doc.insert($key, $value); )+
        doc
    }};
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_id_moves_id_to_front() {
        let mut d = doc! { "a" => 1, "_id" => "x", "b" => 2 };
        d.set_id(Value::from("y"));
        let keys: Vec<_> = d.keys().cloned().collect();
        assert_eq!(keys, vec!["_id", "a", "b"]);
        assert_eq!(d.id(), Some(&Value::from("y")));
    }

    #[test]
    fn dotted_paths_traverse_documents_and_arrays() {
        let d = doc! {
            "photos" => Value::Array(vec![Value::Document(doc! { "image" => "abc" })]),
            "meta" => doc! { "size" => 3 },
        };
        assert_eq!(d.get_path("photos.0.image"), Some(&Value::from("abc")));
        assert_eq!(d.get_path("meta.size"), Some(&Value::Int(3)));
        assert_eq!(d.get_path("meta.size.x"), None);
        assert_eq!(d.get_path("photos.7.image"), None);
    }

    #[test]
    fn set_path_creates_intermediate_documents() {
        let mut d = doc! { "n" => 1 };
        d.set_path("a.b.c", Value::from(true)).unwrap();
        assert_eq!(d.get_path("a.b.c"), Some(&Value::Bool(true)));
        assert!(d.set_path("n.x", Value::Null).is_err());
    }

    #[test]
    fn set_path_on_arrays_replaces_or_appends_only() {
        let mut d = doc! { "arr" => Value::Array(vec![Value::Int(1)]) };
        d.set_path("arr.0", Value::Int(5)).unwrap();
        d.set_path("arr.1", Value::Int(6)).unwrap();
        d.set_path("arr.2.x", Value::Int(7)).unwrap();
        assert_eq!(d.get_path("arr.2.x"), Some(&Value::Int(7)));

        assert!(d.set_path("arr.20000000", Value::Int(1)).is_err());
        assert!(d.set_path("arr.99999999999", Value::Int(1)).is_err());
        assert_eq!(d.get("arr").and_then(Value::as_array).map(Vec::len), Some(3));
    }
}
