use bson::{Bson, Document};

/// Reads dotted paths out of document bodies.
///
/// `Lines[].Product` maps the rest of the path over each element of
/// `Lines`. `Lines.Length` (or `Count`) is the array's size. In flat-map mode
/// an array met in the middle of a path is mapped over even without `[]`,
/// and nested array results are flattened.
#[derive(Debug, Clone, Copy, Default)]
pub struct Traverser {
    flat_map_arrays: bool,
}

impl Traverser {
    pub fn new(flat_map_arrays: bool) -> Self {
        Self { flat_map_arrays }
    }

    /// `None` when the path does not resolve. The empty path is the whole
    /// document.
    pub fn read(&self, data: &Document, path: &str) -> Option<Bson> {
        if path.is_empty() {
            return Some(Bson::Document(data.clone()));
        }
        // a stored key may itself contain dots
        if let Some(value) = data.get(path) {
            return Some(value.clone());
        }
        let segments: Vec<&str> = path.split('.').collect();
        self.read_document(data, &segments)
    }

    /// Every string reachable at `path`, in document order. Used to collect
    /// the ids a load clause refers to.
    pub fn read_ids(&self, data: &Document, path: &str, out: &mut Vec<String>) {
        let flat = Traverser::new(true);
        let Some(value) = flat.read(data, path) else {
            return;
        };
        collect_strings(&value, out);
    }

    fn read_document(&self, doc: &Document, segments: &[&str]) -> Option<Bson> {
        let (first, rest) = segments.split_first()?;
        let (key, map_over) = match first.strip_suffix("[]") {
            Some(key) => (key, true),
            None => (*first, false),
        };
        let value = doc.get(key)?;
        if map_over {
            let Bson::Array(items) = value else {
                return None;
            };
            return Some(self.map_array(items, rest));
        }
        self.read_value(value, rest)
    }

    fn read_value(&self, value: &Bson, rest: &[&str]) -> Option<Bson> {
        if rest.is_empty() {
            return Some(value.clone());
        }
        match value {
            Bson::Document(doc) => self.read_document(doc, rest),
            Bson::Array(items) => match rest {
                [size] if *size == "Length" || *size == "Count" => {
                    Some(Bson::Int32(i32::try_from(items.len()).unwrap_or(i32::MAX)))
                }
                _ if self.flat_map_arrays => Some(self.map_array(items, rest)),
                _ => None,
            },
            _ => None,
        }
    }

    fn map_array(&self, items: &[Bson], rest: &[&str]) -> Bson {
        let mut out = Vec::with_capacity(items.len());
        for item in items {
            let Some(value) = self.read_value(item, rest) else {
                continue;
            };
            match value {
                Bson::Array(nested) if self.flat_map_arrays && !rest.is_empty() => {
                    out.extend(nested)
                }
                other => out.push(other),
            }
        }
        Bson::Array(out)
    }
}

fn collect_strings(value: &Bson, out: &mut Vec<String>) {
    match value {
        Bson::String(s) => out.push(s.clone()),
        Bson::Array(items) => {
            for item in items {
                collect_strings(item, out);
            }
        }
        _ => {}
    }
}
