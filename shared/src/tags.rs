use serde::de::{self, Deserializer, SeqAccess, Visitor};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Ordered list of labels (tags, suggested locations, subject names).
///
/// Always an array on the wire. Legacy documents stored some of these as a
/// comma-joined string or a JSON-encoded array; both are read back here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TagList(Vec<String>);

impl TagList {
    pub fn new<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        TagList(
            tags.into_iter()
                .map(|t| t.as_ref().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    /// Parse form input: a JSON array if it is one, comma-separated text otherwise.
    pub fn parse(input: &str) -> Self {
        match serde_json::from_str::<Vec<String>>(input.trim()) {
            Ok(tags) => TagList::new(tags),
            Err(_) => TagList::new(input.split(',')),
        }
    }

    /// Comma-joined form used by text inputs.
    pub fn to_joined(&self) -> String {
        self.0.join(", ")
    }

    /// Appends `tag` unless an equal tag is already present.
    pub fn push(&mut self, tag: &str) {
        let tag = tag.trim();
        if !tag.is_empty() && !self.0.iter().any(|t| t == tag) {
            self.0.push(tag.to_string());
        }
    }

    pub fn remove(&mut self, tag: &str) {
        self.0.retain(|t| t != tag.trim());
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl From<Vec<String>> for TagList {
    fn from(tags: Vec<String>) -> Self {
        TagList::new(tags)
    }
}

impl<'de> Deserialize<'de> for TagList {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct TagListVisitor;

        impl<'de> Visitor<'de> for TagListVisitor {
            type Value = TagList;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an array of strings or a comma-separated string")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<TagList, E> {
                Ok(TagList::parse(v))
            }

            fn visit_unit<E: de::Error>(self) -> Result<TagList, E> {
                Ok(TagList::default())
            }

            fn visit_none<E: de::Error>(self) -> Result<TagList, E> {
                Ok(TagList::default())
            }

            fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<TagList, A::Error> {
                let mut tags = Vec::with_capacity(seq.size_hint().unwrap_or(0));
                while let Some(tag) = seq.next_element::<String>()? {
                    tags.push(tag);
                }
                Ok(TagList::new(tags))
            }
        }

        deserializer.deserialize_any(TagListVisitor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_array_and_legacy_string_forms() {
        let from_array: TagList = serde_json::from_value(json!(["sunset", " beach "])).unwrap();
        let from_string: TagList = serde_json::from_value(json!("sunset, beach,")).unwrap();
        let from_json_string: TagList = serde_json::from_value(json!("[\"sunset\",\"beach\"]")).unwrap();
        let from_null: TagList = serde_json::from_value(json!(null)).unwrap();

        assert_eq!(from_array.as_slice(), ["sunset", "beach"]);
        assert_eq!(from_string, from_array);
        assert_eq!(from_json_string, from_array);
        assert!(from_null.is_empty());
    }

    #[test]
    fn always_serializes_as_array() {
        let tags = TagList::parse("living room, office");
        assert_eq!(serde_json::to_value(&tags).unwrap(), json!(["living room", "office"]));
        assert_eq!(tags.to_joined(), "living room, office");
    }

    #[test]
    fn push_skips_duplicates_and_blanks() {
        let mut tags = TagList::parse("a,b");
        tags.push("b");
        tags.push("  ");
        tags.push("c");
        tags.remove("a");
        assert_eq!(tags.as_slice(), ["b", "c"]);
    }
}
