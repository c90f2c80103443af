//! Tree composers.
//!
//! A composer converts between the flat key/value layer (a token stream from
//! the lexer, or an ordered [`Property`] list) and the hierarchical document
//! tree. [`FlatComposer`] handles single-level documents only;
//! [`DelimitedComposer`] encodes nesting through a delimiter character in
//! the keys (`a.b.c=value`).

use crate::error::{KeytreeError, Result};
use crate::node::{Node, ObjectNode};

/// One token from the line-level reader.
///
/// `Error` carries the reader's diagnostic text and must abort composition.
#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Key(String),
    Assigner,
    Value(Option<String>),
    Comment(String),
    Error(String),
}

/// One entry of the flat document form: a key, its value, and the comment
/// lines immediately preceding it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Property {
    pub key: String,
    pub value: Option<String>,
    pub comments: Vec<String>,
}

impl Property {
    pub fn new(key: impl Into<String>, value: Option<String>) -> Self {
        Property {
            key: key.into(),
            value,
            comments: Vec::new(),
        }
    }
}

/// Write-side boundary: receives one flat entry per leaf during composition.
pub trait PropertySink {
    fn write(&mut self, property: Property) -> Result<()>;
}

impl PropertySink for Vec<Property> {
    fn write(&mut self, property: Property) -> Result<()> {
        self.push(property);
        Ok(())
    }
}

/// Converts between the flat document form and the tree.
pub trait Composer {
    /// Build a tree from an ordered flat entry list.
    fn read_properties(&self, properties: &[Property]) -> Result<ObjectNode>;

    /// Walk the tree and emit one flat entry per leaf.
    fn write(&self, root: &ObjectNode, out: &mut dyn PropertySink) -> Result<()>;

    /// Build a tree from a raw token stream.
    ///
    /// Tokens are first folded into [`Property`] entries: comments accumulate
    /// onto the next key/value pair, a value must follow its key through at
    /// most one assigner, and an `Error` token aborts with its text.
    fn read_tokens(&self, tokens: &mut dyn Iterator<Item = Token>) -> Result<ObjectNode> {
        self.read_properties(&collect_properties(tokens)?)
    }
}

/// Fold a token stream into flat entries, enforcing the sequencing contract.
fn collect_properties(tokens: &mut dyn Iterator<Item = Token>) -> Result<Vec<Property>> {
    let mut properties = Vec::new();
    let mut comments: Vec<String> = Vec::new();
    let mut pending_key: Option<String> = None;
    let mut seen_assigner = false;

    for token in tokens {
        match token {
            Token::Comment(text) => comments.push(text),
            Token::Key(key) => {
                if let Some(dangling) = pending_key.take() {
                    return Err(KeytreeError::structure(format!(
                        "key '{dangling}' has no value"
                    )));
                }
                pending_key = Some(key);
                seen_assigner = false;
            }
            Token::Assigner => {
                if pending_key.is_none() || seen_assigner {
                    return Err(KeytreeError::structure(
                        "assigner without a preceding key",
                    ));
                }
                seen_assigner = true;
            }
            Token::Value(value) => {
                let key = pending_key.take().ok_or_else(|| {
                    KeytreeError::structure("value without a preceding key")
                })?;
                properties.push(Property {
                    key,
                    value,
                    comments: std::mem::take(&mut comments),
                });
                seen_assigner = false;
            }
            Token::Error(text) => {
                return Err(KeytreeError::structure(format!("reader error: {text}")));
            }
        }
    }
    if let Some(dangling) = pending_key {
        return Err(KeytreeError::structure(format!(
            "key '{dangling}' has no value"
        )));
    }
    Ok(properties)
}

/// Composer for single-level documents: every child of the root is a
/// primitive. Cannot represent hierarchy on either side.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatComposer;

impl Composer for FlatComposer {
    fn read_properties(&self, properties: &[Property]) -> Result<ObjectNode> {
        let mut root = ObjectNode::create_root();
        for property in properties {
            let leaf = root.add_primitive(property.key.clone(), property.value.clone())?;
            for comment in &property.comments {
                leaf.push_comment(comment);
            }
        }
        Ok(root)
    }

    fn write(&self, root: &ObjectNode, out: &mut dyn PropertySink) -> Result<()> {
        if root.child_count() != root.deep_child_count() {
            return Err(KeytreeError::structure(
                "flat composer cannot write a nested tree",
            ));
        }
        for child in root.children() {
            match child {
                Node::Primitive(p) => {
                    let mut property = Property::new(p.name(), p.value.clone());
                    property.comments.extend_from_slice(p.comments());
                    out.write(property)?;
                }
                Node::Object(o) => {
                    // Childless objects slip past the count check but are
                    // still unrepresentable here.
                    return Err(KeytreeError::structure(format!(
                        "flat composer cannot write object child '{}'",
                        o.name()
                    )));
                }
            }
        }
        Ok(())
    }
}

/// Composer encoding hierarchy through delimited key paths.
///
/// Reading splits each key on the delimiter and walks/creates the object
/// path; writing performs a pre-order walk, building the dotted path in a
/// reusable buffer and emitting one entry per leaf.
#[derive(Debug, Clone, Copy)]
pub struct DelimitedComposer {
    pub delimiter: char,
}

impl Default for DelimitedComposer {
    fn default() -> Self {
        DelimitedComposer { delimiter: '.' }
    }
}

impl DelimitedComposer {
    pub fn new(delimiter: char) -> Self {
        DelimitedComposer { delimiter }
    }

    fn write_object(
        &self,
        object: &ObjectNode,
        path: &mut String,
        pending_comments: &mut Vec<String>,
        out: &mut dyn PropertySink,
    ) -> Result<()> {
        // Object comments ride on the first leaf emitted anywhere beneath
        // the object, ahead of that leaf's own comments.
        pending_comments.extend_from_slice(object.comments());
        for child in object.children() {
            match child {
                Node::Primitive(p) => {
                    let mut property = Property::new(
                        format!("{path}{}", p.name()),
                        p.value.clone(),
                    );
                    property.comments.append(pending_comments);
                    property.comments.extend_from_slice(p.comments());
                    out.write(property)?;
                }
                Node::Object(o) => {
                    let depth = path.len();
                    path.push_str(o.name());
                    path.push(self.delimiter);
                    self.write_object(o, path, pending_comments, out)?;
                    path.truncate(depth);
                }
            }
        }
        Ok(())
    }
}

impl Composer for DelimitedComposer {
    fn read_properties(&self, properties: &[Property]) -> Result<ObjectNode> {
        let mut root = ObjectNode::create_root();
        for property in properties {
            let segments: Vec<&str> = property.key.split(self.delimiter).collect();
            if segments.iter().any(|s| s.is_empty()) {
                return Err(KeytreeError::structure(format!(
                    "key '{}' has an empty path segment",
                    property.key
                )));
            }
            let Some((leaf_name, path)) = segments.split_last() else {
                continue;
            };

            let mut current = &mut root;
            for &segment in path {
                match current.try_get_child(segment) {
                    Some(Node::Primitive(_)) => {
                        // Cannot nest under a leaf.
                        return Err(KeytreeError::structure(format!(
                            "key '{}' descends through primitive '{segment}'",
                            property.key
                        )));
                    }
                    Some(Node::Object(_)) => {}
                    None => {
                        current.add_object(segment.to_string())?;
                    }
                }
                current = match current.try_get_child_mut(segment) {
                    Some(Node::Object(o)) => o,
                    _ => unreachable!("segment ensured to be an object"),
                };
            }

            let leaf = current.add_primitive(leaf_name.to_string(), property.value.clone())?;
            for comment in &property.comments {
                leaf.push_comment(comment);
            }
        }
        tracing::trace!(
            children = root.child_count(),
            deep = root.deep_child_count(),
            "composed delimited tree"
        );
        Ok(root)
    }

    fn write(&self, root: &ObjectNode, out: &mut dyn PropertySink) -> Result<()> {
        let mut path = String::new();
        let mut pending_comments = Vec::new();
        self.write_object(root, &mut path, &mut pending_comments, out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prop(key: &str, value: &str) -> Property {
        Property::new(key, Some(value.to_string()))
    }

    #[test]
    fn test_delimited_read_builds_tree() {
        let composer = DelimitedComposer::default();
        let root = composer
            .read_properties(&[prop("a.b", "1"), prop("a.c", "2")])
            .unwrap();

        let a = root.get_object("a").unwrap();
        assert_eq!(a.get_primitive("b").unwrap().value.as_deref(), Some("1"));
        assert_eq!(a.get_primitive("c").unwrap().value.as_deref(), Some("2"));
        assert_eq!(root.child_count(), 1);
        assert_eq!(root.deep_child_count(), 3);
    }

    #[test]
    fn test_delimited_write_is_read_inverse() {
        let composer = DelimitedComposer::default();
        let root = composer
            .read_properties(&[prop("a.b", "1"), prop("a.c", "2")])
            .unwrap();

        let mut out: Vec<Property> = Vec::new();
        composer.write(&root, &mut out).unwrap();
        assert_eq!(out, vec![prop("a.b", "1"), prop("a.c", "2")]);
    }

    #[test]
    fn test_nesting_under_leaf_rejected() {
        let composer = DelimitedComposer::default();
        let err = composer
            .read_properties(&[prop("a", "1"), prop("a.b", "2")])
            .unwrap_err();
        assert!(matches!(err, KeytreeError::Structure(_)));
    }

    #[test]
    fn test_custom_delimiter() {
        let composer = DelimitedComposer::new('/');
        let root = composer.read_properties(&[prop("a/b", "1")]).unwrap();
        assert!(root.try_get_object("a").is_some());

        // '.' is an ordinary key character for this composer
        let root = composer.read_properties(&[prop("a.b", "1")]).unwrap();
        assert!(root.try_get_primitive("a.b").is_some());
    }

    #[test]
    fn test_flat_rejects_nested_tree() {
        let delimited = DelimitedComposer::default();
        let root = delimited.read_properties(&[prop("a.b", "1")]).unwrap();

        let mut out: Vec<Property> = Vec::new();
        let err = FlatComposer.write(&root, &mut out).unwrap_err();
        assert!(matches!(err, KeytreeError::Structure(_)));

        // The same tree writes fine through the delimited composer
        delimited.write(&root, &mut out).unwrap();
        assert_eq!(out, vec![prop("a.b", "1")]);
    }

    #[test]
    fn test_flat_read_keeps_keys_verbatim() {
        let root = FlatComposer.read_properties(&[prop("a.b", "1")]).unwrap();
        assert!(root.try_get_primitive("a.b").is_some());
        assert_eq!(root.deep_child_count(), 1);
    }

    #[test]
    fn test_token_sequencing() {
        let composer = FlatComposer;

        let mut tokens = vec![
            Token::Comment("the port".into()),
            Token::Key("port".into()),
            Token::Assigner,
            Token::Value(Some("80".into())),
        ]
        .into_iter();
        let root = composer.read_tokens(&mut tokens).unwrap();
        let leaf = root.get_primitive("port").unwrap();
        assert_eq!(leaf.value.as_deref(), Some("80"));
        assert_eq!(leaf.comments(), ["the port"]);

        // Value with no key
        let mut bad = vec![Token::Value(Some("80".into()))].into_iter();
        assert!(composer.read_tokens(&mut bad).is_err());

        // Dangling key at end of stream
        let mut bad = vec![Token::Key("port".into())].into_iter();
        assert!(composer.read_tokens(&mut bad).is_err());

        // Double assigner
        let mut bad = vec![
            Token::Key("port".into()),
            Token::Assigner,
            Token::Assigner,
            Token::Value(Some("80".into())),
        ]
        .into_iter();
        assert!(composer.read_tokens(&mut bad).is_err());
    }

    #[test]
    fn test_error_token_aborts() {
        let mut tokens = vec![
            Token::Key("port".into()),
            Token::Error("unterminated quote at line 3".into()),
        ]
        .into_iter();
        let err = FlatComposer.read_tokens(&mut tokens).unwrap_err();
        assert!(err.to_string().contains("unterminated quote at line 3"));
    }

    #[test]
    fn test_object_comments_emitted_before_first_leaf() {
        let composer = DelimitedComposer::default();
        let mut root = ObjectNode::create_root();
        let section = root.add_object("server").unwrap();
        section.push_comment("server section");
        section
            .add_primitive("host", Some("localhost".into()))
            .unwrap();
        let port = section.add_primitive("port", Some("80".into())).unwrap();
        port.push_comment("tcp port");

        let mut out: Vec<Property> = Vec::new();
        composer.write(&root, &mut out).unwrap();
        assert_eq!(out[0].comments, ["server section"]);
        assert_eq!(out[1].comments, ["tcp port"]);
    }

    #[test]
    fn test_object_comments_descend_to_first_nested_leaf() {
        // A commented object with no direct primitive child still hands its
        // comments to the first leaf below it
        let composer = DelimitedComposer::default();
        let mut root = ObjectNode::create_root();
        let a = root.add_object("a").unwrap();
        a.push_comment("section a");
        let b = a.add_object("b").unwrap();
        b.push_comment("subsection b");
        b.add_primitive("c", Some("1".into())).unwrap();
        b.add_primitive("d", Some("2".into())).unwrap();

        let mut out: Vec<Property> = Vec::new();
        composer.write(&root, &mut out).unwrap();
        assert_eq!(out[0].key, "a.b.c");
        assert_eq!(out[0].comments, ["section a", "subsection b"]);
        assert_eq!(out[1].comments, Vec::<String>::new());
    }
}
