//! Post type registry.
//!
//! Assembled once at startup and read-only afterwards; the engine holds it
//! by `Rc` and looks post types up by name per request.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::element::Component;
use crate::error::RegistryError;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostHeight {
    #[default]
    Regular,
    Tall,
}

#[derive(Clone, Debug)]
pub struct PostType {
    pub name: String,
    pub description: String,
    pub height: PostHeight,
    pub root: Component,
}

impl PostType {
    pub fn new(name: impl Into<String>, root: Component) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            height: PostHeight::default(),
            root,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn height(mut self, height: PostHeight) -> Self {
        self.height = height;
        self
    }
}

#[derive(Default)]
pub struct PostRegistryBuilder {
    types: Vec<PostType>,
}

impl PostRegistryBuilder {
    pub fn register(mut self, post: PostType) -> Self {
        self.types.push(post);
        self
    }

    pub fn build(self) -> Result<PostRegistry, RegistryError> {
        let mut types = BTreeMap::new();
        for post in self.types {
            let name = post.name.clone();
            if types.insert(name.clone(), Rc::new(post)).is_some() {
                return Err(RegistryError::DuplicatePostType(name));
            }
        }
        log::debug!("registry: {} post type(s)", types.len());
        Ok(PostRegistry { types })
    }
}

#[derive(Clone, Debug, Default)]
pub struct PostRegistry {
    types: BTreeMap<String, Rc<PostType>>,
}

impl PostRegistry {
    pub fn builder() -> PostRegistryBuilder {
        PostRegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Rc<PostType>> {
        self.types.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> Component {
        Component::new("Empty", |_, _| Ok(None))
    }

    #[test]
    fn lookup_by_name() {
        let registry = PostRegistry::builder()
            .register(PostType::new("poll", empty()).height(PostHeight::Tall))
            .register(PostType::new("counter", empty()).description("Counts presses"))
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert_eq!(registry.names().collect::<Vec<_>>(), ["counter", "poll"]);
        assert_eq!(registry.get("poll").unwrap().height, PostHeight::Tall);
        assert_eq!(registry.get("counter").unwrap().description, "Counts presses");
        assert!(registry.get("missing").is_none());
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let err = PostRegistry::builder()
            .register(PostType::new("counter", empty()))
            .register(PostType::new("counter", empty()))
            .build()
            .unwrap_err();
        assert_eq!(err, RegistryError::DuplicatePostType("counter".into()));
    }
}
