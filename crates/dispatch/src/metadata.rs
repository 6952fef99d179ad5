//! Handler metadata: typed tags declared on controller types and on their actions.
//!
//! A [`ControllerType`] describes a controller once, at start-up: its name, the type it extends,
//! the tags on the type itself and the actions it declares, each with its own tags. Tags are
//! plain values keyed by their Rust type, e.g. a `RequiresAuth { role }` struct.
//!
//! Action tags are inherited along the override chain. When a subtype redeclares an action
//! without a tag, the tag declared on the same action of an ancestor is still visible:
//!
//! ```
//! use micro_dispatch::metadata::{action_tag, ControllerType, Tags};
//!
//! #[derive(Clone, Debug, PartialEq)]
//! struct Secured;
//!
//! let base = ControllerType::builder("BaseController")
//!     .tagged_action("delete", Tags::new().with(Secured))
//!     .build();
//! let users = ControllerType::builder("UserController")
//!     .extends(base)
//!     .action("delete")
//!     .build();
//!
//! assert_eq!(action_tag::<Secured>(&users, "delete"), Some(&Secured));
//! ```
//!
//! Lookups are resolved eagerly into a [`HandlerMetadata`] when a route is bound, so
//! interceptors read a prepared tag set instead of walking types per request.

use crate::error::ResolveError;
use http::Extensions;
use std::fmt;
use std::sync::Arc;

/// A set of typed tags, at most one per type.
#[derive(Clone, Default)]
pub struct Tags {
    inner: Extensions,
}

impl Tags {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a tag, replacing any tag of the same type.
    #[must_use]
    pub fn with<T: Clone + Send + Sync + 'static>(mut self, tag: T) -> Self {
        self.inner.insert(tag);
        self
    }

    pub fn insert<T: Clone + Send + Sync + 'static>(&mut self, tag: T) -> Option<T> {
        self.inner.insert(tag)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.inner.get::<T>()
    }

    pub fn contains<T: Send + Sync + 'static>(&self) -> bool {
        self.get::<T>().is_some()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Lays `nearer` over `self`: tags present in `nearer` win.
    fn overlay(&mut self, nearer: &Tags) {
        self.inner.extend(nearer.inner.clone());
    }
}

impl fmt::Debug for Tags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tags").field("len", &self.len()).finish()
    }
}

/// An action declared on a [`ControllerType`].
#[derive(Debug)]
pub struct ActionDecl {
    name: String,
    tags: Tags,
}

impl ActionDecl {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tags(&self) -> &Tags {
        &self.tags
    }
}

/// Static description of a controller: name, supertype, tags and declared actions.
#[derive(Debug)]
pub struct ControllerType {
    name: String,
    parent: Option<Arc<ControllerType>>,
    tags: Tags,
    actions: Vec<ActionDecl>,
}

impl ControllerType {
    #[must_use]
    pub fn builder(name: impl Into<String>) -> ControllerTypeBuilder {
        ControllerTypeBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&ControllerType> {
        self.parent.as_deref()
    }

    /// Tags declared on this type itself.
    pub fn tags(&self) -> &Tags {
        &self.tags
    }

    /// The action declared on this type itself, ignoring ancestors.
    pub fn declared_action(&self, action: &str) -> Option<&ActionDecl> {
        self.actions.iter().find(|decl| decl.name == action)
    }

    /// Iterates this type and then its ancestors, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = &ControllerType> {
        std::iter::successors(Some(self), |ty| ty.parent())
    }

    /// The nearest type, starting from this one, that declares `action`.
    pub fn declaring_type(&self, action: &str) -> Option<&ControllerType> {
        self.ancestors().find(|ty| ty.declared_action(action).is_some())
    }

    /// Returns true if `action` is declared on this type or inherited from an ancestor.
    pub fn has_action(&self, action: &str) -> bool {
        self.declaring_type(action).is_some()
    }

    /// Declarations of `action` along the override chain, nearest first.
    pub fn action_chain<'a>(&'a self, action: &'a str) -> impl Iterator<Item = &'a ActionDecl> + 'a {
        self.ancestors().filter_map(move |ty| ty.declared_action(action))
    }
}

#[derive(Debug)]
pub struct ControllerTypeBuilder {
    name: String,
    parent: Option<Arc<ControllerType>>,
    tags: Tags,
    actions: Vec<ActionDecl>,
}

impl ControllerTypeBuilder {
    fn new(name: String) -> Self {
        Self { name, parent: None, tags: Tags::new(), actions: vec![] }
    }

    #[must_use]
    pub fn extends(mut self, parent: Arc<ControllerType>) -> Self {
        self.parent = Some(parent);
        self
    }

    #[must_use]
    pub fn tag<T: Clone + Send + Sync + 'static>(mut self, tag: T) -> Self {
        self.tags.insert(tag);
        self
    }

    #[must_use]
    pub fn action(self, name: impl Into<String>) -> Self {
        self.tagged_action(name, Tags::new())
    }

    /// Declares an action, redeclaring an existing one replaces it.
    #[must_use]
    pub fn tagged_action(mut self, name: impl Into<String>, tags: Tags) -> Self {
        let name = name.into();
        self.actions.retain(|decl| decl.name != name);
        self.actions.push(ActionDecl { name, tags });
        self
    }

    #[must_use]
    pub fn build(self) -> Arc<ControllerType> {
        Arc::new(ControllerType { name: self.name, parent: self.parent, tags: self.tags, actions: self.actions })
    }
}

/// Looks up a tag declared on the controller type itself.
pub fn controller_tag<T: Send + Sync + 'static>(controller_type: &ControllerType) -> Option<&T> {
    controller_type.tags().get::<T>()
}

/// Looks up a tag on `action`, walking the override chain from the nearest declaration up
/// until one carries the tag. Returns `None` when no declaration in the chain has it.
pub fn action_tag<'a, T: Send + Sync + 'static>(controller_type: &'a ControllerType, action: &'a str) -> Option<&'a T> {
    controller_type.action_chain(action).find_map(|decl| decl.tags().get::<T>())
}

/// Metadata of a bound handler, resolved once at registration.
#[derive(Debug, Clone, Default)]
pub struct HandlerMetadata {
    target: Option<String>,
    controller: Tags,
    action: Tags,
}

impl HandlerMetadata {
    /// Metadata of a handler that is not bound to a controller.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Builds metadata from explicit tag sets, for handlers that are not controller actions.
    pub fn new(controller: Tags, action: Tags) -> Self {
        Self { target: None, controller, action }
    }

    /// Resolves the metadata of `action` on `controller_type`.
    ///
    /// Fails if no type in the chain declares the action.
    pub fn introspect(controller_type: &ControllerType, action: &str) -> Result<Self, ResolveError> {
        let chain: Vec<&ActionDecl> = controller_type.action_chain(action).collect();
        if chain.is_empty() {
            return Err(ResolveError::unknown_action(controller_type.name(), action));
        }

        let mut action_tags = Tags::new();
        for decl in chain.iter().rev() {
            action_tags.overlay(decl.tags());
        }

        Ok(Self {
            target: Some(format!("{}#{}", controller_type.name(), action)),
            controller: controller_type.tags().clone(),
            action: action_tags,
        })
    }

    /// `Controller#action` for bound controller actions.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn controller_tags(&self) -> &Tags {
        &self.controller
    }

    pub fn action_tags(&self) -> &Tags {
        &self.action
    }

    pub fn controller_tag<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.controller.get::<T>()
    }

    pub fn action_tag<T: Send + Sync + 'static>(&self) -> Option<&T> {
        self.action.get::<T>()
    }
}
