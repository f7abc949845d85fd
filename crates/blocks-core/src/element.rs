use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures_util::FutureExt;
use futures_util::future::{LocalBoxFuture, ready};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{ComponentError, HandlerError};
use crate::hooks::Scope;

pub type ComponentResult = Result<Option<Element>, ComponentError>;
pub type HandlerResult = Result<(), HandlerError>;

type HandlerFn = dyn Fn(Value) -> LocalBoxFuture<'static, HandlerResult>;
type ComponentFn = dyn Fn(Scope, Props) -> LocalBoxFuture<'static, ComponentResult>;

/// Event handler attached to a prop (`onPress`, ...) or an interval.
#[derive(Clone)]
pub struct Handler(Rc<HandlerFn>);

impl Handler {
    pub fn new(f: impl Fn(Value) + 'static) -> Self {
        Handler(Rc::new(move |payload| {
            f(payload);
            ready(Ok(())).boxed_local()
        }))
    }

    pub fn fallible(f: impl Fn(Value) -> HandlerResult + 'static) -> Self {
        Handler(Rc::new(move |payload| ready(f(payload)).boxed_local()))
    }

    /// Handler that awaits external work before it resolves.
    pub fn future<F, Fut>(f: F) -> Self
    where
        F: Fn(Value) -> Fut + 'static,
        Fut: Future<Output = HandlerResult> + 'static,
    {
        Handler(Rc::new(move |payload| f(payload).boxed_local()))
    }

    pub(crate) fn call(&self, payload: Value) -> LocalBoxFuture<'static, HandlerResult> {
        (self.0)(payload)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("<handler>")
    }
}

/// A named component function. Sync and async functions are normalized to
/// the same async contract when the component is created.
#[derive(Clone)]
pub struct Component {
    name: Rc<str>,
    func: Rc<ComponentFn>,
}

impl Component {
    pub fn new(
        name: impl AsRef<str>,
        f: impl Fn(&Scope, &Props) -> ComponentResult + 'static,
    ) -> Self {
        Component {
            name: Rc::from(name.as_ref()),
            func: Rc::new(move |scope, props| ready(f(&scope, &props)).boxed_local()),
        }
    }

    pub fn new_async<F, Fut>(name: impl AsRef<str>, f: F) -> Self
    where
        F: Fn(Scope, Props) -> Fut + 'static,
        Fut: Future<Output = ComponentResult> + 'static,
    {
        Component {
            name: Rc::from(name.as_ref()),
            func: Rc::new(move |scope, props| f(scope, props).boxed_local()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// An element that invokes this component.
    pub fn element(&self) -> Element {
        Element::new(ElementType::Component(self.clone()))
    }

    pub(crate) fn invoke(
        &self,
        scope: Scope,
        props: Props,
    ) -> LocalBoxFuture<'static, ComponentResult> {
        (self.func)(scope, props)
    }
}

impl fmt::Debug for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Component({})", self.name)
    }
}

#[derive(Clone, Debug)]
pub enum Prop {
    Value(Value),
    Handler(Handler),
}

pub type PropMap = BTreeMap<String, Prop>;

#[derive(Clone, Debug)]
pub enum ElementType {
    Intrinsic(String),
    Component(Component),
}

#[derive(Clone, Debug)]
pub struct Element {
    pub kind: ElementType,
    pub props: PropMap,
    pub children: Vec<Element>,
    pub key: Option<String>,
    pub id: Option<String>,
}

impl Element {
    pub fn new(kind: ElementType) -> Self {
        Element {
            kind,
            props: PropMap::new(),
            children: vec![],
            key: None,
            id: None,
        }
    }

    pub fn intrinsic(tag: impl Into<String>) -> Self {
        Self::new(ElementType::Intrinsic(tag.into()))
    }

    pub fn prop(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.props.insert(name.into(), Prop::Value(value.into()));
        self
    }

    pub fn on(mut self, name: impl Into<String>, handler: Handler) -> Self {
        self.props.insert(name.into(), Prop::Handler(handler));
        self
    }

    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_children(mut self, kids: Vec<Element>) -> Self {
        self.children = kids;
        self
    }

    pub fn child(mut self, kid: Element) -> Self {
        self.children.push(kid);
        self
    }

    pub fn tag(&self) -> Option<&str> {
        match &self.kind {
            ElementType::Intrinsic(tag) => Some(tag),
            ElementType::Component(_) => None,
        }
    }
}

/// What a component function receives: its element's props and children.
#[derive(Clone, Debug, Default)]
pub struct Props {
    values: PropMap,
    children: Vec<Element>,
    key: Option<String>,
}

impl Props {
    pub(crate) fn from_element(values: PropMap, children: Vec<Element>, key: Option<String>) -> Self {
        Self {
            values,
            children,
            key,
        }
    }

    pub fn value(&self, name: &str) -> Option<&Value> {
        match self.values.get(name)? {
            Prop::Value(v) => Some(v),
            Prop::Handler(_) => None,
        }
    }

    /// Typed read of a value prop; `None` when absent or of another shape.
    pub fn get<T: DeserializeOwned>(&self, name: &str) -> Option<T> {
        self.value(name)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    pub fn handler(&self, name: &str) -> Option<&Handler> {
        match self.values.get(name)? {
            Prop::Handler(h) => Some(h),
            Prop::Value(_) => None,
        }
    }

    pub fn children(&self) -> &[Element] {
        &self.children
    }

    pub fn into_children(self) -> Vec<Element> {
        self.children
    }

    pub fn key(&self) -> Option<&str> {
        self.key.as_deref()
    }
}
