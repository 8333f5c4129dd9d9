//! Composing nested fragment data and layout chains.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Key holding a layer's own data in composed data.
pub const DATA_KEY: &str = "Data";

/// Key holding the nested child in composed data.
pub const CHILD_KEY: &str = "Child";

/// Data that projects itself into a different value before composition.
pub trait Project: Send + Sync {
    /// The value passed to the fragment in place of `self`.
    fn project(&self) -> Value;
}

/// One layer of composed data.
#[derive(Clone)]
pub enum Layer {
    /// Used as is.
    Plain(Value),
    /// Projected before use.
    Projected(Arc<dyn Project>),
}

impl Layer {
    /// Wrap a projecting value.
    pub fn projected(data: impl Project + 'static) -> Self {
        Self::Projected(Arc::new(data))
    }

    /// Resolve the layer into plain data.
    pub fn into_value(self) -> Value {
        match self {
            Self::Plain(value) => value,
            Self::Projected(data) => data.project(),
        }
    }
}

impl From<Value> for Layer {
    fn from(value: Value) -> Self {
        Self::Plain(value)
    }
}

impl fmt::Debug for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(value) => f.debug_tuple("Plain").field(value).finish(),
            Self::Projected(_) => f.write_str("Projected(..)"),
        }
    }
}

/// Compose layers into nested data, outermost first.
///
/// A single layer is passed through. Each earlier layer wraps the rest as
/// `{"Data": layer, "Child": rest}`, so `[a, b, c]` becomes
/// `{"Data": a, "Child": {"Data": b, "Child": c}}`.
pub fn compose<I>(layers: I) -> Value
where
    I: IntoIterator,
    I::Item: Into<Layer>,
{
    let layers: Vec<Layer> = layers.into_iter().map(Into::into).collect();
    layers
        .into_iter()
        .rev()
        .map(Layer::into_value)
        .reduce(|child, data| nest(data, child))
        .unwrap_or(Value::Null)
}

fn nest(data: Value, child: Value) -> Value {
    let mut map = Map::new();
    map.insert(DATA_KEY.to_string(), data);
    map.insert(CHILD_KEY.to_string(), child);
    Value::Object(map)
}

/// A fragment name together with its data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FragmentRef {
    /// Fragment to render.
    pub fragment: String,
    /// Data passed to it.
    #[serde(default)]
    pub data: Value,
}

impl FragmentRef {
    /// Create a reference.
    pub fn new(fragment: impl Into<String>, data: Value) -> Self {
        Self {
            fragment: fragment.into(),
            data,
        }
    }

    /// Reference whose data is composed from layers.
    pub fn composed<I>(fragment: impl Into<String>, layers: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Layer>,
    {
        Self::new(fragment, compose(layers))
    }

    /// Encode as data, so it can be nested as a child.
    pub fn to_value(&self) -> Value {
        let mut map = Map::new();
        map.insert("fragment".to_string(), Value::String(self.fragment.clone()));
        map.insert("data".to_string(), self.data.clone());
        Value::Object(map)
    }

    /// Decode from data; `None` unless the value is a reference object.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let fragment = object.get("fragment")?.as_str()?;
        Some(Self::new(
            fragment,
            object.get("data").cloned().unwrap_or(Value::Null),
        ))
    }
}

/// Wrap a child in a chain of layouts, outermost first.
///
/// Each layout receives `{"Data": its data, "Child": reference to the next}`
/// and renders the child with [`Frame::render_child`](crate::Frame::render_child).
/// With no layouts the child is returned unchanged.
pub fn combine<I, L>(layouts: I, child: FragmentRef) -> FragmentRef
where
    I: IntoIterator<Item = (String, L)>,
    I::IntoIter: DoubleEndedIterator,
    L: Into<Layer>,
{
    layouts
        .into_iter()
        .rev()
        .fold(child, |inner, (layout, data)| {
            FragmentRef::new(layout, nest(data.into().into_value(), inner.to_value()))
        })
}

/// Conditional list of CSS classes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Classes {
    classes: Vec<String>,
}

impl Classes {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a class.
    pub fn add(mut self, class: impl Into<String>) -> Self {
        let class = class.into();
        if !class.is_empty() {
            self.classes.push(class);
        }
        self
    }

    /// Add a class when `condition` holds.
    pub fn add_if(self, condition: bool, class: impl Into<String>) -> Self {
        if condition {
            self.add(class)
        } else {
            self
        }
    }

    /// Space-separated class list.
    pub fn build(&self) -> String {
        self.classes.join(" ")
    }
}

impl fmt::Display for Classes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.build())
    }
}
