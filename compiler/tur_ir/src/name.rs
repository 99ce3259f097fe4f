//! Identifier names.
//!
//! Names are shared, immutable strings. Command trees are built once and
//! executed from many threads, so a name must be cheap to clone and `Send`.

use std::borrow::Borrow;
use std::fmt;
use std::sync::Arc;

/// An identifier: variable, parameter, field, method or cell name.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Name(Arc<str>);

impl Name {
    /// Create a name from any string-like value.
    #[inline]
    pub fn new(text: impl AsRef<str>) -> Self {
        Name(Arc::from(text.as_ref()))
    }

    /// The name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is one of the reserved self-bindings.
    pub fn is_special(&self) -> bool {
        special::ALL.contains(&self.as_str())
    }
}

impl Borrow<str> for Name {
    #[inline]
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for Name {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Name {
    fn from(text: &str) -> Self {
        Name::new(text)
    }
}

impl From<String> for Name {
    fn from(text: String) -> Self {
        Name(Arc::from(text))
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({})", &self.0)
    }
}

/// Reserved self-binding names.
pub mod special {
    /// The receiver of a method call.
    pub const THIS: &str = "this";
    /// The class of the receiver.
    pub const CLS: &str = "cls";
    /// The callable currently executing.
    pub const ME: &str = "me";
    /// The list a list-method was called on.
    pub const IT: &str = "it";
    /// The name of the method or function currently executing.
    pub const METHOD: &str = ".";

    /// Names excluded when `init` merges its bindings into the new object.
    pub const ALL: [&str; 5] = [THIS, CLS, ME, IT, METHOD];
}
