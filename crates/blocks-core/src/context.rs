//! # Render context
//!
//! The runtime hands every cycle a `RenderContext`: which post is being
//! rendered, for whom, and any platform services the components need (API
//! clients, settings, ...). Services are looked up by type:
//!
//! ```rust,ignore
//! struct Weather { city: String }
//!
//! let ctx = RenderContext::new("t3_abc").with_service(Weather { city: "Oslo".into() });
//!
//! fn Forecast(cx: &Scope, _props: &Props) -> ComponentResult {
//!     let weather = cx.service::<Weather>();
//!     // ...
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

#[derive(Clone, Default)]
pub struct RenderContext {
    post_id: Option<String>,
    user_id: Option<String>,
    services: HashMap<TypeId, Rc<dyn Any>>,
}

impl RenderContext {
    pub fn new(post_id: impl Into<String>) -> Self {
        Self {
            post_id: Some(post_id.into()),
            ..Self::default()
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Registers `service`, replacing any earlier one of the same type.
    pub fn with_service<T: 'static>(mut self, service: T) -> Self {
        self.services.insert(TypeId::of::<T>(), Rc::new(service));
        self
    }

    pub fn service<T: 'static>(&self) -> Option<Rc<T>> {
        self.services
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|s| s.downcast::<T>().ok())
    }

    pub fn post_id(&self) -> Option<&str> {
        self.post_id.as_deref()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }
}

impl fmt::Debug for RenderContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RenderContext")
            .field("post_id", &self.post_id)
            .field("user_id", &self.user_id)
            .field("services", &self.services.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Api(&'static str);

    #[test]
    fn services_are_found_by_type() {
        let ctx = RenderContext::new("t3_1").with_user("t2_9").with_service(Api("v1"));
        assert_eq!(ctx.service::<Api>().map(|a| a.0), Some("v1"));
        assert!(ctx.service::<String>().is_none());
        assert_eq!(ctx.post_id(), Some("t3_1"));
        assert_eq!(ctx.user_id(), Some("t2_9"));
    }
}
