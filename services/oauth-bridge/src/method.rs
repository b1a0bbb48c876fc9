//! Per-verb handler dispatch
//!
//! Each API path registers handlers for the verbs it supports. Anything
//! else (unregistered GET/POST/PUT/PATCH/DELETE, OPTIONS, TRACE, custom
//! verbs) is answered with 405 `{"message":"Unsupported method"}`.

use axum::handler::Handler;
use axum::routing::MethodRouter;

use crate::error::ApiError;

/// Builder mapping HTTP verbs to handlers with a 405 default.
///
/// Covers GET, POST, PUT, PATCH and DELETE. The bridge endpoints only
/// register GET and POST, so the other three are reached from tests alone.
pub struct MethodHandlers<S> {
    router: MethodRouter<S>,
}

impl<S> MethodHandlers<S>
where
    S: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            router: MethodRouter::new(),
        }
    }

    pub fn get<H, T>(self, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        Self {
            router: self.router.get(handler),
        }
    }

    pub fn post<H, T>(self, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        Self {
            router: self.router.post(handler),
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn put<H, T>(self, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        Self {
            router: self.router.put(handler),
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn patch<H, T>(self, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        Self {
            router: self.router.patch(handler),
        }
    }

    #[cfg_attr(not(test), allow(dead_code))]
    pub fn delete<H, T>(self, handler: H) -> Self
    where
        H: Handler<T, S>,
        T: 'static,
    {
        Self {
            router: self.router.delete(handler),
        }
    }

    /// Finish the builder. Unregistered verbs fall through to
    /// [`unsupported_method`].
    pub fn expose(self) -> MethodRouter<S> {
        self.router.fallback(unsupported_method)
    }
}

impl<S> Default for MethodHandlers<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

pub async fn unsupported_method() -> ApiError {
    ApiError::UnsupportedMethod
}
