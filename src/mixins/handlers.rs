//! Request handlers
//!
//! Handlers receive an adapted [`Request`] and answer with a [`Response`].
//! They resolve through the type linearization like views do.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::core::block::{Block, BlockError};
use crate::request::{Request, Response};

/// Handler implementation
pub type HandlerFn = Arc<dyn Fn(&dyn Block, &Request) -> Result<Response, BlockError> + Send + Sync>;

/// A named request handler
pub struct Handler {
    name: String,
    func: HandlerFn,
}

impl Handler {
    pub(crate) fn new(name: String, func: HandlerFn) -> Self {
        Self { name, func }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn call(&self, block: &dyn Block, request: &Request) -> Result<Response, BlockError> {
        (self.func)(block, request)
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handler").field("name", &self.name).finish()
    }
}

/// Dispatch of requests to named handlers
pub trait HandlersMixin: Block {
    /// Run the handler called `name` against `request`
    fn handle(&self, name: &str, request: &Request) -> Result<Response, BlockError>
    where
        Self: Sized,
    {
        let block_type = self.instance().block_type();
        let handler = block_type
            .handler(name)
            .ok_or_else(|| BlockError::NoSuchHandler(name.to_string()))?;
        debug!(block_type = %block_type.name(), handler = name, method = %request.method(), "dispatching handler");
        handler.call(self, request)
    }
}

impl<T: Block> HandlersMixin for T {}
