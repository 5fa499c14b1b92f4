//! Parser configuration.

use crate::Arena;

/// What to do when a tolerated record close finds the cursor somewhere other
/// than the declared end of the record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecordEndPolicy {
    /// Resynchronize silently.
    Ignore,
    /// Resynchronize and push a diagnostic.
    #[default]
    Report,
    /// Fail with [`Error::BadBlockEnd`](crate::Error::BadBlockEnd).
    Strict,
}

/// Options for [`SaveParser`](crate::SaveParser).
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ParseOptions {
    pub record_end: RecordEndPolicy,
    /// Maximum number of nested field groups.
    pub max_depth: usize,
    /// Allocation cap for arenas made by [`new_arena`](Self::new_arena),
    /// covering restored buffers, strings and handle tables.
    pub arena_limit: Option<usize>,
    /// Module preferred for ambiguous class names in `.hl1` files.
    pub server_module: String,
    /// Module preferred for ambiguous class names in `.hl2` files.
    pub client_module: String,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            record_end: RecordEndPolicy::default(),
            max_depth: 32,
            arena_limit: None,
            server_module: "server.dll".to_string(),
            client_module: "client.dll".to_string(),
        }
    }
}

impl ParseOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record_end(mut self, policy: RecordEndPolicy) -> Self {
        self.record_end = policy;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    pub fn with_arena_limit(mut self, limit: Option<usize>) -> Self {
        self.arena_limit = limit;
        self
    }

    pub fn with_modules(mut self, server: impl Into<String>, client: impl Into<String>) -> Self {
        self.server_module = server.into();
        self.client_module = client.into();
        self
    }

    /// An arena honoring [`arena_limit`](Self::arena_limit).
    pub fn new_arena(&self) -> Arena {
        match self.arena_limit {
            Some(limit) => Arena::with_limit(limit),
            None => Arena::new(),
        }
    }
}
