//! `CallbackRegistry`: mints opaque tokens for script functions that
//! cross into a plugin call as arguments, and resolves those tokens
//! back into callables when a plugin later invokes one (spec.md §4.4's
//! `$gode_callback` marker convention).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use rquickjs::{Ctx, Function, Persistent};

/// Owned by the facade alongside the `Queue`; a function value only
/// ever lives as long as the context it was registered against, which
/// in this design is the lifetime of the whole engine thread.
#[derive(Default)]
pub struct CallbackRegistry {
    next_id: AtomicU64,
    entries: Mutex<HashMap<String, Persistent<Function<'static>>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        CallbackRegistry::default()
    }

    /// Mint a token for `func` and retain it until resolved (or
    /// forever, if never invoked — tokens are not garbage collected,
    /// matching the teacher's callback-retention model where native
    /// callback ids live for the process lifetime).
    pub fn register<'js>(&self, ctx: &Ctx<'js>, func: Function<'js>) -> String {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = format!("cb-{}", id);
        let persistent = Persistent::save(ctx.clone(), func);
        self.entries.lock().unwrap().insert(token.clone(), persistent);
        token
    }

    /// Restore the callable for `token` against `ctx`, if it is still
    /// registered.
    pub fn resolve<'js>(&self, ctx: &Ctx<'js>, token: &str) -> Option<Function<'js>> {
        let entries = self.entries.lock().unwrap();
        let persistent = entries.get(token)?;
        persistent.clone().restore(ctx.clone()).ok()
    }

    pub fn forget(&self, token: &str) {
        self.entries.lock().unwrap().remove(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_token_forget_is_a_no_op() {
        let registry = CallbackRegistry::new();
        registry.forget("cb-missing");
    }
}
