//! Panic-to-`ModuleError` conversion across the native/script boundary.

use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::error::{ErrorKind, ModuleError};
use crate::stack::{capture_native_stack, StackTrace};

thread_local! {
    /// Set by the panic hook `safe_operation` installs, before the
    /// unwind pops the panicking closure's frames. Read back in the
    /// `Err` arm of `catch_unwind`, once the stack has already
    /// unwound and a fresh `capture_native_stack` would be too late to
    /// see the panic site.
    static CAPTURED_PANIC_STACK: RefCell<Option<StackTrace>> = const { RefCell::new(None) };
}

/// Serializes access to the process-global panic hook: `panic::set_hook`
/// has no per-thread scoping, so two concurrent `safe_operation` calls
/// installing/restoring it at the same time would clobber each other.
static HOOK_INSTALL: Mutex<()> = Mutex::new(());

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

/// Run `work` in a scope that converts any panic into a `ModuleError`.
///
/// This is the region boundary mandated for configuration, evaluation,
/// and plugin initialization: a fault releases no resources of its own
/// (the closure's locals are dropped by the unwind as usual) and is
/// reported back through the normal error channel instead of aborting
/// the process.
pub fn safe_operation<T>(
    module: &str,
    operation: &str,
    work: impl FnOnce() -> T + std::panic::UnwindSafe,
) -> Result<T, ModuleError> {
    let _guard = HOOK_INSTALL.lock().unwrap();

    let previous_hook: Arc<dyn Fn(&panic::PanicHookInfo<'_>) + Send + Sync> = Arc::from(panic::take_hook());
    let hook_for_install = previous_hook.clone();
    panic::set_hook(Box::new(move |info| {
        let stack = capture_native_stack(info.to_string());
        CAPTURED_PANIC_STACK.with(|cell| *cell.borrow_mut() = Some(stack));
        hook_for_install(info);
    }));

    let result = panic::catch_unwind(AssertUnwindSafe(work));
    panic::set_hook(Box::new(move |info| previous_hook(info)));

    match result {
        Ok(value) => Ok(value),
        Err(payload) => {
            let message = panic_message(&payload);
            let native_stack = CAPTURED_PANIC_STACK
                .with(|cell| cell.borrow_mut().take())
                .unwrap_or_else(|| capture_native_stack(message.clone()));
            Err(ModuleError::new(
                ErrorKind::Invocation,
                module,
                "",
                operation,
                format!("panic: {}", message),
            )
            .with_native_stack(native_stack))
        }
    }
}

/// Like [`safe_operation`], but for closures that already return a
/// `Result`: a panic is converted the same way, and a returned `Err` is
/// passed through converted into a `ModuleError` via the supplied
/// mapper.
pub fn safe_operation_with_result<T, E>(
    module: &str,
    operation: &str,
    work: impl FnOnce() -> Result<T, E> + std::panic::UnwindSafe,
    to_module_error: impl FnOnce(E) -> ModuleError,
) -> Result<T, ModuleError> {
    match safe_operation(module, operation, work) {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(to_module_error(e)),
        Err(panic_err) => Err(panic_err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn safe_operation_catches_panic() {
        let result = safe_operation("mymod", "do_thing", || -> i32 {
            panic!("boom");
        });
        let err = result.unwrap_err();
        assert_eq!(err.module(), "mymod");
        assert_eq!(err.operation(), "do_thing");
        assert!(err.message().contains("boom"));
        assert!(!err.native_stack().is_empty());

        // The top frame must be captured at the panic site, inside the
        // wrapped closure, not after the unwind has already popped it —
        // pinned by requiring the panicking closure itself show up near
        // the top of the trace rather than just a non-empty trace.
        let top_frames: Vec<&str> = err
            .native_stack()
            .frames
            .iter()
            .take(6)
            .map(|f| f.function.as_str())
            .collect();
        assert!(
            top_frames.iter().any(|f| f.contains("safe_operation_catches_panic")),
            "expected the panicking closure's frame near the top of the trace, got {:?}",
            top_frames
        );
    }

    #[test]
    fn safe_operation_passes_through_value() {
        let result = safe_operation("mymod", "op", || 42);
        assert_eq!(result.unwrap(), 42);
    }

    #[test]
    fn safe_operation_with_result_propagates_err() {
        let result: Result<i32, ModuleError> = safe_operation_with_result(
            "mymod",
            "op",
            || -> Result<i32, String> { Err("bad".to_string()) },
            |e| ModuleError::new(ErrorKind::Invocation, "mymod", "", "op", e),
        );
        assert!(result.is_err());
    }
}
