//! Guards for code the engine calls into
//!
//! Unwinding out of an `extern "C"` function aborts the process, so every
//! engine-facing thunk runs host code through [`guard`].

use crate::api::Api;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Report a failure both to `tracing` and to the engine's error log
pub fn report(api: &Api, context: &str, message: &str) {
    tracing::error!(context, message, "Host callback failed");
    api.print_error(message, context, file!(), line!());
}

/// Run `f`, turning a panic into a reported error and `None`
pub fn guard<R>(api: &Api, context: &str, f: impl FnOnce() -> R) -> Option<R> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => Some(value),
        Err(payload) => {
            let message = format!("panic in {}: {}", context, panic_message(&*payload));
            report(api, context, &message);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;

    #[test]
    fn test_guard_passes_values_through() {
        let engine = MockEngine::install();
        assert_eq!(guard(&engine.api(), "ok", || 5), Some(5));
        assert!(engine.errors().is_empty());
    }

    #[test]
    fn test_guard_reports_panics() {
        let engine = MockEngine::install();
        let result: Option<()> = guard(&engine.api(), "Control._has_point", || panic!("bad point"));
        assert!(result.is_none());
        assert_eq!(
            engine.errors(),
            vec!["panic in Control._has_point: bad point".to_string()]
        );
    }
}
