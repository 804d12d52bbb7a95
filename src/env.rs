use std::{cell::RefCell, ffi::OsStr};

#[derive(Clone, Copy, Default, Debug)]
struct Env {
    trace: bool,
    minimal: bool,
}

thread_local! {
    /// Must only be mutated within `set_env`
    static ENV: RefCell<Option<Env>> = const { RefCell::new(None) };
}

/// Read configuration from the process environment. Must only be called once.
pub fn init() {
    let value = Env {
        trace: var_is("CASM_TRACE", "1"),
        minimal: var_is("CASM_MINIMAL", "1"),
    };
    set_env(value);
}

/// `CASM_TRACE=1`: print every executed line, its tokens and its effects
pub fn is_trace_enabled() -> bool {
    with_env(|env| env.trace)
}

/// `CASM_MINIMAL=1`: plain output regardless of command line flags
pub fn is_minimal_forced() -> bool {
    with_env(|env| env.minimal)
}

fn set_env(value: Env) {
    ENV.with(|env| {
        let mut env = env.borrow_mut();
        assert!(
            env.is_none(),
            "tried to initialize environment state multiple times"
        );
        *env = Some(value);
    });
}

/// Library users that never call [`init`] get the defaults.
fn with_env<F, R>(callback: F) -> R
where
    F: Fn(&Env) -> R,
{
    ENV.with(|env| {
        let env = env.borrow();
        callback(&env.unwrap_or_default())
    })
}

fn var_is(name: impl AsRef<OsStr>, value: impl AsRef<str>) -> bool {
    std::env::var(name.as_ref()).is_ok_and(|v| v == value.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_before_init() {
        // Each test runs on its own thread, so nothing has been initialized here
        assert!(!is_trace_enabled());
        assert!(!is_minimal_forced());
    }

    #[test]
    #[should_panic(expected = "multiple times")]
    fn init_twice_panics() {
        init();
        init();
    }
}
