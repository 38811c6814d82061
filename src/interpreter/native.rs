use std::time::{SystemTime, UNIX_EPOCH};

use crate::value::{LoxValue, NativeFunction, RuntimeErrorKind};

/// `clock()` — seconds since the UNIX epoch as a double.
#[derive(Debug)]
pub struct NativeClock;

impl NativeFunction for NativeClock {
    fn name(&self) -> &'static str {
        "clock"
    }

    fn arity(&self) -> usize {
        0
    }

    fn call(&self, arguments: &[LoxValue]) -> Result<LoxValue, RuntimeErrorKind> {
        let _ = arguments;
        let now = SystemTime::now();
        let since_epoch = now.duration_since(UNIX_EPOCH).expect("Time went backwards");
        Ok(LoxValue::Number(
            since_epoch.as_secs() as f64 + since_epoch.subsec_nanos() as f64 * 1e-9,
        ))
    }
}
