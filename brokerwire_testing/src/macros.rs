//! Assertion macros shared by integration tests.

/// Await a receive future and panic with contextual diagnostics unless it
/// yields a message.
#[macro_export]
macro_rules! receive_expect {
    ($fut:expr) => {{
        $fut.await
            .expect(concat!("receive failed at ", file!(), ":", line!()))
            .expect(concat!("no message at ", file!(), ":", line!()))
    }};
    ($fut:expr, $msg:expr) => {{
        let m = ::std::format!("{msg} at {}:{}", file!(), line!(), msg = $msg);
        $fut.await.expect(&m).expect(&m)
    }};
}

pub use crate::receive_expect;
