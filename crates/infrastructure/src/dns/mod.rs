/// Per-attempt diagnostics: debug level when the resolver's debug option is
/// on, trace level otherwise.
macro_rules! attempt_event {
    ($debug:expr, $($arg:tt)+) => {
        if $debug {
            tracing::debug!($($arg)+);
        } else {
            tracing::trace!($($arg)+);
        }
    };
}

pub mod attempt;
pub mod sender;
pub mod session;
pub mod transport;

pub use attempt::{AttemptOutcome, AttemptRecord};
pub use sender::{send_query, udp_attempt_timeout};
pub use session::Session;
pub use transport::{SessionSocket, TcpChannel, UdpChannel};
