mod profile;
mod receipt;
mod sequencer;
mod trace;

pub use profile::*;
pub use receipt::*;
pub use sequencer::*;
pub use trace::*;

/// Current unix time in milliseconds.
pub fn now_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}
