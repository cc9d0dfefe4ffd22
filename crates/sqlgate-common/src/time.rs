use std::time::Instant;

use chrono::{DateTime, Utc};

/// Wall-clock now. Session timestamps and context items go through this so
/// there is exactly one clock to stub if that ever becomes necessary.
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Milliseconds elapsed since `started`, as reported in response metadata.
pub fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_elapsed_ms_counts_up() {
        let started = Instant::now();
        std::thread::sleep(Duration::from_millis(15));
        assert!(elapsed_ms(started) >= 15);
    }
}
