//! Millisecond timers for RLC entities
//!
//! RLC timers are driven by the node's 1 ms cadence rather than wall-clock
//! time: every call to [`RlcTimer::perform_tick`] counts one millisecond.

/// RLC timer (t-PollRetransmit, t-Reassembly, t-StatusProhibit)
#[derive(Debug, Clone)]
pub struct RlcTimer {
    /// Timer interval in milliseconds
    interval_ms: u32,
    /// Milliseconds left while running
    remaining_ms: Option<u32>,
    /// Number of times the timer has expired
    expiry_count: u64,
}

impl RlcTimer {
    /// Creates a stopped timer
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            remaining_ms: None,
            expiry_count: 0,
        }
    }

    /// Starts (or restarts) the timer
    pub fn start(&mut self) {
        self.remaining_ms = Some(self.interval_ms);
    }

    /// Stops the timer without counting an expiry
    pub fn stop(&mut self) {
        self.remaining_ms = None;
    }

    /// Returns true while the timer is running
    pub fn is_running(&self) -> bool {
        self.remaining_ms.is_some()
    }

    /// Number of expiries so far
    pub fn expiry_count(&self) -> u64 {
        self.expiry_count
    }

    /// Counts one millisecond. Returns `true` if the timer expired on this tick.
    pub fn perform_tick(&mut self) -> bool {
        match self.remaining_ms {
            Some(remaining) if remaining <= 1 => {
                self.remaining_ms = None;
                self.expiry_count += 1;
                true
            }
            Some(remaining) => {
                self.remaining_ms = Some(remaining - 1);
                false
            }
            None => false,
        }
    }
}
