/// Coalesces redraw requests into at most one pending frame
#[derive(Debug, Clone)]
pub struct RedrawScheduler {
    pending: bool,
    cancelled: bool,
    frames: u64,
    coalesced: u64,
}

impl RedrawScheduler {
    /// A new scheduler starts with the first frame already pending
    pub fn new() -> Self {
        Self {
            pending: true,
            cancelled: false,
            frames: 0,
            coalesced: 0,
        }
    }

    /// Schedule a frame. Returns `false` when one was already pending.
    pub fn request(&mut self) -> bool {
        if self.cancelled {
            return false;
        }
        if self.pending {
            self.coalesced += 1;
            return false;
        }
        self.pending = true;
        true
    }

    pub fn is_pending(&self) -> bool {
        self.pending
    }

    /// Consume the pending frame, if any
    pub fn take(&mut self) -> bool {
        if !self.pending {
            return false;
        }
        self.pending = false;
        self.frames += 1;
        true
    }

    /// Drop any pending frame and refuse new ones
    pub fn cancel(&mut self) {
        if self.pending {
            log::debug!("Cancelling pending redraw");
        }
        self.pending = false;
        self.cancelled = true;
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames
    }

    /// Requests folded into an already pending frame
    pub fn coalesced(&self) -> u64 {
        self.coalesced
    }
}

impl Default for RedrawScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_yields_one_frame() {
        let mut redraw = RedrawScheduler::new();
        assert!(redraw.take());

        assert!(redraw.request());
        for _ in 0..10 {
            assert!(!redraw.request());
        }
        assert!(redraw.take());
        assert!(!redraw.take());
        assert_eq!(redraw.frames_drawn(), 2);
        assert_eq!(redraw.coalesced(), 10);
    }

    #[test]
    fn test_cancel_drops_pending() {
        let mut redraw = RedrawScheduler::new();
        redraw.cancel();

        assert!(!redraw.is_pending());
        assert!(!redraw.request());
        assert!(!redraw.take());
    }
}
