use std::time::Duration;

/// Tolerance for wakeups that land marginally before the cap deadline due
/// to timer granularity.
const TIMER_SLACK: f64 = 1e-4;

#[derive(Clone, Copy, Debug)]
pub struct ScheduleConfig {
    /// Frames per second the loop is capped at.
    pub fps_cap: f32,
    /// Hard ceiling on ticks per animation batch; keeps a batch finite even
    /// when alpha never settles.
    pub tick_limit: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            fps_cap: 60.0,
            tick_limit: 100,
        }
    }
}

/// Drives the tick/render loop without owning it: the caller (the display
/// shell in production, a plain loop in tests) asks `request` to schedule a
/// frame, gates the frame body on `on_frame` with the current time, counts
/// work with `note_tick`, and stops once `is_done`.
///
/// `cancel` is a one-way latch for teardown: nothing is scheduled or
/// executed after it, even a callback already in flight.
#[derive(Debug)]
pub struct FrameScheduler {
    config: ScheduleConfig,
    ticks: u64,
    scheduled: bool,
    cancelled: bool,
    last_frame: Option<f64>,
}

impl FrameScheduler {
    pub fn new(config: ScheduleConfig) -> Self {
        Self {
            config,
            ticks: 0,
            scheduled: false,
            cancelled: false,
            last_frame: None,
        }
    }

    /// Asks for one frame. Returns `true` only when a new callback should
    /// actually be queued: repeated requests coalesce until the scheduled
    /// frame runs, and a raised latch refuses outright.
    pub fn request(&mut self) -> bool {
        if self.cancelled || self.scheduled {
            return false;
        }
        self.scheduled = true;
        true
    }

    /// Entry check for a callback at time `now` (seconds). The frame body
    /// may run only when one was actually scheduled (a stray repaint must
    /// not tick a stopped loop), the latch is down, and at least the cap
    /// interval has passed since the previous frame. A repaint that arrives
    /// early leaves the frame scheduled; the caller waits out
    /// `remaining_delay` and tries again.
    pub fn on_frame(&mut self, now: f64) -> bool {
        if self.cancelled {
            self.scheduled = false;
            return false;
        }
        if !self.scheduled {
            return false;
        }
        if let Some(last) = self.last_frame
            && now - last < self.frame_delay().as_secs_f64() - TIMER_SLACK
        {
            return false;
        }
        self.scheduled = false;
        self.last_frame = Some(now);
        true
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled
    }

    /// Time until the scheduled frame is allowed to run at `now`.
    pub fn remaining_delay(&self, now: f64) -> Duration {
        let interval = self.frame_delay().as_secs_f64();
        match self.last_frame {
            Some(last) => Duration::from_secs_f64((last + interval - now).max(0.0)),
            None => Duration::ZERO,
        }
    }

    pub fn note_tick(&mut self) {
        self.ticks += 1;
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// A batch runs until it hits the tick ceiling or settles with nothing
    /// queued. Queued admissions override the ceiling: a node whose delay
    /// outlasts the ceiling still gets admitted and settled instead of
    /// being stranded in the queue forever.
    pub fn is_done(&self, settled: bool, pending: usize) -> bool {
        if self.cancelled {
            return true;
        }
        if pending > 0 {
            return false;
        }
        self.ticks >= self.config.tick_limit || settled
    }

    /// New batch admitted: zero the tick counter. Does not clear the latch.
    pub fn restart(&mut self) {
        self.ticks = 0;
    }

    pub fn cancel(&mut self) {
        self.cancelled = true;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled
    }

    /// Explicit inter-frame delay implementing the rate cap. Below the
    /// display's refresh rate this inserts real delay; above it the loop is
    /// refresh-bound.
    pub fn frame_delay(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.config.fps_cap.max(1.0))
    }
}
