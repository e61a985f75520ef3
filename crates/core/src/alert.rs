//! Non-blocking buzzer patterns.
//!
//! Each waveform step has a fixed length and a fixed output level; `tick`
//! advances at most one step per call.  Alarm and error are background
//! patterns that repeat while their flag is set.  `beep` and `ready` are
//! one-shots that play over the background and hand back to it when done.
//!
//! ```text
//! beep   : ▔▔▔(150)
//! ready  : ▔(100) ▁(100) ▔(100)
//! alarm  : ▔(500) ▁(2000) ...
//! error  : ▔(100) ▁(100) ▔(100) ▁(100) ▁(2000) ...
//! ```

use std::time::{Duration, Instant};

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Waveform {
    Off,
    ShortBeep,
    ChimeOn1,
    ChimeGap,
    ChimeOn2,
    AlarmOn,
    AlarmRest,
    ErrorOn1,
    ErrorGap1,
    ErrorOn2,
    ErrorGap2,
    ErrorRest,
}

/// What follows a step once it has run its course.
enum Next {
    Step(Waveform),
    /// End of a one-shot: resume the background pattern.
    Background,
}

impl Waveform {
    fn level(self) -> bool {
        matches!(
            self,
            Self::ShortBeep
                | Self::ChimeOn1
                | Self::ChimeOn2
                | Self::AlarmOn
                | Self::ErrorOn1
                | Self::ErrorOn2
        )
    }

    fn step(self) -> Option<(u64, Next)> {
        match self {
            Self::Off => None,
            Self::ShortBeep => Some((150, Next::Background)),
            Self::ChimeOn1 => Some((100, Next::Step(Self::ChimeGap))),
            Self::ChimeGap => Some((100, Next::Step(Self::ChimeOn2))),
            Self::ChimeOn2 => Some((100, Next::Background)),
            Self::AlarmOn => Some((500, Next::Step(Self::AlarmRest))),
            Self::AlarmRest => Some((2000, Next::Step(Self::AlarmOn))),
            Self::ErrorOn1 => Some((100, Next::Step(Self::ErrorGap1))),
            Self::ErrorGap1 => Some((100, Next::Step(Self::ErrorOn2))),
            Self::ErrorOn2 => Some((100, Next::Step(Self::ErrorGap2))),
            Self::ErrorGap2 => Some((100, Next::Step(Self::ErrorRest))),
            Self::ErrorRest => Some((2000, Next::Step(Self::ErrorOn1))),
        }
    }

    fn is_alarm(self) -> bool {
        matches!(self, Self::AlarmOn | Self::AlarmRest)
    }

    fn is_error(self) -> bool {
        matches!(
            self,
            Self::ErrorOn1 | Self::ErrorGap1 | Self::ErrorOn2 | Self::ErrorGap2 | Self::ErrorRest
        )
    }
}

#[derive(Debug)]
pub struct AlertStateMachine {
    waveform: Waveform,
    last_transition: Instant,
    alarm_active: bool,
    error_active: bool,
    dnd: bool,
}

impl AlertStateMachine {
    pub fn new(now: Instant, dnd: bool) -> Self {
        Self {
            waveform: Waveform::Off,
            last_transition: now,
            alarm_active: false,
            error_active: false,
            dnd,
        }
    }

    pub fn waveform(&self) -> Waveform {
        self.waveform
    }

    /// Current output level of the line.
    pub fn level(&self) -> bool {
        self.waveform.level()
    }

    pub fn alarm_active(&self) -> bool {
        self.alarm_active
    }

    pub fn error_active(&self) -> bool {
        self.error_active
    }

    pub fn dnd(&self) -> bool {
        self.dnd
    }

    /// Do-not-disturb silences `beep` and `ready` only.
    pub fn set_dnd(&mut self, enable: bool) {
        self.dnd = enable;
    }

    pub fn beep(&mut self, now: Instant) {
        if !self.dnd {
            self.enter(Waveform::ShortBeep, now);
        }
    }

    pub fn ready(&mut self, now: Instant) {
        if !self.dnd {
            self.enter(Waveform::ChimeOn1, now);
        }
    }

    pub fn set_alarm(&mut self, active: bool, now: Instant) {
        if active && !self.alarm_active && !self.error_active {
            self.alarm_active = true;
            self.enter(Waveform::AlarmOn, now);
        } else if !active && self.alarm_active {
            self.alarm_active = false;
            if self.waveform.is_alarm() {
                self.enter(Waveform::Off, now);
            }
        }
    }

    /// Raising an error cancels any alarm.
    pub fn set_error(&mut self, active: bool, now: Instant) {
        if active && !self.error_active {
            self.error_active = true;
            self.alarm_active = false;
            self.enter(Waveform::ErrorOn1, now);
        } else if !active && self.error_active {
            self.error_active = false;
            if self.waveform.is_error() {
                self.enter(Waveform::Off, now);
            }
        }
    }

    /// Advance the pattern.  Returns `true` when the output level changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        let Some((ms, next)) = self.waveform.step() else {
            return false;
        };
        if now.duration_since(self.last_transition) < Duration::from_millis(ms) {
            return false;
        }
        let before = self.level();
        let next = match next {
            Next::Step(w) => w,
            Next::Background => self.background(),
        };
        self.enter(next, now);
        before != self.level()
    }

    fn background(&self) -> Waveform {
        if self.error_active {
            Waveform::ErrorOn1
        } else if self.alarm_active {
            Waveform::AlarmOn
        } else {
            Waveform::Off
        }
    }

    fn enter(&mut self, waveform: Waveform, now: Instant) {
        self.waveform = waveform;
        self.last_transition = now;
    }
}
