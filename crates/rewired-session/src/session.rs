//! Session state machine.
//!
//! Exactly one [`SessionState`] is active. Transitions go through
//! [`Session::request`], which consults [`SessionState::can_transition_to`]
//! and runs the entry guards:
//!
//! - entering any state stops the menu joystick repeat;
//! - entering a modal state from a non-modal one pauses the engine and
//!   remembers its speed, leaving the modal states restores it;
//! - entering `MenuTransition` arms the input lock-out timer.
//!
//! `ErrorHalt` is terminal. Once there, every request is ignored and the
//! guards no longer run.

use std::cell::Cell;
use std::rc::Rc;

use rewired_core::config::FrontendConfig;
use rewired_core::engine::{Speed, SpeedControl};
use rewired_core::timer::{Interval, Millis, Timer};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    Splash,
    /// Menu fading in; input is locked out.
    MenuTransition,
    MenuActive,
    /// Waiting for the engine before acting.
    Loading,
    ExecLaunching,
    Exec,
    ModalMessage,
    ModalFileBrowser,
    ErrorHalt,
}

impl SessionState {
    pub fn is_modal(self) -> bool {
        matches!(self, SessionState::ModalMessage | SessionState::ModalFileBrowser)
    }

    /// The transition table. Same-state requests are handled before this is
    /// consulted.
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;
        if self == ErrorHalt {
            return false;
        }
        if next == ErrorHalt || next == ModalMessage {
            return true;
        }
        match self {
            Splash => matches!(next, MenuTransition | Loading),
            MenuTransition => matches!(next, MenuActive | Loading),
            MenuActive => matches!(next, Loading | ExecLaunching | ModalFileBrowser),
            Loading => matches!(next, Exec | ExecLaunching | ModalFileBrowser | MenuTransition),
            ExecLaunching => matches!(next, Exec | MenuTransition | Loading),
            Exec => matches!(next, MenuTransition | Loading | ModalFileBrowser),
            ModalMessage => true,
            ModalFileBrowser => matches!(
                next,
                MenuTransition | MenuActive | Loading | ExecLaunching | Exec
            ),
            ErrorHalt => false,
        }
    }

    /// Where a message raised in this state returns on dismissal. Transient
    /// states fall back to the menu.
    fn resume_target(self) -> SessionState {
        match self {
            SessionState::Loading | SessionState::ExecLaunching => SessionState::MenuTransition,
            other => other,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("transition from {from:?} to {to:?} is not allowed")]
    Disallowed { from: SessionState, to: SessionState },
}

// ---------------------------------------------------------------------------
// Modal messages
// ---------------------------------------------------------------------------

/// How a modal message ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageOutcome {
    Dismissed,
    /// Replaced by a newer message before being dismissed.
    Superseded,
}

/// Handle for a shown message. Resolves exactly once.
#[derive(Debug, Clone)]
pub struct MessageTicket {
    outcome: Rc<Cell<Option<MessageOutcome>>>,
}

impl MessageTicket {
    fn new() -> Self {
        Self {
            outcome: Rc::new(Cell::new(None)),
        }
    }

    fn resolve(&self, outcome: MessageOutcome) {
        if self.outcome.get().is_none() {
            self.outcome.set(Some(outcome));
        }
    }

    pub fn outcome(&self) -> Option<MessageOutcome> {
        self.outcome.get()
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome.get().is_some()
    }
}

#[derive(Debug)]
struct PendingMessage {
    text: String,
    resume: SessionState,
    ticket: MessageTicket,
}

// ---------------------------------------------------------------------------
// Menu joystick
// ---------------------------------------------------------------------------

/// Menu steps per repeat tick at full deflection.
const JOYSTICK_RATE: f32 = 0.25;
/// Slow-down applied when the next step would wrap around.
const JOYSTICK_EDGE_FACTOR: f32 = 0.3;

#[derive(Debug, Default)]
struct MenuJoystick {
    y: f32,
    accum: f32,
    repeat: Interval,
}

impl MenuJoystick {
    fn stop(&mut self) {
        self.repeat.stop();
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Delays used by the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub menu_lockout_ms: u64,
    pub splash_grace_ms: u64,
    pub joystick_repeat_ms: u64,
}

impl SessionTimings {
    pub fn from_config(config: &FrontendConfig) -> Self {
        Self {
            menu_lockout_ms: config.menu_lockout_ms,
            splash_grace_ms: config.splash_grace_ms,
            joystick_repeat_ms: config.joystick_repeat_ms,
        }
    }
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self::from_config(&FrontendConfig::default())
    }
}

#[derive(Debug)]
pub struct Session {
    state: SessionState,
    timings: SessionTimings,
    saved_speed: Option<Speed>,
    message: Option<PendingMessage>,
    halt_notice: Option<String>,
    lockout: Timer,
    splash_grace: Timer,
    joystick: MenuJoystick,
    menu_len: usize,
    choice: usize,
}

impl Session {
    /// A session on the splash screen with a menu of `menu_len` choices.
    pub fn new(timings: SessionTimings, menu_len: usize) -> Self {
        Self {
            state: SessionState::Splash,
            timings,
            saved_speed: None,
            message: None,
            halt_notice: None,
            lockout: Timer::new(),
            splash_grace: Timer::new(),
            joystick: MenuJoystick::default(),
            menu_len,
            choice: 0,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_halted(&self) -> bool {
        self.state == SessionState::ErrorHalt
    }

    /// Text of the message currently shown, or the halt notice.
    pub fn message(&self) -> Option<&str> {
        self.message
            .as_ref()
            .map(|m| m.text.as_str())
            .or(self.halt_notice.as_deref())
    }

    pub fn choice(&self) -> usize {
        self.choice
    }

    pub fn menu_len(&self) -> usize {
        self.menu_len
    }

    // -- Transitions --------------------------------------------------------

    /// Move to `next`, running entry and exit guards.
    pub fn request(
        &mut self,
        next: SessionState,
        speed: &mut dyn SpeedControl,
        now: Millis,
    ) -> Result<(), TransitionError> {
        let from = self.state;
        if from == SessionState::ErrorHalt {
            tracing::debug!(?next, "session halted, ignoring transition");
            return Ok(());
        }
        if from == next {
            return Ok(());
        }
        if !from.can_transition_to(next) {
            tracing::debug!(?from, to = ?next, "rejected session transition");
            return Err(TransitionError::Disallowed { from, to: next });
        }

        self.state = next;
        tracing::debug!(?from, to = ?next, "session transition");

        self.joystick.stop();
        if from == SessionState::ModalMessage {
            if let Some(pending) = self.message.take() {
                pending.ticket.resolve(MessageOutcome::Superseded);
            }
        }
        if next == SessionState::ErrorHalt {
            return Ok(());
        }

        if !from.is_modal() && next.is_modal() {
            self.saved_speed = Some(speed.speed());
            speed.set_speed(Speed::PAUSED);
        } else if from.is_modal() && !next.is_modal() {
            if let Some(saved) = self.saved_speed.take() {
                speed.set_speed(saved);
            }
        }

        match next {
            SessionState::MenuTransition => self.lockout.rearm(now, self.timings.menu_lockout_ms),
            _ => self.lockout.cancel(),
        }
        if next != SessionState::Splash {
            self.splash_grace.cancel();
        }
        Ok(())
    }

    fn go(&mut self, next: SessionState, speed: &mut dyn SpeedControl, now: Millis) {
        // Rejections are logged by `request`.
        let _ = self.request(next, speed, now);
    }

    /// Run due timers: splash grace, menu lock-out, joystick repeat.
    pub fn advance(&mut self, speed: &mut dyn SpeedControl, now: Millis) {
        if self.splash_grace.fire_if_due(now) && self.state == SessionState::Splash {
            self.go(SessionState::MenuTransition, speed, now);
        }
        if self.lockout.fire_if_due(now) && self.state == SessionState::MenuTransition {
            self.go(SessionState::MenuActive, speed, now);
        }
        if self.state == SessionState::MenuActive {
            if self.joystick.repeat.fire_if_due(now) {
                self.joystick_tick();
            }
        }
    }

    /// Pointer, key, or joystick button activity on the splash screen.
    pub fn splash_input(&mut self, speed: &mut dyn SpeedControl, now: Millis) {
        if self.state == SessionState::Splash {
            self.go(SessionState::MenuTransition, speed, now);
        }
    }

    /// The splash animation finished; leave after the grace delay.
    pub fn splash_animation_ended(&mut self, now: Millis) {
        if self.state == SessionState::Splash {
            self.splash_grace.rearm(now, self.timings.splash_grace_ms);
        }
    }

    // -- Messages -----------------------------------------------------------

    /// Show a modal message. A message already showing is resolved as
    /// [`MessageOutcome::Superseded`] and its return state is kept.
    pub fn show_message(
        &mut self,
        text: impl Into<String>,
        speed: &mut dyn SpeedControl,
        now: Millis,
    ) -> MessageTicket {
        let ticket = MessageTicket::new();
        let text = text.into();
        if self.is_halted() {
            ticket.resolve(MessageOutcome::Superseded);
            return ticket;
        }
        tracing::debug!(text, "showing message");

        let resume = match self.message.take() {
            Some(previous) => {
                previous.ticket.resolve(MessageOutcome::Superseded);
                previous.resume
            }
            None => self.state.resume_target(),
        };
        self.go(SessionState::ModalMessage, speed, now);
        self.message = Some(PendingMessage {
            text,
            resume,
            ticket: ticket.clone(),
        });
        ticket
    }

    /// Dismiss the current message and return to where it was raised.
    pub fn dismiss(&mut self, speed: &mut dyn SpeedControl, now: Millis) -> bool {
        if self.state != SessionState::ModalMessage {
            return false;
        }
        let Some(pending) = self.message.take() else {
            return false;
        };
        pending.ticket.resolve(MessageOutcome::Dismissed);
        self.go(pending.resume, speed, now);
        true
    }

    /// Enter the terminal error state with a permanent notice.
    pub fn halt(&mut self, notice: impl Into<String>) {
        if self.is_halted() {
            return;
        }
        let notice = notice.into();
        tracing::error!(notice, "session halted");
        if let Some(pending) = self.message.take() {
            pending.ticket.resolve(MessageOutcome::Superseded);
        }
        self.halt_notice = Some(notice);
        self.joystick.stop();
        self.lockout.cancel();
        self.splash_grace.cancel();
        self.state = SessionState::ErrorHalt;
    }

    // -- Menu ---------------------------------------------------------------

    /// Select a choice, wrapping around both ends.
    pub fn set_choice(&mut self, choice: i64) {
        if self.menu_len == 0 {
            return;
        }
        let len = self.menu_len as i64;
        self.choice = choice.rem_euclid(len) as usize;
    }

    pub fn menu_next(&mut self) {
        if self.state == SessionState::MenuActive {
            self.set_choice(self.choice as i64 + 1);
        }
    }

    pub fn menu_previous(&mut self) {
        if self.state == SessionState::MenuActive {
            self.set_choice(self.choice as i64 - 1);
        }
    }

    /// Pointer hover. Ignored while the joystick is deflected.
    pub fn menu_hover(&mut self, choice: usize) {
        if self.state == SessionState::MenuActive && self.joystick.y == 0.0 {
            self.set_choice(choice as i64);
        }
    }

    /// Vertical joystick axis in the menu. Deflection moves once right away,
    /// then repeats at a rate proportional to the deflection.
    pub fn set_joystick_axis(&mut self, y: f32, now: Millis) {
        if self.state != SessionState::MenuActive {
            return;
        }
        self.joystick.y = y.clamp(-1.0, 1.0);
        if self.joystick.y == 0.0 {
            self.joystick.stop();
        } else if !self.joystick.repeat.is_running() {
            self.joystick.accum = self.joystick.y.signum();
            self.joystick.repeat.start(now, self.timings.joystick_repeat_ms);
            self.joystick_tick();
        }
    }

    pub fn joystick_repeating(&self) -> bool {
        self.joystick.repeat.is_running()
    }

    fn joystick_tick(&mut self) {
        let y = self.joystick.y;
        let last = self.menu_len.saturating_sub(1);
        let mut rate = JOYSTICK_RATE;
        if (self.choice == 0 && y < 0.0) || (self.choice == last && y > 0.0) {
            rate *= JOYSTICK_EDGE_FACTOR;
        }
        self.joystick.accum += rate * y;
        let steps = self.joystick.accum.trunc();
        if steps != 0.0 {
            self.joystick.accum -= steps;
            self.set_choice(self.choice as i64 + steps as i64);
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
