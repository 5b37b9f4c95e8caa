//! Event taxonomy and message payloads.
//!
//! `Event` is a closed taxonomy: each member carries an immutable priority
//! (lower = more urgent), a description, and a ballistic flag. Ballistic
//! events start a response that may only be interrupted by a *higher*
//! priority event; non-ballistic events generally just adjust motor
//! setpoints.
//!
//! `Payload` is the tagged content a message may carry, one variant per
//! event category, so handlers match exhaustively without runtime type
//! inspection.

use bitflags::bitflags;

use crate::consts::IGNORE_PRIORITY_THRESHOLD;

bitflags! {
    /// Which bumper zones registered contact.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ContactZones: u8 {
        const PORT = 0b0000_0001;
        const CNTR = 0b0000_0010;
        const STBD = 0b0000_0100;
    }
}

/// Closed taxonomy of occurrences routed over the message bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Event {
    // ── system ──
    /// Battery voltage below the cutoff threshold.
    BatteryLow,
    /// Orderly whole-robot shutdown requested.
    Shutdown,
    // ── stopping and halting ──
    /// Immediate stop, motors released.
    Stop,
    /// Controlled stop at a fast slew.
    Halt,
    /// Controlled stop with braking.
    Brake,
    // ── bumpers ──
    /// Mechanical bumper contact.
    BumperContact,
    // ── infrared proximity, by heading ──
    InfraredPortSide,
    InfraredPort,
    InfraredCntr,
    InfraredStbd,
    InfraredStbdSide,
    // ── attitude ──
    /// Heading change reported by the IMU collaborator.
    OrientationChange,
    // ── behaviour triggers ──
    /// Start/refresh the cruise behaviour.
    Cruise,
    /// Start a fixed-distance travel maneuver.
    Travel,
    // ── drive directives ──
    /// Velocity directive for both wheels.
    ForwardVelocity,
    /// Velocity directive for the port wheel.
    PortVelocity,
    /// Velocity directive for the starboard wheel.
    StbdVelocity,
    // ── ignoreable (priority ≥ threshold) ──
    /// No action.
    NoAction,
    /// Clock tick.
    ClockTick,
    /// Clock tock (every Nth tick).
    ClockTock,
}

impl Event {
    /// Dispatch priority: lower is served first.
    pub const fn priority(&self) -> u16 {
        match self {
            Self::BatteryLow => 0,
            Self::Shutdown => 1,
            Self::Stop => 2,
            Self::Halt => 3,
            Self::Brake => 4,
            Self::BumperContact => 10,
            Self::InfraredPortSide
            | Self::InfraredPort
            | Self::InfraredCntr
            | Self::InfraredStbd
            | Self::InfraredStbdSide => 20,
            Self::OrientationChange => 30,
            Self::Cruise | Self::Travel => 150,
            Self::ForwardVelocity | Self::PortVelocity | Self::StbdVelocity => 200,
            Self::NoAction | Self::ClockTick | Self::ClockTock => 500,
        }
    }

    /// Human description for log lines.
    pub const fn description(&self) -> &'static str {
        match self {
            Self::BatteryLow => "battery low",
            Self::Shutdown => "shutdown",
            Self::Stop => "stop",
            Self::Halt => "halt",
            Self::Brake => "brake",
            Self::BumperContact => "bumper contact",
            Self::InfraredPortSide => "infrared port side",
            Self::InfraredPort => "infrared port",
            Self::InfraredCntr => "infrared center",
            Self::InfraredStbd => "infrared starboard",
            Self::InfraredStbdSide => "infrared starboard side",
            Self::OrientationChange => "orientation change",
            Self::Cruise => "cruise",
            Self::Travel => "travel",
            Self::ForwardVelocity => "forward velocity",
            Self::PortVelocity => "port velocity",
            Self::StbdVelocity => "starboard velocity",
            Self::NoAction => "no action",
            Self::ClockTick => "tick",
            Self::ClockTock => "tock",
        }
    }

    /// Ballistic responses may not be interrupted by lower-priority events.
    pub const fn is_ballistic(&self) -> bool {
        matches!(
            self,
            Self::BatteryLow
                | Self::Shutdown
                | Self::Stop
                | Self::BumperContact
                | Self::InfraredPortSide
                | Self::InfraredPort
                | Self::InfraredCntr
                | Self::InfraredStbd
                | Self::InfraredStbdSide
        )
    }

    /// True when the priority is at or above the ignore threshold.
    /// By definition this includes NoAction, ClockTick and ClockTock.
    #[inline]
    pub const fn is_ignoreable(&self) -> bool {
        self.priority() >= IGNORE_PRIORITY_THRESHOLD
    }
}

/// Message content, tagged per event category.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Payload {
    /// No content.
    None,
    /// Distance reading [cm].
    Distance(f64),
    /// Heading reading [degrees].
    Heading(f64),
    /// Bumper contact zones.
    Contact(ContactZones),
    /// Velocity directive [cm/s].
    Velocity(f64),
    /// Clock tick ordinal.
    Tick(u64),
}

impl Payload {
    /// The distance value, if this payload carries one.
    #[inline]
    pub fn as_distance(&self) -> Option<f64> {
        match self {
            Self::Distance(cm) => Some(*cm),
            _ => None,
        }
    }

    /// The velocity value, if this payload carries one.
    #[inline]
    pub fn as_velocity(&self) -> Option<f64> {
        match self {
            Self::Velocity(v) => Some(*v),
            _ => None,
        }
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
