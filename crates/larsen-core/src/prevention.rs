//! Corrective-action policy for confirmed feedback events.
//!
//! [`PreventionController`] maps each [`FeedbackEvent`] to a
//! [`PreventionAction`]. The base response is a gain reduction proportional
//! to event magnitude; muting and rerouting are escalation steps that only
//! fire when configured and when events keep recurring on the same channel
//! set.

use crate::detector::{ConfigError, FeedbackEvent};
use alloc::string::String;
use alloc::vec::Vec;

/// A corrective action requested by the prevention layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PreventionAction {
    /// Pull the offending path's gain down by `amount_db`.
    GainReduction {
        /// Reduction amount in dB, positive.
        amount_db: f32,
    },
    /// Mute the listed channels outright.
    ChannelMute {
        /// Channel indices to mute, ascending.
        channels: Vec<usize>,
    },
    /// Ask the routing layer to move the signal to a different path.
    RouteChange {
        /// Identifier of the current route.
        from: String,
        /// Identifier of the replacement route.
        to: String,
    },
}

/// A reroute target for the route-change escalation step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutePair {
    /// Identifier of the route to move away from.
    pub from: String,
    /// Identifier of the route to move to.
    pub to: String,
}

/// Tunable prevention behavior.
///
/// Only the gain-reduction response is always on; the escalation steps are
/// opt-in. `mute_after_events` consecutive events on the same channel set
/// escalate to a mute, and `route_after_events` (which requires
/// `route_change`) escalate further to a reroute.
#[derive(Debug, Clone, PartialEq)]
pub struct PreventionPolicy {
    /// Margin added on top of event magnitude when sizing the reduction.
    pub headroom_db: f32,
    /// Upper bound on any single gain reduction.
    pub max_gain_reduction_db: f32,
    /// Consecutive same-channel events before escalating to a mute.
    pub mute_after_events: Option<u32>,
    /// Route to switch to when the route-change step fires.
    pub route_change: Option<RoutePair>,
    /// Consecutive same-channel events before escalating to a reroute.
    pub route_after_events: Option<u32>,
}

impl Default for PreventionPolicy {
    fn default() -> Self {
        Self {
            headroom_db: 6.0,
            max_gain_reduction_db: 24.0,
            mute_after_events: None,
            route_change: None,
            route_after_events: None,
        }
    }
}

impl PreventionPolicy {
    /// Check internal consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("headroom_db", self.headroom_db),
            ("max_gain_reduction_db", self.max_gain_reduction_db),
        ] {
            if !value.is_finite() {
                return Err(ConfigError::NonFinite { field, value });
            }
        }
        if self.max_gain_reduction_db <= 0.0 {
            return Err(ConfigError::NonPositiveGain {
                field: "max_gain_reduction_db",
                value: self.max_gain_reduction_db,
            });
        }
        if self.mute_after_events == Some(0) {
            return Err(ConfigError::ZeroCount {
                field: "mute_after_events",
            });
        }
        if self.route_after_events == Some(0) {
            return Err(ConfigError::ZeroCount {
                field: "route_after_events",
            });
        }
        if self.route_after_events.is_some() && self.route_change.is_none() {
            return Err(ConfigError::RouteWithoutTarget);
        }
        Ok(())
    }
}

/// Maps feedback events to corrective actions.
///
/// Stateful only for escalation: it remembers how many consecutive events
/// landed on the same channel set. A changed channel set, a zero-magnitude
/// event, or [`reset`](Self::reset) restarts the streak.
#[derive(Debug, Clone)]
pub struct PreventionController {
    policy: PreventionPolicy,
    streak_channels: Vec<usize>,
    streak: u32,
}

impl PreventionController {
    /// Create a controller with a validated policy.
    pub fn new(policy: PreventionPolicy) -> Result<Self, ConfigError> {
        policy.validate()?;
        Ok(Self {
            policy,
            streak_channels: Vec::new(),
            streak: 0,
        })
    }

    /// Active policy.
    pub fn policy(&self) -> &PreventionPolicy {
        &self.policy
    }

    /// Length of the current same-channel event streak.
    pub fn consecutive_events(&self) -> u32 {
        self.streak
    }

    /// Forget the escalation streak.
    pub fn reset(&mut self) {
        self.streak_channels.clear();
        self.streak = 0;
    }

    /// Compute the corrective action for one event.
    ///
    /// Returns `None` for zero or non-positive magnitude (nothing to
    /// correct). Otherwise the strongest applicable step of the escalation
    /// ladder: reroute, then mute, then the base gain reduction of
    /// `min(magnitude + headroom_db, max_gain_reduction_db)`.
    pub fn on_event(&mut self, event: &FeedbackEvent) -> Option<PreventionAction> {
        if !(event.magnitude > 0.0) {
            self.reset();
            return None;
        }

        if self.streak_channels == event.channels {
            self.streak += 1;
        } else {
            self.streak_channels.clear();
            self.streak_channels.extend_from_slice(&event.channels);
            self.streak = 1;
        }

        if let (Some(route), Some(after)) =
            (&self.policy.route_change, self.policy.route_after_events)
        {
            if self.streak >= after {
                return Some(PreventionAction::RouteChange {
                    from: route.from.clone(),
                    to: route.to.clone(),
                });
            }
        }

        if let Some(after) = self.policy.mute_after_events {
            if self.streak >= after {
                return Some(PreventionAction::ChannelMute {
                    channels: event.channels.clone(),
                });
            }
        }

        let amount_db =
            (event.magnitude + self.policy.headroom_db).min(self.policy.max_gain_reduction_db);
        Some(PreventionAction::GainReduction { amount_db })
    }
}

impl Default for PreventionController {
    fn default() -> Self {
        Self {
            policy: PreventionPolicy::default(),
            streak_channels: Vec::new(),
            streak: 0,
        }
    }
}
