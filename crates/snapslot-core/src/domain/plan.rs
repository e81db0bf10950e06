//! Capacity policy: (role, plan limits) -> cap.
//!
//! This is the only place that decides how many slots an identity owns.
//! It is a pure function: no I/O, no clock, no shared state.

use serde::{Deserialize, Serialize};

use super::identity::Role;
use super::listing::RoleCaps;

pub const DEFAULT_HOST_MAX_SHOTS: u32 = 30;
pub const DEFAULT_GUEST_MAX_SHOTS: u32 = 20;

const GUEST_RANGE: (u32, u32) = (1, 200);
const HOST_RANGE: (u32, u32) = (1, 1000);

/// Externally supplied plan limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanLimits {
    pub host_max_shots: u32,
    pub guest_max_shots: u32,
}

impl Default for PlanLimits {
    fn default() -> Self {
        Self {
            host_max_shots: DEFAULT_HOST_MAX_SHOTS,
            guest_max_shots: DEFAULT_GUEST_MAX_SHOTS,
        }
    }
}

impl PlanLimits {
    /// The event's `roleCaps` win over configured limits when the listing has them.
    pub fn overridden_by(self, caps: Option<RoleCaps>) -> Self {
        match caps {
            Some(caps) => Self {
                host_max_shots: caps.host,
                guest_max_shots: caps.guest,
            },
            None => self,
        }
    }
}

/// Returns the slot count for `role`; always `>= 1`.
pub fn capacity_for(role: Role, limits: &PlanLimits) -> u32 {
    match role {
        Role::Host => limits.host_max_shots.clamp(HOST_RANGE.0, HOST_RANGE.1),
        Role::Guest => limits.guest_max_shots.clamp(GUEST_RANGE.0, GUEST_RANGE.1),
    }
}
