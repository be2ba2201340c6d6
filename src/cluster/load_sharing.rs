use num_complex::Complex64;

use crate::cluster::{ClusterContext, ClusterPolicy};
use crate::devices::GridElement;
use crate::sim::power::reactive_power;
use crate::sim::step::BATTERY_REACTIVE_DAMPING;

/// Shares the cluster's demand across its second half.
///
/// The first `n / 2` members (in list order) are passive: when their battery
/// can cover its usual share of rated demand, only the remainder counts
/// towards the cluster total, otherwise their whole rated demand does. The
/// remaining members split the total evenly as an injection request and stop
/// sharing their own demand with their battery.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoadSharing;

impl ClusterPolicy for LoadSharing {
    fn run(&self, members: &[String], ctx: &mut ClusterContext<'_>) {
        let passive_count = members.len() / 2;
        let active_count = members.len() - passive_count;
        if active_count == 0 {
            return;
        }

        let mut total = Complex64::new(0.0, 0.0);
        for (i, name) in members.iter().enumerate() {
            let Some(agent) = ctx.agents.get(name) else {
                continue;
            };
            let rated_active = agent.power_rating;
            let rated_reactive = reactive_power(agent.power_rating, agent.power_factor);
            let battery = &agent.battery;

            if i < passive_count && battery.is_active() {
                let desired =
                    Complex64::new(rated_active, BATTERY_REACTIVE_DAMPING * rated_reactive).norm();
                let required_amps = desired / battery.voltage / battery.inverter_efficiency;
                if battery.status - required_amps >= 0.0 {
                    total += Complex64::new(
                        rated_active - rated_active * battery.contribution_active,
                        rated_reactive - rated_reactive * battery.contribution_reactive,
                    );
                    continue;
                }
            }
            total += Complex64::new(rated_active, rated_reactive);
        }

        let share = total / active_count as f64;
        let share_pf = if share.norm() > 0.0 {
            share.re / share.norm()
        } else {
            1.0
        };
        for name in &members[passive_count..] {
            if let Some(agent) = ctx.agents.get_mut(name) {
                agent.request_inject_power = share.re;
                agent.request_power_factor = share_pf;
                agent.battery.contribution_active = 0.0;
                agent.battery.contribution_reactive = 0.0;
            }
        }
    }
}
