//! # Trace Filtering
//!
//! Decides, per event, whether the memory tracer records it.
//!
//! ## Arming
//!
//! Tracing can be delayed by `timeTrigger` timer ticks. The filter starts
//! `Disarmed` in that case and arms itself on the first tick after the delay
//! has elapsed; arming is permanent. With `timeTrigger = 0` it starts armed.
//!
//! ```text
//! timeTrigger = 3
//! tick:     1         2         3         4      5 ...
//! state:    Disarmed  Disarmed  Disarmed  Armed  Armed
//! ```
//!
//! ## Memory Access Admission
//!
//! 1. Below `catchAccessesAbove`: rejected
//! 2. `monitorStack` set: accepted only inside the stack pointer's window
//! 3. Otherwise accepted
//!
//! TLB misses and page faults are admitted whenever their category is enabled.

use log::debug;
use serde::Deserialize;

use super::events::EventKind;

/// Default stack window used by `monitorStack` (256 KiB, 256 KiB aligned)
pub const DEFAULT_STACK_WINDOW: u64 = 1 << 18;

/// Memory tracer policy, fixed after initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilterPolicy {
    /// Only record accesses that fall in the current stack window
    pub monitor_stack: bool,
    /// Ignore accesses below this address
    #[serde(rename = "catchAccessesAbove")]
    pub catch_above: u64,
    /// Number of timer ticks to wait before tracing starts
    pub time_trigger: u64,
    pub monitor_memory: bool,
    pub monitor_page_faults: bool,
    pub monitor_tlb_misses: bool,
    /// Size of the `monitorStack` window, a power of two
    pub stack_window: u64,
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            monitor_stack: false,
            catch_above: 0,
            time_trigger: 0,
            monitor_memory: false,
            monitor_page_faults: false,
            monitor_tlb_misses: false,
            stack_window: DEFAULT_STACK_WINDOW,
        }
    }
}

impl FilterPolicy {
    #[must_use]
    pub fn monitors(&self, kind: EventKind) -> bool {
        match kind {
            EventKind::Memory => self.monitor_memory,
            EventKind::TlbMiss => self.monitor_tlb_misses,
            EventKind::PageFault => self.monitor_page_faults,
        }
    }
}

/// Deferred global enable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArmingState {
    Disarmed { elapsed: u64, threshold: u64 },
    Armed,
}

pub struct TraceFilter {
    policy: FilterPolicy,
    state: ArmingState,
    window_mask: u64,
}

impl TraceFilter {
    /// Build a filter for `policy`
    ///
    /// A `stack_window` that is not a power of two is rounded up to the next
    /// one; `Config::validate` rejects such values before they get here.
    #[must_use]
    pub fn new(policy: FilterPolicy) -> Self {
        let state = if policy.time_trigger > 0 {
            ArmingState::Disarmed { elapsed: 0, threshold: policy.time_trigger }
        } else {
            ArmingState::Armed
        };
        let window = policy.stack_window.max(1).checked_next_power_of_two().unwrap_or(1 << 63);

        debug!("Trace filter policy: {policy:?}, initial state {state:?}");

        Self { policy, state, window_mask: !(window - 1) }
    }

    #[must_use]
    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    #[must_use]
    pub fn state(&self) -> ArmingState {
        self.state
    }

    #[must_use]
    pub fn is_armed(&self) -> bool {
        self.state == ArmingState::Armed
    }

    /// Advance the deferred-arming timer by one tick
    ///
    /// Returns `true` on the tick that arms the filter. Ticks after that are
    /// ignored.
    pub fn on_tick(&mut self) -> bool {
        match &mut self.state {
            ArmingState::Armed => false,
            ArmingState::Disarmed { elapsed, threshold } => {
                if *elapsed < *threshold {
                    *elapsed += 1;
                    return false;
                }
                self.state = ArmingState::Armed;
                true
            }
        }
    }

    /// Whether events of `kind` currently reach the recorder
    #[must_use]
    pub fn category_enabled(&self, kind: EventKind) -> bool {
        self.is_armed() && self.policy.monitors(kind)
    }

    /// Address policy for one concrete memory access
    #[must_use]
    pub fn admit_memory(&self, address: u64, stack_pointer: u64) -> bool {
        if address < self.policy.catch_above {
            return false;
        }

        if self.policy.monitor_stack {
            return address & self.window_mask == stack_pointer & self.window_mask;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_policy() -> FilterPolicy {
        FilterPolicy { monitor_memory: true, ..FilterPolicy::default() }
    }

    #[test]
    fn test_starts_armed_without_time_trigger() {
        let filter = TraceFilter::new(memory_policy());
        assert!(filter.is_armed());
        assert!(filter.category_enabled(EventKind::Memory));
    }

    #[test]
    fn test_deferred_arming_after_three_ticks() {
        let mut filter = TraceFilter::new(FilterPolicy { time_trigger: 3, ..memory_policy() });
        assert_eq!(filter.state(), ArmingState::Disarmed { elapsed: 0, threshold: 3 });

        for _ in 0..3 {
            assert!(!filter.on_tick());
            assert!(!filter.is_armed());
            assert!(!filter.category_enabled(EventKind::Memory));
        }

        assert!(filter.on_tick());
        assert!(filter.is_armed());

        for _ in 0..10 {
            assert!(!filter.on_tick());
            assert_eq!(filter.state(), ArmingState::Armed);
        }
    }

    #[test]
    fn test_ticks_ignored_when_armed() {
        let mut filter = TraceFilter::new(memory_policy());
        assert!(!filter.on_tick());
        assert!(filter.is_armed());
    }

    #[test]
    fn test_disabled_categories_never_fire() {
        let filter = TraceFilter::new(FilterPolicy { monitor_tlb_misses: true, ..FilterPolicy::default() });
        assert!(filter.is_armed());
        assert!(filter.category_enabled(EventKind::TlbMiss));
        assert!(!filter.category_enabled(EventKind::Memory));
        assert!(!filter.category_enabled(EventKind::PageFault));
    }

    #[test]
    fn test_threshold_admission() {
        let filter = TraceFilter::new(FilterPolicy { catch_above: 0x1000, ..memory_policy() });
        assert!(!filter.admit_memory(0x0FFF, 0));
        assert!(filter.admit_memory(0x1000, 0));
        assert!(filter.admit_memory(u64::MAX, 0));
    }

    #[test]
    fn test_stack_window_admission() {
        let filter = TraceFilter::new(FilterPolicy { monitor_stack: true, ..memory_policy() });
        let window = DEFAULT_STACK_WINDOW;
        let sp = 0x0012_0000 & !(window - 1);

        assert!(filter.admit_memory(sp, sp));
        assert!(filter.admit_memory(sp + window - 1, sp));
        assert!(!filter.admit_memory(sp + window, sp));
        assert!(!filter.admit_memory(sp - 1, sp));
    }

    #[test]
    fn test_stack_window_still_applies_threshold() {
        let filter = TraceFilter::new(FilterPolicy {
            monitor_stack: true,
            catch_above: 0x0010_0000,
            ..memory_policy()
        });
        // Same window as the stack pointer, but below the threshold
        assert!(!filter.admit_memory(0x0004_0000, 0x0004_1000));
        assert!(filter.admit_memory(0x0014_0000, 0x0014_1000));
    }

    #[test]
    fn test_custom_stack_window() {
        let filter = TraceFilter::new(FilterPolicy {
            monitor_stack: true,
            stack_window: 0x2000,
            ..memory_policy()
        });
        assert!(filter.admit_memory(0x7000, 0x6000));
        assert!(!filter.admit_memory(0x8000, 0x6000));
    }

    #[test]
    fn test_policy_deserializes_config_keys() {
        let policy: FilterPolicy = serde_json::from_str(
            r#"{"monitorStack":true,"catchAccessesAbove":4096,"timeTrigger":5,
                "monitorMemory":true,"monitorPageFaults":true,"monitorTlbMisses":false}"#,
        )
        .unwrap();

        assert!(policy.monitor_stack);
        assert_eq!(policy.catch_above, 0x1000);
        assert_eq!(policy.time_trigger, 5);
        assert!(policy.monitor_page_faults);
        assert!(!policy.monitor_tlb_misses);
        assert_eq!(policy.stack_window, DEFAULT_STACK_WINDOW);
    }
}
