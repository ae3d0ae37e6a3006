// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Priority requested for the beat and output threads when none is configured.
pub const DEFAULT_THREAD_PRIORITY: u8 = 70;

/// Resolves a configured priority (0-99), falling back to the default when
/// unset or out of range.
pub fn thread_priority_value(priority: Option<u8>) -> u8 {
    match priority {
        Some(priority) if priority < 100 => priority,
        _ => DEFAULT_THREAD_PRIORITY,
    }
}

/// Raises the priority of the calling thread once. With `rt_audio` set on unix,
/// also attempts SCHED_FIFO. Failures are logged and otherwise ignored.
pub fn configure_thread_priority(
    name: &str,
    priority: u8,
    rt_audio: bool,
    priority_set: &mut bool,
) {
    if *priority_set {
        return;
    }
    *priority_set = true;

    let value = match ThreadPriorityValue::try_from(priority) {
        Ok(value) => value,
        Err(e) => {
            warn!(thread = name, priority, error = ?e, "Invalid thread priority");
            return;
        }
    };
    let tp = ThreadPriority::Crossplatform(value);
    if let Err(e) = set_current_thread_priority(tp) {
        warn!(thread = name, error = ?e, "Failed to raise thread priority");
    }

    #[cfg(unix)]
    if rt_audio {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            tp,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => {
                info!(thread = name, "Enabled RT SCHED_FIFO");
            }
            Err(e) => {
                warn!(thread = name, error = %e, "Failed to set RT SCHED_FIFO");
            }
        }
    }
    #[cfg(not(unix))]
    let _ = rt_audio;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_thread_priority_value() {
        assert_eq!(thread_priority_value(Some(10)), 10);
        assert_eq!(thread_priority_value(None), DEFAULT_THREAD_PRIORITY);
        assert_eq!(thread_priority_value(Some(150)), DEFAULT_THREAD_PRIORITY);
    }

    #[test]
    fn test_configure_only_once() {
        let mut priority_set = true;
        configure_thread_priority("test", thread_priority_value(None), false, &mut priority_set);
        assert!(priority_set);
    }
}
