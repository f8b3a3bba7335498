//! Boot-time confirmation of a freshly updated slot.
//!
//! With rollback enabled the bootloader starts a new image in the
//! pending-verify state. Unless the running image marks itself valid, the next
//! reset falls back to the previous slot.

use log::{info, warn};
use serde::Serialize;

use crate::error::SlotError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    PendingVerify,
    Valid,
    Invalid,
    Factory,
    Unknown,
}

/// Boot state queries against the partition table.
pub trait BootSlots {
    fn running_state(&mut self) -> Result<SlotState, SlotError>;
    fn mark_running_valid(&mut self) -> Result<(), SlotError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootCheck {
    /// The running slot was pending and is now valid.
    Confirmed,
    AlreadyValid,
    NotApplicable(SlotState),
}

/// Marks the running slot valid if it is still pending verification.
pub fn confirm_running_slot<B: BootSlots>(slots: &mut B) -> Result<BootCheck, SlotError> {
    match slots.running_state()? {
        SlotState::PendingVerify => {
            info!("Running slot is pending verification, marking valid");
            slots.mark_running_valid()?;
            Ok(BootCheck::Confirmed)
        }
        SlotState::Valid => Ok(BootCheck::AlreadyValid),
        other => {
            warn!("Running slot state {:?}, nothing to confirm", other);
            Ok(BootCheck::NotApplicable(other))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeSlots {
        state: SlotState,
        marks: usize,
    }

    impl BootSlots for FakeSlots {
        fn running_state(&mut self) -> Result<SlotState, SlotError> {
            Ok(self.state)
        }

        fn mark_running_valid(&mut self) -> Result<(), SlotError> {
            self.marks += 1;
            self.state = SlotState::Valid;
            Ok(())
        }
    }

    #[test]
    fn test_pending_slot_is_confirmed_once() {
        let mut slots = FakeSlots {
            state: SlotState::PendingVerify,
            marks: 0,
        };
        assert_eq!(confirm_running_slot(&mut slots).unwrap(), BootCheck::Confirmed);
        assert_eq!(confirm_running_slot(&mut slots).unwrap(), BootCheck::AlreadyValid);
        assert_eq!(slots.marks, 1);
    }

    #[test]
    fn test_factory_slot_untouched() {
        let mut slots = FakeSlots {
            state: SlotState::Factory,
            marks: 0,
        };
        assert_eq!(
            confirm_running_slot(&mut slots).unwrap(),
            BootCheck::NotApplicable(SlotState::Factory)
        );
        assert_eq!(slots.marks, 0);
    }
}
