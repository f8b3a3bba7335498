use crate::error::SlotError;

/// Sequential writer for the inactive firmware slot.
///
/// One stream at a time: `begin`, any number of `write`s, then exactly one of
/// `finalize` (commit and make the slot the boot target) or `abort`.
pub trait FirmwareSlot {
    /// `image_size` lets the platform erase only what is needed; `None` erases
    /// as writes arrive.
    fn begin(&mut self, image_size: Option<u32>) -> Result<(), SlotError>;

    fn write(&mut self, data: &[u8]) -> Result<(), SlotError>;

    fn finalize(&mut self) -> Result<(), SlotError>;

    /// Drops the in-progress stream. Safe to call when nothing is open.
    fn abort(&mut self);
}

impl<T: FirmwareSlot + ?Sized> FirmwareSlot for &mut T {
    fn begin(&mut self, image_size: Option<u32>) -> Result<(), SlotError> {
        (**self).begin(image_size)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), SlotError> {
        (**self).write(data)
    }

    fn finalize(&mut self) -> Result<(), SlotError> {
        (**self).finalize()
    }

    fn abort(&mut self) {
        (**self).abort()
    }
}
