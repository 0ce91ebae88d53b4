//! # Serial transport seam
//!
//! The UART driver owned by the application fills a receive buffer and flags it once a
//! frame is complete. This crate consumes that buffer through [Transport] and sends bytes
//! through its [embedded_io::Write] supertrait.
//!
//! Frames are consumed exclusively via [InboundFrame], which clears the frame-ready flag
//! when dropped. So a consumer can not leave a stale frame behind, which would otherwise get
//! processed twice.
use core::ops::Deref;
use embedded_io::{ErrorType, Write};

/// Serial link to the WiFi module
pub trait Transport: Write {
    /// Returns the received frame, if the transport flagged it as complete
    fn frame(&self) -> Option<&[u8]>;

    /// Clears the frame-ready flag, so the transport may receive the next frame
    fn clear_frame(&mut self);
}

/// Exclusive access to a complete inbound frame. Clears the frame-ready flag on drop.
pub struct InboundFrame<'a, T: Transport> {
    transport: &'a mut T,
}

impl<'a, T: Transport> InboundFrame<'a, T> {
    /// Takes the pending frame. Returns None if the transport has no complete frame.
    pub fn take(transport: &'a mut T) -> Option<Self> {
        if transport.frame().is_none() {
            return None;
        }

        Some(Self { transport })
    }
}

impl<T: Transport> Deref for InboundFrame<'_, T> {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.transport.frame().unwrap_or(&[])
    }
}

impl<T: Transport> Drop for InboundFrame<'_, T> {
    fn drop(&mut self) {
        self.transport.clear_frame();
    }
}

/// Diagnostic sink discarding all relayed bytes
#[derive(Copy, Clone, Debug, Default)]
pub struct NullRelay;

impl ErrorType for NullRelay {
    type Error = core::convert::Infallible;
}

impl Write for NullRelay {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
