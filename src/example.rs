//! Mocks for doc examples
use crate::transport::Transport;
use core::convert::Infallible;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::{ErrorType as PinErrorType, OutputPin};
use embedded_io::{ErrorType, Write};
use heapless::Vec;

/// Serial link mock answering the commands used by the doc examples
#[derive(Default)]
pub struct ExampleTransport {
    /// Current command line
    line: Vec<u8, 256>,

    /// Response flagged as received
    frame: Option<&'static [u8]>,
}

impl ExampleTransport {
    fn respond(&mut self) {
        let response: &'static [u8] = match self.line.as_slice() {
            b"AT+CWJAP=\"test_wifi\",\"secret\"\r\n" => b"WIFI CONNECTED\r\nWIFI GOT IP\r\n",
            b"AT+CIFSR\r\n" => b"+CIFSR:STAIP,\"10.0.0.181\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n",
            b"AT+CIPSTART=\"TCP\",\"10.0.0.1\",5555\r\n" => b"CONNECT\r\n\r\nOK\r\n",
            b"AT+CIPSEND\r\n" => b"\r\nOK\r\n\r\n>",
            b"AT\r\n" | b"ATE0\r\n" | b"AT+CWMODE=1\r\n" | b"AT+CIPMODE=1\r\n" | b"AT+RST\r\n" => b"\r\nOK\r\n",
            _ => b"\r\nERROR\r\n",
        };

        self.frame = Some(response);
        self.line.clear();
    }
}

impl ErrorType for ExampleTransport {
    type Error = Infallible;
}

impl Write for ExampleTransport {
    fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        for byte in buf {
            if self.line.push(*byte).is_err() {
                self.line.clear();
            }

            if self.line.ends_with(b"\r\n") {
                self.respond();
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

impl Transport for ExampleTransport {
    fn frame(&self) -> Option<&[u8]> {
        self.frame
    }

    fn clear_frame(&mut self) {
        self.frame = None;
    }
}

/// Delay returning immediately
#[derive(Default)]
pub struct ExampleDelay;

impl DelayNs for ExampleDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// Reset pin mock
#[derive(Default)]
pub struct ExampleResetPin;

impl PinErrorType for ExampleResetPin {
    type Error = Infallible;
}

impl OutputPin for ExampleResetPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}
