use crate::client::{AtClient, Transaction, TransactionError};
use crate::commands::{CommandErrorHandler, RestoreCommand, SelfTestCommand};
use crate::config::Config;
use crate::responses::NoResponse;
use crate::tests::mock::{MockDelay, MockRelay, MockTransport, MockedCommand};
use crate::wifi::Error;
use alloc::string::ToString;
use atat::atat_derive::AtatCmd;
use core::sync::atomic::{AtomicBool, Ordering};
use embedded_io::ErrorKind;
use heapless::String;

#[derive(Clone, AtatCmd)]
#[at_cmd("+OVERSIZED", NoResponse, timeout_ms = 500)]
struct OversizedCommand {
    #[at_arg(position = 0)]
    value: atat::heapless::String<300>,
}

impl CommandErrorHandler for OversizedCommand {
    const EXPECTED: &'static str = "OK";

    fn command_error(&self, error: TransactionError) -> Error {
        Error::SelfTestFailed(error)
    }
}

type ClientType = AtClient<MockTransport, MockDelay, MockRelay, 64>;

fn client(transport: MockTransport) -> ClientType {
    AtClient::new(transport, MockDelay::default(), MockRelay::default(), &Config::default())
}

fn timeout(command: &str, expected: &str, timeout_ms: u32) -> TransactionError {
    TransactionError::Timeout(Transaction {
        command: String::try_from(command).unwrap(),
        expected: String::try_from(expected).unwrap(),
        timeout_ms,
    })
}

#[test]
fn test_send_and_wait_matched() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::ok(b"AT\r\n"));

    let mut client = client(transport);
    client.send_and_wait("AT", Some("OK"), 500).unwrap();

    let commands = client.transport.get_commands_as_strings();
    assert_eq!(1, commands.len());
    assert_eq!("AT\r\n".to_string(), commands[0]);
    assert_eq!(0, client.delay.elapsed_ms());
}

#[test]
fn test_send_and_wait_timeout() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::silent(b"AT\r\n"));

    let mut client = client(transport);
    let error = client.send_and_wait("AT", Some("OK"), 500).unwrap_err();

    assert_eq!(timeout("AT", "OK", 500), error);
    assert_eq!(500, client.delay.elapsed_ms());
    assert_eq!(500, client.delay.get_ms_calls().len());
}

#[test]
fn test_send_and_wait_no_expectation() {
    let mut client = client(MockTransport::new());
    client.send_and_wait("AT+CIPSEND", None, 500).unwrap();

    assert_eq!(vec!["AT+CIPSEND\r\n".to_string()], client.transport.get_commands_as_strings());
    assert_eq!(0, client.delay.elapsed_ms());
}

#[test]
fn test_send_and_wait_zero_timeout() {
    let mut client = client(MockTransport::new());
    client.send_and_wait("AT", Some("OK"), 0).unwrap();

    assert_eq!(vec!["AT\r\n".to_string()], client.transport.get_commands_as_strings());
    assert_eq!(0, client.delay.elapsed_ms());
}

#[test]
fn test_send_and_wait_substring_not_anchored() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::new(
        b"AT+CWJAP=\"Net\",\"Pass\"\r\n",
        &[b"WIFI CONNECTED\r\nWIFI GOT IP\r\n\r\nOK\r\n"],
    ));

    let mut client = client(transport);
    client
        .send_and_wait("AT+CWJAP=\"Net\",\"Pass\"", Some("WIFI GOT IP"), 10_000)
        .unwrap();
}

#[test]
fn test_send_and_wait_case_sensitive() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::new(b"AT\r\n", &[b"\r\nok\r\n"]));

    let mut client = client(transport);
    let error = client.send_and_wait("AT", Some("OK"), 20).unwrap_err();

    assert_eq!(timeout("AT", "OK", 20), error);
}

#[test]
fn test_send_and_wait_later_frame_matched() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::new(
        b"AT+RESTORE\r\n",
        &[b"\r\nOK\r\n", b"boot log\r\n", b"ready\r\n"],
    ));

    let mut client = client(transport);
    client.send_and_wait("AT+RESTORE", Some("ready"), 3_000).unwrap();

    assert_eq!(b"\r\nOK\r\nboot log\r\nready\r\n", client.relay.data.as_slice());
    assert_eq!(3, client.transport.get_clear_count());
    assert_eq!(b"ready\r\n", client.last_response());
}

#[test]
fn test_frames_relayed_on_timeout() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::new(b"AT+CIPSEND\r\n", &[b"\r\nERROR\r\n"]));

    let mut client = client(transport);
    let error = client.send_and_wait("AT+CIPSEND", Some(">"), 500).unwrap_err();

    assert_eq!(timeout("AT+CIPSEND", ">", 500), error);
    assert_eq!(b"\r\nERROR\r\n", client.relay.data.as_slice());
    assert!(!client.transport.has_frame());
}

#[test]
fn test_stale_frame_not_matched() {
    let mut transport = MockTransport::new();
    transport.add_frame(b"\r\nOK\r\n");
    transport.add_response(MockedCommand::silent(b"AT\r\n"));

    let mut client = client(transport);
    let error = client.send_and_wait("AT", Some("OK"), 50).unwrap_err();

    assert_eq!(timeout("AT", "OK", 50), error);
    // Stale frame was relayed before the command got sent
    assert_eq!(b"\r\nOK\r\n", client.relay.data.as_slice());
    assert!(client.last_response().is_empty());
}

#[test]
fn test_timeout_counted_down_by_poll_interval() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::silent(b"AT\r\n"));

    let config = Config::default().poll_interval_ms(10);
    let mut client: ClientType = AtClient::new(transport, MockDelay::default(), MockRelay::default(), &config);
    let error = client.send_and_wait("AT", Some("OK"), 95).unwrap_err();

    assert_eq!(timeout("AT", "OK", 95), error);
    assert_eq!(100, client.delay.elapsed_ms());
    assert_eq!(10, client.delay.get_ms_calls().len());
}

#[test]
fn test_cancelled_wait() {
    static CANCEL: AtomicBool = AtomicBool::new(false);
    CANCEL.store(true, Ordering::Release);

    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::silent(b"AT\r\n"));

    let mut client = client(transport);
    client.set_cancel_flag(&CANCEL);

    let error = client.send_and_wait("AT", Some("OK"), 500).unwrap_err();
    assert_eq!(TransactionError::Cancelled, error);
    assert_eq!(0, client.delay.elapsed_ms());
}

#[test]
fn test_cancel_flag_unset() {
    static CANCEL: AtomicBool = AtomicBool::new(false);

    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::ok(b"AT\r\n"));

    let mut client = client(transport);
    client.set_cancel_flag(&CANCEL);
    client.send_and_wait("AT", Some("OK"), 500).unwrap();
}

#[test]
fn test_transport_error() {
    let mut transport = MockTransport::new();
    transport.fail_writes();

    let mut client = client(transport);
    let error = client.send_and_wait("AT", Some("OK"), 500).unwrap_err();

    assert_eq!(TransactionError::Transport(ErrorKind::BrokenPipe), error);
    assert_eq!(0, client.delay.elapsed_ms());
}

#[test]
fn test_relay_failure_ignored() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::ok(b"AT\r\n"));

    let mut client = client(transport);
    client.relay.fail = true;
    client.send_and_wait("AT", Some("OK"), 500).unwrap();

    assert!(client.relay.data.is_empty());
}

#[test]
fn test_wait_for_without_command() {
    let mut transport = MockTransport::new();
    transport.add_frame(b"SEND OK\r\n");

    let mut client = client(transport);
    client.wait_for("OK", 100).unwrap();

    assert!(client.transport.get_commands_as_strings().is_empty());
}

#[test]
fn test_wait_for_timeout() {
    let mut client = client(MockTransport::new());
    let error = client.wait_for("OK", 100).unwrap_err();

    assert_eq!(timeout("", "OK", 100), error);
    assert_eq!(100, client.delay.elapsed_ms());
}

#[test]
fn test_relay_idle_frame() {
    let mut transport = MockTransport::new();
    transport.add_frame(b"+IPD,4:ping");

    let mut client = client(transport);
    assert!(client.relay());
    assert!(!client.relay());

    assert_eq!(b"+IPD,4:ping", client.relay.data.as_slice());
    assert_eq!(1, client.transport.get_clear_count());
}

#[test]
fn test_relay_nothing_pending() {
    let mut client = client(MockTransport::new());

    assert!(!client.relay());
    assert!(client.relay.data.is_empty());
    assert_eq!(0, client.transport.get_clear_count());
}

#[test]
fn test_send_command_encoded() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::ok(b"AT\r\n"));

    let mut client = client(transport);
    client.send_command(&SelfTestCommand).unwrap();

    assert_eq!(vec!["AT\r\n".to_string()], client.transport.get_commands_as_strings());
}

#[test]
fn test_send_command_timeout_taken_from_command() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::ok(b"AT+RESTORE\r\n"));

    let mut client = client(transport);
    let error = client.send_command(&RestoreCommand).unwrap_err();

    assert_eq!(timeout("AT+RESTORE", "ready", 3_000), error);
    assert_eq!(3_000, client.delay.elapsed_ms());
}

#[test]
fn test_long_frame_truncated_when_stored() {
    let mut transport = MockTransport::new();
    transport.add_response(MockedCommand::new(
        b"AT+CIFSR\r\n",
        &[b"+CIFSR:STAIP,\"192.168.4.2\"\r\n+CIFSR:STAMAC,\"10:fe:ed:05:ba:50\"\r\n\r\nOK\r\n"],
    ));

    let mut client = client(transport);
    client.send_and_wait("AT+CIFSR", Some("OK"), 500).unwrap();

    assert_eq!(64, client.last_response().len());
    assert!(client.last_response().starts_with(b"+CIFSR:STAIP,\"192.168.4.2\""));
}

#[test]
fn test_send_command_overflow() {
    let mut client = client(MockTransport::new());
    let command = OversizedCommand {
        value: atat::heapless::String::new(),
    };

    let error = client.send_command(&command).unwrap_err();
    assert_eq!(TransactionError::CommandOverflow, error);
    assert!(client.transport.get_commands_as_strings().is_empty());
}

#[test]
fn test_send_and_wait_line_too_long() {
    let command = "A".repeat(255);

    let mut client = client(MockTransport::new());
    let error = client.send_and_wait(command.as_str(), Some("OK"), 500).unwrap_err();

    assert_eq!(TransactionError::CommandOverflow, error);
    assert!(client.transport.get_commands_as_strings().is_empty());
    assert!(client.transport.get_raw_data().is_empty());
}

#[test]
fn test_send_and_wait_longest_line() {
    let command = "A".repeat(254);

    let mut client = client(MockTransport::new());
    client.send_and_wait(command.as_str(), None, 0).unwrap();

    assert_eq!(256, client.transport.get_commands_as_strings()[0].len());
}
