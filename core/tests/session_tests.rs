mod common;

use std::time::Duration;

use ccid_bulk::config::ConfigError;
use ccid_bulk::message::{EncodingError, MAX_PAYLOAD_SIZE};
use ccid_bulk::status::{IccStatus, SlotError};
use ccid_bulk::{CcidError, PowerState, ResponseType, Session, SessionConfig, TransportError};

use common::{data_block, frame, slot_status, ScriptedReader, TOKEN_ATR};

fn open(reader: ScriptedReader) -> Session<ScriptedReader> {
    Session::new(reader, SessionConfig::default()).unwrap()
}

#[test]
fn test_power_cycle() {
    let reader = ScriptedReader::new()
        .reply(slot_status(0, 0x01))
        .reply(data_block(1, &TOKEN_ATR));
    let mut session = open(reader);

    let power_off = session.power_off().unwrap();
    assert_eq!(ResponseType::SlotStatus, power_off.message_type);
    assert_eq!(IccStatus::PresentInactive, power_off.status.icc_status());
    assert_eq!(PowerState::PoweredOff, session.power_state());

    let atr = session.power_on().unwrap();
    assert!(atr.starts_with(&[0x3B, 0x8C, 0x80, 0x01]));
    assert_eq!(Some(&atr), session.last_atr());
    assert_eq!(PowerState::PoweredOn, session.power_state());

    let written = &session.transport().written;
    assert_eq!(
        vec![0x63, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        written[0],
    );
    // Sequence 1, bPowerSelect = 5V.
    assert_eq!(
        vec![0x62, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x01, 0x00, 0x00],
        written[1],
    );
}

#[test]
fn test_configured_timeout_and_voltage() {
    let config = SessionConfig::default()
        .with_timeout(Duration::from_millis(250))
        .with_voltage(ccid_bulk::Voltage::V3);
    let reader = ScriptedReader::new().reply(data_block(0, &TOKEN_ATR));
    let mut session = Session::new(reader, config).unwrap();

    session.power_on().unwrap();

    let reader = session.into_transport();
    assert_eq!(0x02, reader.written[0][7]);
    assert!(reader
        .timeouts
        .iter()
        .all(|t| *t == Duration::from_millis(250)));
}

#[test]
fn test_unbounded_timeouts_are_rejected() {
    for timeout in [
        Duration::ZERO,
        Duration::from_micros(500),
        Duration::from_millis(1 << 32),
    ] {
        let config = SessionConfig::default().with_timeout(timeout);

        assert!(
            matches!(
                Session::new(ScriptedReader::new(), config),
                Err(CcidError::Config(ConfigError::TimeoutOutOfRange(t))) if t == timeout
            ),
            "{timeout:?}",
        );
    }
}

#[test]
fn test_timeout_advances_sequence() {
    let reader = ScriptedReader::new()
        .fail(TransportError::Timeout)
        .reply(slot_status(1, 0x01));
    let mut session = open(reader);

    assert_eq!(Err(CcidError::Timeout), session.power_on());
    assert_eq!(0, session.sequence().current());
    assert_eq!(1, session.sequence().upcoming());
    assert_eq!(PowerState::Unknown, session.power_state());

    session.power_off().unwrap();

    let written = &session.transport().written;
    assert_eq!(0, written[0][6]);
    assert_eq!(1, written[1][6]);
}

#[test]
fn test_late_response_is_rejected() {
    // The answer to the timed-out power-on arrives during the next exchange.
    let reader = ScriptedReader::new()
        .fail(TransportError::Timeout)
        .reply(data_block(0, &TOKEN_ATR));
    let mut session = open(reader);

    assert_eq!(Err(CcidError::Timeout), session.power_on());
    assert_eq!(
        Err(CcidError::SequenceMismatch {
            expected: 1,
            actual: 0,
        }),
        session.power_off(),
    );
    assert_eq!(PowerState::Unknown, session.power_state());
}

#[test]
fn test_sequence_mismatch_is_not_an_atr() {
    let reader = ScriptedReader::new().reply(data_block(5, &TOKEN_ATR));
    let mut session = open(reader);

    assert_eq!(
        Err(CcidError::SequenceMismatch {
            expected: 0,
            actual: 5,
        }),
        session.power_on(),
    );
    assert_eq!(None, session.last_atr());
}

#[test]
fn test_short_read() {
    let mut raw = data_block(0, &[]);
    raw.truncate(9);
    let mut session = open(ScriptedReader::new().reply(raw));

    assert_eq!(Err(CcidError::ShortRead(9)), session.power_on());
}

#[test]
fn test_unexpected_message_type() {
    let reader = ScriptedReader::new()
        .reply(slot_status(0, 0x00))
        .reply(frame(0x6C, 1, 0x40, 0x00, &[]));
    let mut session = open(reader);

    assert_eq!(
        Err(CcidError::UnexpectedMessageType {
            expected: ResponseType::DataBlock,
            actual: 0x81,
        }),
        session.power_on(),
    );
    assert_eq!(
        Err(CcidError::UnexpectedMessageType {
            expected: ResponseType::SlotStatus,
            actual: 0x6C,
        }),
        session.power_off(),
    );
}

#[test]
fn test_slot_mismatch() {
    let mut raw = data_block(0, &TOKEN_ATR);
    raw[5] = 1;
    let mut session = open(ScriptedReader::new().reply(raw));

    assert_eq!(
        Err(CcidError::SlotMismatch {
            expected: 0,
            actual: 1,
        }),
        session.power_on(),
    );
}

#[test]
fn test_padding_is_trimmed() {
    let mut raw = data_block(0, &[0x3B, 0x8C, 0x80, 0x01]);
    raw.extend_from_slice(&[0x00, 0x00, 0x00]);
    let mut session = open(ScriptedReader::new().reply(raw));

    let atr = session.power_on().unwrap();
    assert_eq!(&[0x3B, 0x8C, 0x80, 0x01], atr.as_bytes());
}

#[test]
fn test_truncated_payload_is_accepted() {
    let mut raw = data_block(0, &TOKEN_ATR);
    raw.truncate(14);
    let mut session = open(ScriptedReader::new().reply(raw));

    let atr = session.power_on().unwrap();
    assert_eq!(&TOKEN_ATR[..4], atr.as_bytes());
}

#[test]
fn test_power_on_without_card() {
    let reader = ScriptedReader::new().reply(frame(0x80, 0, 0x42, 0xFE, &[]));
    let mut session = open(reader);

    assert_eq!(
        Err(CcidError::CommandFailed {
            icc: IccStatus::NotPresent,
            error: SlotError::IccMute,
        }),
        session.power_on(),
    );
}

#[test]
fn test_power_off_clears_atr() {
    let reader = ScriptedReader::new()
        .reply(data_block(0, &TOKEN_ATR))
        .reply(slot_status(1, 0x01));
    let mut session = open(reader);

    session.power_on().unwrap();
    assert!(session.last_atr().is_some());

    session.power_off().unwrap();
    assert_eq!(None, session.last_atr());
}

#[test]
fn test_failed_power_off_keeps_state() {
    let reader = ScriptedReader::new()
        .reply(data_block(0, &TOKEN_ATR))
        .reply(frame(0x81, 1, 0x40, 0xE0, &[]));
    let mut session = open(reader);

    let atr = session.power_on().unwrap();

    let response = session.power_off().unwrap();
    assert!(response.status.is_failed());
    assert_eq!(SlotError::CmdSlotBusy, SlotError::from(response.error));
    assert_eq!(PowerState::PoweredOn, session.power_state());
    assert_eq!(Some(&atr), session.last_atr());
}

#[test]
fn test_slot_status() {
    let reader = ScriptedReader::new().reply(slot_status(0, 0x02));
    let mut session = open(reader);

    let response = session.slot_status().unwrap();
    assert_eq!(IccStatus::NotPresent, response.status.icc_status());
    assert_eq!(0x65, session.transport().written[0][0]);
    assert_eq!(PowerState::Unknown, session.power_state());
}

#[test]
fn test_transmit_with_time_extension() {
    let select = [0x00, 0xA4, 0x04, 0x00, 0x05, 0xA0, 0x00, 0x00, 0x03, 0x08];
    let reader = ScriptedReader::new()
        .reply(frame(0x80, 0, 0x80, 0x01, &[]))
        .reply(data_block(0, &[0x61, 0x11, 0x90, 0x00]));
    let mut session = open(reader);

    assert_eq!(Ok(vec![0x61, 0x11, 0x90, 0x00]), session.transmit(&select));

    let written = &session.transport().written;
    assert_eq!(1, written.len());
    assert_eq!(0x6F, written[0][0]);
    assert_eq!(select.len() as u8, written[0][1]);
    assert_eq!(&select, &written[0][10..]);
}

#[test]
fn test_too_many_time_extensions() {
    let config = SessionConfig::default().with_max_time_extensions(1);
    let reader = ScriptedReader::new()
        .reply(frame(0x80, 0, 0x80, 0x01, &[]))
        .reply(frame(0x80, 0, 0x80, 0x01, &[]));
    let mut session = Session::new(reader, config).unwrap();

    assert_eq!(
        Err(CcidError::TooManyTimeExtensions(1)),
        session.transmit(&[0x00, 0xCA, 0x00, 0x00]),
    );
}

#[test]
fn test_transmit_rejects_chained_response() {
    let mut raw = data_block(0, &[0x01, 0x02]);
    raw[9] = 0x01;
    let mut session = open(ScriptedReader::new().reply(raw));

    assert_eq!(
        Err(CcidError::ChainingUnsupported(0x01)),
        session.transmit(&[0x00, 0xCA, 0x00, 0x00]),
    );
}

#[test]
fn test_oversized_apdu_spends_no_sequence() {
    let mut session = open(ScriptedReader::new());
    let apdu = vec![0u8; MAX_PAYLOAD_SIZE + 1];

    assert_eq!(
        Err(CcidError::Encoding(EncodingError::PacketTooLarge {
            len: 65,
            max: 64,
        })),
        session.transmit(&apdu),
    );
    assert_eq!(0, session.sequence().upcoming());
    assert!(session.transport().written.is_empty());
}

#[test]
fn test_short_write() {
    let reader = ScriptedReader::new().write_limit(4);
    let mut session = open(reader);

    assert_eq!(
        Err(CcidError::ShortWrite {
            written: 4,
            expected: 10,
        }),
        session.power_off(),
    );
}

#[test]
fn test_transport_failure() {
    let reader = ScriptedReader::new().fail(TransportError::Disconnected);
    let mut session = open(reader);

    assert_eq!(
        Err(CcidError::Transport(TransportError::Disconnected)),
        session.slot_status(),
    );
}

#[test]
fn test_sequence_wraps_across_exchanges() {
    let mut reader = ScriptedReader::new();
    for i in 0..300u32 {
        reader = reader.reply(slot_status(i as u8, 0x00));
    }
    let mut session = open(reader);

    for _ in 0..300 {
        session.slot_status().unwrap();
    }

    let written = &session.transport().written;
    for (i, command) in written.iter().enumerate() {
        assert_eq!(i as u8, command[6]);
    }
}
