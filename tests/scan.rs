use std::{
    collections::BTreeMap,
    io::{self, Read, Write},
};

use proptest::prelude::*;
use scservo_ping::{
    protocol::{PacketHandler, Pong, ProtocolEnd, ProtocolHandler},
    scan::{scan, Console, PingOutcome, ScanError, ScanReport, ScanRequest},
    serial::{CommError, SerialError, TransportHandle},
};

/// Transport that counts lifecycle calls and never carries bytes.
#[derive(Default)]
struct CountingPort {
    opens: usize,
    bauds: Vec<u32>,
    closes: usize,
    pings: Vec<u8>,
    refuse_open: bool,
}

impl Read for CountingPort {
    fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
        Err(io::ErrorKind::TimedOut.into())
    }
}

impl Write for CountingPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl TransportHandle for CountingPort {
    fn open(&mut self) -> Result<(), SerialError> {
        if self.refuse_open {
            return Err(SerialError::NotOpen);
        }
        self.opens += 1;
        Ok(())
    }

    fn set_baud_rate(&mut self, baud_rate: u32) -> Result<(), SerialError> {
        self.bauds.push(baud_rate);
        Ok(())
    }

    fn close(&mut self) {
        self.closes += 1;
    }
}

/// Servos that answer with a model number; every other ID is silent.
struct Bus(BTreeMap<u8, u16>);

impl ProtocolHandler<CountingPort> for Bus {
    fn ping(&self, port: &mut CountingPort, id: u8) -> Result<Pong, CommError> {
        port.pings.push(id);
        self.0
            .get(&id)
            .map(|&model_number| Pong {
                model_number,
                error: 0,
            })
            .ok_or(CommError::RxTimeout)
    }
}

fn request(id_start: u8, id_end: u8) -> ScanRequest {
    ScanRequest {
        device: "/dev/ttyUSB0".to_owned(),
        id_start,
        id_end,
        ..ScanRequest::default()
    }
}

fn run(request: &ScanRequest, port: &mut CountingPort, bus: &Bus) -> (ScanReport, String) {
    let mut console = Console::new(Vec::new(), false);
    let report = scan(request, port, bus, &mut console).unwrap();
    (report, String::from_utf8(console.into_inner()).unwrap())
}

#[test]
fn prints_full_session() {
    let bus = Bus(BTreeMap::from([(1, 777), (3, 778)]));
    let mut port = CountingPort::default();
    let (_, output) = run(&request(1, 3), &mut port, &bus);

    assert_eq!(
        output,
        "Succeeded to open the port: /dev/ttyUSB0\n\
         Succeeded to change the baudrate to 1000000\n\
         Scanning for servos in ID range: 1-3...\n\
         [ID:001] Ping succeeded. SCServo model number: 777\n\
         [ID:002] There is no status packet.\n\
         [ID:003] Ping succeeded. SCServo model number: 778\n\
         \n\
         Summary of Successful Pings:\n\
         \x20 - ID:1 Model:777\n\
         \x20 - ID:3 Model:778\n"
    );
}

#[test]
fn open_failure_never_touches_bus() {
    let bus = Bus(BTreeMap::from([(1, 777)]));
    let mut port = CountingPort {
        refuse_open: true,
        ..CountingPort::default()
    };
    let mut console = Console::new(Vec::new(), false);
    let result = scan(&request(1, 10), &mut port, &bus, &mut console);

    assert!(matches!(result, Err(ScanError::PortOpen { .. })));
    assert!(port.bauds.is_empty());
    assert!(port.pings.is_empty());
    assert_eq!(port.closes, 0);
}

#[test]
fn scan_is_repeatable() {
    let bus = Bus(BTreeMap::from([(2, 1), (7, 9)]));
    let mut port = CountingPort::default();
    let (first, _) = run(&request(0, 10), &mut port, &bus);
    let (second, _) = run(&request(0, 10), &mut port, &bus);

    assert_eq!(first, second);
    assert_eq!((port.opens, port.closes), (2, 2));
}

#[test]
fn real_handler_reports_silent_bus() {
    let mut port = CountingPort::default();
    let mut console = Console::new(Vec::new(), false);
    let report = scan(
        &request(1, 2),
        &mut port,
        &PacketHandler::new(ProtocolEnd::Scs),
        &mut console,
    )
    .unwrap();

    assert_eq!(
        report.outcomes(),
        &[
            PingOutcome::CommFailure {
                id: 1,
                reason: "There is no status packet.".to_owned()
            },
            PingOutcome::CommFailure {
                id: 2,
                reason: "There is no status packet.".to_owned()
            },
        ]
    );
    assert_eq!(report.successes().count(), 0);
}

proptest! {
    #[test]
    fn one_outcome_per_id(
        (id_start, id_end) in (0u8..=255).prop_flat_map(|start| (Just(start), start..=255)),
        present in prop::collection::btree_map(any::<u8>(), any::<u16>(), 0..32),
    ) {
        let bus = Bus(present.clone());
        let mut port = CountingPort::default();
        let (report, _) = run(&request(id_start, id_end), &mut port, &bus);

        let ids: Vec<u8> = report.outcomes().iter().map(PingOutcome::id).collect();
        prop_assert_eq!(ids, (id_start..=id_end).collect::<Vec<_>>());
        prop_assert_eq!(report.outcomes().len(), usize::from(id_end - id_start) + 1);
        prop_assert_eq!((port.opens, port.closes), (1, 1));

        let expected: Vec<(u8, u16)> = present
            .range(id_start..=id_end)
            .map(|(&id, &model)| (id, model))
            .collect();
        prop_assert_eq!(report.successes().collect::<Vec<_>>(), expected);
    }
}
