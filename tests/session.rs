use std::collections::VecDeque;
use std::io;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

use parking_lot::Mutex;

use ofp_agent::flow::{FlowEntry, FlowTable};
use ofp_agent::ofp_header::OFP_HEADER_LEN;
use ofp_agent::ofp_transport::Transport;
use ofp_agent::openflow0x04::{self, Capabilities, MsgCode, FEATURES_REPLY_LEN, OFP_VERSION};
use ofp_agent::resolve::{InterfaceResolver, NetInterface, StaticResolver};
use ofp_agent::trace::TraceSink;
use ofp_agent::{AgentConfig, Dispatch, EventSource, Events, OfpError, PathBridge, QueueEntry,
                Session, SessionState};

const CONTROLLER: Ipv4Addr = Ipv4Addr::new(10, 0, 0, 1);
const MAC: [u8; 6] = [0x02, 0xaa, 0xbb, 0xcc, 0xdd, 0xee];

/// Both ends of an in-memory controller connection.
#[derive(Clone, Default)]
struct Wire {
    inbound: Arc<Mutex<VecDeque<Vec<u8>>>>,
    sent: Arc<Mutex<Vec<Vec<u8>>>>,
    fail_send: Arc<AtomicBool>,
    overstate_len: Arc<AtomicBool>,
}

impl Wire {
    fn deliver(&self, bytes: Vec<u8>, events: &EventSource) {
        self.inbound.lock().push_back(bytes);
        events.send(Events::CONTROLLER_READABLE);
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().clone()
    }
}

struct MockTransport {
    wire: Wire,
}

impl Transport for MockTransport {
    fn send(&mut self, buf: &[u8]) -> io::Result<()> {
        if self.wire.fail_send.load(Ordering::SeqCst) {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        self.wire.sent.lock().push(buf.to_vec());
        Ok(())
    }

    fn receive(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.wire.inbound.lock().pop_front() {
            Some(frame) => {
                let n = frame.len().min(buf.len());
                buf[..n].copy_from_slice(&frame[..n]);
                if self.wire.overstate_len.load(Ordering::SeqCst) {
                    return Ok(buf.len() + 1);
                }
                Ok(n)
            }
            None => Err(io::ErrorKind::WouldBlock.into()),
        }
    }
}

#[derive(Default)]
struct Recorder(Mutex<Vec<Vec<u8>>>);

impl TraceSink for Recorder {
    fn record(&self, bytes: &[u8]) {
        self.0.lock().push(bytes.to_vec());
    }
}

type TestSession<R> = Session<MockTransport, R, Arc<Recorder>>;

struct Harness<R> {
    session: TestSession<R>,
    wire: Wire,
    bridge: Arc<PathBridge>,
    trace: Arc<Recorder>,
}

fn config() -> AgentConfig {
    AgentConfig {
        controller_ip: CONTROLLER,
        initial_xid: 0x55,
        ..AgentConfig::default()
    }
}

fn start_with<R: InterfaceResolver>(config: AgentConfig, resolver: R) -> Harness<R> {
    let wire = Wire::default();
    let bridge = Arc::new(PathBridge::new(config.queue_capacity));
    let trace = Arc::new(Recorder::default());
    let transport_wire = wire.clone();
    let session = Session::setup(config,
                                 bridge.clone(),
                                 move |_, _| Ok(MockTransport { wire: transport_wire }),
                                 resolver,
                                 trace.clone())
        .unwrap();
    Harness {
        session: session,
        wire: wire,
        bridge: bridge,
        trace: trace,
    }
}

fn start() -> Harness<StaticResolver> {
    start_with(config(), StaticResolver::new().with(CONTROLLER, "eth0", MAC))
}

fn header(typ: u8, length: u16, xid: u32, version: u8) -> Vec<u8> {
    let mut bytes = vec![version, typ];
    bytes.extend_from_slice(&length.to_be_bytes());
    bytes.extend_from_slice(&xid.to_be_bytes());
    bytes
}

fn hello(xid: u32, version: u8) -> Vec<u8> {
    header(MsgCode::Hello.code(), 8, xid, version)
}

fn features_request(xid: u32) -> Vec<u8> {
    header(MsgCode::FeaturesReq.code(), 8, xid, OFP_VERSION)
}

#[test]
fn setup_sends_hello_and_awaits_controller() {
    let h = start();
    assert_eq!(h.session.state(), SessionState::AwaitingHello);
    let sent = h.wire.sent();
    assert_eq!(sent.len(), 1);
    let hdr = openflow0x04::decode_header(&sent[0]).unwrap();
    assert_eq!(hdr.type_code(), MsgCode::Hello);
    assert_eq!(hdr.xid(), 0x55);
    assert_eq!(hdr.version(), OFP_VERSION);
    assert_eq!(sent[0].len(), OFP_HEADER_LEN);
    assert_eq!(h.session.config().initial_xid, 0x55);
    assert_eq!(h.session.transport().wire.sent(), sent);
}

#[test]
fn bind_failure_is_setup_failure() {
    let bridge = Arc::new(PathBridge::new(None));
    let result: ofp_agent::Result<TestSession<StaticResolver>> =
        Session::setup(config(),
                       bridge,
                       |_, _| Err(io::Error::new(io::ErrorKind::AddrNotAvailable, "bind")),
                       StaticResolver::new(),
                       Arc::new(Recorder::default()));
    match result {
        Err(OfpError::SetupFailure(cause)) => {
            assert!(matches!(*cause, OfpError::Transport(_)));
        }
        Err(e) => panic!("unexpected error {}", e),
        Ok(_) => panic!("setup should fail"),
    }
}

#[test]
fn hello_send_failure_is_setup_failure() {
    let wire = Wire::default();
    wire.fail_send.store(true, Ordering::SeqCst);
    let transport_wire = wire.clone();
    let result = Session::setup(config(),
                                Arc::new(PathBridge::new(None)),
                                move |_, _| Ok(MockTransport { wire: transport_wire }),
                                StaticResolver::new(),
                                Arc::new(Recorder::default()));
    assert!(matches!(result, Err(OfpError::SetupFailure(_))));
    assert!(wire.sent().is_empty());
}

#[test]
fn hello_reply_keeps_xid_and_uses_own_version() {
    for &version in [0x01u8, 0x04, 0x05, 0xfe].iter() {
        let mut h = start();
        let outcome = h.session.dispatch(&hello(0xabcd, version)).unwrap();
        assert_eq!(outcome, Dispatch::HelloReplied);
        assert_eq!(h.session.state(), SessionState::Established);

        let sent = h.wire.sent();
        assert_eq!(sent.len(), 2);
        let reply = openflow0x04::decode_header(&sent[1]).unwrap();
        assert_eq!(reply.xid(), 0xabcd);
        assert_eq!(reply.version(), OFP_VERSION);
        assert_eq!(reply.type_code(), MsgCode::Hello);
    }
}

#[test]
fn features_reply_carries_interface_address() {
    let mut h = start();
    h.session.dispatch(&hello(1, OFP_VERSION)).unwrap();
    let outcome = h.session.dispatch(&features_request(0x0102_0304)).unwrap();
    assert_eq!(outcome, Dispatch::FeaturesReplied);

    let sent = h.wire.sent();
    let reply = sent.last().unwrap();
    assert_eq!(reply.len(), FEATURES_REPLY_LEN);
    let hdr = openflow0x04::decode_header(reply).unwrap();
    assert_eq!(hdr.type_code(), MsgCode::FeaturesResp);
    assert_eq!(hdr.xid(), 0x0102_0304);
    assert_eq!(hdr.length(), FEATURES_REPLY_LEN);

    let dpid = u64::from_be_bytes([reply[8], reply[9], reply[10], reply[11], reply[12],
                                   reply[13], reply[14], reply[15]]);
    assert_eq!(openflow0x04::mac_of_datapath_id(dpid), MAC);
    assert_eq!(h.session.datapath_id(), Some(dpid));

    let caps = u32::from_be_bytes([reply[28], reply[29], reply[30], reply[31]]);
    assert_eq!(Capabilities::from_bits_truncate(caps),
               Capabilities::FLOW_STATS | Capabilities::TABLE_STATS);
}

#[test]
fn resolution_failure_skips_features_reply() {
    let mut h = start_with(config(), StaticResolver::new());
    h.session.dispatch(&hello(1, OFP_VERSION)).unwrap();
    match h.session.dispatch(&features_request(9)) {
        Err(OfpError::ResolutionFailure(ip)) => assert_eq!(ip, CONTROLLER),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(h.wire.sent().len(), 2);
    assert_eq!(h.session.datapath_id(), None);
}

#[test]
fn short_buffer_is_malformed_and_unanswered() {
    let mut h = start();
    match h.session.dispatch(&[OFP_VERSION, 0, 0]) {
        Err(OfpError::MalformedMessage { len, .. }) => assert_eq!(len, 3),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(h.wire.sent().len(), 1);
    assert_eq!(h.session.state(), SessionState::AwaitingHello);
    assert_eq!(h.trace.0.lock().last().unwrap(), &vec![OFP_VERSION, 0, 0]);
}

#[test]
fn overstated_receive_length_is_malformed() {
    let mut h = start();
    let mtu = h.session.config().mtu;
    h.wire.overstate_len.store(true, Ordering::SeqCst);
    h.wire.deliver(hello(4, OFP_VERSION), h.bridge.control_events());
    match h.session.receive_one() {
        Err(OfpError::MalformedMessage { len, .. }) => assert_eq!(len, mtu + 1),
        other => panic!("unexpected {:?}", other),
    }
    assert_eq!(h.session.state(), SessionState::AwaitingHello);
    assert_eq!(h.wire.sent().len(), 1);

    h.wire.overstate_len.store(false, Ordering::SeqCst);
    h.wire.deliver(hello(5, OFP_VERSION), h.bridge.control_events());
    assert_eq!(h.session.receive_one().unwrap(), Some(Dispatch::HelloReplied));
}

#[test]
fn length_mismatch_is_malformed() {
    let mut h = start();
    let mut bytes = header(MsgCode::Hello.code(), 16, 3, OFP_VERSION);
    bytes.extend_from_slice(&[0; 4]);
    assert!(matches!(h.session.dispatch(&bytes), Err(OfpError::MalformedMessage { .. })));
    assert_eq!(h.wire.sent().len(), 1);
}

#[test]
fn unsupported_type_is_acknowledged_without_reply() {
    let mut h = start();
    h.session.dispatch(&hello(1, OFP_VERSION)).unwrap();
    let echo = header(MsgCode::EchoReq.code(), 8, 4, OFP_VERSION);
    assert_eq!(h.session.dispatch(&echo).unwrap(),
               Dispatch::Unsupported(MsgCode::EchoReq));
    let unknown = header(0xee, 8, 5, OFP_VERSION);
    assert_eq!(h.session.dispatch(&unknown).unwrap(),
               Dispatch::Unsupported(MsgCode::Unknown(0xee)));
    assert_eq!(h.wire.sent().len(), 2);
    assert_eq!(h.trace.0.lock().len(), 3);
}

#[test]
fn any_first_message_establishes_by_default() {
    let mut h = start();
    assert_eq!(h.session.dispatch(&features_request(2)).unwrap(),
               Dispatch::FeaturesReplied);
    assert_eq!(h.session.state(), SessionState::Established);
}

#[test]
fn strict_handshake_waits_for_hello() {
    let strict = AgentConfig { strict_handshake: true, ..config() };
    let mut h = start_with(strict, StaticResolver::new().with(CONTROLLER, "eth0", MAC));
    assert_eq!(h.session.dispatch(&features_request(2)).unwrap(),
               Dispatch::Ignored(MsgCode::FeaturesReq));
    assert_eq!(h.session.state(), SessionState::AwaitingHello);
    assert_eq!(h.wire.sent().len(), 1);

    h.session.dispatch(&hello(3, OFP_VERSION)).unwrap();
    assert_eq!(h.session.state(), SessionState::Established);
}

#[test]
fn send_failure_is_contained_to_one_message() {
    let mut h = start();
    h.wire.fail_send.store(true, Ordering::SeqCst);
    assert!(matches!(h.session.dispatch(&hello(1, OFP_VERSION)), Err(OfpError::Transport(_))));
    assert_eq!(h.session.state(), SessionState::Established);

    h.wire.fail_send.store(false, Ordering::SeqCst);
    assert_eq!(h.session.dispatch(&features_request(2)).unwrap(),
               Dispatch::FeaturesReplied);
}

struct ShiftingResolver {
    calls: AtomicUsize,
}

impl InterfaceResolver for ShiftingResolver {
    fn resolve_interface_by_ip(&self, _: Ipv4Addr) -> Option<NetInterface> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) as u8;
        Some(NetInterface {
            name: "eth0".to_owned(),
            hw_addr: [0x02, 0, 0, 0, 0, n],
        })
    }
}

#[test]
fn datapath_id_is_stable_across_replies() {
    let mut h = start_with(config(), ShiftingResolver { calls: AtomicUsize::new(1) });
    h.session.dispatch(&features_request(1)).unwrap();
    h.session.dispatch(&features_request(2)).unwrap();
    let sent = h.wire.sent();
    assert_eq!(&sent[1][8..16], &sent[2][8..16]);
    assert_eq!(h.session.datapath_id(),
               Some(openflow0x04::datapath_id_of_mac([0x02, 0, 0, 0, 0, 1])));
}

#[test]
fn readable_wake_drains_every_pending_message() {
    let mut h = start();
    let events = h.bridge.control_events().clone();
    h.wire.deliver(hello(1, OFP_VERSION), &events);
    h.wire.deliver(vec![1, 2, 3], &events);
    h.wire.deliver(features_request(2), &events);

    let raised = events.wait(Events::all());
    assert_eq!(raised, Events::CONTROLLER_READABLE);
    h.session.service(raised);

    let sent = h.wire.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(openflow0x04::decode_header(&sent[2]).unwrap().xid(), 2);
    assert!(h.wire.inbound.lock().is_empty());
}

#[test]
fn datapath_entries_are_traced_in_order() {
    let mut h = start();
    let mut table = FlowTable::new(0, "main", 8);
    let flow = table.add_entry(FlowEntry { priority: 10, ..FlowEntry::default() }).unwrap();
    h.bridge.send_to_control(QueueEntry::new(vec![1])).unwrap();
    h.bridge.send_to_control(QueueEntry::for_flow(flow, vec![2, 2])).unwrap();
    h.bridge.send_to_control(QueueEntry::new(vec![3, 3, 3])).unwrap();

    let raised = h.bridge.control_events().wait(Events::all());
    assert_eq!(raised, Events::DATAPATH_PENDING);
    h.session.service(raised);

    assert_eq!(*h.trace.0.lock(), vec![vec![1], vec![2, 2], vec![3, 3, 3]]);
    assert_eq!(h.wire.sent().len(), 1);
    assert!(h.bridge.recv_from_datapath().is_empty());
}

#[test]
fn control_to_datapath_queue_wakes_datapath() {
    let h = start();
    h.session.send_to_datapath(QueueEntry::new(vec![7, 7])).unwrap();
    let raised = h.bridge.datapath_events().wait(Events::CONTROL_PENDING);
    assert_eq!(raised, Events::CONTROL_PENDING);
    let entries = h.bridge.recv_from_control();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].payload, vec![7, 7]);
}

#[test]
fn loop_services_both_sources_until_shutdown() {
    let Harness { mut session, wire, bridge, trace } = start();
    let events = bridge.control_events().clone();
    let control = thread::spawn(move || {
        session.run();
        session
    });

    const PRODUCERS: usize = 4;
    const PER_PRODUCER: usize = 50;
    let producers: Vec<_> = (0..PRODUCERS)
        .map(|p| {
            let bridge = bridge.clone();
            thread::spawn(move || for i in 0..PER_PRODUCER {
                bridge.send_to_control(QueueEntry::new(vec![p as u8, i as u8])).unwrap();
            })
        })
        .collect();

    wire.deliver(hello(10, 0x01), &events);
    wire.deliver(features_request(11), &events);
    for p in producers {
        p.join().unwrap();
    }

    // the producers are done, so one more wake covers whatever is still queued
    events.send(Events::DATAPATH_PENDING | Events::SHUTDOWN);
    let session = control.join().unwrap();

    assert_eq!(session.state(), SessionState::Established);
    let sent = wire.sent();
    assert_eq!(sent.len(), 3);
    assert_eq!(openflow0x04::decode_header(&sent[1]).unwrap().xid(), 10);
    assert_eq!(openflow0x04::decode_header(&sent[2]).unwrap().type_code(),
               MsgCode::FeaturesResp);

    let traced = trace.0.lock();
    let from_datapath = traced.iter().filter(|t| t.len() == 2).count();
    assert_eq!(from_datapath, PRODUCERS * PER_PRODUCER);
}
