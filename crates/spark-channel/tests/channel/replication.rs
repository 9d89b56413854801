use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use spark_channel::{
    ChannelBuilder, ChannelConfig, ChannelEvent, ChannelManager, ChannelServices, ChannelSide,
    DefaultChannelConnection, EventChannel, EventOrigin, InMemoryZone, InlineWorkerPool,
    PortableEvent, ReplicationMonitor, TopologyError,
    test_stubs::{Journal, RecordingHandler, RecordingTopology},
};

#[derive(Debug, serde::Serialize, serde::Deserialize, PartialEq)]
struct Quote {
    symbol: String,
    price: u32,
}

fn node(zone: &Arc<InMemoryZone>, runtime: &str) -> ChannelManager {
    let member = Arc::new(zone.join(runtime));
    let services = ChannelServices::new(Arc::new(InlineWorkerPool)).with_topology(member);
    ChannelManager::new(ChannelBuilder::new(services))
}

fn deploy_with_subscriber(manager: &ChannelManager, journal: &Journal) -> Arc<EventChannel> {
    let channel = manager
        .deploy(&ChannelConfig::new("channel://quotes", "trading").replicated(None))
        .expect("部署复制通道");
    channel.subscribe(
        "sca://local",
        Arc::new(DefaultChannelConnection::from_handler(Arc::new(
            RecordingHandler::new("local", journal.clone()),
        ))),
    );
    channel
}

/// 本地事件复制到对等节点，对等节点投递时不再回传。
#[test]
fn portable_event_reaches_peer_exactly_once() {
    let zone = InMemoryZone::new(Arc::new(InlineWorkerPool));
    let node_a = node(&zone, "node-a");
    let node_b = node(&zone, "node-b");
    let journal_a = Journal::new();
    let journal_b = Journal::new();
    let channel_a = deploy_with_subscriber(&node_a, &journal_a);
    deploy_with_subscriber(&node_b, &journal_b);

    let quote = Quote {
        symbol: "ACME".into(),
        price: 42,
    };
    let event = ChannelEvent::encode(&quote).expect("可序列化");
    channel_a.publish(event, false);

    assert_eq!(journal_a.entries(), vec![("local".to_owned(), false)]);
    assert_eq!(journal_b.entries(), vec![("local".to_owned(), true)]);
    let received = &journal_b.events()[0];
    assert_eq!(
        received.origin(),
        &EventOrigin::Replicated {
            source: "node-a".into()
        }
    );
    assert_eq!(received.decode::<Quote>().expect("可反序列化"), quote);
}

/// 不可移植的事件只在本地投递。
#[test]
fn opaque_event_stays_local() {
    let zone = InMemoryZone::new(Arc::new(InlineWorkerPool));
    let node_a = node(&zone, "node-a");
    let node_b = node(&zone, "node-b");
    let journal_a = Journal::new();
    let journal_b = Journal::new();
    let channel_a = deploy_with_subscriber(&node_a, &journal_a);
    deploy_with_subscriber(&node_b, &journal_b);

    channel_a.publish(ChannelEvent::opaque(Arc::new(5_u8)), true);

    assert_eq!(journal_a.len(), 1);
    assert!(journal_b.is_empty());
}

/// 卸载后对等节点不再收到复制事件。
#[test]
fn undeployed_peer_stops_receiving() {
    let zone = InMemoryZone::new(Arc::new(InlineWorkerPool));
    let node_a = node(&zone, "node-a");
    let node_b = node(&zone, "node-b");
    let journal_b = Journal::new();
    let channel_a = deploy_with_subscriber(&node_a, &Journal::new());
    deploy_with_subscriber(&node_b, &journal_b);

    assert_eq!(node_b.undeploy("trading").len(), 1);
    channel_a.publish(
        ChannelEvent::portable(PortableEvent::new("tick", serde_json::json!(1))),
        true,
    );

    assert!(journal_b.is_empty());
}

#[derive(Default)]
struct CountingMonitor(AtomicUsize);

impl ReplicationMonitor for CountingMonitor {
    fn send_failed(&self, _channel: &str, _error: &TopologyError) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// 复制失败交给监视器，本地投递不受影响。
#[test]
fn send_failures_reach_monitor_and_local_delivery_continues() {
    let topology = Arc::new(RecordingTopology::new("node-a"));
    topology.fail_sends(true);
    let monitor = Arc::new(CountingMonitor::default());
    let services = ChannelServices::new(Arc::new(InlineWorkerPool))
        .with_topology(topology)
        .with_monitor(monitor.clone());
    let manager = ChannelManager::new(ChannelBuilder::new(services));
    let journal = Journal::new();
    let channel = deploy_with_subscriber(&manager, &journal);

    channel.publish(
        ChannelEvent::portable(PortableEvent::new("tick", serde_json::json!(2))),
        true,
    );

    assert_eq!(monitor.0.load(Ordering::SeqCst), 1);
    assert_eq!(journal.len(), 1);
    assert_eq!(
        manager.get("channel://quotes", ChannelSide::Collocated).map(|c| c.handler_count()),
        Some(1)
    );
}
