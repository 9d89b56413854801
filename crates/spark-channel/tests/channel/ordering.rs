use std::sync::Arc;

use spark_channel::{
    ChannelEvent, ChannelSide, DefaultChannelConnection, EventChannel, EventStreamHandler,
    HandlerRef,
    test_stubs::{Journal, RecordingHandler},
};

fn recording(name: &str, journal: &Journal) -> HandlerRef {
    Arc::new(RecordingHandler::new(name, journal.clone()))
}

fn subscriber(name: &str, journal: &Journal) -> Arc<DefaultChannelConnection> {
    Arc::new(DefaultChannelConnection::from_handler(recording(name, journal)))
}

/// 事件按安装顺序经过 Handler，最后才到达订阅者。
#[test]
fn handlers_run_in_installation_order_before_fan_out() {
    let channel = EventChannel::synchronous("channel://quotes", "trading", ChannelSide::Collocated);
    let journal = Journal::new();
    channel.add_handler(recording("h1", &journal));
    channel.add_handler(recording("h2", &journal));
    channel.subscribe("sca://c1", subscriber("c1", &journal));
    channel.subscribe("sca://c2", subscriber("c2", &journal));

    channel.publish(ChannelEvent::opaque("tick"), true);

    assert_eq!(journal.names(), vec!["h1", "h2", "c1", "c2"]);
    assert!(journal.entries().iter().all(|(_, end_of_batch)| *end_of_batch));
}

/// 外部生产者挂接到入口后，事件经过完整链路。
#[test]
fn attached_producer_feeds_the_chain() {
    let channel = EventChannel::synchronous("channel://quotes", "trading", ChannelSide::Producer);
    let journal = Journal::new();
    let producer = recording("producer", &journal);
    channel.attach_producer(&producer);
    channel.add_handler(recording("h1", &journal));
    channel.subscribe("sca://c1", subscriber("c1", &journal));

    producer.handle(ChannelEvent::opaque(7_u32), false);

    assert_eq!(
        journal.entries(),
        vec![
            ("producer".to_owned(), false),
            ("h1".to_owned(), false),
            ("c1".to_owned(), false),
        ]
    );
}

/// 无订阅者时事件在扇出阶段被静默丢弃。
#[test]
fn publish_without_subscribers_is_a_no_op() {
    let channel = EventChannel::synchronous("channel://quotes", "trading", ChannelSide::Collocated);
    let journal = Journal::new();
    channel.add_handler(recording("h1", &journal));

    channel.publish(ChannelEvent::opaque(()), true);

    assert_eq!(journal.names(), vec!["h1"]);
    assert_eq!(channel.subscriber_count(), 0);
}
