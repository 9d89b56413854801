use std::sync::Arc;

use spark_channel::{
    ChannelEvent, ChannelSide, DefaultChannelConnection, EventChannel, EventStreamHandler,
    HandlerRef,
    handler::same_handler,
    test_stubs::{Journal, RecordingHandler},
};

fn recording(name: &str, journal: &Journal) -> HandlerRef {
    Arc::new(RecordingHandler::new(name, journal.clone()))
}

fn channel_with_subscriber(journal: &Journal) -> EventChannel {
    let channel = EventChannel::synchronous("channel://orders", "trading", ChannelSide::Collocated);
    channel.subscribe(
        "sca://sink",
        Arc::new(DefaultChannelConnection::from_handler(recording("sink", journal))),
    );
    channel
}

/// 摘除中间 Handler 后，前驱直接链接到其后继。
#[test]
fn removing_middle_handler_splices_neighbours() {
    let journal = Journal::new();
    let channel = channel_with_subscriber(&journal);
    let h1 = recording("h1", &journal);
    let h2 = recording("h2", &journal);
    let h3 = recording("h3", &journal);
    for handler in [&h1, &h2, &h3] {
        assert!(channel.add_handler(Arc::clone(handler)));
    }
    channel.publish(ChannelEvent::opaque(0_u8), true);
    assert_eq!(journal.names(), vec!["h1", "h2", "h3", "sink"]);
    journal.clear();

    assert!(channel.remove_handler(&h2));
    let successor = h1.next().expect("h1 仍有后继");
    assert!(same_handler(&successor, &h3));

    channel.publish(ChannelEvent::opaque(1_u8), true);
    assert_eq!(journal.names(), vec!["h1", "h3", "sink"]);
}

/// 摘除首个与末尾 Handler 时分别更新入口与扇出前驱。
#[test]
fn removing_edges_keeps_entry_and_fan_out_reachable() {
    let journal = Journal::new();
    let channel = channel_with_subscriber(&journal);
    let h1 = recording("h1", &journal);
    let h2 = recording("h2", &journal);
    channel.add_handler(Arc::clone(&h1));
    channel.add_handler(Arc::clone(&h2));

    assert!(channel.remove_handler(&h1));
    assert!(same_handler(&channel.direct_connection(), &h2));
    assert!(channel.remove_handler(&h2));

    let fan_out: HandlerRef = channel.fan_out().clone();
    assert!(same_handler(&channel.direct_connection(), &fan_out));
    let entry_next = channel.entry().next().expect("入口总有后继");
    assert!(same_handler(&entry_next, &fan_out));

    channel.publish(ChannelEvent::opaque(2_u8), false);
    assert_eq!(journal.entries(), vec![("sink".to_owned(), false)]);
}

/// 移除未安装的 Handler 返回 `false`，链路与 epoch 不变。
#[test]
fn removing_unknown_handler_is_rejected() {
    let journal = Journal::new();
    let channel = channel_with_subscriber(&journal);
    channel.add_handler(recording("h1", &journal));
    let epoch = channel.chain().epoch();

    assert!(!channel.remove_handler(&recording("stranger", &journal)));
    assert_eq!(channel.chain().epoch(), epoch);
    assert_eq!(channel.handler_count(), 1);
}

/// 被摘除的 Handler 仍保留原后继，正在其内部执行的事件可继续前进。
#[test]
fn removed_handler_keeps_its_successor() {
    let journal = Journal::new();
    let channel = channel_with_subscriber(&journal);
    let h1 = recording("h1", &journal);
    channel.add_handler(Arc::clone(&h1));

    assert!(channel.remove_handler(&h1));
    h1.handle(ChannelEvent::opaque(3_u8), true);

    assert_eq!(journal.names(), vec!["h1", "sink"]);
}

/// 重复安装同一 Handler 被拒绝，事件只经过它一次。
#[test]
fn adding_installed_handler_again_is_rejected() {
    let journal = Journal::new();
    let channel = channel_with_subscriber(&journal);
    let h1 = recording("h1", &journal);
    assert!(channel.add_handler(Arc::clone(&h1)));
    let epoch = channel.chain().epoch();

    assert!(!channel.add_handler(Arc::clone(&h1)));
    assert_eq!(channel.chain().epoch(), epoch);
    assert_eq!(channel.handler_count(), 1);

    channel.publish(ChannelEvent::opaque(4_u8), true);
    assert_eq!(journal.names(), vec!["h1", "sink"]);
}
