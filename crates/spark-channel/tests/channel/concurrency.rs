//! 变更与分发并发进行时的不变量。
//!
//! - **Why**：订阅集合与 Handler 链都采用“互斥写、快照读”，分发线程不得观察到半更新状态；
//! - **How**：多个线程同时发布、订阅/退订与增删 Handler，结束后校验计数；
//! - **What**：稳定订阅者恰好收到每条事件一次，链路与订阅计数回到初始状态。

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use spark_channel::{
    ChannelEvent, ChannelSide, ConsumerHandler, DefaultChannelConnection, EventChannel,
    FanOutHandler, HandlerRef, PassThroughHandler,
};

const EVENTS: usize = 2_000;
const CHURN: usize = 500;

fn counting_subscriber(counter: &Arc<AtomicUsize>) -> Arc<DefaultChannelConnection> {
    let counter = Arc::clone(counter);
    Arc::new(DefaultChannelConnection::from_handler(Arc::new(
        ConsumerHandler::new(move |_, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        }),
    )))
}

#[test]
fn subscription_churn_never_disturbs_stable_subscriber() {
    let channel = EventChannel::synchronous("channel://quotes", "trading", ChannelSide::Collocated);
    let stable = Arc::new(AtomicUsize::new(0));
    let transient = Arc::new(AtomicUsize::new(0));
    channel.subscribe("sca://stable", counting_subscriber(&stable));

    thread::scope(|scope| {
        scope.spawn(|| {
            for seq in 0..EVENTS {
                channel.publish(ChannelEvent::opaque(seq), seq + 1 == EVENTS);
            }
        });
        for worker in 0..2 {
            let channel = &channel;
            let transient = &transient;
            scope.spawn(move || {
                let id = format!("sca://transient-{worker}");
                for _ in 0..CHURN {
                    channel.subscribe(&id, counting_subscriber(transient));
                    channel.subscribe(&id, counting_subscriber(transient));
                    assert!(channel.unsubscribe(&id).is_some());
                    assert_eq!(channel.fan_out().registry().count(&id), 1, "计数未归零时连接保留");
                    assert!(channel.unsubscribe(&id).is_some());
                    assert!(channel.unsubscribe(&id).is_none(), "已移除的连接不可再次退订");
                }
            });
        }
    });

    assert_eq!(stable.load(Ordering::SeqCst), EVENTS);
    assert_eq!(channel.subscriber_count(), 1);
}

#[test]
fn chain_mutation_during_dispatch_keeps_fan_out_reachable() {
    let channel = EventChannel::synchronous("channel://orders", "trading", ChannelSide::Collocated);
    let delivered = Arc::new(AtomicUsize::new(0));
    channel.subscribe("sca://sink", counting_subscriber(&delivered));

    thread::scope(|scope| {
        scope.spawn(|| {
            for seq in 0..EVENTS {
                channel.publish(ChannelEvent::opaque(seq), false);
            }
        });
        scope.spawn(|| {
            for _ in 0..CHURN {
                let first: HandlerRef = Arc::new(PassThroughHandler::new());
                let second: HandlerRef = Arc::new(PassThroughHandler::new());
                channel.add_handler(Arc::clone(&first));
                channel.add_handler(Arc::clone(&second));
                assert!(channel.remove_handler(&first));
                assert!(channel.remove_handler(&second));
            }
        });
    });

    assert_eq!(delivered.load(Ordering::SeqCst), EVENTS);
    assert_eq!(channel.handler_count(), 0);
    assert_eq!(channel.chain().epoch(), (CHURN * 4) as u64);
}
