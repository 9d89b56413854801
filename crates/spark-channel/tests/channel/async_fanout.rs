use std::{
    sync::{Arc, Mutex, mpsc as std_mpsc},
    time::Duration,
};

use spark_channel::{
    ChannelEvent, ChannelSide, ConsumerHandler, DefaultChannelConnection, EventChannel,
    TokioWorkerPool,
};
use tokio::{sync::mpsc, time::timeout};

const WAIT: Duration = Duration::from_secs(5);

fn forwarding_subscriber(
    name: &'static str,
    sink: mpsc::UnboundedSender<(&'static str, bool)>,
) -> Arc<DefaultChannelConnection> {
    Arc::new(DefaultChannelConnection::from_handler(Arc::new(
        ConsumerHandler::new(move |_, end_of_batch| {
            let _ = sink.send((name, end_of_batch));
        }),
    )))
}

fn tokio_channel() -> EventChannel {
    let pool = TokioWorkerPool::current().expect("测试运行在 Tokio 运行时中");
    EventChannel::asynchronous(
        "channel://quotes",
        "trading",
        ChannelSide::Collocated,
        Arc::new(pool),
    )
}

/// 异步扇出在工作池上投递给全部订阅者，且批次结束标志恒为 `true`。
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn delivers_to_every_subscriber_with_end_of_batch() {
    let channel = tokio_channel();
    let (tx, mut rx) = mpsc::unbounded_channel();
    channel.subscribe("sca://c1", forwarding_subscriber("c1", tx.clone()));
    channel.subscribe("sca://c2", forwarding_subscriber("c2", tx));

    channel.publish(ChannelEvent::opaque(1_u64), false);

    let mut received = Vec::new();
    for _ in 0..2 {
        let delivery = timeout(WAIT, rx.recv())
            .await
            .expect("投递应在超时前完成")
            .expect("发送端仍存活");
        received.push(delivery);
    }
    assert_eq!(received, vec![("c1", true), ("c2", true)]);
}

/// 发布线程不等待订阅者完成处理。
#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn publish_returns_before_slow_subscriber_finishes() {
    let channel = tokio_channel();
    let (gate_tx, gate_rx) = std_mpsc::channel::<()>();
    let gate = Mutex::new(gate_rx);
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();
    channel.subscribe(
        "sca://slow",
        Arc::new(DefaultChannelConnection::from_handler(Arc::new(
            ConsumerHandler::new(move |_, _| {
                let _ = gate.lock().expect("gate lock").recv_timeout(WAIT);
                let _ = done_tx.send(());
            }),
        ))),
    );

    channel.publish(ChannelEvent::opaque("slow"), true);
    assert!(done_rx.try_recv().is_err(), "订阅者尚未放行，不应已完成");

    gate_tx.send(()).expect("订阅者仍在等待");
    timeout(WAIT, done_rx.recv())
        .await
        .expect("放行后应完成")
        .expect("发送端仍存活");
}
