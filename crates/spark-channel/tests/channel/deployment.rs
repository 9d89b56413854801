use std::sync::Arc;

use spark_channel::{
    ChannelBuilder, ChannelError, ChannelEvent, ChannelManager, ChannelServices, ChannelSetConfig,
    ChannelSide, ConfigError, DefaultChannelConnection,
    test_stubs::{DeferredWorkerPool, Journal, RecordingHandler},
};

const COMPOSITE: &str = r#"
[telemetry]
filter = "spark_channel=debug"

[[channel]]
uri = "channel://quotes"
deployable = "trading"
delivery = "async"

[[channel]]
uri = "channel://quotes"
deployable = "trading"
side = "producer"

[[channel]]
uri = "channel://audit"
deployable = "compliance"
"#;

fn manager(pool: Arc<DeferredWorkerPool>) -> ChannelManager {
    ChannelManager::new(ChannelBuilder::new(ChannelServices::new(pool)))
}

/// 配置中的投递方式决定扇出变体。
#[test]
fn deployed_channels_follow_configured_delivery() {
    let pool = Arc::new(DeferredWorkerPool::new());
    let manager = manager(pool.clone());
    let config = ChannelSetConfig::from_toml_str(COMPOSITE).expect("配置合法");
    let deployed = manager.deploy_all(&config).expect("部署成功");
    assert_eq!(deployed.len(), 3);

    let journal = Journal::new();
    let collocated = manager
        .get_and_increment("channel://quotes", ChannelSide::Collocated)
        .expect("同节点通道存在");
    collocated.subscribe(
        "sca://async-consumer",
        Arc::new(DefaultChannelConnection::from_handler(Arc::new(
            RecordingHandler::new("async", journal.clone()),
        ))),
    );
    let producer = manager
        .get("channel://quotes", ChannelSide::Producer)
        .expect("生产侧通道存在");
    producer.subscribe(
        "sca://sync-consumer",
        Arc::new(DefaultChannelConnection::from_handler(Arc::new(
            RecordingHandler::new("sync", journal.clone()),
        ))),
    );

    collocated.publish(ChannelEvent::opaque(1_u8), false);
    producer.publish(ChannelEvent::opaque(2_u8), false);
    assert_eq!(journal.entries(), vec![("sync".to_owned(), false)]);

    assert_eq!(pool.run_pending(), 1);
    assert_eq!(
        journal.entries(),
        vec![("sync".to_owned(), false), ("async".to_owned(), true)]
    );
    assert_eq!(
        manager.use_count("channel://quotes", ChannelSide::Collocated),
        Some(1)
    );
}

/// 卸载部署单元只移除其拥有的通道。
#[test]
fn undeploy_is_scoped_to_deployable() {
    let manager = manager(Arc::new(DeferredWorkerPool::new()));
    let config = ChannelSetConfig::from_toml_str(COMPOSITE).expect("配置合法");
    manager.deploy_all(&config).expect("部署成功");

    assert_eq!(manager.undeploy("trading").len(), 2);
    assert!(manager.get("channel://audit", ChannelSide::Collocated).is_some());
    assert!(manager.get("channel://quotes", ChannelSide::Producer).is_none());
    assert!(manager.undeploy("trading").is_empty());
}

/// 重复部署同一配置被拒绝，已部署通道保持不变。
#[test]
fn redeploying_same_configuration_fails() {
    let manager = manager(Arc::new(DeferredWorkerPool::new()));
    let config = ChannelSetConfig::from_toml_str(COMPOSITE).expect("配置合法");
    manager.deploy_all(&config).expect("首次部署成功");

    assert!(matches!(
        manager.deploy_all(&config),
        Err(ChannelError::DuplicateChannel { .. })
    ));
    assert_eq!(manager.len(), 3);
}

/// 配置错误在解析阶段暴露。
#[test]
fn malformed_configuration_is_reported() {
    assert!(matches!(
        ChannelSetConfig::from_toml_str("[[channel]]\nuri = \"channel://x\""),
        Err(ConfigError::Parse { .. })
    ));
}
