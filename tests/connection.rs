use replicon_scene::{
    prelude::*,
    spawn::spawn_message::SpawnMessage,
    test_scene::{TestPeer, TestSynchronizer},
};
use test_log::test;

#[test]
fn disconnect_frees_received() {
    let mut server = TestPeer::server();
    let mut client = TestPeer::new(PeerId::new(2));
    server.connect_peer(&mut client);

    let server_spawner = server.add_spawner(PeerId::SERVER);
    client.add_spawner(PeerId::SERVER);

    server.spawn(server_spawner, "Player");
    for result in server.exchange(&mut client) {
        result.unwrap();
    }
    let client_entity = client.scene.find_path("Player").unwrap();

    client.disconnect(PeerId::SERVER).unwrap();
    assert!(client.session.peer(PeerId::SERVER).is_none());
    assert!(!client.scene.contains(client_entity));
    assert!(client.session.tracked(client_entity).is_none());
}

#[test]
fn disconnect_unknown() {
    let mut server = TestPeer::server();
    let error = server.disconnect(PeerId::new(2)).unwrap_err();
    assert!(matches!(error, ReplicationError::UnknownPeer(_)));
    assert_eq!(error.kind(), ErrorKind::Misuse);
}

#[test]
fn reconnect() {
    let mut server = TestPeer::server();
    let client = PeerId::new(2);
    server.connect(client);

    let spawner = server.add_spawner(PeerId::SERVER);
    let entity = server.spawn(spawner, "Player");
    assert_eq!(server.transport.take_sent().len(), 1);

    server.disconnect(client).unwrap();
    assert!(
        server.scene.contains(entity),
        "local entities shouldn't be affected by disconnects"
    );
    assert!(server.session.is_spawned(entity));

    server.connect(client);
    assert!(server.session.peer(client).unwrap().is_spawned(entity));
    let sent = server.transport.take_sent();
    assert_eq!(sent.len(), 1);
    let message = SpawnMessage::read(&sent[0].2).unwrap();
    assert_eq!(
        message.net_id,
        server.session.tracked(entity).unwrap().net_id
    );
}

#[test]
fn reset() {
    let mut server = TestPeer::server();
    let client = PeerId::new(2);
    server.connect(client);

    let spawner = server.add_spawner(PeerId::SERVER);
    server.scene.spawner_mut(spawner).unwrap().scenes[0]
        .synchronizers
        .push(TestSynchronizer::new(PeerId::SERVER));
    let entity = server.spawn(spawner, "Player");
    let sync = server.session.tracked(entity).unwrap().synchronizers[0];
    assert_eq!(server.session.tracked(entity).unwrap().net_id, NetId::new(1));
    assert_eq!(server.scene.synchronizer(sync).unwrap().net_id(), NetId::new(2));
    server.transport.take_sent();

    server.reset();
    assert_eq!(server.session.peers().count(), 0);
    let tracked = server.session.tracked(entity).unwrap();
    assert!(tracked.net_id.is_none());
    assert_eq!(tracked.spawner, Some(spawner), "registrations should survive");
    assert!(server.scene.synchronizer(sync).unwrap().net_id().is_none());

    server.connect(client);
    assert!(
        server.transport.take_sent().is_empty(),
        "entities without IDs shouldn't be announced"
    );

    server.register_spawn(entity, spawner);
    assert_eq!(
        server.session.tracked(entity).unwrap().net_id,
        NetId::new(1),
        "IDs should be allocated from the start"
    );
    assert_eq!(server.scene.synchronizer(sync).unwrap().net_id(), NetId::new(2));
    let sent = server.transport.take_sent();
    assert_eq!(sent.len(), 1);
    let message = SpawnMessage::read(&sent[0].2).unwrap();
    assert_eq!(message.sync_ids, [NetId::new(2)]);
}

#[test]
fn reset_frees_received() {
    let mut server = TestPeer::server();
    let mut client = TestPeer::new(PeerId::new(2));
    server.connect_peer(&mut client);

    let server_spawner = server.add_spawner(PeerId::SERVER);
    client.add_spawner(PeerId::SERVER);
    let local_entity = client.scene.create_node("Local");

    server.spawn(server_spawner, "Player");
    for result in server.exchange(&mut client) {
        result.unwrap();
    }
    let client_entity = client.scene.find_path("Player").unwrap();

    client.reset();
    assert!(!client.scene.contains(client_entity));
    assert!(client.scene.contains(local_entity));
    assert!(client.session.registry().is_empty());
}
