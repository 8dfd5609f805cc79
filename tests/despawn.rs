use replicon_scene::{
    prelude::*,
    spawn::spawn_message::DespawnMessage,
    test_scene::{SceneTemplate, TestPeer, TestSynchronizer},
};
use test_log::test;

#[test]
fn despawn() {
    let mut server = TestPeer::server();
    let mut client = TestPeer::new(PeerId::new(2));
    server.connect_peer(&mut client);

    let server_spawner = server.add_spawner(PeerId::SERVER);
    client.add_spawner(PeerId::SERVER);

    let server_entity = server.spawn(server_spawner, "Player");
    for result in server.exchange(&mut client) {
        result.unwrap();
    }
    let net_id = server.session.tracked(server_entity).unwrap().net_id;
    let client_entity = client.scene.find_path("Player").unwrap();

    server.despawn(server_entity, server_spawner);
    assert!(!server.session.is_spawned(server_entity));
    assert!(server.session.tracked(server_entity).is_none());

    for result in server.exchange(&mut client) {
        result.unwrap();
    }
    assert!(client.scene.find_path("Player").is_none());
    assert!(!client.scene.contains(client_entity));
    assert!(client.session.tracked(client_entity).is_none());
    assert!(
        client
            .session
            .peer(PeerId::SERVER)
            .unwrap()
            .received_entity(net_id)
            .is_none()
    );
}

#[test]
fn despawn_with_synchronizers() {
    let mut server = TestPeer::server();
    let mut client = TestPeer::new(PeerId::new(2));
    server.connect_peer(&mut client);

    let server_spawner = server.add_spawner(PeerId::SERVER);
    let client_spawner = client.add_spawner(PeerId::SERVER);
    for (peer, spawner) in [(&mut server, server_spawner), (&mut client, client_spawner)] {
        peer.scene.spawner_mut(spawner).unwrap().scenes[0] = SceneTemplate {
            synchronizers: vec![TestSynchronizer::new(PeerId::SERVER)],
            properties: Vec::new(),
        };
    }

    let server_entity = server.spawn(server_spawner, "Player");
    for result in server.exchange(&mut client) {
        result.unwrap();
    }
    let client_entity = client.scene.find_path("Player").unwrap();
    let client_sync = client.session.tracked(client_entity).unwrap().synchronizers[0];
    let sync_id = NetId::new(2);
    assert_eq!(
        client
            .session
            .peer(PeerId::SERVER)
            .unwrap()
            .received_synchronizer(sync_id),
        Some(client_sync)
    );

    server.despawn(server_entity, server_spawner);
    for result in server.exchange(&mut client) {
        result.unwrap();
    }

    assert!(!client.session.is_replicating(client_sync));
    assert!(
        client
            .session
            .peer(PeerId::SERVER)
            .unwrap()
            .received_synchronizer(sync_id)
            .is_none(),
        "sync components should be forgotten with their entity"
    );
}

#[test]
fn despawn_ignores_current_visibility() {
    let mut server = TestPeer::server();
    let first_peer = PeerId::new(2);
    let second_peer = PeerId::new(3);
    server.connect(first_peer);
    server.connect(second_peer);

    let spawner = server.add_spawner(PeerId::SERVER);
    server.scene.spawner_mut(spawner).unwrap().scenes[0]
        .synchronizers
        .push(TestSynchronizer::new(PeerId::SERVER));
    let entity = server.spawn(spawner, "Player");
    let sync = server.session.tracked(entity).unwrap().synchronizers[0];
    server.transport.take_sent();

    // Hide without notifying the session.
    server
        .scene
        .synchronizer_component_mut(sync)
        .unwrap()
        .visibility = PeerVisibility::new(VisibilityPolicy::Whitelist);

    let net_id = server.session.tracked(entity).unwrap().net_id;
    server.despawn(entity, spawner);

    let sent = server.transport.take_sent();
    assert_eq!(sent.len(), 2, "every peer that knows the entity should be notified");
    for ((peer, channel, packet), expected_peer) in sent.iter().zip([first_peer, second_peer]) {
        assert_eq!(*peer, expected_peer);
        assert_eq!(*channel, Channel::Ordered);
        assert_eq!(DespawnMessage::read(packet).unwrap().net_id, net_id);
    }
}

#[test]
fn despawn_only_spawned() {
    let mut server = TestPeer::server();
    let visible_peer = PeerId::new(2);
    let hidden_peer = PeerId::new(3);
    server.connect(visible_peer);
    server.connect(hidden_peer);

    let spawner = server.add_spawner(PeerId::SERVER);
    let mut visibility = PeerVisibility::new(VisibilityPolicy::Whitelist);
    visibility.set_visibility(visible_peer, true);
    server.scene.spawner_mut(spawner).unwrap().scenes[0]
        .synchronizers
        .push(TestSynchronizer::new(PeerId::SERVER).with_visibility(visibility));

    let entity = server.spawn(spawner, "Player");
    let sent = server.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, visible_peer);

    server.despawn(entity, spawner);
    let sent = server.transport.take_sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, visible_peer);
}

#[test]
fn unknown_remote_entity() {
    let mut client = TestPeer::new(PeerId::new(2));
    client.connect(PeerId::SERVER);
    client.add_spawner(PeerId::SERVER);

    let mut packet = Vec::new();
    DespawnMessage {
        net_id: NetId::new(5),
    }
    .write(&mut packet);

    let error = client
        .with_ctx(|session, ctx| session.receive(ctx, PeerId::SERVER, &packet))
        .unwrap_err();
    assert!(matches!(
        error,
        ReplicationError::UnknownRemoteEntity { net_id, .. } if net_id == NetId::new(5)
    ));
    assert_eq!(error.kind(), ErrorKind::ProtocolViolation);
}

#[test]
fn despawn_from_other_peer() {
    let mut server = TestPeer::server();
    let mut client = TestPeer::new(PeerId::new(2));
    let other_peer = PeerId::new(3);
    server.connect_peer(&mut client);
    client.connect(other_peer);

    let server_spawner = server.add_spawner(PeerId::SERVER);
    client.add_spawner(PeerId::SERVER);

    let server_entity = server.spawn(server_spawner, "Player");
    for result in server.exchange(&mut client) {
        result.unwrap();
    }
    let net_id = server.session.tracked(server_entity).unwrap().net_id;

    let mut packet = Vec::new();
    DespawnMessage { net_id }.write(&mut packet);
    let error = client
        .with_ctx(|session, ctx| session.receive(ctx, other_peer, &packet))
        .unwrap_err();
    assert!(
        matches!(error, ReplicationError::UnknownRemoteEntity { .. }),
        "IDs should be scoped to the peer that spawned the entity"
    );
    assert!(client.scene.find_path("Player").is_some());
}
