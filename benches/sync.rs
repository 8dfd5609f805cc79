use core::time::Duration;

use bevy::{platform::time::Instant, prelude::*};
use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use replicon_scene::{
    prelude::*,
    test_scene::{TestPeer, TestSynchronizer},
};

criterion_main!(benches);

criterion_group!(benches, replicate);

const ENTITIES: usize = 1000;

fn replicate(c: &mut Criterion) {
    let mut g = c.benchmark_group("replication");

    for peers_count in [1, 20] {
        g.bench_function(BenchmarkId::new("spawn_send", peers_count), |b| {
            b.iter_custom(|iter| spawn_send(iter, peers_count))
        });
        g.bench_function(BenchmarkId::new("sync_send", peers_count), |b| {
            b.iter_custom(|iter| sync_send(iter, peers_count))
        });
    }

    g.bench_function("spawn_receive", |b| b.iter_custom(spawn_receive));
    g.bench_function("sync_receive", |b| b.iter_custom(sync_receive));
}

fn spawn_send(iter: u64, peers_count: usize) -> Duration {
    let mut elapsed = Duration::ZERO;
    for _ in 0..iter {
        let mut server = TestPeer::server();
        for index in 0..peers_count {
            server.connect(PeerId::new(index as u32 + 2));
        }
        let spawner = add_spawner(&mut server);

        let instant = Instant::now();
        for index in 0..ENTITIES {
            server.spawn(spawner, &format!("Entity{index}"));
        }
        elapsed += instant.elapsed();

        assert_eq!(server.transport.sent().len(), ENTITIES * peers_count);
    }

    elapsed
}

fn spawn_receive(iter: u64) -> Duration {
    let mut elapsed = Duration::ZERO;
    for _ in 0..iter {
        let (mut server, mut client) = create_pair();
        let spawner = add_spawner(&mut server);
        add_spawner(&mut client);
        for index in 0..ENTITIES {
            server.spawn(spawner, &format!("Entity{index}"));
        }

        let instant = Instant::now();
        for result in server.exchange(&mut client) {
            result.unwrap();
        }
        elapsed += instant.elapsed();

        assert_eq!(client.session.registry().len(), ENTITIES);
    }

    elapsed
}

fn sync_send(iter: u64, peers_count: usize) -> Duration {
    let mut server = TestPeer::server();
    for index in 0..peers_count {
        server.connect(PeerId::new(index as u32 + 2));
    }
    let spawner = add_spawner(&mut server);
    let entities = spawn_entities(&mut server, spawner);
    server.transport.take_sent();

    let mut elapsed = Duration::ZERO;
    for tick in 0..iter {
        change_values(&mut server, &entities, tick);

        let instant = Instant::now();
        server.process(Duration::from_millis(tick));
        elapsed += instant.elapsed();

        assert!(!server.transport.take_sent().is_empty());
    }

    elapsed
}

fn sync_receive(iter: u64) -> Duration {
    let (mut server, mut client) = create_pair();
    let spawner = add_spawner(&mut server);
    add_spawner(&mut client);
    let entities = spawn_entities(&mut server, spawner);
    for result in server.exchange(&mut client) {
        result.unwrap();
    }

    let mut elapsed = Duration::ZERO;
    for tick in 0..iter {
        change_values(&mut server, &entities, tick);
        server.process(Duration::from_millis(tick));
        let packets = server.transport.take_sent_to(client.id());

        let instant = Instant::now();
        for packet in packets {
            client
                .with_ctx(|session, ctx| session.receive(ctx, PeerId::SERVER, &packet))
                .unwrap();
        }
        elapsed += instant.elapsed();
    }

    elapsed
}

fn create_pair() -> (TestPeer, TestPeer) {
    let mut server = TestPeer::server();
    let mut client = TestPeer::new(PeerId::new(2));
    server.connect_peer(&mut client);
    (server, client)
}

fn add_spawner(peer: &mut TestPeer) -> Entity {
    let spawner = peer.add_spawner(PeerId::SERVER);
    peer.scene.spawner_mut(spawner).unwrap().scenes[0]
        .synchronizers
        .push(TestSynchronizer::new(PeerId::SERVER).with_sync_property("value"));
    spawner
}

fn spawn_entities(server: &mut TestPeer, spawner: Entity) -> Vec<Entity> {
    let entities: Vec<_> = (0..ENTITIES)
        .map(|index| server.spawn(spawner, &format!("Entity{index}")))
        .collect();
    change_values(server, &entities, 0);
    entities
}

fn change_values(server: &mut TestPeer, entities: &[Entity], tick: u64) {
    for &entity in entities {
        server
            .scene
            .set_property(entity, "value", PropertyValue::Int(tick as i64));
    }
}
