/*!
Per-peer spawn, despawn and state synchronization for a networked scene graph.

The crate doesn't own the scene or the network. It decides, for every connected peer,
which entities should exist there, what state they carry and when updates are sent,
and translates these decisions into compact binary packets.

# Quick start

All replication state lives in [`ReplicationSession`](session::ReplicationSession).
It can be stored as a [`Resource`](bevy::prelude::Resource) or owned directly.

The session talks to its surroundings through a few traits:

- [`SceneTree`](shared::scene::SceneTree) owns entities, spawners and sync components.
  Entities are referred to by [`Entity`](bevy::prelude::Entity) handles.
- [`Transport`](shared::backend::transport::Transport) delivers packets.
- [`PathCache`](shared::backend::path_cache::PathCache) gives remotely addressable
  objects short IDs that peers confirm before they are used.
- [`StateCodec`](shared::state_codec::StateCodec) encodes property values.
  [`PostcardCodec`](shared::state_codec::PostcardCodec) is provided.

They are passed to every session operation with [`ReplicationCtx`](shared::ctx::ReplicationCtx):

```
use core::time::Duration;

use replicon_scene::{prelude::*, test_scene::TestPeer};

let mut server = TestPeer::server();
let mut client = TestPeer::new(PeerId::new(2));
server.connect_peer(&mut client);

let spawner = server.add_spawner(PeerId::SERVER);
client.add_spawner(PeerId::SERVER);

server.spawn(spawner, "Player");
server.with_ctx(|session, ctx| session.process(ctx, Duration::ZERO));

for result in server.exchange(&mut client) {
    result.unwrap();
}
assert!(client.scene.find_path("Player").is_some());
```

[`TestPeer`](test_scene::TestPeer) wires in-memory collaborators together, see
[`test_scene`] for how they can be implemented.

# Spawning

Spawners are components that create entities which should exist on other peers.
The peer that owns the spawner is the spawn authority.

After a spawner created an entity, call [`ReplicationSession::on_spawn`](session::ReplicationSession::on_spawn).
On the spawn authority this assigns the entity a [`NetId`](shared::net_id::NetId) and announces
it to every peer that can see it. When the entity is removed from the spawner, call
[`ReplicationSession::on_despawn`](session::ReplicationSession::on_despawn). Peers that were
told about the entity receive a despawn even if they can no longer see it.

The receiving side instantiates the entity with its own spawner, resolved with the path
cache, and attaches it under the spawner's spawn parent. Received names are validated
with [`is_valid_name`](shared::scene::is_valid_name), so a peer can't place entities outside
the spawn parent.

# Synchronization

Sync components replicate properties of their root entity. Multiple sync components can
share a root, each with its own [`ReplicationConfig`](shared::replication_config::ReplicationConfig).
Properties flagged with [`PropertyFlags::SPAWN`](shared::replication_config::PropertyFlags::SPAWN)
are sent inside the spawn packet, properties flagged with
[`PropertyFlags::SYNC`](shared::replication_config::PropertyFlags::SYNC) are sent by
[`ReplicationSession::process`](session::ReplicationSession::process), which should be called
once per network tick.

Call [`ReplicationSession::on_replication_start`](session::ReplicationSession::on_replication_start)
and [`ReplicationSession::on_replication_stop`](session::ReplicationSession::on_replication_stop)
when a sync component is attached or detached. When attaching a remotely spawned entity,
[`SceneTree::add_child`](shared::scene::SceneTree::add_child) returns the sync components
that started replication, so the session can apply their spawn state right away.

Sync packets are sent unreliably. Each carries a per-peer [`SyncTick`](shared::sync_tick::SyncTick)
and outdated states are discarded by the receiving sync component. A sync component
can rate-limit its own updates with [`SyncTimer`](shared::sync_tick::SyncTimer).

Sync components of entities that weren't spawned by a spawner are addressed with
path-based IDs. They are sent only after the peer confirmed the path.

# Visibility

Each sync component decides which peers can see it, for example with
[`PeerVisibility`](shared::visibility::PeerVisibility). An entity is visible to a peer
if any of its locally authoritative sync components is visible to it. Entities without
such components are visible to everyone.

After changing visibility, call
[`ReplicationSession::on_visibility_changed`](session::ReplicationSession::on_visibility_changed).

# Errors

Fallible operations return [`ReplicationError`](shared::error::ReplicationError).
See [`ErrorKind`](shared::error::ErrorKind) for how errors are classified. Errors caused
by a received packet affect only this packet, the connection is never torn down.
*/
extern crate alloc;

pub mod peer_state;
pub mod registry;
pub mod session;
pub mod shared;
pub mod spawn;
pub mod sync;
pub mod test_scene;

pub mod prelude {
    pub use super::{
        peer_state::PeerState,
        registry::{EntityRegistry, TrackedEntity},
        session::{ReplicationSession, SessionConfig},
        shared::{
            backend::{
                path_cache::{PathCache, PathConfirm},
                transport::{Channel, ReplicationChannel, Transport},
            },
            command::NetworkCommand,
            ctx::ReplicationCtx,
            error::{ErrorKind, ReplicationError},
            net_id::NetId,
            peer_id::PeerId,
            replication_config::{PropertyFlags, PropertyPath, PropertyValue, ReplicationConfig},
            scene::{SceneTree, SpawnRequest, Spawner, StateError, Synchronizer},
            state_codec::{CodecError, PostcardCodec, StateCodec},
            sync_tick::{SyncTick, SyncTimer},
            visibility::{PeerVisibility, VisibilityPolicy},
        },
    };
}
