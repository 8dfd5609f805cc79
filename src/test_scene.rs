/*!
In-memory collaborators for testing replication without a real scene or network.

# Example

```
use core::time::Duration;

use replicon_scene::{prelude::*, test_scene::{TestPeer, TestSynchronizer}};

let mut server = TestPeer::server();
let mut client = TestPeer::new(PeerId::new(2));
server.connect_peer(&mut client);

// Both peers should have the same spawner at the same path.
let server_spawner = server.add_spawner(PeerId::SERVER);
let client_spawner = client.add_spawner(PeerId::SERVER);
for (peer, spawner) in [(&mut server, server_spawner), (&mut client, client_spawner)] {
    peer.scene.spawner_mut(spawner).unwrap().scenes[0]
        .synchronizers
        .push(TestSynchronizer::new(PeerId::SERVER).with_sync_property("health"));
}

let entity = server.spawn(server_spawner, "Player");
server.scene.set_property(entity, "health", PropertyValue::Int(100));

// Deliver the spawn.
server.exchange(&mut client);
let client_entity = client.scene.find_path("Player").unwrap();

// Sync state.
server.process(Duration::ZERO);
server.exchange(&mut client);
assert_eq!(
    client.scene.property(client_entity, "health"),
    Some(&PropertyValue::Int(100))
);
```
*/

use alloc::{format, string::String, vec::Vec};
use core::time::Duration;

use bevy::{
    ecs::entity::hash_map::EntityHashMap,
    platform::collections::{HashMap, HashSet},
    prelude::*,
};
use log::debug;

use crate::{
    session::{ReplicationSession, SessionConfig},
    shared::{
        backend::{
            path_cache::{PathCache, PathConfirm},
            transport::{Channel, Transport},
        },
        ctx::ReplicationCtx,
        error::ReplicationError,
        net_id::NetId,
        peer_id::PeerId,
        replication_config::{PropertyFlags, PropertyPath, PropertyValue, ReplicationConfig},
        scene::{SceneTree, SpawnRequest, Spawner, StateError, Synchronizer},
        state_codec::PostcardCodec,
        sync_tick::{SyncTick, SyncTimer},
        visibility::PeerVisibility,
    },
};

/// A peer with all collaborators required by [`ReplicationSession`].
pub struct TestPeer {
    pub scene: TestScene,
    pub transport: TestTransport,
    pub path_cache: TestPathCache,
    pub codec: PostcardCodec,
    pub session: ReplicationSession,
}

impl TestPeer {
    pub fn new(id: PeerId) -> Self {
        Self::with_config(id, Default::default())
    }

    /// Creates a peer with [`PeerId::SERVER`].
    pub fn server() -> Self {
        Self::new(PeerId::SERVER)
    }

    pub fn with_config(id: PeerId, config: SessionConfig) -> Self {
        Self {
            scene: Default::default(),
            transport: TestTransport::new(id),
            path_cache: Default::default(),
            codec: PostcardCodec,
            session: ReplicationSession::new(config),
        }
    }

    pub fn id(&self) -> PeerId {
        self.transport.id
    }

    /// Calls `f` with the session and a context that borrows all collaborators.
    pub fn with_ctx<R>(
        &mut self,
        f: impl FnOnce(&mut ReplicationSession, &mut ReplicationCtx<'_>) -> R,
    ) -> R {
        let mut ctx = ReplicationCtx {
            scene: &mut self.scene,
            transport: &mut self.transport,
            path_cache: &mut self.path_cache,
            codec: &self.codec,
        };
        f(&mut self.session, &mut ctx)
    }

    /// Notifies the session about a connected peer.
    pub fn connect(&mut self, peer: PeerId) {
        self.with_ctx(|session, ctx| session.on_peer_connected(ctx, peer));
    }

    /// Connects two peers with each other.
    pub fn connect_peer(&mut self, other: &mut TestPeer) {
        self.connect(other.id());
        other.connect(self.id());
    }

    /// Notifies the session about a disconnected peer and destroys freed entities.
    pub fn disconnect(&mut self, peer: PeerId) -> Result<(), ReplicationError> {
        let result = self.with_ctx(|session, ctx| session.on_peer_disconnected(ctx, peer));
        self.flush_destroyed();
        result
    }

    /// Resets the session and destroys freed entities.
    pub fn reset(&mut self) {
        self.with_ctx(|session, ctx| session.reset(ctx));
        self.flush_destroyed();
    }

    /// Adds a spawner with a single empty scene that spawns under the scene root.
    pub fn add_spawner(&mut self, authority: PeerId) -> Entity {
        let spawner = TestSpawner::new(authority, self.scene.root());
        self.scene.add_spawner(spawner)
    }

    /// Instantiates the first scene of the spawner and registers it.
    ///
    /// # Panics
    ///
    /// Panics if the spawner can't instantiate the scene.
    pub fn spawn(&mut self, spawner: Entity, name: &str) -> Entity {
        self.spawn_with(spawner, SpawnRequest::Scene(0), name)
    }

    /// Instantiates an entity like a local spawner would do and registers it.
    ///
    /// Replication of sync components in the scene is started before the spawn is registered.
    ///
    /// # Panics
    ///
    /// Panics if the spawner refuses the request or the session returns an error.
    pub fn spawn_with(&mut self, spawner: Entity, request: SpawnRequest, name: &str) -> Entity {
        let entity = self
            .scene
            .instantiate(spawner, request)
            .expect("spawner should accept the request");
        self.scene.set_name(entity, name);

        let parent = self
            .scene
            .spawner(spawner)
            .and_then(|spawner| spawner.spawn_parent())
            .expect("spawner should have a spawn parent");
        for sync in self.scene.add_child(parent, entity) {
            self.with_ctx(|session, ctx| session.on_replication_start(ctx, entity, sync))
                .expect("replication should start");
        }
        self.register_spawn(entity, spawner);

        entity
    }

    /// Registers an existing entity with a spawner.
    ///
    /// # Panics
    ///
    /// Panics if the session returns an error.
    pub fn register_spawn(&mut self, entity: Entity, spawner: Entity) {
        self.with_ctx(|session, ctx| session.on_spawn(ctx, entity, spawner))
            .expect("entity should be registered");
    }

    /// Unregisters an entity from its spawner and destroys it.
    ///
    /// # Panics
    ///
    /// Panics if the session returns an error.
    pub fn despawn(&mut self, entity: Entity, spawner: Entity) {
        self.with_ctx(|session, ctx| session.on_despawn(ctx, entity, spawner))
            .expect("entity should be unregistered");
        self.scene.queue_free(entity);
        self.flush_destroyed();
    }

    /// Starts replication of a sync component added with [`TestScene::add_synchronizer`].
    ///
    /// # Panics
    ///
    /// Panics if the session returns an error.
    pub fn start_replication(&mut self, entity: Entity, sync: Entity) {
        self.scene.mark_replicating(sync);
        self.with_ctx(|session, ctx| session.on_replication_start(ctx, entity, sync))
            .expect("replication should start");
    }

    /// Changes visibility of a sync component and notifies the session.
    ///
    /// # Panics
    ///
    /// Panics if the sync component doesn't exist or the session returns an error.
    pub fn set_visibility(&mut self, sync: Entity, peer: PeerId, visible: bool) {
        self.scene
            .synchronizer_component_mut(sync)
            .expect("sync component should exist")
            .visibility
            .set_visibility(peer, visible);
        self.with_ctx(|session, ctx| session.on_visibility_changed(ctx, sync, Some(peer)))
            .expect("visibility should be updated");
    }

    /// Runs a sync pass.
    pub fn process(&mut self, now: Duration) {
        self.with_ctx(|session, ctx| session.process(ctx, now));
    }

    /// Delivers path announcements and packets sent to `other`.
    ///
    /// Announcements are delivered first and confirmed immediately, since the real
    /// handshake happens on a reliable channel before any packet that uses it.
    ///
    /// Returns results of all received packets in order.
    pub fn exchange(&mut self, other: &mut TestPeer) -> Vec<Result<(), ReplicationError>> {
        let other_id = other.id();
        for announcement in self.path_cache.take_announcements(other_id) {
            let path = self.scene.path(announcement.target);
            match other.scene.find_path(&path) {
                Some(entity) => {
                    other
                        .path_cache
                        .insert_remote(self.id(), announcement.id, entity);
                    self.path_cache.confirm(announcement.target, other_id);
                }
                None => debug!("`{path}` doesn't exist on {other_id}"),
            }
        }

        let from = self.id();
        let results = self
            .transport
            .take_sent_to(other_id)
            .into_iter()
            .map(|packet| other.with_ctx(|session, ctx| session.receive(ctx, from, &packet)))
            .collect();
        other.flush_destroyed();

        results
    }

    /// Destroys entities queued for destruction and notifies the session.
    pub fn flush_destroyed(&mut self) {
        for destroyed in self.scene.flush().into_iter().rev() {
            if self.session.is_replicating(destroyed.entity) {
                if let Some(root) = destroyed.sync_root {
                    if let Err(e) = self.session.on_replication_stop(root, destroyed.entity) {
                        debug!("unable to stop replication of {}: {e}", destroyed.entity);
                    }
                }
            }
            self.session.notify_destroyed(destroyed.entity);
        }
    }
}

/// Scene graph backed by a [`World`].
///
/// Each node has a [`Name`] and [`Properties`], the hierarchy is stored with [`ChildOf`].
/// Spawners and sync components are nodes with [`TestSpawner`] and [`TestSynchronizer`].
pub struct TestScene {
    world: World,
    root: Entity,
    queued: Vec<Entity>,
}

impl Default for TestScene {
    fn default() -> Self {
        let mut world = World::new();
        let root = world
            .spawn((Name::new("root"), Properties::default()))
            .id();

        Self {
            world,
            root,
            queued: Default::default(),
        }
    }
}

impl TestScene {
    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }

    pub fn root(&self) -> Entity {
        self.root
    }

    /// Creates a node under the scene root.
    pub fn create_node(&mut self, name: &str) -> Entity {
        self.world
            .spawn((
                Name::new(String::from(name)),
                Properties::default(),
                ChildOf(self.root),
            ))
            .id()
    }

    /// Adds a spawner node under the scene root.
    ///
    /// Spawners are named by their creation order, so peers that create spawners
    /// in the same order get the same paths.
    pub fn add_spawner(&mut self, spawner: TestSpawner) -> Entity {
        let index = self.world.query::<&TestSpawner>().iter(&self.world).count();
        let entity = self.create_node(&format!("Spawner{index}"));
        self.world.entity_mut(entity).insert(spawner);
        entity
    }

    /// Adds a sync component node as a child of `entity` without starting its replication.
    pub fn add_synchronizer(&mut self, entity: Entity, mut sync: TestSynchronizer) -> Entity {
        sync.root = entity;
        let index = self.children(entity).len();
        self.world
            .spawn((
                Name::new(format!("Synchronizer{index}")),
                Properties::default(),
                sync,
                ChildOf(entity),
            ))
            .id()
    }

    pub fn spawner_mut(&mut self, spawner: Entity) -> Option<Mut<'_, TestSpawner>> {
        self.world.get_mut::<TestSpawner>(spawner)
    }

    pub fn synchronizer_component_mut(&mut self, sync: Entity) -> Option<Mut<'_, TestSynchronizer>> {
        self.world.get_mut::<TestSynchronizer>(sync)
    }

    pub fn property(&self, entity: Entity, path: &str) -> Option<&PropertyValue> {
        self.world
            .get::<Properties>(entity)
            .and_then(|properties| properties.get(path))
    }

    pub fn set_property(&mut self, entity: Entity, path: &'static str, value: PropertyValue) {
        if let Some(mut properties) = self.world.get_mut::<Properties>(entity) {
            properties.insert(path.into(), value);
        }
    }

    pub fn children(&self, entity: Entity) -> Vec<Entity> {
        self.world
            .get::<Children>(entity)
            .map(|children| children.to_vec())
            .unwrap_or_default()
    }

    pub fn parent(&self, entity: Entity) -> Option<Entity> {
        self.world.get::<ChildOf>(entity).map(|child_of| child_of.0)
    }

    /// Returns names from the scene root to the entity separated by `/`.
    ///
    /// The root itself is not included.
    pub fn path(&self, entity: Entity) -> String {
        let mut names = Vec::new();
        let mut current = Some(entity);
        while let Some(entity) = current {
            if entity == self.root {
                break;
            }
            names.push(self.name(entity).unwrap_or_default());
            current = self.parent(entity);
        }
        names.reverse();
        names.join("/")
    }

    /// Resolves a path returned by [`Self::path`].
    pub fn find_path(&self, path: &str) -> Option<Entity> {
        path.split('/')
            .try_fold(self.root, |parent, name| self.find_child(parent, name))
    }

    /// Marks a sync component as replicating, so attaching doesn't report it again.
    pub(crate) fn mark_replicating(&mut self, sync: Entity) {
        if let Some(mut sync) = self.world.get_mut::<TestSynchronizer>(sync) {
            sync.replicating = true;
        }
    }

    /// Destroys all entities passed to [`SceneTree::queue_free`] with their descendants.
    pub fn flush(&mut self) -> Vec<DestroyedEntity> {
        let mut destroyed = Vec::new();
        for entity in core::mem::take(&mut self.queued) {
            if self.world.get_entity(entity).is_err() {
                continue;
            }

            let mut stack = vec![entity];
            while let Some(entity) = stack.pop() {
                stack.extend(self.children(entity));
                let sync_root = self
                    .world
                    .get::<TestSynchronizer>(entity)
                    .map(|sync| sync.root);
                destroyed.push(DestroyedEntity { entity, sync_root });
            }
            self.world.despawn(entity);
        }

        destroyed
    }

    fn spawn_template(&mut self, template: &SceneTemplate) -> Entity {
        let properties = Properties(template.properties.iter().cloned().collect());
        let entity = self.world.spawn((Name::new(""), properties)).id();
        for sync in &template.synchronizers {
            self.add_synchronizer(entity, sync.clone());
        }
        entity
    }

    /// Returns all sync components in the subtree that haven't started replication yet.
    fn start_subtree(&mut self, entity: Entity) -> Vec<Entity> {
        let mut started = Vec::new();
        let mut stack = vec![entity];
        while let Some(entity) = stack.pop() {
            let mut children = self.children(entity);
            children.reverse();
            stack.extend(children);
            if let Some(mut sync) = self.world.get_mut::<TestSynchronizer>(entity) {
                if !sync.replicating {
                    sync.replicating = true;
                    started.push(entity);
                }
            }
        }
        started
    }
}

impl SceneTree for TestScene {
    fn contains(&self, entity: Entity) -> bool {
        self.world.get_entity(entity).is_ok()
    }

    fn name(&self, entity: Entity) -> Option<&str> {
        self.world.get::<Name>(entity).map(|name| name.as_str())
    }

    fn set_name(&mut self, entity: Entity, name: &str) {
        if let Ok(mut entity) = self.world.get_entity_mut(entity) {
            entity.insert(Name::new(String::from(name)));
        }
    }

    fn find_child(&self, parent: Entity, name: &str) -> Option<Entity> {
        self.children(parent)
            .into_iter()
            .find(|&child| self.name(child) == Some(name))
    }

    fn add_child(&mut self, parent: Entity, child: Entity) -> Vec<Entity> {
        let Ok(mut entity) = self.world.get_entity_mut(child) else {
            return Vec::new();
        };
        entity.insert(ChildOf(parent));
        self.start_subtree(child)
    }

    fn detach(&mut self, entity: Entity) {
        if let Ok(mut entity) = self.world.get_entity_mut(entity) {
            entity.remove::<ChildOf>();
        }
    }

    fn queue_free(&mut self, entity: Entity) -> bool {
        if !self.contains(entity) {
            return false;
        }
        if !self.queued.contains(&entity) {
            self.queued.push(entity);
        }
        true
    }

    fn get_state(
        &self,
        entity: Entity,
        properties: &[PropertyPath],
    ) -> Result<Vec<PropertyValue>, StateError> {
        let values = self
            .world
            .get::<Properties>(entity)
            .ok_or(StateError::MissingEntity(entity))?;

        properties
            .iter()
            .map(|path| {
                values
                    .get(path.as_str())
                    .cloned()
                    .ok_or_else(|| StateError::UnknownProperty {
                        entity,
                        path: path.clone(),
                    })
            })
            .collect()
    }

    fn set_state(
        &mut self,
        entity: Entity,
        properties: &[PropertyPath],
        values: Vec<PropertyValue>,
    ) -> Result<(), StateError> {
        if properties.len() != values.len() {
            return Err(StateError::CountMismatch {
                expected: properties.len(),
                actual: values.len(),
            });
        }

        let mut entity_properties = self
            .world
            .get_mut::<Properties>(entity)
            .ok_or(StateError::MissingEntity(entity))?;
        for (path, value) in properties.iter().zip(values) {
            entity_properties.insert(path.clone(), value);
        }

        Ok(())
    }

    fn spawner(&self, spawner: Entity) -> Option<&dyn Spawner> {
        self.world
            .get::<TestSpawner>(spawner)
            .map(|spawner| spawner as &dyn Spawner)
    }

    fn instantiate(&mut self, spawner: Entity, request: SpawnRequest) -> Option<Entity> {
        let spawner_component = self.world.get::<TestSpawner>(spawner)?;
        let template = match &request {
            SpawnRequest::Scene(id) => spawner_component.scenes.get(*id as usize)?,
            SpawnRequest::Custom(_) => spawner_component.custom_scene.as_ref()?,
        }
        .clone();

        let entity = self.spawn_template(&template);
        self.world
            .get_mut::<TestSpawner>(spawner)?
            .spawned
            .insert(entity, request);

        Some(entity)
    }

    fn synchronizer(&self, sync: Entity) -> Option<&dyn Synchronizer> {
        self.world
            .get::<TestSynchronizer>(sync)
            .map(|sync| sync as &dyn Synchronizer)
    }

    fn synchronizer_mut(&mut self, sync: Entity) -> Option<&mut dyn Synchronizer> {
        self.world
            .get_mut::<TestSynchronizer>(sync)
            .map(|sync| sync.into_inner() as &mut dyn Synchronizer)
    }
}

/// Entity removed by [`TestScene::flush`].
#[derive(Clone, Copy, Debug)]
pub struct DestroyedEntity {
    pub entity: Entity,
    /// Root of the sync component if the entity was one.
    pub sync_root: Option<Entity>,
}

/// Property values of a node.
#[derive(Component, Default, Deref, DerefMut)]
pub struct Properties(HashMap<PropertyPath, PropertyValue>);

/// Sync component that stores its settings inline.
#[derive(Component, Clone, Debug)]
pub struct TestSynchronizer {
    pub authority: PeerId,
    pub config: ReplicationConfig,
    pub visibility: PeerVisibility,
    pub timer: SyncTimer,
    root: Entity,
    net_id: NetId,
    replicating: bool,
}

impl TestSynchronizer {
    pub fn new(authority: PeerId) -> Self {
        Self {
            authority,
            config: Default::default(),
            visibility: Default::default(),
            timer: Default::default(),
            root: Entity::PLACEHOLDER,
            net_id: NetId::NONE,
            replicating: false,
        }
    }

    #[must_use]
    pub fn with_property(mut self, path: &'static str, flags: PropertyFlags) -> Self {
        self.config.add_property(path, flags);
        self
    }

    #[must_use]
    pub fn with_spawn_property(self, path: &'static str) -> Self {
        self.with_property(path, PropertyFlags::SPAWN)
    }

    #[must_use]
    pub fn with_sync_property(self, path: &'static str) -> Self {
        self.with_property(path, PropertyFlags::SYNC)
    }

    #[must_use]
    pub fn with_visibility(mut self, visibility: PeerVisibility) -> Self {
        self.visibility = visibility;
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.timer = SyncTimer::new(interval);
        self
    }
}

impl Synchronizer for TestSynchronizer {
    fn authority(&self) -> PeerId {
        self.authority
    }

    fn root(&self) -> Entity {
        self.root
    }

    fn is_visible_to(&self, peer: Option<PeerId>) -> bool {
        self.visibility.is_visible_to(peer)
    }

    fn net_id(&self) -> NetId {
        self.net_id
    }

    fn set_net_id(&mut self, net_id: NetId) {
        self.net_id = net_id;
    }

    fn replication_config(&self) -> Option<&ReplicationConfig> {
        Some(&self.config)
    }

    fn update_outbound_sync_time(&mut self, now: Duration) -> bool {
        self.timer.update_outbound(now)
    }

    fn update_inbound_sync_time(&mut self, tick: SyncTick) -> bool {
        self.timer.update_inbound(tick)
    }

    fn reset(&mut self) {
        self.timer.reset();
        self.net_id = NetId::NONE;
    }
}

/// Spawner that instantiates [`SceneTemplate`]s.
#[derive(Component)]
pub struct TestSpawner {
    pub authority: PeerId,
    /// Templates for [`SpawnRequest::Scene`] by index.
    pub scenes: Vec<SceneTemplate>,
    /// Template for [`SpawnRequest::Custom`], custom spawns are refused if [`None`].
    pub custom_scene: Option<SceneTemplate>,
    pub spawn_parent: Option<Entity>,
    spawned: EntityHashMap<SpawnRequest>,
}

impl TestSpawner {
    /// Creates a spawner with a single empty scene that also accepts custom spawns.
    pub fn new(authority: PeerId, spawn_parent: Entity) -> Self {
        Self {
            authority,
            scenes: vec![Default::default()],
            custom_scene: Some(Default::default()),
            spawn_parent: Some(spawn_parent),
            spawned: Default::default(),
        }
    }
}

impl Spawner for TestSpawner {
    fn authority(&self) -> PeerId {
        self.authority
    }

    fn find_spawnable_scene(&self, entity: Entity) -> Option<u8> {
        match self.spawned.get(&entity) {
            Some(SpawnRequest::Scene(id)) => Some(*id),
            _ => None,
        }
    }

    fn spawn_argument(&self, entity: Entity) -> PropertyValue {
        match self.spawned.get(&entity) {
            Some(SpawnRequest::Custom(value)) => value.clone(),
            _ => PropertyValue::Nil,
        }
    }

    fn spawn_parent(&self) -> Option<Entity> {
        self.spawn_parent
    }
}

/// Content of an instantiated entity.
#[derive(Clone, Debug, Default)]
pub struct SceneTemplate {
    /// Sync components attached as children in order.
    pub synchronizers: Vec<TestSynchronizer>,
    /// Initial property values.
    pub properties: Vec<(PropertyPath, PropertyValue)>,
}

/// Transport that records sent packets.
pub struct TestTransport {
    pub id: PeerId,
    pub active: bool,
    sent: Vec<(PeerId, Channel, Vec<u8>)>,
}

impl TestTransport {
    pub fn new(id: PeerId) -> Self {
        Self {
            id,
            active: true,
            sent: Default::default(),
        }
    }

    /// Drains all sent packets.
    pub fn take_sent(&mut self) -> Vec<(PeerId, Channel, Vec<u8>)> {
        core::mem::take(&mut self.sent)
    }

    /// Drains packets sent to `peer`, keeping packets for other peers.
    pub fn take_sent_to(&mut self, peer: PeerId) -> Vec<Vec<u8>> {
        let mut packets = Vec::new();
        self.sent.retain(|(receiver, _, packet)| {
            if *receiver == peer {
                packets.push(packet.clone());
                false
            } else {
                true
            }
        });
        packets
    }

    pub fn sent(&self) -> &[(PeerId, Channel, Vec<u8>)] {
        &self.sent
    }
}

impl Transport for TestTransport {
    fn unique_id(&self) -> PeerId {
        self.id
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn send(&mut self, peer: PeerId, channel: Channel, packet: &[u8]) {
        self.sent.push((peer, channel, packet.to_vec()));
    }
}

/// Path cache that requires an explicit confirmation for each announcement.
///
/// [`TestPeer::exchange`] delivers and confirms announcements automatically.
#[derive(Default)]
pub struct TestPathCache {
    local_ids: EntityHashMap<u32>,
    last_id: u32,
    announced: HashSet<(Entity, PeerId)>,
    confirmed: HashSet<(Entity, PeerId)>,
    announcements: Vec<PathAnnouncement>,
    remote: HashMap<(PeerId, u32), Entity>,
}

impl TestPathCache {
    /// Marks the ID of `target` as confirmed by `peer`.
    pub fn confirm(&mut self, target: Entity, peer: PeerId) {
        self.announced.insert((target, peer));
        self.confirmed.insert((target, peer));
    }

    /// Registers an ID announced by `peer`.
    pub fn insert_remote(&mut self, peer: PeerId, id: u32, target: Entity) {
        self.remote.insert((peer, id), target);
    }

    /// Drains announcements for `peer` that weren't delivered yet.
    pub fn take_announcements(&mut self, peer: PeerId) -> Vec<PathAnnouncement> {
        let mut taken = Vec::new();
        self.announcements.retain(|announcement| {
            if announcement.peer == peer {
                taken.push(*announcement);
                false
            } else {
                true
            }
        });
        taken
    }
}

impl PathCache for TestPathCache {
    fn make_local_id(&mut self, target: Entity) -> u32 {
        *self.local_ids.entry(target).or_insert_with(|| {
            self.last_id += 1;
            self.last_id
        })
    }

    fn send_and_confirm(&mut self, target: Entity, peer: PeerId) -> PathConfirm {
        let id = self.make_local_id(target);
        if self.announced.insert((target, peer)) {
            self.announcements.push(PathAnnouncement { peer, target, id });
        }

        PathConfirm {
            id,
            confirmed: self.confirmed.contains(&(target, peer)),
        }
    }

    fn resolve(&self, peer: PeerId, id: u32) -> Option<Entity> {
        self.remote.get(&(peer, id)).copied()
    }
}

/// ID of a local object that should be delivered to a peer.
#[derive(Clone, Copy, Debug)]
pub struct PathAnnouncement {
    pub peer: PeerId,
    pub target: Entity,
    pub id: u32,
}
