//! Shared fakes for service tests.
//!
//! `FakeControlPlane` is an in-memory control plane whose resources move
//! through scripted state sequences as they are described. `ManualClock`
//! advances only when slept on, so poll deadlines are exercised without
//! real waits.

#![allow(clippy::expect_used, clippy::unwrap_used, dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::time::{Duration, Instant};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use rsa::{Pkcs1v15Encrypt, RsaPublicKey};
use wincloud_common::{
    InstanceDetails, InstanceState, LifecycleState, MANAGED_BY, ManagedInstance,
    ResourceGroupStatus, TAG_MANAGED_BY, TAG_NAME,
};

use crate::application::ports::{
    Clock, CpResult, InstanceRecordStore, Instances, KeyMaterialStore, KeyPairs, LaunchSpec,
    PasswordData, ProgressReporter, ResourceGroupDescription, ResourceGroups,
};
use crate::application::services::Remote;
use crate::application::services::retry::RetryPolicy;
use crate::domain::{ControlPlaneError, KeyMaterial};

pub const TEST_KEY_BITS: usize = 1024;
pub const REGION: &str = "us-east-1";

// ── Clock ─────────────────────────────────────────────────────────────────────

pub struct ManualClock {
    start: Instant,
    offset: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.start + self.offset.get()
    }

    async fn sleep(&self, duration: Duration) {
        self.offset.set(self.offset.get() + duration);
    }
}

// ── Control plane ─────────────────────────────────────────────────────────────

/// How fake resources behave over successive describes.
#[derive(Debug, Clone)]
pub struct Script {
    /// Describes spent in progress before a group settles.
    pub group_ready_after: u32,
    /// Settle as failed with this reason instead of created.
    pub group_failure: Option<String>,
    pub group_outputs: HashMap<String, String>,
    pub group_delete_after: u32,
    /// Describes spent `pending` before an instance reaches `boot_into`.
    pub boot_after: u32,
    pub boot_into: InstanceState,
    /// Describes spent in `stopping`/`shutting-down`/`pending` after a request.
    pub transition_after: u32,
    /// Password polls returning nothing before material appears; `None` never.
    pub password_after: Option<u32>,
    pub password: String,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            group_ready_after: 2,
            group_failure: None,
            group_outputs: HashMap::from([
                ("VpcId".to_string(), "vpc-0aa".to_string()),
                ("SubnetId".to_string(), "subnet-0bb".to_string()),
                ("SecurityGroupId".to_string(), "sg-0cc".to_string()),
            ]),
            group_delete_after: 1,
            boot_after: 2,
            boot_into: InstanceState::Running,
            transition_after: 1,
            password_after: Some(3),
            password: "Xy7$kP!q2-Admin".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct FakeGroup {
    pub id: String,
    pub status: ResourceGroupStatus,
    pub reason: Option<String>,
    pub tags: HashMap<String, String>,
    countdown: u32,
    target: ResourceGroupStatus,
}

#[derive(Debug, Clone)]
pub struct FakeInstance {
    /// Value of the `Name` tag.
    pub name: String,
    pub state: InstanceState,
    pub key_name: String,
    pub subnet_id: String,
    pub image_id: String,
    countdown: u32,
    target: InstanceState,
    password_polls: u32,
}

#[derive(Default)]
pub struct World {
    pub script: Script,
    pub groups: HashMap<String, FakeGroup>,
    pub instances: BTreeMap<String, FakeInstance>,
    pub key_pairs: HashMap<String, String>,
    pub calls: Vec<String>,
    failures: HashMap<&'static str, VecDeque<ControlPlaneError>>,
    lost_responses: HashMap<&'static str, VecDeque<ControlPlaneError>>,
    next_id: u32,
}

#[derive(Default)]
pub struct FakeControlPlane {
    pub world: RefCell<World>,
}

impl FakeControlPlane {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: Script) -> Self {
        let cp = Self::default();
        cp.world.borrow_mut().script = script;
        cp
    }

    /// Queue `err` as the next result of `op`.
    pub fn fail(&self, op: &'static str, err: ControlPlaneError) {
        self.world
            .borrow_mut()
            .failures
            .entry(op)
            .or_default()
            .push_back(err);
    }

    /// Let the next `op` take effect remotely, then fail with `err` as if
    /// the response never arrived.
    pub fn lose_response(&self, op: &'static str, err: ControlPlaneError) {
        self.world
            .borrow_mut()
            .lost_responses
            .entry(op)
            .or_default()
            .push_back(err);
    }

    pub fn calls(&self) -> Vec<String> {
        self.world.borrow().calls.clone()
    }

    pub fn count(&self, op: &str) -> usize {
        self.world.borrow().calls.iter().filter(|c| *c == op).count()
    }

    pub fn group_exists(&self, name: &str) -> bool {
        self.world.borrow().groups.contains_key(name)
    }

    pub fn key_pair_exists(&self, name: &str) -> bool {
        self.world.borrow().key_pairs.contains_key(name)
    }

    pub fn instance_state(&self, id: &str) -> Option<InstanceState> {
        self.world.borrow().instances.get(id).map(|i| i.state)
    }

    /// Instances not yet terminated.
    pub fn live_instances(&self) -> usize {
        self.world
            .borrow()
            .instances
            .values()
            .filter(|i| i.state != InstanceState::Terminated)
            .count()
    }

    pub fn insert_instance(&self, id: &str, state: InstanceState, key_name: &str) {
        let name = key_name.strip_prefix("wincloud-").unwrap_or(key_name);
        self.world.borrow_mut().instances.insert(
            id.to_string(),
            FakeInstance {
                name: name.to_string(),
                state,
                key_name: key_name.to_string(),
                subnet_id: "subnet-0bb".into(),
                image_id: "ami-0123".into(),
                countdown: 0,
                target: state,
                password_polls: 0,
            },
        );
    }

    pub fn insert_group(&self, name: &str, status: ResourceGroupStatus) {
        self.world.borrow_mut().groups.insert(
            name.to_string(),
            FakeGroup {
                id: group_id(name),
                status,
                reason: None,
                tags: managed_tags(name),
                countdown: 0,
                target: status,
            },
        );
    }

    fn begin(&self, op: &'static str) -> CpResult<()> {
        let mut world = self.world.borrow_mut();
        world.calls.push(op.to_string());
        match world.failures.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Called once `op` has taken effect.
    fn respond<T>(&self, op: &'static str, value: T) -> CpResult<T> {
        let mut world = self.world.borrow_mut();
        match world.lost_responses.get_mut(op).and_then(VecDeque::pop_front) {
            Some(err) => Err(err),
            None => Ok(value),
        }
    }
}

fn managed_tags(name: &str) -> HashMap<String, String> {
    HashMap::from([
        (TAG_MANAGED_BY.to_string(), MANAGED_BY.to_string()),
        (TAG_NAME.to_string(), name.to_string()),
    ])
}

fn group_id(name: &str) -> String {
    format!("arn:aws:cloudformation:us-east-1:123456789012:stack/{name}/6f1c2d3e-0000-4000-8000-00000000abcd")
}

fn find_group<'a>(world: &'a mut World, name_or_id: &str) -> Option<&'a mut FakeGroup> {
    world
        .groups
        .iter_mut()
        .find(|(name, g)| *name == name_or_id || g.id == name_or_id)
        .map(|(_, g)| g)
}

impl ResourceGroups for FakeControlPlane {
    async fn create_resource_group(
        &self,
        _region: &str,
        name: &str,
        _template_body: &str,
        _parameters: &[(&str, &str)],
    ) -> CpResult<String> {
        self.begin("create-stack")?;
        let mut world = self.world.borrow_mut();
        if world.groups.contains_key(name) {
            return Err(ControlPlaneError::AlreadyExists(format!(
                "Stack [{name}] already exists"
            )));
        }
        let (target, reason) = match world.script.group_failure.clone() {
            Some(reason) => (ResourceGroupStatus::Failed, Some(reason)),
            None => (ResourceGroupStatus::Created, None),
        };
        let id = group_id(name);
        let countdown = world.script.group_ready_after;
        world.groups.insert(
            name.to_string(),
            FakeGroup {
                id: id.clone(),
                status: ResourceGroupStatus::InProgress,
                reason,
                tags: managed_tags(name),
                countdown,
                target,
            },
        );
        drop(world);
        self.respond("create-stack", id)
    }

    async fn describe_resource_group(
        &self,
        _region: &str,
        name_or_id: &str,
    ) -> CpResult<ResourceGroupDescription> {
        self.begin("describe-stacks")?;
        let mut world = self.world.borrow_mut();
        let outputs = world.script.group_outputs.clone();
        let Some(group) = find_group(&mut world, name_or_id) else {
            return Err(ControlPlaneError::NotFound(format!(
                "Stack with id {name_or_id} does not exist"
            )));
        };
        if group.countdown == 0 {
            group.status = group.target;
        } else {
            group.countdown -= 1;
        }
        let description = ResourceGroupDescription {
            id: Some(group.id.clone()),
            status: group.status,
            reason: group.reason.clone(),
            outputs: if group.status == ResourceGroupStatus::Created {
                outputs
            } else {
                HashMap::new()
            },
            tags: group.tags.clone(),
        };
        if group.status == ResourceGroupStatus::Deleted {
            world.groups.retain(|_, g| g.status != ResourceGroupStatus::Deleted);
        }
        Ok(description)
    }

    async fn delete_resource_group(&self, _region: &str, name_or_id: &str) -> CpResult<()> {
        self.begin("delete-stack")?;
        let mut world = self.world.borrow_mut();
        let after = world.script.group_delete_after;
        if let Some(group) = find_group(&mut world, name_or_id) {
            group.status = ResourceGroupStatus::Deleting;
            group.target = ResourceGroupStatus::Deleted;
            group.countdown = after;
        }
        Ok(())
    }
}

fn missing_instance(id: &str) -> ControlPlaneError {
    ControlPlaneError::NotFound(format!(
        "InvalidInstanceID.NotFound: The instance ID '{id}' does not exist"
    ))
}

impl FakeControlPlane {
    fn transition(
        &self,
        id: &str,
        through: InstanceState,
        to: InstanceState,
    ) -> CpResult<()> {
        let mut world = self.world.borrow_mut();
        let after = world.script.transition_after;
        let instance = world
            .instances
            .get_mut(id)
            .ok_or_else(|| missing_instance(id))?;
        instance.state = through;
        instance.target = to;
        instance.countdown = after;
        Ok(())
    }
}

impl Instances for FakeControlPlane {
    async fn create_instance(&self, spec: &LaunchSpec<'_>) -> CpResult<String> {
        self.begin("run-instances")?;
        let mut world = self.world.borrow_mut();
        world.next_id += 1;
        let id = format!("i-{:017x}", world.next_id);
        let instance = FakeInstance {
            name: spec.name.to_string(),
            state: InstanceState::Pending,
            key_name: spec.key_name.to_string(),
            subnet_id: spec.subnet_id.to_string(),
            image_id: spec.image_id.to_string(),
            countdown: world.script.boot_after,
            target: world.script.boot_into,
            password_polls: 0,
        };
        world.instances.insert(id.clone(), instance);
        drop(world);
        self.respond("run-instances", id)
    }

    async fn describe_instance(&self, region: &str, instance_id: &str) -> CpResult<InstanceDetails> {
        self.begin("describe-instances")?;
        let mut world = self.world.borrow_mut();
        let instance = world
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| missing_instance(instance_id))?;
        if instance.countdown == 0 {
            instance.state = instance.target;
        } else {
            instance.countdown -= 1;
        }
        Ok(InstanceDetails {
            instance_id: instance_id.to_string(),
            state: Some(instance.state),
            instance_type: Some("t3.medium".into()),
            public_ip: (instance.state == InstanceState::Running).then(|| "198.51.100.7".into()),
            private_ip: Some("10.0.1.10".into()),
            availability_zone: Some(format!("{region}a")),
            subnet_id: Some(instance.subnet_id.clone()),
            key_name: Some(instance.key_name.clone()),
            launch_time: Some("2024-06-01T12:00:00+00:00".into()),
        })
    }

    async fn start_instance(&self, _region: &str, instance_id: &str) -> CpResult<()> {
        self.begin("start-instances")?;
        self.transition(instance_id, InstanceState::Pending, InstanceState::Running)
    }

    async fn stop_instance(&self, _region: &str, instance_id: &str) -> CpResult<()> {
        self.begin("stop-instances")?;
        self.transition(instance_id, InstanceState::Stopping, InstanceState::Stopped)
    }

    async fn terminate_instance(&self, _region: &str, instance_id: &str) -> CpResult<()> {
        self.begin("terminate-instances")?;
        self.transition(
            instance_id,
            InstanceState::ShuttingDown,
            InstanceState::Terminated,
        )
    }

    async fn find_instances(&self, _region: &str, name: &str) -> CpResult<Vec<String>> {
        self.begin("find-instances")?;
        Ok(self
            .world
            .borrow()
            .instances
            .iter()
            .filter(|(_, i)| i.name == name && i.state != InstanceState::Terminated)
            .map(|(id, _)| id.clone())
            .collect())
    }
}

impl PasswordData for FakeControlPlane {
    async fn get_password_material(
        &self,
        _region: &str,
        instance_id: &str,
    ) -> CpResult<Option<String>> {
        self.begin("get-password-data")?;
        let mut world = self.world.borrow_mut();
        let after = world.script.password_after;
        let password = world.script.password.clone();
        let instance = world
            .instances
            .get_mut(instance_id)
            .ok_or_else(|| missing_instance(instance_id))?;
        let Some(after) = after else {
            return Ok(None);
        };
        if instance.password_polls < after {
            instance.password_polls += 1;
            return Ok(None);
        }
        let key_name = instance.key_name.clone();
        let public_key = world
            .key_pairs
            .get(&key_name)
            .cloned()
            .ok_or_else(|| ControlPlaneError::Other(format!("no key pair {key_name}")))?;
        Ok(Some(encrypt_for(&public_key, password.as_bytes())))
    }
}

impl KeyPairs for FakeControlPlane {
    async fn import_key_pair(&self, _region: &str, name: &str, public_key: &str) -> CpResult<()> {
        self.begin("import-key-pair")?;
        let mut world = self.world.borrow_mut();
        if world.key_pairs.contains_key(name) {
            return Err(ControlPlaneError::AlreadyExists(format!(
                "InvalidKeyPair.Duplicate: The keypair '{name}' already exists."
            )));
        }
        world.key_pairs.insert(name.to_string(), public_key.to_string());
        drop(world);
        self.respond("import-key-pair", ())
    }

    async fn describe_key_pair(&self, _region: &str, name: &str) -> CpResult<Option<String>> {
        self.begin("describe-key-pairs")?;
        Ok(self.world.borrow().key_pairs.get(name).cloned())
    }

    async fn delete_key_pair(&self, _region: &str, name: &str) -> CpResult<()> {
        self.begin("delete-key-pair")?;
        self.world.borrow_mut().key_pairs.remove(name);
        Ok(())
    }
}

/// Encrypt `plaintext` to an OpenSSH `ssh-rsa` public key, the way the
/// provider encrypts boot-time passwords.
pub fn encrypt_for(openssh: &str, plaintext: &[u8]) -> String {
    let parsed = ssh_key::PublicKey::from_openssh(openssh).expect("openssh key");
    let public =
        RsaPublicKey::try_from(parsed.key_data().rsa().expect("rsa key")).expect("public key");
    let ct = public
        .encrypt(&mut rand::rngs::OsRng, Pkcs1v15Encrypt, plaintext)
        .expect("encrypt");
    STANDARD.encode(ct)
}

// ── Local stores ──────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemRecords {
    pub records: RefCell<BTreeMap<String, ManagedInstance>>,
    /// Every record passed to `save`, oldest first.
    pub saved: RefCell<Vec<ManagedInstance>>,
    pub fail_writes: Cell<bool>,
}

impl MemRecords {
    pub fn with(records: impl IntoIterator<Item = ManagedInstance>) -> Self {
        let store = Self::default();
        for r in records {
            store.records.borrow_mut().insert(r.name.clone(), r);
        }
        store
    }

    pub fn get(&self, name: &str) -> Option<ManagedInstance> {
        self.records.borrow().get(name).cloned()
    }
}

impl InstanceRecordStore for MemRecords {
    async fn load_all(&self) -> anyhow::Result<BTreeMap<String, ManagedInstance>> {
        Ok(self.records.borrow().clone())
    }

    async fn save(&self, record: &ManagedInstance) -> anyhow::Result<()> {
        if self.fail_writes.get() {
            anyhow::bail!("disk full");
        }
        self.saved.borrow_mut().push(record.clone());
        self.records
            .borrow_mut()
            .insert(record.name.clone(), record.clone());
        Ok(())
    }

    async fn remove(&self, name: &str) -> anyhow::Result<()> {
        if self.fail_writes.get() {
            anyhow::bail!("disk full");
        }
        self.records.borrow_mut().remove(name);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemKeys {
    pub keys: RefCell<HashMap<String, KeyMaterial>>,
    pub fail_writes: Cell<bool>,
}

impl MemKeys {
    pub fn contains(&self, key_name: &str) -> bool {
        self.keys.borrow().contains_key(key_name)
    }
}

impl KeyMaterialStore for MemKeys {
    async fn exists(&self, key_name: &str) -> anyhow::Result<bool> {
        Ok(self.contains(key_name))
    }

    async fn read(&self, key_name: &str) -> anyhow::Result<Option<KeyMaterial>> {
        Ok(self.keys.borrow().get(key_name).cloned())
    }

    async fn write(&self, key: &KeyMaterial) -> anyhow::Result<()> {
        if self.fail_writes.get() {
            anyhow::bail!("permission denied");
        }
        let mut keys = self.keys.borrow_mut();
        anyhow::ensure!(!keys.contains_key(&key.name), "key file exists");
        keys.insert(key.name.clone(), key.clone());
        Ok(())
    }

    async fn remove(&self, key_name: &str) -> anyhow::Result<bool> {
        Ok(self.keys.borrow_mut().remove(key_name).is_some())
    }
}

/// Discards progress output.
pub struct NullReporter;

impl ProgressReporter for NullReporter {
    fn step(&self, _: &str) {}
    fn success(&self, _: &str) {}
    fn warn(&self, _: &str) {}
}

// ── Builders ──────────────────────────────────────────────────────────────────

pub fn remote<'a>(
    cp: &'a FakeControlPlane,
    clock: &'a ManualClock,
) -> Remote<'a, FakeControlPlane, ManualClock> {
    Remote::new(
        cp,
        clock,
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
        },
    )
}

pub fn record(name: &str, instance_id: Option<&str>, state: LifecycleState) -> ManagedInstance {
    ManagedInstance {
        name: name.to_string(),
        instance_id: instance_id.map(str::to_string),
        resource_group: wincloud_common::resource_group_name(name),
        resource_group_id: Some(group_id(&wincloud_common::resource_group_name(name))),
        region: REGION.to_string(),
        key_name: wincloud_common::key_pair_name(name),
        instance_type: Some("t3.medium".into()),
        state,
        created_at: Utc::now(),
    }
}
