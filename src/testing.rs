//! In-memory fakes for the cluster and control-plane adapters

use crate::argocd::{
    AccountInfo, BOOTSTRAP_SECRET, ClusterInfo, ControlPlane, LoginOutcome, Session, TokenInfo,
};
use crate::config::Config;
use crate::kube::{ClusterApi, DeploymentContext};
use crate::services::credentials::RetryPolicy;
use crate::services::steps::{ReadinessPolicy, ReadinessSettings};
use crate::utils::CommandExecutor;
use anyhow::Result;
use base64::{Engine as _, engine::general_purpose};
use std::cell::{Cell, RefCell};
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::os::unix::process::ExitStatusExt;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Output};
use std::time::Duration;

/// Config rooted in a temp dir with millisecond waits
pub fn test_config(dir: &Path) -> Config {
    Config {
        namespace: "argocd".to_string(),
        default_context: None,
        manifests_dir: dir.join("manifests"),
        backup_dir: dir.join("backups"),
        token_dir: dir.join("tokens"),
        persist_tokens: false,
        hub_address: None,
        readiness: ReadinessSettings {
            policy: ReadinessPolicy::BestEffort,
            gate_timeout: Duration::from_millis(20),
            poll_interval: Duration::from_millis(1),
        },
        credential_retry: RetryPolicy {
            attempts: 5,
            delay: Duration::from_millis(1),
        },
        default_role: "role:readonly".to_string(),
        log_file: dir.join("hubspoke.log"),
        insecure_tls: true,
    }
}

/// Create empty resource-set files under `<dir>/manifests`
pub fn write_manifests(dir: &Path, relative: &[&str]) {
    for rel in relative {
        let path = dir.join("manifests").join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "apiVersion: v1\nkind: List\nitems: []\n").unwrap();
    }
}

pub struct FakeCluster {
    contexts: Vec<String>,
    current: RefCell<String>,
    switches: RefCell<Vec<String>>,
    applied: RefCell<Vec<PathBuf>>,
    deleted: RefCell<Vec<PathBuf>>,
    live: RefCell<BTreeSet<PathBuf>>,
    fail_apply: RefCell<Option<String>>,
    namespaces: RefCell<BTreeSet<String>>,
    crd_established: Cell<bool>,
    pods_ready: Cell<bool>,
    rollout_complete: Cell<bool>,
    secret: RefCell<Option<(String, u32)>>,
    secret_reads: Cell<u32>,
    ingress_host: RefCell<Option<String>>,
    config_maps: RefCell<HashMap<String, BTreeMap<String, String>>>,
    patches: RefCell<Vec<String>>,
    fail_patch: RefCell<Option<String>>,
    restarts: Cell<u32>,
}

impl FakeCluster {
    pub fn new(contexts: &[&str], current: &str) -> Self {
        Self {
            contexts: contexts.iter().map(|c| c.to_string()).collect(),
            current: RefCell::new(current.to_string()),
            switches: RefCell::new(Vec::new()),
            applied: RefCell::new(Vec::new()),
            deleted: RefCell::new(Vec::new()),
            live: RefCell::new(BTreeSet::new()),
            fail_apply: RefCell::new(None),
            namespaces: RefCell::new(BTreeSet::new()),
            crd_established: Cell::new(true),
            pods_ready: Cell::new(true),
            rollout_complete: Cell::new(true),
            secret: RefCell::new(None),
            secret_reads: Cell::new(0),
            ingress_host: RefCell::new(None),
            config_maps: RefCell::new(HashMap::new()),
            patches: RefCell::new(Vec::new()),
            fail_patch: RefCell::new(None),
            restarts: Cell::new(0),
        }
    }

    pub fn set_crd_established(&self, value: bool) {
        self.crd_established.set(value);
    }

    pub fn set_pods_ready(&self, value: bool) {
        self.pods_ready.set(value);
    }

    pub fn set_rollout_complete(&self, value: bool) {
        self.rollout_complete.set(value);
    }

    /// The secret becomes readable on read number `available_on`
    pub fn set_bootstrap_password(&self, password: &str, available_on: u32) {
        let encoded = general_purpose::STANDARD.encode(password);
        *self.secret.borrow_mut() = Some((encoded, available_on));
    }

    pub fn set_raw_secret(&self, raw: &str) {
        *self.secret.borrow_mut() = Some((raw.to_string(), 1));
    }

    pub fn set_ingress_host(&self, host: &str) {
        *self.ingress_host.borrow_mut() = Some(host.to_string());
    }

    /// Make `apply` fail for any resource whose path contains `fragment`
    pub fn fail_apply_of(&self, fragment: &str) {
        *self.fail_apply.borrow_mut() = Some(fragment.to_string());
    }

    /// Make patches of config map `name` fail
    pub fn fail_patch_of(&self, name: &str) {
        *self.fail_patch.borrow_mut() = Some(name.to_string());
    }

    pub fn set_config_map_entry(&self, name: &str, key: &str, value: &str) {
        self.config_maps
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .insert(key.to_string(), value.to_string());
    }

    pub fn config_map(&self, name: &str) -> BTreeMap<String, String> {
        self.config_maps
            .borrow()
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn patch_count(&self, name: &str) -> usize {
        self.patches.borrow().iter().filter(|n| *n == name).count()
    }

    pub fn applied_resources(&self) -> Vec<PathBuf> {
        self.applied.borrow().clone()
    }

    pub fn deleted_resources(&self) -> Vec<PathBuf> {
        self.deleted.borrow().clone()
    }

    pub fn live_resources(&self) -> BTreeSet<PathBuf> {
        self.live.borrow().clone()
    }

    pub fn namespaces(&self) -> BTreeSet<String> {
        self.namespaces.borrow().clone()
    }

    pub fn secret_reads(&self) -> u32 {
        self.secret_reads.get()
    }

    pub fn active_context(&self) -> String {
        self.current.borrow().clone()
    }

    pub fn context_switches(&self) -> Vec<String> {
        self.switches.borrow().clone()
    }

    pub fn restarts(&self) -> u32 {
        self.restarts.get()
    }
}

impl ClusterApi for FakeCluster {
    fn list_contexts(&self) -> Result<Vec<String>> {
        Ok(self.contexts.clone())
    }

    fn current_context(&self) -> Result<String> {
        Ok(self.current.borrow().clone())
    }

    fn use_context(&self, context: &str) -> Result<()> {
        if !self.contexts.iter().any(|c| c == context) {
            anyhow::bail!("no context exists with the name: \"{}\"", context);
        }
        *self.current.borrow_mut() = context.to_string();
        self.switches.borrow_mut().push(context.to_string());
        Ok(())
    }

    fn apply(&self, _ctx: &DeploymentContext, resource: &Path, _ns: Option<&str>) -> Result<()> {
        if let Some(fragment) = self.fail_apply.borrow().as_deref() {
            if resource.to_string_lossy().contains(fragment) {
                anyhow::bail!("error validating \"{}\"", resource.display());
            }
        }
        self.applied.borrow_mut().push(resource.to_path_buf());
        self.live.borrow_mut().insert(resource.to_path_buf());
        Ok(())
    }

    fn delete(&self, _ctx: &DeploymentContext, resource: &Path, _ns: Option<&str>) -> Result<()> {
        // Absent resources are ignored, like --ignore-not-found
        self.deleted.borrow_mut().push(resource.to_path_buf());
        self.live.borrow_mut().remove(resource);
        Ok(())
    }

    fn ensure_namespace(&self, _ctx: &DeploymentContext, namespace: &str) -> Result<()> {
        self.namespaces.borrow_mut().insert(namespace.to_string());
        Ok(())
    }

    fn get_field(
        &self,
        _ctx: &DeploymentContext,
        kind: &str,
        name: &str,
        _namespace: Option<&str>,
        _jsonpath: &str,
    ) -> Result<Option<String>> {
        match (kind, name) {
            ("secret", BOOTSTRAP_SECRET) => {
                let reads = self.secret_reads.get() + 1;
                self.secret_reads.set(reads);
                Ok(self
                    .secret
                    .borrow()
                    .as_ref()
                    .filter(|(_, available_on)| reads >= *available_on)
                    .map(|(value, _)| value.clone()))
            }
            ("ingress", _) => Ok(self.ingress_host.borrow().clone()),
            _ => Ok(None),
        }
    }

    fn crd_established(&self, _ctx: &DeploymentContext, _crd: &str) -> Result<bool> {
        Ok(self.crd_established.get())
    }

    fn pods_ready(&self, _ctx: &DeploymentContext, _ns: &str, _selector: &str) -> Result<bool> {
        Ok(self.pods_ready.get())
    }

    fn rollout_restart(
        &self,
        _ctx: &DeploymentContext,
        _ns: &str,
        _deployment: &str,
    ) -> Result<()> {
        self.restarts.set(self.restarts.get() + 1);
        Ok(())
    }

    fn rollout_complete(
        &self,
        _ctx: &DeploymentContext,
        _ns: &str,
        _deployment: &str,
    ) -> Result<bool> {
        Ok(self.rollout_complete.get())
    }

    fn get_config_map(
        &self,
        _ctx: &DeploymentContext,
        _namespace: &str,
        name: &str,
    ) -> Result<BTreeMap<String, String>> {
        Ok(self.config_map(name))
    }

    fn patch_config_map(
        &self,
        _ctx: &DeploymentContext,
        _namespace: &str,
        name: &str,
        data: &BTreeMap<String, String>,
    ) -> Result<()> {
        if self.fail_patch.borrow().as_deref() == Some(name) {
            anyhow::bail!("configmaps \"{}\" is forbidden", name);
        }
        self.config_maps
            .borrow_mut()
            .entry(name.to_string())
            .or_default()
            .extend(data.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.patches.borrow_mut().push(name.to_string());
        Ok(())
    }

    fn remove_config_map_keys(
        &self,
        _ctx: &DeploymentContext,
        _namespace: &str,
        name: &str,
        keys: &[&str],
    ) -> Result<()> {
        if let Some(data) = self.config_maps.borrow_mut().get_mut(name) {
            for key in keys {
                data.remove(*key);
            }
        }
        Ok(())
    }
}

pub struct FakeControlPlane {
    admin_password: String,
    accounts: RefCell<Vec<AccountInfo>>,
    password_updates: RefCell<Vec<(String, String, String)>>,
    tokens: RefCell<HashMap<String, Vec<TokenInfo>>>,
    export_payload: RefCell<Option<String>>,
    fail_import: Cell<bool>,
    events: RefCell<Vec<String>>,
    clusters: RefCell<Vec<ClusterInfo>>,
    fail_add_cluster: Cell<bool>,
    hide_new_clusters: Cell<bool>,
}

impl FakeControlPlane {
    pub fn new(admin_password: &str) -> Self {
        Self {
            admin_password: admin_password.to_string(),
            accounts: RefCell::new(vec![AccountInfo {
                name: "admin".to_string(),
                enabled: true,
                capabilities: vec!["login".to_string()],
            }]),
            password_updates: RefCell::new(Vec::new()),
            tokens: RefCell::new(HashMap::new()),
            export_payload: RefCell::new(Some("apiVersion: v1\nkind: ConfigMap\n".to_string())),
            fail_import: Cell::new(false),
            events: RefCell::new(Vec::new()),
            clusters: RefCell::new(Vec::new()),
            fail_add_cluster: Cell::new(false),
            hide_new_clusters: Cell::new(false),
        }
    }

    pub fn add_account(&self, name: &str) {
        self.accounts.borrow_mut().push(AccountInfo {
            name: name.to_string(),
            enabled: true,
            capabilities: vec!["apiKey".to_string(), "login".to_string()],
        });
    }

    pub fn add_token(&self, account: &str, id: &str) {
        self.tokens
            .borrow_mut()
            .entry(account.to_string())
            .or_default()
            .push(TokenInfo {
                id: id.to_string(),
                issued_at: Some(1_700_000_000),
                expires_at: None,
            });
    }

    pub fn tokens_of(&self, account: &str) -> Vec<TokenInfo> {
        self.tokens
            .borrow()
            .get(account)
            .cloned()
            .unwrap_or_default()
    }

    pub fn password_updates(&self) -> Vec<(String, String, String)> {
        self.password_updates.borrow().clone()
    }

    /// `None` makes every export fail
    pub fn set_export_payload(&self, payload: Option<&str>) {
        *self.export_payload.borrow_mut() = payload.map(str::to_string);
    }

    pub fn set_fail_import(&self, fail: bool) {
        self.fail_import.set(fail);
    }

    pub fn set_fail_add_cluster(&self, fail: bool) {
        self.fail_add_cluster.set(fail);
    }

    /// Registered clusters do not show up in listings (slow propagation)
    pub fn set_hide_new_clusters(&self, hide: bool) {
        self.hide_new_clusters.set(hide);
    }

    /// Ordered log of export/import/login calls
    pub fn events(&self) -> Vec<String> {
        self.events.borrow().clone()
    }

    pub fn cluster_names(&self) -> Vec<String> {
        self.clusters.borrow().iter().map(|c| c.name.clone()).collect()
    }
}

impl ControlPlane for FakeControlPlane {
    fn login(&self, server: &str, username: &str, password: &str) -> Result<LoginOutcome> {
        self.events
            .borrow_mut()
            .push(format!("login:{}@{}", username, server));
        if username == "admin" && password == self.admin_password {
            Ok(LoginOutcome::Success)
        } else {
            Ok(LoginOutcome::Failure("Invalid username or password".to_string()))
        }
    }

    fn list_accounts(&self, _session: &Session) -> Result<Vec<AccountInfo>> {
        Ok(self.accounts.borrow().clone())
    }

    fn update_password(
        &self,
        _session: &Session,
        account: &str,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        if current_password != self.admin_password {
            anyhow::bail!("current password does not match");
        }
        self.password_updates.borrow_mut().push((
            account.to_string(),
            current_password.to_string(),
            new_password.to_string(),
        ));
        Ok(())
    }

    fn generate_token(
        &self,
        _session: &Session,
        account: &str,
        token_id: &str,
        expires_in_secs: Option<u64>,
    ) -> Result<String> {
        self.tokens
            .borrow_mut()
            .entry(account.to_string())
            .or_default()
            .push(TokenInfo {
                id: token_id.to_string(),
                issued_at: Some(1_700_000_000),
                expires_at: expires_in_secs.map(|s| 1_700_000_000 + s as i64),
            });
        Ok(format!("eyJ.fake.{}", token_id))
    }

    fn list_tokens(&self, _session: &Session, account: &str) -> Result<Vec<TokenInfo>> {
        Ok(self.tokens_of(account))
    }

    fn revoke_token(&self, _session: &Session, account: &str, token_id: &str) -> Result<()> {
        let mut tokens = self.tokens.borrow_mut();
        let list = tokens.entry(account.to_string()).or_default();
        let before = list.len();
        list.retain(|t| t.id != token_id);
        if list.len() == before {
            anyhow::bail!("token {} not found", token_id);
        }
        Ok(())
    }

    fn export_state(&self, _ctx: &DeploymentContext) -> Result<String> {
        self.events.borrow_mut().push("export".to_string());
        self.export_payload
            .borrow()
            .clone()
            .ok_or_else(|| anyhow::anyhow!("connection refused"))
    }

    fn import_state(&self, _ctx: &DeploymentContext, artifact: &Path) -> Result<()> {
        self.events
            .borrow_mut()
            .push(format!("import:{}", artifact.display()));
        if self.fail_import.get() {
            anyhow::bail!("import rejected");
        }
        Ok(())
    }

    fn list_clusters(&self, _session: &Session) -> Result<Vec<ClusterInfo>> {
        if self.hide_new_clusters.get() {
            return Ok(Vec::new());
        }
        Ok(self.clusters.borrow().clone())
    }

    fn add_cluster(&self, _session: &Session, kube_context: &str, name: &str) -> Result<()> {
        if self.fail_add_cluster.get() {
            anyhow::bail!("rpc error: code = Unknown desc = cluster unreachable");
        }
        self.clusters.borrow_mut().push(ClusterInfo {
            server: format!("https://{}.example:6443", kube_context),
            name: name.to_string(),
        });
        Ok(())
    }
}

/// One recorded invocation of an external tool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    pub stdin: Option<Vec<u8>>,
}

/// Records every command and answers with queued replies, then with an
/// empty success
#[derive(Default)]
pub struct ScriptedExecutor {
    replies: RefCell<VecDeque<Output>>,
    calls: RefCell<Vec<Invocation>>,
}

impl ScriptedExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(&self, code: i32, stdout: &str, stderr: &str) {
        self.replies.borrow_mut().push_back(Output {
            status: ExitStatus::from_raw(code << 8),
            stdout: stdout.as_bytes().to_vec(),
            stderr: stderr.as_bytes().to_vec(),
        });
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.calls.borrow().clone()
    }

    pub fn last_args(&self) -> Vec<String> {
        self.calls
            .borrow()
            .last()
            .map(|c| c.args.clone())
            .unwrap_or_default()
    }

    fn answer(&self, program: &str, args: &[&str], stdin: Option<&[u8]>) -> Output {
        self.calls.borrow_mut().push(Invocation {
            program: program.to_string(),
            args: args.iter().map(|a| a.to_string()).collect(),
            stdin: stdin.map(<[u8]>::to_vec),
        });
        self.replies.borrow_mut().pop_front().unwrap_or(Output {
            status: ExitStatus::from_raw(0),
            stdout: Vec::new(),
            stderr: Vec::new(),
        })
    }
}

impl CommandExecutor for &ScriptedExecutor {
    fn execute_simple(&self, program: &str, args: &[&str]) -> Result<Output> {
        Ok(self.answer(program, args, None))
    }

    fn execute_with_stdin(&self, program: &str, args: &[&str], input: &[u8]) -> Result<Output> {
        Ok(self.answer(program, args, Some(input)))
    }

    fn check_command_exists(&self, _command: &str) -> bool {
        true
    }
}
