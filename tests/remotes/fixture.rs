use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use remote_loader::{
    build_manifest, ArtifactExecutor, Component, Container, ContainerTable, Fetch, FetchError,
    LoaderState, ModuleFactory, ModuleResolver, Props, RemoteBuild, RemoteModule,
    SharedDependency, SharedScope,
};

pub(crate) const MANIFEST_URL: &str = "http://store.test/remotes-manifest.json";
pub(crate) const CART_V1: &str = "http://cart.test/v1.0.0/remoteEntry.js";
pub(crate) const CART_V2: &str = "http://cart.test/v2.0.0/remoteEntry.js";
pub(crate) const REVIEWS_V1: &str = "http://reviews.test/v1.0.0/remoteEntry.js";
pub(crate) const REVIEWS_V2: &str = "http://reviews.test/v2.0.0/remoteEntry.js";

/// What a fake remote entry registers when executed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct ArtifactSpec {
    pub(crate) scope: String,
    pub(crate) version: String,
    pub(crate) modules: Vec<String>,
}

pub(crate) fn artifact(scope: &str, version: &str, modules: &[&str]) -> Vec<u8> {
    serde_json::to_vec(&ArtifactSpec {
        scope: scope.to_string(),
        version: version.to_string(),
        modules: modules.iter().map(|m| m.to_string()).collect(),
    })
    .unwrap()
}

/// In-memory network that counts requests per URL.
#[derive(Default)]
pub(crate) struct FakeNetwork {
    bodies: Mutex<HashMap<String, Result<Vec<u8>, u16>>>,
    requests: Mutex<HashMap<String, usize>>,
    delay: Mutex<Duration>,
}

impl FakeNetwork {
    pub(crate) fn serve(&self, url: &str, body: Vec<u8>) {
        self.bodies.lock().unwrap().insert(url.to_string(), Ok(body));
    }

    pub(crate) fn fail(&self, url: &str, status: u16) {
        self.bodies.lock().unwrap().insert(url.to_string(), Err(status));
    }

    pub(crate) fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub(crate) fn requests(&self, url: &str) -> usize {
        self.requests.lock().unwrap().get(url).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetch for FakeNetwork {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        *self.requests.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let body = self.bodies.lock().unwrap().get(url).cloned();
        match body {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(status)) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Err(FetchError::Status {
                url: url.to_string(),
                status: 404,
            }),
        }
    }
}

/// Host environment: executing an artifact registers a fake container.
pub(crate) struct FakeHost {
    pub(crate) table: Arc<ContainerTable>,
    executions: Mutex<HashMap<String, usize>>,
    inits: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeHost {
    fn new() -> Self {
        Self {
            table: Arc::new(ContainerTable::new()),
            executions: Mutex::new(HashMap::new()),
            inits: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub(crate) fn executions(&self, url: &str) -> usize {
        self.executions.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub(crate) fn inits(&self, scope: &str) -> usize {
        self.inits.lock().unwrap().get(scope).copied().unwrap_or(0)
    }

    /// Initializations of the container built from `scope`'s `version` artifact.
    pub(crate) fn inits_at(&self, scope: &str, version: &str) -> usize {
        self.inits(&format!("{}@{}", scope, version))
    }
}

#[async_trait]
impl ArtifactExecutor for FakeHost {
    async fn execute(&self, url: &str, artifact: &[u8]) -> Result<(), String> {
        *self.executions.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let spec: ArtifactSpec = serde_json::from_slice(artifact).map_err(|e| e.to_string())?;
        let container = FakeContainer::new(&spec, Arc::clone(&self.inits));
        self.table.register(spec.scope.clone(), Arc::new(container));
        Ok(())
    }
}

struct FakeContainer {
    scope: String,
    version: String,
    factories: HashMap<String, Arc<FakeFactory>>,
    inits: Arc<Mutex<HashMap<String, usize>>>,
}

impl FakeContainer {
    fn new(spec: &ArtifactSpec, inits: Arc<Mutex<HashMap<String, usize>>>) -> Self {
        let factories = spec
            .modules
            .iter()
            .map(|module| {
                let component: Arc<dyn Component> = if module == "./Explode" {
                    Arc::new(Exploding)
                } else {
                    Arc::new(Widget {
                        name: module.trim_start_matches("./").to_string(),
                        version: spec.version.clone(),
                    })
                };
                (module.clone(), Arc::new(FakeFactory { component }))
            })
            .collect();

        Self {
            scope: spec.scope.clone(),
            version: spec.version.clone(),
            factories,
            inits,
        }
    }
}

#[async_trait]
impl Container for FakeContainer {
    async fn init(&self, shared: &SharedScope) -> Result<(), String> {
        if shared.get("react").is_none() {
            return Err("host did not share react".into());
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
        let mut inits = self.inits.lock().unwrap();
        *inits.entry(self.scope.clone()).or_default() += 1;
        *inits
            .entry(format!("{}@{}", self.scope, self.version))
            .or_default() += 1;
        Ok(())
    }

    async fn get(&self, module_path: &str) -> Option<Arc<dyn ModuleFactory>> {
        self.factories
            .get(module_path)
            .map(|f| Arc::clone(f) as Arc<dyn ModuleFactory>)
    }
}

struct FakeFactory {
    component: Arc<dyn Component>,
}

#[async_trait]
impl ModuleFactory for FakeFactory {
    async fn create(&self) -> Result<RemoteModule, String> {
        Ok(RemoteModule::new(Arc::clone(&self.component)))
    }
}

/// Renders `Name@version {props}`.
struct Widget {
    name: String,
    version: String,
}

impl Component for Widget {
    fn name(&self) -> &str {
        &self.name
    }

    fn render(&self, props: &Props) -> String {
        format!(
            "{}@{} {}",
            self.name,
            self.version,
            serde_json::Value::Object(props.clone())
        )
    }
}

struct Exploding;

impl Component for Exploding {
    fn name(&self) -> &str {
        "Explode"
    }

    fn render(&self, _props: &Props) -> String {
        panic!("render exploded")
    }
}

pub(crate) struct Fixture {
    pub(crate) network: Arc<FakeNetwork>,
    pub(crate) host: Arc<FakeHost>,
    pub(crate) resolver: Arc<ModuleResolver>,
}

fn storefront_builds() -> Vec<RemoteBuild> {
    vec![
        RemoteBuild {
            name: "cart".into(),
            base_url: "http://cart.test".into(),
            versions: vec!["1.0.0".into(), "2.0.0".into()],
            exposes: BTreeMap::from([
                ("CartWidget".into(), "./CartWidget".into()),
                ("CartPage".into(), "./CartPage".into()),
                ("Explode".into(), "./Explode".into()),
            ]),
        },
        RemoteBuild {
            name: "reviews".into(),
            base_url: "http://reviews.test".into(),
            versions: vec!["1.0.0".into(), "2.0.0".into()],
            exposes: BTreeMap::from([
                ("ReviewList".into(), "./ReviewList".into()),
                ("ReviewForm".into(), "./ReviewForm".into()),
                ("ReviewSummary".into(), "./ReviewSummary".into()),
            ]),
        },
    ]
}

/// Cart and reviews remotes, each published at 1.0.0 and 2.0.0 (2.0.0 active).
pub(crate) fn storefront() -> Fixture {
    let network = Arc::new(FakeNetwork::default());
    let manifest = build_manifest(&storefront_builds());
    network.serve(MANIFEST_URL, manifest.to_pretty_json().unwrap().into_bytes());

    let cart_modules = ["./CartWidget", "./CartPage", "./Explode"];
    let review_modules = ["./ReviewList", "./ReviewForm", "./ReviewSummary"];
    network.serve(CART_V1, artifact("cart", "1.0.0", &cart_modules));
    network.serve(CART_V2, artifact("cart", "2.0.0", &cart_modules));
    network.serve(REVIEWS_V1, artifact("reviews", "1.0.0", &review_modules));
    network.serve(REVIEWS_V2, artifact("reviews", "2.0.0", &review_modules));

    let host = Arc::new(FakeHost::new());
    let state = LoaderState::new(
        MANIFEST_URL,
        network.clone(),
        host.clone(),
        host.table.clone(),
    );
    let shared = SharedScope::new("default").with(
        SharedDependency::new("react", "18.3.1", Arc::new("react-runtime"))
            .singleton()
            .requires("^18.3.0"),
    );
    let resolver = Arc::new(ModuleResolver::new(state, Arc::new(shared)));

    Fixture {
        network,
        host,
        resolver,
    }
}

pub(crate) fn props(value: serde_json::Value) -> Props {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Props::new(),
    }
}
