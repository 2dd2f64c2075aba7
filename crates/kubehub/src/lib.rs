//! kubesnap kube integration: kubeconfig/context resolution, API
//! discovery and paged dynamic listing.

#![forbid(unsafe_code)]

use anyhow::{anyhow, Context, Result};
use kube::{
    api::{Api, DynamicObject, ListParams},
    config::{KubeConfigOptions, Kubeconfig},
    discovery::{verbs, ApiResource, Discovery, Scope},
    Client, Config,
};
use serde_json::Value;
use tracing::debug;

use kubesnap_core::TypeRef;

/// Page size for paginated list requests.
const PAGE_SIZE: u32 = 500;

/// A resolved cluster connection plus the effective context defaults.
pub struct Session {
    pub context: String,
    pub cluster: String,
    pub namespace: Option<String>,
    client: Client,
}

impl Session {
    /// Connect using the local kubeconfig. Explicit overrides win over the
    /// kubeconfig's current context; the context's own cluster/namespace
    /// fill whatever is left unset.
    pub async fn connect(
        context: Option<&str>,
        cluster: Option<&str>,
        namespace: Option<&str>,
    ) -> Result<Self> {
        let kubeconfig = Kubeconfig::read().context("reading kubeconfig")?;
        let context_name = context
            .map(str::to_string)
            .or_else(|| kubeconfig.current_context.clone())
            .ok_or_else(|| anyhow!("no context given and no current context in kubeconfig"))?;
        let named = kubeconfig
            .contexts
            .iter()
            .find(|c| c.name == context_name)
            .ok_or_else(|| anyhow!("context {:?} not found in kubeconfig", context_name))?;
        let ctx = named
            .context
            .as_ref()
            .ok_or_else(|| anyhow!("context {:?} is empty in kubeconfig", context_name))?;
        let cluster_name = cluster
            .map(str::to_string)
            .unwrap_or_else(|| ctx.cluster.clone());
        let namespace = namespace.map(str::to_string).or_else(|| ctx.namespace.clone());

        let options = KubeConfigOptions {
            context: Some(context_name.clone()),
            cluster: cluster.map(str::to_string),
            ..Default::default()
        };
        let config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .with_context(|| format!("loading kubeconfig for context {:?}", context_name))?;
        let client = Client::try_from(config)
            .with_context(|| format!("creating client for context {:?}", context_name))?;

        Ok(Self {
            context: context_name,
            cluster: cluster_name,
            namespace,
            client,
        })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }
}

/// One entry of the discovery catalog: a served type and its verbs.
#[derive(Debug, Clone)]
pub struct TypeEntry {
    pub type_ref: TypeRef,
    pub verbs: Vec<String>,
}

/// Flatten kube discovery into a catalog of served types (incl. CRDs).
pub async fn discover_catalog(client: Client) -> Result<Vec<TypeEntry>> {
    let discovery = Discovery::new(client)
        .run()
        .await
        .context("running API discovery")?;
    let mut out = Vec::new();
    for group in discovery.groups() {
        for (ar, caps) in group.recommended_resources() {
            out.push(TypeEntry {
                type_ref: TypeRef {
                    group: ar.group.clone(),
                    version: ar.version.clone(),
                    kind: ar.kind.clone(),
                    plural: ar.plural.clone(),
                    namespaced: matches!(caps.scope, Scope::Namespaced),
                },
                verbs: caps.operations.clone(),
            });
        }
    }
    Ok(out)
}

/// Pick the exportable subset of the catalog: namespaced types that support
/// `list`, minus subresources and excluded plural names. Sorted and
/// deduplicated so runs are deterministic.
pub fn select_exportable(catalog: &[TypeEntry], exclude: &[String]) -> Vec<TypeRef> {
    let mut out: Vec<TypeRef> = catalog
        .iter()
        .filter(|e| e.type_ref.namespaced)
        .filter(|e| e.verbs.iter().any(|v| v.as_str() == verbs::LIST))
        .filter(|e| !e.type_ref.plural.contains('/'))
        .filter(|e| !exclude.contains(&e.type_ref.plural))
        .map(|e| e.type_ref.clone())
        .collect();
    out.sort_by(|a, b| {
        a.group
            .cmp(&b.group)
            .then(a.version.cmp(&b.version))
            .then(a.plural.cmp(&b.plural))
    });
    out.dedup();
    out
}

/// Resolve explicit resource-type arguments against the catalog, matching
/// the plural name or the lowercased kind. Unknown names fail the run.
pub fn resolve_names(catalog: &[TypeEntry], names: &[String]) -> Result<Vec<TypeRef>> {
    let mut out = Vec::with_capacity(names.len());
    for name in names {
        let want = name.to_lowercase();
        let entry = catalog
            .iter()
            .find(|e| e.type_ref.plural == want || e.type_ref.kind.to_lowercase() == want)
            .ok_or_else(|| anyhow!("unknown resource type {:?}", name))?;
        out.push(entry.type_ref.clone());
    }
    Ok(out)
}

/// List all objects of one type, returning each as a self-describing JSON
/// document. The list API omits per-item type meta, so `apiVersion` and
/// `kind` are injected back. Pages through the collection; no retry.
pub async fn list_objects(
    client: Client,
    type_ref: &TypeRef,
    namespace: Option<&str>,
) -> Result<Vec<Value>> {
    let ar = ApiResource {
        group: type_ref.group.clone(),
        version: type_ref.version.clone(),
        api_version: type_ref.api_version(),
        kind: type_ref.kind.clone(),
        plural: type_ref.plural.clone(),
    };
    let api: Api<DynamicObject> = if type_ref.namespaced {
        match namespace {
            Some(ns) => Api::namespaced_with(client, ns, &ar),
            None => Api::all_with(client, &ar),
        }
    } else {
        Api::all_with(client, &ar)
    };

    let mut items = Vec::new();
    let mut continue_token: Option<String> = None;
    loop {
        let mut params = ListParams::default().limit(PAGE_SIZE);
        if let Some(token) = &continue_token {
            params = params.continue_token(token);
        }
        let page = api
            .list(&params)
            .await
            .with_context(|| format!("listing {}", type_ref.plural))?;
        let fetched = page.items.len();
        for obj in page.items {
            let mut value = serde_json::to_value(obj).context("serializing DynamicObject")?;
            if let Some(map) = value.as_object_mut() {
                map.insert(
                    "apiVersion".to_string(),
                    Value::String(ar.api_version.clone()),
                );
                map.insert("kind".to_string(), Value::String(ar.kind.clone()));
            }
            items.push(value);
        }
        match page.metadata.continue_ {
            Some(token) if !token.is_empty() => {
                debug!(
                    resource = %type_ref.plural,
                    page_items = fetched,
                    total = items.len(),
                    "fetched page, continuing"
                );
                continue_token = Some(token);
            }
            _ => break,
        }
    }
    Ok(items)
}
