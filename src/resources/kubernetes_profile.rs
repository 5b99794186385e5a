//! Kubernetes profiles.
//!
//! Everything but the lock is fixed at creation. The load balancer choice is
//! a single token in the schema but two flags on the wire.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    base_schema, id_string, name_attribute, organization_id, record, with_audit, Family, FamilyInfo,
    Record,
};
use crate::attributes::AttributeBag;
use crate::client::{Routes, TaikunClient};
use crate::context::OperationContext;
use crate::convert::{IdKind, LoadBalancingSolution};
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};
use crate::validation::Validator;

static INFO: FamilyInfo = FamilyInfo {
    resource: "taikun_kubernetes_profile",
    data_source_plural: "taikun_kubernetes_profiles",
    list_attribute: "kubernetes_profiles",
    write_only: &[],
    id_kind: IdKind::Numeric,
    lock_attribute: "lock",
    mutable: &[],
};

static ROUTES: Routes = Routes {
    list: "/api/KubernetesProfiles/list",
    create: "/api/KubernetesProfiles/create",
    update: "/api/KubernetesProfiles/update",
    delete: "/api/KubernetesProfiles/delete",
    lock_manager: "/api/KubernetesProfiles/lockmanager",
};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct KubernetesProfileDto {
    id: Option<i64>,
    name: String,
    cni: String,
    octavia_enabled: bool,
    #[serde(rename = "taikunLBEnabled")]
    taikun_lb_enabled: bool,
    expose_node_port_on_bastion: bool,
    allow_scheduling_on_master: bool,
    unique_cluster_name: bool,
    nvidia_gpu_operator_enabled: bool,
    wasm_enabled: bool,
    organization_id: Option<i64>,
    organization_name: String,
    is_locked: bool,
    created_by: String,
    last_modified: String,
    last_modified_by: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateKubernetesProfile {
    name: String,
    octavia_enabled: bool,
    #[serde(rename = "taikunLBEnabled")]
    taikun_lb_enabled: bool,
    expose_node_port_on_bastion: bool,
    allow_scheduling_on_master: bool,
    unique_cluster_name: bool,
    nvidia_gpu_operator_enabled: bool,
    wasm_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    organization_id: Option<i32>,
}

fn force_new_bool(default: bool, description: &str) -> Attribute {
    Attribute::optional_bool()
        .with_default(json!(default))
        .with_force_new()
        .with_description(description)
}

/// Cluster-wide Kubernetes settings.
pub struct KubernetesProfile;

#[async_trait]
impl Family for KubernetesProfile {
    fn info(&self) -> &FamilyInfo {
        &INFO
    }

    fn routes(&self) -> &Routes {
        &ROUTES
    }

    fn schema(&self) -> Schema {
        with_audit(base_schema("Indicates whether to lock the Kubernetes profile."))
            .with_attribute(
                "name",
                name_attribute("The name of the Kubernetes profile.").with_force_new(),
            )
            .with_attribute(
                "bastion_proxy",
                force_new_bool(
                    false,
                    "Whether to expose the Service on each Node's IP at a static port.",
                ),
            )
            .with_attribute(
                "cni",
                Attribute::computed_string()
                    .with_description(
                        "Container Network Interface (CNI) of the Kubernetes profile.",
                    ),
            )
            .with_attribute(
                "load_balancing_solution",
                Attribute::optional_string()
                    .with_default(json!("Octavia"))
                    .with_force_new()
                    .with_validator(Validator::one_of(LoadBalancingSolution::TOKENS))
                    .with_description("Load-balancing solution: None, Octavia or Taikun."),
            )
            .with_attribute(
                "schedule_on_master",
                force_new_bool(false, "When enabled, workloads can run on the control plane."),
            )
            .with_attribute(
                "unique_cluster_name",
                force_new_bool(
                    true,
                    "If not enabled, the cluster name is prefixed with the organization name.",
                ),
            )
            .with_attribute(
                "nvidia_gpu_operator",
                force_new_bool(false, "Enable the NVIDIA GPU operator."),
            )
            .with_attribute("wasm", force_new_bool(false, "Enable WebAssembly workloads."))
    }

    fn flatten(&self, dto: Value) -> Result<Record, ProviderError> {
        let dto: KubernetesProfileDto = serde_json::from_value(dto)?;
        let solution =
            LoadBalancingSolution::from_flags(dto.octavia_enabled, dto.taikun_lb_enabled);
        Ok(record(json!({
            "id": id_string(dto.id),
            "name": dto.name,
            "bastion_proxy": dto.expose_node_port_on_bastion,
            "cni": dto.cni,
            "load_balancing_solution": solution.as_str(),
            "schedule_on_master": dto.allow_scheduling_on_master,
            "unique_cluster_name": dto.unique_cluster_name,
            "nvidia_gpu_operator": dto.nvidia_gpu_operator_enabled,
            "wasm": dto.wasm_enabled,
            "organization_id": id_string(dto.organization_id),
            "organization_name": dto.organization_name,
            "lock": dto.is_locked,
            "created_by": dto.created_by,
            "last_modified": dto.last_modified,
            "last_modified_by": dto.last_modified_by,
        })))
    }

    async fn create(
        &self,
        ctx: &OperationContext,
        client: &TaikunClient,
        bag: &AttributeBag,
    ) -> Result<String, ProviderError> {
        let solution = LoadBalancingSolution::parse(
            bag.get_str("load_balancing_solution").unwrap_or("Octavia"),
        )?;
        let (octavia_enabled, taikun_lb_enabled) = solution.flags();
        let body = CreateKubernetesProfile {
            name: bag.string("name"),
            octavia_enabled,
            taikun_lb_enabled,
            expose_node_port_on_bastion: bag.get_bool("bastion_proxy"),
            allow_scheduling_on_master: bag.get_bool("schedule_on_master"),
            unique_cluster_name: bag.get_bool("unique_cluster_name"),
            nvidia_gpu_operator_enabled: bag.get_bool("nvidia_gpu_operator"),
            wasm_enabled: bag.get_bool("wasm"),
            organization_id: organization_id(bag)?,
        };
        client.create(ctx, ROUTES.create, &body).await
    }
}
