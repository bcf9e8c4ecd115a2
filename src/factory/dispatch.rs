// Copyright (c) 2025 Nikolay Denev <ndenev@gmail.com>
// SPDX-License-Identifier: BSD-3-Clause

//! The decorating factory.
//!
//! [`DeployConfigFactory`] wraps a delegate implementing the full
//! [`ClientAccessFactory`] contract. Every operation first matches on the
//! object's kind: DeployConfig objects get the specialized handling below,
//! anything else is forwarded to the delegate untouched, so for generic kinds
//! the decorated factory is observably identical to the delegate alone.

use async_trait::async_trait;
use k8s_openapi::api::core::v1 as corev1;
use kube::config::Kubeconfig;
use kube::{Client, Config};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config;
use crate::error::{FactoryError, Result};
use crate::factory::generators::{self, Generator};
use crate::factory::{ClientAccessFactory, JsonEncoder, ObjectEncoder, ResourceFilter};
use crate::kubernetes::{CachedDiscovery, ClientSource, build_discovery_client};
use crate::resources::deploy_config::{self, PodTemplate};
use crate::resources::pod::PodSpec;
use crate::resources::{GroupKind, GroupResource, ResourceObject, convert};

pub struct DeployConfigFactory {
    delegate: Arc<dyn ClientAccessFactory>,
    source: Arc<ClientSource>,
    encoder: Arc<dyn ObjectEncoder>,
}

impl DeployConfigFactory {
    pub fn new(delegate: Arc<dyn ClientAccessFactory>, source: Arc<ClientSource>) -> Self {
        Self {
            delegate,
            source,
            encoder: Arc::new(JsonEncoder),
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn ObjectEncoder>) -> Self {
        self.encoder = encoder;
        self
    }
}

#[async_trait]
impl ClientAccessFactory for DeployConfigFactory {
    fn raw_config(&self) -> Result<Kubeconfig> {
        self.delegate.raw_config()
    }

    async fn client_config(&self) -> Result<Config> {
        self.delegate.client_config().await
    }

    async fn bare_client_config(&self) -> Result<Config> {
        self.source.bare_client_config().await
    }

    async fn client(&self) -> Result<Client> {
        self.delegate.client().await
    }

    async fn discovery_client(&self) -> Result<CachedDiscovery> {
        build_discovery_client(&self.source).await
    }

    fn update_pod_spec(
        &self,
        object: &mut ResourceObject,
        mutate: &mut dyn FnMut(&mut corev1::PodSpec) -> Result<()>,
    ) -> Result<bool> {
        match object {
            ResourceObject::DeployConfig(dc) => {
                let template = dc.spec.template.get_or_insert_with(PodTemplate::default);
                let mut adapted = convert::external_mutator_for_internal(mutate);
                adapted(&mut template.spec)?;
                Ok(true)
            }
            other => self.delegate.update_pod_spec(other, mutate),
        }
    }

    fn map_based_selector(&self, object: &ResourceObject) -> Result<String> {
        match object {
            ResourceObject::DeployConfig(dc) => Ok(selector_string(&dc.spec.selector)),
            other => self.delegate.map_based_selector(other),
        }
    }

    fn ports_for_object(&self, object: &ResourceObject) -> Result<Vec<String>> {
        match object {
            ResourceObject::DeployConfig(dc) => Ok(dc
                .spec
                .template
                .as_ref()
                .map(|t| template_ports(&t.spec))
                .unwrap_or_default()),
            other => self.delegate.ports_for_object(other),
        }
    }

    fn protocols_for_object(
        &self,
        object: &ResourceObject,
    ) -> Result<BTreeMap<String, String>> {
        match object {
            ResourceObject::DeployConfig(dc) => Ok(dc
                .spec
                .template
                .as_ref()
                .map(|t| template_protocols(&t.spec))
                .unwrap_or_default()),
            other => self.delegate.protocols_for_object(other),
        }
    }

    fn labels_for_object(&self, object: &ResourceObject) -> Result<BTreeMap<String, String>> {
        self.delegate.labels_for_object(object)
    }

    fn pauser(&self, object: &mut ResourceObject) -> Result<Vec<u8>> {
        match object {
            ResourceObject::DeployConfig(dc) => {
                if dc.spec.paused {
                    return Err(FactoryError::AlreadyPaused);
                }
                dc.spec.paused = true;
                // TODO: suspending reconciliation does not stop rollout pods
                // already launched for this config.
            }
            other => return self.delegate.pauser(other),
        }
        self.encoder.encode(object)
    }

    fn resumer(&self, object: &mut ResourceObject) -> Result<Vec<u8>> {
        match object {
            ResourceObject::DeployConfig(dc) => {
                if !dc.spec.paused {
                    return Err(FactoryError::NotPaused);
                }
                dc.spec.paused = false;
            }
            other => return self.delegate.resumer(other),
        }
        self.encoder.encode(object)
    }

    fn can_be_exposed(&self, kind: &GroupKind) -> Result<()> {
        if deploy_config::is_deploy_config_kind(kind) {
            return Ok(());
        }
        self.delegate.can_be_exposed(kind)
    }

    fn can_be_autoscaled(&self, kind: &GroupKind) -> Result<()> {
        if deploy_config::is_deploy_config_kind(kind) {
            return Ok(());
        }
        self.delegate.can_be_autoscaled(kind)
    }

    fn generators(&self, command: &str) -> HashMap<String, Arc<dyn Generator>> {
        let mut merged = self.delegate.generators(command);
        // specialized entries win on collision; nothing is removed
        merged.extend(generators::default_generators(command));
        merged
    }

    fn default_namespace(&self) -> Result<(String, bool)> {
        self.delegate.default_namespace()
    }

    fn resolve_image(&self, image: &str) -> Result<String> {
        self.delegate.resolve_image(image)
    }

    fn bind_flags(&self, command: clap::Command) -> clap::Command {
        self.delegate.bind_flags(command)
    }

    fn command_record(&self, argv: &[String], show_secrets: bool) -> String {
        self.delegate.command_record(argv, show_secrets)
    }

    fn default_resource_filter(&self) -> ResourceFilter {
        self.delegate.default_resource_filter()
    }

    fn suggested_pod_template_resources(&self) -> Vec<GroupResource> {
        self.delegate.suggested_pod_template_resources()
    }

    fn editor_envs(&self) -> Vec<String> {
        config::EDITOR_ENVS.iter().map(|s| s.to_string()).collect()
    }
}

/// Encode a selector map as a label-expression string, sorted by key.
fn selector_string(selector: &BTreeMap<String, String>) -> String {
    selector
        .iter()
        .map(|(key, value)| format!("{key}={value}"))
        .collect::<Vec<_>>()
        .join(",")
}

fn template_ports(spec: &PodSpec) -> Vec<String> {
    let mut ports = Vec::new();
    for container in &spec.containers {
        for port in &container.ports {
            ports.push(port.container_port.to_string());
        }
    }
    ports
}

fn template_protocols(spec: &PodSpec) -> BTreeMap<String, String> {
    let mut protocols = BTreeMap::new();
    for container in &spec.containers {
        for port in &container.ports {
            protocols.insert(
                port.container_port.to_string(),
                port.protocol.unwrap_or_default().as_str().to_string(),
            );
        }
    }
    protocols
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::factory::generators::ParamSpec;
    use crate::kubernetes::client::tests::test_kubeconfig;
    use crate::resources::deploy_config::DeployConfig;
    use crate::resources::pod::{Container, Protocol};
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct StubDelegate {
        calls: Mutex<Vec<&'static str>>,
    }

    impl StubDelegate {
        fn record(&self, op: &'static str) {
            self.calls.lock().unwrap().push(op);
        }

        fn called(&self, op: &'static str) -> bool {
            self.calls.lock().unwrap().contains(&op)
        }
    }

    struct MarkerGenerator;

    impl Generator for MarkerGenerator {
        fn param_specs(&self) -> &'static [ParamSpec] {
            &[]
        }

        fn generate(
            &self,
            _params: &BTreeMap<String, String>,
        ) -> Result<ResourceObject> {
            Err(FactoryError::MissingParam("marker"))
        }
    }

    #[async_trait]
    impl ClientAccessFactory for StubDelegate {
        fn raw_config(&self) -> Result<Kubeconfig> {
            self.record("raw_config");
            Ok(Kubeconfig::default())
        }

        async fn client_config(&self) -> Result<Config> {
            self.record("client_config");
            Err(FactoryError::NoHomeDir)
        }

        async fn bare_client_config(&self) -> Result<Config> {
            self.record("bare_client_config");
            Err(FactoryError::NoHomeDir)
        }

        async fn client(&self) -> Result<Client> {
            self.record("client");
            Err(FactoryError::NoHomeDir)
        }

        async fn discovery_client(&self) -> Result<CachedDiscovery> {
            self.record("discovery_client");
            Err(FactoryError::NoHomeDir)
        }

        fn update_pod_spec(
            &self,
            _object: &mut ResourceObject,
            _mutate: &mut dyn FnMut(&mut corev1::PodSpec) -> Result<()>,
        ) -> Result<bool> {
            self.record("update_pod_spec");
            Ok(false)
        }

        fn map_based_selector(&self, _object: &ResourceObject) -> Result<String> {
            self.record("map_based_selector");
            Ok("origin=delegate".to_string())
        }

        fn ports_for_object(&self, _object: &ResourceObject) -> Result<Vec<String>> {
            self.record("ports_for_object");
            Ok(vec!["9999".to_string()])
        }

        fn protocols_for_object(
            &self,
            _object: &ResourceObject,
        ) -> Result<BTreeMap<String, String>> {
            self.record("protocols_for_object");
            Ok(BTreeMap::from([("9999".to_string(), "TCP".to_string())]))
        }

        fn labels_for_object(
            &self,
            _object: &ResourceObject,
        ) -> Result<BTreeMap<String, String>> {
            self.record("labels_for_object");
            Ok(BTreeMap::from([(
                "origin".to_string(),
                "delegate".to_string(),
            )]))
        }

        fn pauser(&self, _object: &mut ResourceObject) -> Result<Vec<u8>> {
            self.record("pauser");
            Ok(b"delegate-paused".to_vec())
        }

        fn resumer(&self, _object: &mut ResourceObject) -> Result<Vec<u8>> {
            self.record("resumer");
            Ok(b"delegate-resumed".to_vec())
        }

        fn can_be_exposed(&self, _kind: &GroupKind) -> Result<()> {
            self.record("can_be_exposed");
            Ok(())
        }

        fn can_be_autoscaled(&self, _kind: &GroupKind) -> Result<()> {
            self.record("can_be_autoscaled");
            Ok(())
        }

        fn generators(&self, _command: &str) -> HashMap<String, Arc<dyn Generator>> {
            self.record("generators");
            let mut table: HashMap<String, Arc<dyn Generator>> = HashMap::new();
            table.insert("delegate/v1".to_string(), Arc::new(MarkerGenerator));
            table.insert("deployconfig/v1".to_string(), Arc::new(MarkerGenerator));
            table
        }

        fn default_namespace(&self) -> Result<(String, bool)> {
            self.record("default_namespace");
            Ok(("delegate-ns".to_string(), true))
        }

        fn resolve_image(&self, image: &str) -> Result<String> {
            self.record("resolve_image");
            Ok(format!("resolved/{image}"))
        }

        fn bind_flags(&self, command: clap::Command) -> clap::Command {
            self.record("bind_flags");
            command.arg(clap::Arg::new("delegate-flag").long("delegate-flag"))
        }

        fn command_record(&self, argv: &[String], _show_secrets: bool) -> String {
            self.record("command_record");
            argv.join(" ")
        }

        fn default_resource_filter(&self) -> ResourceFilter {
            self.record("default_resource_filter");
            Arc::new(|_| true)
        }

        fn suggested_pod_template_resources(&self) -> Vec<GroupResource> {
            self.record("suggested_pod_template_resources");
            vec![GroupResource {
                group: "apps".to_string(),
                resource: "deployments".to_string(),
            }]
        }

        fn editor_envs(&self) -> Vec<String> {
            self.record("editor_envs");
            vec!["DELEGATE_EDITOR".to_string()]
        }
    }

    fn factory() -> (DeployConfigFactory, Arc<StubDelegate>) {
        let delegate = Arc::new(StubDelegate::default());
        let source = Arc::new(
            ClientSource::from_kubeconfig(test_kubeconfig(), Some("edge")).unwrap(),
        );
        (
            DeployConfigFactory::new(delegate.clone(), source),
            delegate,
        )
    }

    fn generic_object() -> ResourceObject {
        ResourceObject::from_value(json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "frontend"},
        }))
        .unwrap()
    }

    fn deploy_config_with_ports() -> DeployConfig {
        let mut dc = DeployConfig::new("frontend");
        dc.spec
            .selector
            .insert("app".to_string(), "web".to_string());
        dc.spec
            .selector
            .insert("tier".to_string(), "front".to_string());
        dc.spec.template = Some(PodTemplate {
            spec: PodSpec::default()
                .container(Container::new("web", "nginx").port(80).port(443))
                .container(Container::new("api", "api-img").port(8080)),
            ..Default::default()
        });
        dc
    }

    #[test]
    fn generic_objects_are_forwarded_verbatim() {
        let (factory, delegate) = factory();
        let mut object = generic_object();

        assert_eq!(
            factory.map_based_selector(&object).unwrap(),
            "origin=delegate"
        );
        assert_eq!(factory.ports_for_object(&object).unwrap(), vec!["9999"]);
        assert_eq!(
            factory.protocols_for_object(&object).unwrap(),
            BTreeMap::from([("9999".to_string(), "TCP".to_string())])
        );
        assert_eq!(factory.pauser(&mut object).unwrap(), b"delegate-paused");
        assert_eq!(factory.resumer(&mut object).unwrap(), b"delegate-resumed");
        let mut noop = |_: &mut corev1::PodSpec| Ok(());
        assert!(!factory.update_pod_spec(&mut object, &mut noop).unwrap());

        for op in [
            "map_based_selector",
            "ports_for_object",
            "protocols_for_object",
            "pauser",
            "resumer",
            "update_pod_spec",
        ] {
            assert!(delegate.called(op), "delegate not called for {op}");
        }
    }

    #[test]
    fn passthrough_operations_reach_the_delegate() {
        let (factory, delegate) = factory();
        let object = generic_object();

        factory.raw_config().unwrap();
        assert_eq!(
            factory.labels_for_object(&object).unwrap()["origin"],
            "delegate"
        );
        assert_eq!(
            factory.default_namespace().unwrap(),
            ("delegate-ns".to_string(), true)
        );
        assert_eq!(factory.resolve_image("nginx").unwrap(), "resolved/nginx");
        assert_eq!(
            factory.command_record(&["kubedc".to_string(), "run".to_string()], false),
            "kubedc run"
        );
        let command = factory.bind_flags(clap::Command::new("kubedc"));
        assert!(
            command
                .get_arguments()
                .any(|a| a.get_id() == "delegate-flag")
        );
        assert!((factory.default_resource_filter())(&object));
        assert_eq!(
            factory.suggested_pod_template_resources()[0].resource,
            "deployments"
        );

        for op in [
            "raw_config",
            "labels_for_object",
            "default_namespace",
            "resolve_image",
            "command_record",
            "bind_flags",
            "default_resource_filter",
            "suggested_pod_template_resources",
        ] {
            assert!(delegate.called(op), "delegate not called for {op}");
        }
    }

    #[tokio::test]
    async fn async_construction_ops_pass_through_except_the_source_backed_ones() {
        let (factory, delegate) = factory();

        assert!(factory.client_config().await.is_err());
        assert!(delegate.called("client_config"));
        assert!(factory.client().await.is_err());
        assert!(delegate.called("client"));

        // bare config and discovery come from the factory's own source
        let bare = factory.bare_client_config().await.unwrap();
        assert!(
            bare.cluster_url
                .to_string()
                .starts_with("https://api.edge.example.com:6443")
        );
        assert!(!delegate.called("bare_client_config"));

        let discovery = factory.discovery_client().await.unwrap();
        assert!(
            discovery
                .cache_dir()
                .ends_with("api.edge.example.com_6443")
        );
        assert!(!delegate.called("discovery_client"));
    }

    #[test]
    fn selector_for_deploy_config_is_canonical() {
        let (factory, delegate) = factory();
        let object = ResourceObject::DeployConfig(deploy_config_with_ports());
        assert_eq!(
            factory.map_based_selector(&object).unwrap(),
            "app=web,tier=front"
        );
        assert!(!delegate.called("map_based_selector"));
    }

    #[test]
    fn ports_come_back_in_declaration_order() {
        let (factory, _) = factory();
        let object = ResourceObject::DeployConfig(deploy_config_with_ports());
        assert_eq!(
            factory.ports_for_object(&object).unwrap(),
            vec!["80", "443", "8080"]
        );
    }

    #[test]
    fn ports_of_a_template_less_config_are_empty() {
        let (factory, _) = factory();
        let object = ResourceObject::DeployConfig(DeployConfig::new("bare"));
        assert!(factory.ports_for_object(&object).unwrap().is_empty());
        assert!(factory.protocols_for_object(&object).unwrap().is_empty());
    }

    #[test]
    fn duplicate_ports_keep_the_last_declared_protocol() {
        let (factory, _) = factory();
        let mut dc = DeployConfig::new("frontend");
        dc.spec.template = Some(PodTemplate {
            spec: PodSpec::default()
                .container(
                    Container::new("a", "img-a").port_with_protocol(80, Protocol::Tcp),
                )
                .container(
                    Container::new("b", "img-b").port_with_protocol(80, Protocol::Udp),
                ),
            ..Default::default()
        });
        let object = ResourceObject::DeployConfig(dc);
        assert_eq!(
            factory.protocols_for_object(&object).unwrap(),
            BTreeMap::from([("80".to_string(), "UDP".to_string())])
        );
    }

    #[test]
    fn unset_protocols_default_to_tcp() {
        let (factory, _) = factory();
        let object = ResourceObject::DeployConfig(deploy_config_with_ports());
        let protocols = factory.protocols_for_object(&object).unwrap();
        assert_eq!(protocols["80"], "TCP");
    }

    #[test]
    fn pause_and_resume_walk_the_two_state_machine() {
        let (factory, delegate) = factory();
        let mut object = ResourceObject::DeployConfig(deploy_config_with_ports());
        let original = match &object {
            ResourceObject::DeployConfig(dc) => dc.clone(),
            _ => unreachable!(),
        };

        let encoded = factory.pauser(&mut object).unwrap();
        let paused: DeployConfig = serde_json::from_slice(&encoded).unwrap();
        assert!(paused.spec.paused);

        // wrong-direction transition fails and leaves the flag alone
        let err = factory.pauser(&mut object).unwrap_err();
        assert!(matches!(err, FactoryError::AlreadyPaused));
        match &object {
            ResourceObject::DeployConfig(dc) => assert!(dc.spec.paused),
            _ => unreachable!(),
        }

        let encoded = factory.resumer(&mut object).unwrap();
        let resumed: DeployConfig = serde_json::from_slice(&encoded).unwrap();
        assert!(!resumed.spec.paused);
        assert_eq!(resumed, original);

        let err = factory.resumer(&mut object).unwrap_err();
        assert!(matches!(err, FactoryError::NotPaused));

        assert!(!delegate.called("pauser"));
        assert!(!delegate.called("resumer"));
    }

    #[test]
    fn custom_encoders_serialize_pause_output() {
        struct FixedEncoder;
        impl ObjectEncoder for FixedEncoder {
            fn encode(&self, _object: &ResourceObject) -> Result<Vec<u8>> {
                Ok(b"encoded".to_vec())
            }
        }

        let delegate = Arc::new(StubDelegate::default());
        let source = Arc::new(
            ClientSource::from_kubeconfig(test_kubeconfig(), Some("edge")).unwrap(),
        );
        let factory =
            DeployConfigFactory::new(delegate, source).with_encoder(Arc::new(FixedEncoder));

        let mut object = ResourceObject::DeployConfig(DeployConfig::new("frontend"));
        assert_eq!(factory.pauser(&mut object).unwrap(), b"encoded");
    }

    #[test]
    fn update_pod_spec_synthesizes_a_missing_template() {
        let (factory, _) = factory();
        let mut object = ResourceObject::DeployConfig(DeployConfig::new("frontend"));

        let mut add_container = |spec: &mut corev1::PodSpec| {
            spec.containers.push(corev1::Container {
                name: "injected".to_string(),
                image: Some("nginx".to_string()),
                ..Default::default()
            });
            Ok(())
        };
        assert!(factory.update_pod_spec(&mut object, &mut add_container).unwrap());

        match &object {
            ResourceObject::DeployConfig(dc) => {
                let template = dc.spec.template.as_ref().unwrap();
                assert_eq!(template.spec.containers[0].name, "injected");
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn update_pod_spec_reports_updated_even_for_a_noop_mutator() {
        let (factory, _) = factory();
        let mut object = ResourceObject::DeployConfig(deploy_config_with_ports());
        let mut noop = |_: &mut corev1::PodSpec| Ok(());
        assert!(factory.update_pod_spec(&mut object, &mut noop).unwrap());
    }

    #[test]
    fn exposability_is_granted_for_the_specialized_kind_and_its_alias() {
        let (factory, delegate) = factory();

        let grouped = GroupKind {
            group: "workloads.kubedc.io".to_string(),
            kind: "DeployConfig".to_string(),
        };
        let legacy = GroupKind {
            group: String::new(),
            kind: "DeployConfig".to_string(),
        };
        factory.can_be_exposed(&grouped).unwrap();
        factory.can_be_exposed(&legacy).unwrap();
        factory.can_be_autoscaled(&grouped).unwrap();
        assert!(!delegate.called("can_be_exposed"));
        assert!(!delegate.called("can_be_autoscaled"));

        let generic = GroupKind {
            group: "apps".to_string(),
            kind: "Deployment".to_string(),
        };
        factory.can_be_exposed(&generic).unwrap();
        factory.can_be_autoscaled(&generic).unwrap();
        assert!(delegate.called("can_be_exposed"));
        assert!(delegate.called("can_be_autoscaled"));
    }

    #[test]
    fn generator_tables_merge_with_specialized_entries_winning() {
        let (factory, _) = factory();
        let table = factory.generators("run");

        // delegate keys survive, specialized keys are added
        assert!(table.contains_key("delegate/v1"));
        assert!(table.contains_key("run-controller/v1"));
        // the colliding key holds the specialized generator, not the marker
        assert!(!table["deployconfig/v1"].param_specs().is_empty());
        assert_eq!(table.len(), 3);
    }

    #[test]
    fn editor_envs_are_overridden_not_delegated() {
        let (factory, delegate) = factory();
        assert_eq!(factory.editor_envs(), vec!["KUBEDC_EDITOR", "EDITOR"]);
        assert!(!delegate.called("editor_envs"));
    }
}
