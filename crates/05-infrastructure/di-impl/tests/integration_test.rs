//! 默认协作者组合使用的集成测试

use config_impl::{Environment, MapPropertySource};
use di_abstractions::{
    ComponentDefinition, ComponentScanner, ConditionContext, ConditionGate, ConditionTarget,
    ConfigurationPhase, DeferredImportGroup, DeferredImportSelector, DefinitionOrigin,
    DefinitionRegistry, GroupEntry, ImportContext, ImportHandler, ImportHandlerFactory,
    NameGenerator, ResourceDefinitionReader, ScanDirective, TypeFilter,
};
use di_impl::{
    ConditionEvaluator, DefaultDefinitionRegistry, FileDefinitionReader, FixedDeferredSelector,
    HandlerCatalog, MarkerNameGenerator, PropertyListSelector, TypeCatalog,
};
use infrastructure_common::{MarkerIndex, MetadataView, ResolutionError, TypeLoader};
use std::io::Write;
use std::sync::Arc;

const CATALOG: &str = r#"
[[types]]
name = "app.Gateway"
kind = "marker"
markers = [{ name = "di.stereotype.Component" }]

[[types]]
name = "app.pay.StripeClient"
markers = [{ name = "app.Gateway", attributes = { value = "paymentGateway" } }]

[[types]]
name = "app.pay.LedgerService"
markers = [{ name = "di.stereotype.Service" }]

[[types]]
name = "app.pay.LedgerRepository"
superclass = "app.pay.BaseRepository"

[[types]]
name = "app.pay.BaseRepository"
is_abstract = true

[[types]]
name = "app.pay.internal.AuditTrail"
markers = [{ name = "di.stereotype.Component" }]

[[types]]
name = "app.web.Router"
markers = [{ name = "di.stereotype.Controller" }]
"#;

fn catalog() -> Arc<TypeCatalog> {
    Arc::new(TypeCatalog::from_toml_str(CATALOG).unwrap().with_standard_markers())
}

/// 扫描并按组件命名策略注册，返回注册名
fn scan_and_register(
    catalog: &Arc<TypeCatalog>,
    directive: &ScanDirective,
    registry: &mut DefaultDefinitionRegistry,
) -> Vec<String> {
    let markers = MarkerIndex::new(catalog.clone());
    let scanner = di_impl::CatalogComponentScanner::new(catalog.clone());
    let names = MarkerNameGenerator::with_types(catalog.clone());
    let mut registered = Vec::new();
    for view in scanner.scan(directive, &markers).unwrap() {
        let definition = ComponentDefinition::new(view.type_name())
            .with_origin(DefinitionOrigin::Scanned)
            .with_markers(view.markers().to_vec());
        let name = names.generate_name(&definition, registry).unwrap();
        registry.register(&name, definition).unwrap();
        registered.push(name);
    }
    registered
}

#[test]
fn test_scan_with_custom_stereotype_and_filters() {
    let catalog = catalog();
    let mut registry = DefaultDefinitionRegistry::new();

    let mut directive = ScanDirective::new("app.Root", vec!["app.pay".to_string()]);
    directive.include_filters =
        vec![TypeFilter::parse("assignable:app.pay.BaseRepository").unwrap()];
    directive.exclude_filters = vec![TypeFilter::parse("regex:app\\.pay\\.internal\\..*").unwrap()];

    let names = scan_and_register(&catalog, &directive, &mut registry);

    // 自定义构造型的 value 作为显式名称
    assert_eq!(names, vec!["paymentGateway", "ledgerService", "ledgerRepository"]);
    assert_eq!(registry.get("paymentGateway").unwrap().type_name, "app.pay.StripeClient");
    assert!(!registry.contains("auditTrail"));
    assert!(!registry.contains("router"));
    assert!(!registry.contains("baseRepository"));
}

#[test]
fn test_scan_without_default_filters_uses_only_includes() {
    let catalog = catalog();
    let mut registry = DefaultDefinitionRegistry::new();
    let mut directive = ScanDirective::new("app.Root", vec!["app".to_string()]);
    directive.use_default_filters = false;
    directive.include_filters = vec![TypeFilter::parse("marker:di.stereotype.Controller").unwrap()];

    let names = scan_and_register(&catalog, &directive, &mut registry);

    assert_eq!(names, vec!["router"]);
}

#[test]
fn test_resource_definitions_in_every_format() {
    let dir = tempfile::tempdir().unwrap();
    let write = |file: &str, content: &str| {
        let path = dir.path().join(file);
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        path.display().to_string()
    };
    let toml = write(
        "infra.toml",
        "[definitions.dataSource]\ntype_name = \"app.PooledDataSource\"\nlazy_init = true\n",
    );
    let json = write(
        "infra.json",
        r#"{
            "definitions": {"clock": {"type_name": "app.SystemClock", "role": "infrastructure"}},
            "aliases": {"time": "clock"}
        }"#,
    );
    let yaml = write(
        "infra.yaml",
        "definitions:\n  mailer:\n    type_name: app.SmtpMailer\n    depends_on: [clock]\n",
    );

    let reader = FileDefinitionReader::new();
    let mut registry = DefaultDefinitionRegistry::new();
    for location in [&toml, &json, &yaml] {
        assert_eq!(reader.load_definitions(location, &mut registry).unwrap(), 1);
    }

    assert!(registry.get("dataSource").unwrap().lazy_init);
    assert_eq!(registry.canonical_name("time"), "clock");
    assert_eq!(registry.get("mailer").unwrap().depends_on, vec!["clock"]);
    assert_eq!(
        registry.get("clock").unwrap().origin,
        DefinitionOrigin::Resource { location: json.clone() }
    );

    let err = reader
        .load_definitions(&format!("{}/missing.toml", dir.path().display()), &mut registry)
        .unwrap_err();
    assert!(matches!(err, ResolutionError::Config { .. }));
}

#[test]
fn test_resource_conflicts_respect_override_policy() {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    write!(file, "[definitions.clock]\ntype_name = \"app.OtherClock\"\n").unwrap();

    let mut registry = DefaultDefinitionRegistry::new().with_allow_override(false);
    registry
        .register("clock", ComponentDefinition::new("app.SystemClock"))
        .unwrap();

    let err = FileDefinitionReader::new()
        .load_definitions(&file.path().display().to_string(), &mut registry)
        .unwrap_err();
    assert!(matches!(err, ResolutionError::NamingConflict { .. }));
    assert_eq!(registry.get("clock").unwrap().type_name, "app.SystemClock");
}

#[test]
fn test_conditions_see_registry_and_environment() {
    let catalog = catalog();
    let markers = MarkerIndex::new(catalog.clone());
    let mut environment = Environment::new();
    environment
        .property_sources_mut()
        .add_last(Arc::new(MapPropertySource::from_pairs("app", [("pay.enabled", "true")])));
    let mut registry = DefaultDefinitionRegistry::new();
    registry
        .register("paymentGateway", ComponentDefinition::new("app.pay.StripeClient"))
        .unwrap();

    let gated = TypeCatalog::from_toml_str(
        r#"
        [[types]]
        name = "app.pay.PayConfig"

        [[types.markers]]
        name = "di.condition.ConditionalOnProperty"
        attributes = { name = "pay.enabled" }

        [[types.markers]]
        name = "di.condition.ConditionalOnDefinition"
        attributes = { type = ["app.pay.StripeClient"] }

        [[types]]
        name = "app.pay.MockPayConfig"

        [[types.markers]]
        name = "di.condition.ConditionalOnMissingDefinition"
        attributes = { name = ["paymentGateway"] }
        "#,
    )
    .unwrap();

    let ctx = ConditionContext {
        registry: &registry,
        environment: &environment,
        types: catalog.as_ref(),
        markers: &markers,
    };
    let evaluator = ConditionEvaluator::new();
    let skip = |name: &str, phase| {
        let view = gated.load(name).unwrap();
        evaluator.should_skip(ConditionTarget::Type(view.as_ref()), phase, &ctx)
    };

    assert!(!skip("app.pay.PayConfig", ConfigurationPhase::RegisterDefinition));
    assert!(skip("app.pay.MockPayConfig", ConfigurationPhase::RegisterDefinition));
    // 定义条件只在注册阶段求值
    assert!(!skip("app.pay.MockPayConfig", ConfigurationPhase::ParseConfiguration));
}

/// 按目标名倒序输出的分组
#[derive(Default)]
struct ReversedGroup {
    entries: Vec<GroupEntry>,
}

impl DeferredImportGroup for ReversedGroup {
    fn process(
        &mut self,
        importing: &Arc<dyn MetadataView>,
        selector: &dyn DeferredImportSelector,
        ctx: &ImportContext<'_>,
    ) {
        for target in selector.select_imports(importing.as_ref(), ctx) {
            self.entries.push(GroupEntry {
                importing: importing.clone(),
                target,
            });
        }
    }

    fn select_imports(&mut self) -> Vec<GroupEntry> {
        let mut entries = std::mem::take(&mut self.entries);
        entries.sort_by(|a, b| b.target.cmp(&a.target));
        entries
    }
}

#[test]
fn test_handler_catalog_groups_deferred_selectors() {
    let catalog = catalog();
    let handlers = HandlerCatalog::new()
        .deferred(
            "app.AutoImports",
            Arc::new(PropertyListSelector::new("auto.imports", "app.EnableAuto").in_group("auto")),
        )
        .deferred(
            "app.Extra",
            Arc::new(FixedDeferredSelector::new(["app.z.Extra"]).in_group("auto")),
        )
        .group("auto", || Box::new(ReversedGroup::default()));

    let mut environment = Environment::new();
    environment.property_sources_mut().add_last(Arc::new(MapPropertySource::from_pairs(
        "app",
        [("auto.imports", "app.a.First, app.m.Middle")],
    )));
    let registry = DefaultDefinitionRegistry::new();
    let ctx = ImportContext {
        environment: &environment,
        registry: &registry,
        types: catalog.as_ref(),
    };

    let importing: Arc<dyn MetadataView> = catalog.load("app.web.Router").unwrap();
    let mut group = handlers.group_for("auto");
    for target in ["app.AutoImports", "app.Extra"] {
        match handlers.handler_for(target) {
            Some(ImportHandler::Deferred(selector)) => {
                assert_eq!(selector.group_key().as_deref(), Some("auto"));
                group.process(&importing, selector.as_ref(), &ctx);
            }
            other => panic!("unexpected handler for {}: {:?}", target, other.is_some()),
        }
    }

    let targets: Vec<String> = group.select_imports().into_iter().map(|e| e.target).collect();
    assert_eq!(targets, vec!["app.z.Extra", "app.m.Middle", "app.a.First"]);
    assert!(handlers.handler_for("app.Unknown").is_none());
}
