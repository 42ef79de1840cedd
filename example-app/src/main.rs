//! # 配置解析命令行工具
//!
//! 读取类型目录与根配置源，执行完整的配置解析，并以 JSON 输出注册表中的组件定义。
//!
//! ```text
//! example-app --catalog types.toml --root app=app.AppConfig \
//!     --properties application.yaml --settings resolver.toml
//! ```

use anyhow::{anyhow, bail, Context, Result};
use clap::Parser;
use config_impl::{Environment, PropertySourceLoader};
use config_resolution::{ConfigurationResolver, ResolutionSummary, ResolverSettings};
use di_abstractions::{ComponentDefinition, DefinitionRegistry, ResourceDefinitionReader};
use di_impl::{DefaultDefinitionRegistry, FileDefinitionReader, TypeCatalog};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// 命令行参数
#[derive(Parser, Debug)]
#[command(name = "example-app")]
#[command(about = "声明式配置解析工具")]
struct Args {
    /// 类型目录文件 (TOML)
    #[arg(short, long)]
    catalog: PathBuf,

    /// 根配置源，格式为 `name=type`，可重复
    #[arg(short, long = "root", value_name = "NAME=TYPE", required = true)]
    roots: Vec<String>,

    /// 预先载入注册表的定义文件，可重复
    #[arg(short, long = "definitions", value_name = "FILE")]
    definitions: Vec<String>,

    /// 属性文件，后出现的优先级更高
    #[arg(short, long = "properties", value_name = "FILE")]
    properties: Vec<String>,

    /// 解析器设置文件
    #[arg(short, long)]
    settings: Option<PathBuf>,

    /// 禁止同名定义覆盖
    #[arg(long)]
    no_override: bool,

    /// 日志级别
    #[arg(long, default_value = "info")]
    log_level: String,

    /// 以 JSON 格式输出日志
    #[arg(long)]
    json_logs: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();
    init_logging(&args);

    info!("启动配置解析工具");

    let catalog = TypeCatalog::from_toml_file(&args.catalog)
        .with_context(|| format!("加载类型目录失败: {}", args.catalog.display()))?
        .with_standard_markers();
    let settings = ResolverSettings::load(args.settings.as_deref()).context("加载解析器设置失败")?;
    let environment = build_environment(&args.properties)?;

    let mut registry = DefaultDefinitionRegistry::new().with_allow_override(!args.no_override);
    preload_definitions(&args.definitions, &mut registry)?;
    register_roots(&args.roots, &mut registry)?;

    let mut resolver = ConfigurationResolver::for_catalog(Arc::new(catalog))
        .settings(settings)
        .environment(environment)
        .build();
    let summary = resolver.resolve(&mut registry).context("配置解析失败")?;

    for problem in summary.warnings() {
        warn!("{}", problem);
    }
    info!(
        "解析完成: {} 轮, {} 个配置源, {} 个组件定义",
        summary.rounds,
        summary.sources.len(),
        registry.len()
    );

    let output = render(&registry, &summary)?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// 初始化日志，`RUST_LOG` 优先于命令行级别
fn init_logging(args: &Args) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if args.json_logs {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// 系统环境变量之上叠加属性文件
fn build_environment(files: &[String]) -> Result<Environment> {
    let mut environment = Environment::new().with_system_environment();
    let loader = PropertySourceLoader::new();
    for (idx, location) in files.iter().enumerate() {
        let source = loader
            .load(&format!("cli-properties-{}", idx), location)
            .with_context(|| format!("加载属性文件失败: {}", location))?;
        environment.property_sources_mut().add_first(Arc::new(source));
    }
    Ok(environment)
}

fn preload_definitions(files: &[String], registry: &mut DefaultDefinitionRegistry) -> Result<()> {
    let reader = FileDefinitionReader::new();
    for location in files {
        let count = reader
            .load_definitions(location, registry)
            .with_context(|| format!("加载定义文件失败: {}", location))?;
        info!("预载入 {} 个定义: {}", count, location);
    }
    Ok(())
}

fn register_roots(roots: &[String], registry: &mut DefaultDefinitionRegistry) -> Result<()> {
    for root in roots {
        let (name, type_name) = parse_root(root)?;
        registry
            .register(name, ComponentDefinition::new(type_name))
            .with_context(|| format!("注册根配置源失败: {}", root))?;
    }
    Ok(())
}

fn parse_root(text: &str) -> Result<(&str, &str)> {
    let (name, type_name) = text
        .split_once('=')
        .ok_or_else(|| anyhow!("根配置源格式应为 name=type: {}", text))?;
    let (name, type_name) = (name.trim(), type_name.trim());
    if name.is_empty() || type_name.is_empty() {
        bail!("根配置源的名称与类型均不能为空: {}", text);
    }
    Ok((name, type_name))
}

fn render(registry: &DefaultDefinitionRegistry, summary: &ResolutionSummary) -> Result<Value> {
    let mut definitions = serde_json::Map::new();
    for (name, definition) in registry.iter() {
        let mut entry = serde_json::to_value(definition)?;
        let aliases = registry.aliases(name);
        if !aliases.is_empty() {
            if let Value::Object(map) = &mut entry {
                map.insert("aliases".to_string(), json!(aliases));
            }
        }
        definitions.insert(name.clone(), entry);
    }
    let problems: Vec<String> = summary
        .problems
        .problems()
        .iter()
        .map(ToString::to_string)
        .collect();
    Ok(json!({
        "rounds": summary.rounds,
        "sources": summary.sources,
        "problems": problems,
        "definitions": definitions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_root() {
        assert_eq!(parse_root("app = app.AppConfig").unwrap(), ("app", "app.AppConfig"));
        assert!(parse_root("app.AppConfig").is_err());
        assert!(parse_root("=app.AppConfig").is_err());
    }

    #[test]
    fn test_args_accept_repeated_roots() {
        let args = Args::try_parse_from([
            "example-app",
            "--catalog",
            "types.toml",
            "--root",
            "a=app.A",
            "--root",
            "b=app.B",
            "-p",
            "one.toml",
        ])
        .unwrap();
        assert_eq!(args.roots, vec!["a=app.A", "b=app.B"]);
        assert_eq!(args.properties, vec!["one.toml"]);
        assert!(!args.no_override);
    }

    #[test]
    fn test_render_includes_aliases() {
        let mut registry = DefaultDefinitionRegistry::new();
        registry
            .register("dataSource", ComponentDefinition::new("app.PooledDataSource"))
            .unwrap();
        registry.register_alias("dataSource", "ds").unwrap();

        let output = render(&registry, &ResolutionSummary::default()).unwrap();

        assert_eq!(output["rounds"], 0);
        assert_eq!(output["definitions"]["dataSource"]["type_name"], "app.PooledDataSource");
        assert_eq!(output["definitions"]["dataSource"]["aliases"], json!(["ds"]));
    }
}
